//! Typed calls, return values, and events of the marketplace contract.

use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use ethers::types::{BlockNumber, Bytes, Filter, H256, Log};

use crate::{Address, BindingError, TxHash, U256};

const PRODUCT_COUNT: &str = "function productCount() external view returns (uint256)";
const PRODUCTS_WITH_CREATOR: &str = "function products(uint256 id) external view returns (uint256, string, string, uint256, address, address, bool)";
const PRODUCTS_LEGACY: &str =
    "function products(uint256 id) external view returns (uint256, string, string, uint256, address, bool)";
const BUY_PRODUCT: &str = "function buyProduct(uint256 productId) external payable";
const CREATE_PRODUCT: &str =
    "function createProduct(string name, string description, uint256 price, string ipfsHash) external";
const GET_PRODUCTS_BY_OWNER: &str = "function getProductsByOwner(address owner) external view returns (uint256[])";
const PRODUCT_SOLD: &str =
    "event ProductSold(uint256 indexed productId, address indexed seller, address indexed buyer, uint256 price)";

/// Canonical signature hashed into topic 0 of every sale log.
pub const PRODUCT_SOLD_SIGNATURE: &str = "ProductSold(uint256,address,address,uint256)";

// =============================================================================
// LISTING TUPLE
// =============================================================================

/// Field layout of the struct returned by `products(uint256)`.
///
/// Older deployments predate the `creator` field; their tuple goes straight
/// from `owner` to `isAvailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingLayout {
    #[default]
    WithCreator,
    Legacy,
}

/// A listing exactly as the contract returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    /// Contract-assigned identifier; `0` marks a slot that does not exist.
    pub product_id: u64,
    pub name: String,
    pub description: String,
    pub price: U256,
    pub owner: Address,
    pub creator: Option<Address>,
    pub is_available: bool,
}

impl RawListing {
    /// `true` when the contract returned the zeroed struct for an unused slot.
    #[must_use]
    pub fn is_empty_slot(&self) -> bool {
        self.product_id == 0
    }
}

type CreatorTuple = (U256, String, String, U256, Address, Address, bool);
type LegacyTuple = (U256, String, String, U256, Address, bool);

/// A decoded `ProductSold` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoldEvent {
    pub product_id: u64,
    pub seller: Address,
    pub buyer: Address,
    pub price: U256,
    pub tx_hash: Option<TxHash>,
}

// =============================================================================
// BINDING
// =============================================================================

/// The marketplace ABI for one listing layout.
#[derive(Debug, Clone)]
pub struct MarketAbi {
    contract: BaseContract,
    layout: ListingLayout,
}

impl MarketAbi {
    /// Build the binding for `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Parse`] if a signature fails to parse.
    pub fn new(layout: ListingLayout) -> Result<Self, BindingError> {
        let products = match layout {
            ListingLayout::WithCreator => PRODUCTS_WITH_CREATOR,
            ListingLayout::Legacy => PRODUCTS_LEGACY,
        };
        let abi = parse_abi(&[PRODUCT_COUNT, products, BUY_PRODUCT, CREATE_PRODUCT, GET_PRODUCTS_BY_OWNER, PRODUCT_SOLD])
            .map_err(|e| BindingError::Parse(e.to_string()))?;
        Ok(Self { contract: BaseContract::from(abi), layout })
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`BindingError::Abi`] if the function is missing from the ABI.
    pub fn product_count_call(&self) -> Result<Bytes, BindingError> {
        Ok(self.contract.encode("productCount", ())?)
    }

    /// # Errors
    ///
    /// Returns [`BindingError::Abi`] if the function is missing from the ABI.
    pub fn product_call(&self, id: u64) -> Result<Bytes, BindingError> {
        Ok(self.contract.encode("products", U256::from(id))?)
    }

    /// # Errors
    ///
    /// Returns [`BindingError::Abi`] if the function is missing from the ABI.
    pub fn buy_product_call(&self, id: u64) -> Result<Bytes, BindingError> {
        Ok(self.contract.encode("buyProduct", U256::from(id))?)
    }

    /// # Errors
    ///
    /// Returns [`BindingError::Abi`] if the function is missing from the ABI.
    pub fn create_product_call(
        &self,
        name: &str,
        description: &str,
        price: U256,
        reference: &str,
    ) -> Result<Bytes, BindingError> {
        let args = (name.to_owned(), description.to_owned(), price, reference.to_owned());
        Ok(self.contract.encode("createProduct", args)?)
    }

    /// # Errors
    ///
    /// Returns [`BindingError::Abi`] if the function is missing from the ABI.
    pub fn products_by_owner_call(&self, owner: Address) -> Result<Bytes, BindingError> {
        Ok(self.contract.encode("getProductsByOwner", owner)?)
    }

    // -------------------------------------------------------------------------
    // Return data
    // -------------------------------------------------------------------------

    /// Decode the return data of `productCount()`.
    ///
    /// # Errors
    ///
    /// Returns a [`BindingError`] for malformed data or a count beyond `u64`.
    pub fn decode_count(&self, data: &Bytes) -> Result<u64, BindingError> {
        let count: U256 = self.contract.decode_output("productCount", data)?;
        to_u64("productCount", count)
    }

    /// Decode the return data of `products(uint256)` under this layout.
    ///
    /// # Errors
    ///
    /// Returns a [`BindingError`] when the tuple does not match the layout.
    pub fn decode_listing(&self, data: &Bytes) -> Result<RawListing, BindingError> {
        let (id, name, description, price, owner, creator, is_available) = match self.layout {
            ListingLayout::WithCreator => {
                let (id, name, description, price, owner, creator, available): CreatorTuple =
                    self.contract.decode_output("products", data)?;
                (id, name, description, price, owner, Some(creator), available)
            }
            ListingLayout::Legacy => {
                let (id, name, description, price, owner, available): LegacyTuple =
                    self.contract.decode_output("products", data)?;
                (id, name, description, price, owner, None, available)
            }
        };
        Ok(RawListing { product_id: to_u64("productId", id)?, name, description, price, owner, creator, is_available })
    }

    /// Decode the `uint256[]` returned by `getProductsByOwner(address)`.
    ///
    /// # Errors
    ///
    /// Returns a [`BindingError`] for malformed data or identifiers beyond `u64`.
    pub fn decode_owner_index(&self, data: &Bytes) -> Result<Vec<u64>, BindingError> {
        let ids: Vec<U256> = self.contract.decode_output("getProductsByOwner", data)?;
        ids.into_iter().map(|id| to_u64("productId", id)).collect()
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Decode a `ProductSold` log.
    ///
    /// # Errors
    ///
    /// Returns a [`BindingError`] when the log belongs to another event or
    /// its topics are malformed.
    pub fn decode_sold(&self, log: &Log) -> Result<SoldEvent, BindingError> {
        let (product_id, seller, buyer, price): (U256, Address, Address, U256) =
            self.contract.decode_event("ProductSold", log.topics.clone(), log.data.clone())?;
        Ok(SoldEvent { product_id: to_u64("productId", product_id)?, seller, buyer, price, tx_hash: log.transaction_hash })
    }
}

/// Log filter for sales to `buyer`: `[signature, any, any, buyer]` from
/// `from_block` to the chain head.
#[must_use]
pub fn sold_filter(market: Address, buyer: Address, from_block: u64) -> Filter {
    Filter::new()
        .address(market)
        .event(PRODUCT_SOLD_SIGNATURE)
        .topic3(H256::from(buyer))
        .from_block(from_block)
        .to_block(BlockNumber::Latest)
}

fn to_u64(field: &'static str, value: U256) -> Result<u64, BindingError> {
    if value > U256::from(u64::MAX) {
        return Err(BindingError::OutOfRange { field, value });
    }
    Ok(value.low_u64())
}

#[cfg(test)]
#[path = "market_test.rs"]
mod tests;
