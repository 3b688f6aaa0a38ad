//! In-memory wallet and contract for unit tests.
//!
//! `MockWallet` hands out `MockContract` handles that all share one
//! `MarketState`, so a purchase made through one handle is visible to the
//! next read, like a chain would be after the transaction is mined.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use abi::market::RawListing;
use abi::{Address, TxHash, U256};

use crate::contract::{Capabilities, MarketContract, Receipt, SoldEvent};
use crate::error::MarketError;
use crate::session::WalletSession;
use crate::wallet::{Signer, WalletProvider};

pub const ONE_ETHER: u64 = 1_000_000_000_000_000_000;

#[must_use]
pub fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

#[must_use]
pub fn tx(n: u8) -> TxHash {
    TxHash::repeat_byte(n)
}

#[must_use]
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(ONE_ETHER)
}

/// A populated contract slot.
#[must_use]
pub fn raw_listing(id: u64, owner: Address, creator: Address, available: bool) -> RawListing {
    RawListing {
        product_id: id,
        name: format!("Ring {id}"),
        description: format!("Gold ring number {id}"),
        price: ether(id),
        owner,
        creator: Some(creator),
        is_available: available,
    }
}

/// Failures a mock call can be told to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    UserRejected,
    InsufficientFunds,
    Reverted(String),
    Transport,
}

impl MockFailure {
    #[must_use]
    pub fn to_error(&self) -> MarketError {
        match self {
            Self::UserRejected => MarketError::UserRejected,
            Self::InsufficientFunds => MarketError::InsufficientFunds,
            Self::Reverted(reason) => MarketError::Reverted { reason: Some(reason.clone()) },
            Self::Transport => MarketError::WalletNotPresent("connection refused".to_owned()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// CONTRACT
// =============================================================================

#[derive(Debug, Default)]
pub struct MarketState {
    /// Slot `i` holds listing id `i + 1`.
    pub listings: Vec<RawListing>,
    /// Reported by `productCount()` instead of `listings.len()`.
    pub count_override: Option<u64>,
    pub fail_count: bool,
    /// Ids whose `products(id)` read fails.
    pub fail_reads: BTreeSet<u64>,
    /// Ids that read back as the zero-identifier sentinel.
    pub empty_slots: BTreeSet<u64>,
    pub buy_failure: Option<MockFailure>,
    pub create_failure: Option<MockFailure>,
    pub receipt_failure: Option<MockFailure>,
    pub capabilities: Capabilities,
    pub sold_events: Vec<SoldEvent>,
    /// Every `products(id)` call, in order.
    pub reads: Vec<u64>,
    pub created: Vec<(String, String, U256, String)>,
    next_tx: u8,
}

impl MarketState {
    #[must_use]
    pub fn with_listings(listings: Vec<RawListing>) -> Self {
        Self { listings, ..Self::default() }
    }

    fn next_hash(&mut self) -> TxHash {
        self.next_tx = self.next_tx.wrapping_add(1);
        TxHash::repeat_byte(self.next_tx)
    }

    fn slot(&self, id: u64) -> RawListing {
        let index = usize::try_from(id).unwrap_or(usize::MAX).wrapping_sub(1);
        match self.listings.get(index) {
            Some(raw) if !self.empty_slots.contains(&id) => raw.clone(),
            _ => RawListing {
                product_id: 0,
                name: String::new(),
                description: String::new(),
                price: U256::zero(),
                owner: Address::zero(),
                creator: Some(Address::zero()),
                is_available: false,
            },
        }
    }
}

pub struct MockContract {
    account: Address,
    state: Arc<Mutex<MarketState>>,
}

impl MockContract {
    #[must_use]
    pub fn new(account: Address, state: Arc<Mutex<MarketState>>) -> Self {
        Self { account, state }
    }
}

#[async_trait::async_trait]
impl MarketContract for MockContract {
    fn account(&self) -> Address {
        self.account
    }

    async fn product_count(&self) -> Result<u64, MarketError> {
        let state = lock(&self.state);
        if state.fail_count {
            return Err(MarketError::Rpc("productCount unavailable".to_owned()));
        }
        Ok(state.count_override.unwrap_or(state.listings.len() as u64))
    }

    async fn product(&self, id: u64) -> Result<RawListing, MarketError> {
        let mut state = lock(&self.state);
        state.reads.push(id);
        if state.fail_reads.contains(&id) {
            return Err(MarketError::Rpc(format!("read {id} failed")));
        }
        Ok(state.slot(id))
    }

    async fn buy_product(&self, id: u64, value: U256) -> Result<TxHash, MarketError> {
        let mut state = lock(&self.state);
        if let Some(failure) = &state.buy_failure {
            return Err(failure.to_error());
        }
        let hash = state.next_hash();
        let buyer = self.account;
        let index = usize::try_from(id).unwrap_or(usize::MAX).wrapping_sub(1);
        let Some(slot) = state.listings.get_mut(index) else {
            return Err(MarketError::Reverted { reason: Some("Product does not exist".to_owned()) });
        };
        if !slot.is_available {
            return Err(MarketError::Reverted { reason: Some("Product not available".to_owned()) });
        }
        let seller = slot.owner;
        slot.owner = buyer;
        slot.is_available = false;
        state.sold_events.push(SoldEvent { product_id: id, seller, buyer, price: value, tx_hash: Some(hash) });
        Ok(hash)
    }

    async fn create_product(
        &self,
        name: &str,
        description: &str,
        price: U256,
        reference: &str,
    ) -> Result<TxHash, MarketError> {
        let mut state = lock(&self.state);
        if let Some(failure) = &state.create_failure {
            return Err(failure.to_error());
        }
        let id = state.listings.len() as u64 + 1;
        let creator = self.account;
        state.listings.push(RawListing {
            product_id: id,
            name: name.to_owned(),
            description: description.to_owned(),
            price,
            owner: creator,
            creator: Some(creator),
            is_available: true,
        });
        state.created.push((name.to_owned(), description.to_owned(), price, reference.to_owned()));
        Ok(state.next_hash())
    }

    async fn products_by_owner(&self, owner: Address) -> Result<Vec<u64>, MarketError> {
        let state = lock(&self.state);
        if !state.capabilities.owner_index {
            return Err(MarketError::Reverted { reason: None });
        }
        Ok(state.listings.iter().filter(|l| l.owner == owner).map(|l| l.product_id).collect())
    }

    async fn sold_events(&self, buyer: Address) -> Result<Vec<SoldEvent>, MarketError> {
        let state = lock(&self.state);
        if !state.capabilities.sold_events {
            return Err(MarketError::Rpc("eth_getLogs unsupported".to_owned()));
        }
        Ok(state.sold_events.iter().filter(|e| e.buyer == buyer).cloned().collect())
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, MarketError> {
        let state = lock(&self.state);
        match &state.receipt_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(Receipt { tx_hash: hash, block_number: Some(1) }),
        }
    }

    async fn capabilities(&self) -> Capabilities {
        lock(&self.state).capabilities
    }
}

// =============================================================================
// WALLET
// =============================================================================

#[derive(Debug)]
pub struct WalletState {
    pub accounts: Vec<Address>,
    pub chain_id: u64,
    pub failure: Option<MockFailure>,
    pub requests: usize,
}

impl Default for WalletState {
    fn default() -> Self {
        Self { accounts: vec![addr(1)], chain_id: 11_155_111, failure: None, requests: 0 }
    }
}

#[derive(Clone, Default)]
pub struct MockWallet {
    pub wallet: Arc<Mutex<WalletState>>,
    pub market: Arc<Mutex<MarketState>>,
}

impl MockWallet {
    #[must_use]
    pub fn with_market(market: MarketState) -> Self {
        Self { wallet: Arc::default(), market: Arc::new(Mutex::new(market)) }
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        lock(&self.wallet).accounts = accounts;
    }

    pub fn set_chain(&self, chain_id: u64) {
        lock(&self.wallet).chain_id = chain_id;
    }

    pub fn set_failure(&self, failure: Option<MockFailure>) {
        lock(&self.wallet).failure = failure;
    }

    /// Run `f` against the shared contract state.
    pub fn market<R>(&self, f: impl FnOnce(&mut MarketState) -> R) -> R {
        f(&mut lock(&self.market))
    }

    #[must_use]
    pub fn requests(&self) -> usize {
        lock(&self.wallet).requests
    }
}

#[async_trait::async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, MarketError> {
        let mut wallet = lock(&self.wallet);
        wallet.requests += 1;
        match &wallet.failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(wallet.accounts.clone()),
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, MarketError> {
        let wallet = lock(&self.wallet);
        match &wallet.failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(wallet.accounts.clone()),
        }
    }

    async fn chain_id(&self) -> Result<u64, MarketError> {
        let wallet = lock(&self.wallet);
        match &wallet.failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(wallet.chain_id),
        }
    }

    fn bind_contract(&self, signer: &Signer) -> Arc<dyn MarketContract> {
        Arc::new(MockContract::new(signer.account, Arc::clone(&self.market)))
    }
}

/// Session over `wallet`, already connected. Returns `Err` if the mock was
/// set up to fail connecting.
pub async fn connected_session(wallet: &MockWallet) -> Result<WalletSession, MarketError> {
    let mut session = WalletSession::new(Arc::new(wallet.clone()));
    session.connect().await?;
    Ok(session)
}
