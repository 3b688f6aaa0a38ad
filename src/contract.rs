//! Marketplace contract capability trait and its `ethers` binding.
//!
//! ARCHITECTURE
//! ============
//! Views talk to [`MarketContract`], never to a provider directly, so tests
//! can run every flow against an in-memory contract. [`RpcMarket`] is the
//! production binding over any `ethers` [`Middleware`]: reads go through
//! `eth_call`, writes through `eth_sendTransaction` on the wallet endpoint
//! (which signs), and sold history through `eth_getLogs`.
//!
//! Optional contract features (owner index, sold events) are reported by
//! [`MarketContract::capabilities`], which the session calls once at
//! connect time.

use std::sync::Arc;
use std::time::Duration;

use abi::market::{MarketAbi, RawListing, sold_filter};
use abi::{Address, TxHash, U256};
use ethers::providers::Middleware;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, TransactionReceipt, TransactionRequest, U64};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use abi::market::SoldEvent;

use crate::config::{CapabilityMode, ContractProfile, ReceiptPolicy};
use crate::error::MarketError;

/// Optional contract features detected for this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub owner_index: bool,
    pub sold_events: bool,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

#[async_trait::async_trait]
pub trait MarketContract: Send + Sync {
    /// Account that signs this handle's transactions.
    fn account(&self) -> Address;

    /// `productCount()`.
    async fn product_count(&self) -> Result<u64, MarketError>;

    /// `products(id)`. Nonexistent slots come back with `product_id == 0`.
    async fn product(&self, id: u64) -> Result<RawListing, MarketError>;

    /// `buyProduct(id)` carrying `value` wei. Returns once the wallet has
    /// accepted and broadcast the transaction.
    async fn buy_product(&self, id: u64, value: U256) -> Result<TxHash, MarketError>;

    /// `createProduct(name, description, price, reference)`.
    async fn create_product(
        &self,
        name: &str,
        description: &str,
        price: U256,
        reference: &str,
    ) -> Result<TxHash, MarketError>;

    /// `getProductsByOwner(owner)`, when the deployment has it.
    async fn products_by_owner(&self, owner: Address) -> Result<Vec<u64>, MarketError>;

    /// `ProductSold` logs whose buyer is `buyer`, oldest first.
    async fn sold_events(&self, buyer: Address) -> Result<Vec<SoldEvent>, MarketError>;

    /// Block until `hash` is mined. A failed receipt is a revert.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, MarketError>;

    /// Detect optional features. Never fails; unknown means absent.
    async fn capabilities(&self) -> Capabilities;
}

// =============================================================================
// ETHERS BINDING
// =============================================================================

pub struct RpcMarket<M> {
    client: Arc<M>,
    abi: Arc<MarketAbi>,
    address: Address,
    account: Address,
    profile: ContractProfile,
    receipt: ReceiptPolicy,
}

impl<M: Middleware + 'static> RpcMarket<M> {
    #[must_use]
    pub fn new(
        client: Arc<M>,
        abi: Arc<MarketAbi>,
        address: Address,
        account: Address,
        profile: ContractProfile,
        receipt: ReceiptPolicy,
    ) -> Self {
        Self { client, abi, address, account, profile, receipt }
    }

    fn request(&self, data: Bytes) -> TransactionRequest {
        TransactionRequest::new().from(self.account).to(self.address).data(data)
    }

    async fn call(&self, data: Bytes) -> Result<Bytes, MarketError> {
        let tx: TypedTransaction = self.request(data).into();
        self.client.call(&tx, None).await.map_err(|e| MarketError::from_middleware(&e))
    }

    async fn send(&self, tx: TransactionRequest) -> Result<TxHash, MarketError> {
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| MarketError::from_middleware(&e))?;
        Ok(pending.tx_hash())
    }

    async fn detect(&self, mode: CapabilityMode, feature: Feature) -> bool {
        match mode {
            CapabilityMode::On => true,
            CapabilityMode::Off => false,
            CapabilityMode::Detect => {
                let result = match feature {
                    Feature::OwnerIndex => self.products_by_owner(self.account).await.map(|_| ()),
                    Feature::SoldEvents => self.sold_events(self.account).await.map(|_| ()),
                };
                match result {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(?feature, error = %e, "capability check failed; treating as absent");
                        false
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Feature {
    OwnerIndex,
    SoldEvents,
}

#[async_trait::async_trait]
impl<M: Middleware + 'static> MarketContract for RpcMarket<M> {
    fn account(&self) -> Address {
        self.account
    }

    async fn product_count(&self) -> Result<u64, MarketError> {
        let data = self.call(self.abi.product_count_call()?).await?;
        Ok(self.abi.decode_count(&data)?)
    }

    async fn product(&self, id: u64) -> Result<RawListing, MarketError> {
        let data = self.call(self.abi.product_call(id)?).await?;
        Ok(self.abi.decode_listing(&data)?)
    }

    async fn buy_product(&self, id: u64, value: U256) -> Result<TxHash, MarketError> {
        let tx = self.request(self.abi.buy_product_call(id)?).value(value);
        self.send(tx).await
    }

    async fn create_product(
        &self,
        name: &str,
        description: &str,
        price: U256,
        reference: &str,
    ) -> Result<TxHash, MarketError> {
        let tx = self.request(self.abi.create_product_call(name, description, price, reference)?);
        self.send(tx).await
    }

    async fn products_by_owner(&self, owner: Address) -> Result<Vec<u64>, MarketError> {
        let data = self.call(self.abi.products_by_owner_call(owner)?).await?;
        Ok(self.abi.decode_owner_index(&data)?)
    }

    async fn sold_events(&self, buyer: Address) -> Result<Vec<SoldEvent>, MarketError> {
        let filter = sold_filter(self.address, buyer, self.profile.log_from_block);
        let logs = self.client.get_logs(&filter).await.map_err(|e| MarketError::from_middleware(&e))?;
        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match self.abi.decode_sold(log) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, tx_hash = ?log.transaction_hash, "skipping undecodable ProductSold log"),
            }
        }
        Ok(events)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, MarketError> {
        let client = &self.client;
        poll_receipt(hash, self.receipt, move || async move {
            client.get_transaction_receipt(hash).await.map_err(|e| MarketError::from_middleware(&e))
        })
        .await
    }

    async fn capabilities(&self) -> Capabilities {
        let caps = Capabilities {
            owner_index: self.detect(self.profile.owner_index, Feature::OwnerIndex).await,
            sold_events: self.detect(self.profile.sold_events, Feature::SoldEvents).await,
        };
        info!(owner_index = caps.owner_index, sold_events = caps.sold_events, "contract capabilities");
        caps
    }
}

/// Poll `fetch` every `policy.poll_ms` until it yields a receipt or
/// `policy.timeout_secs` elapse.
async fn poll_receipt<F, Fut>(hash: TxHash, policy: ReceiptPolicy, mut fetch: F) -> Result<Receipt, MarketError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<TransactionReceipt>, MarketError>>,
{
    let deadline = Instant::now() + Duration::from_secs(policy.timeout_secs);
    let poll = Duration::from_millis(policy.poll_ms.max(1));
    loop {
        if let Some(receipt) = fetch().await? {
            return receipt_outcome(hash, &receipt);
        }
        if Instant::now() >= deadline {
            warn!(tx_hash = ?hash, timeout_secs = policy.timeout_secs, "receipt not found before deadline");
            return Err(MarketError::ConfirmationTimeout(format!("{hash:#x}")));
        }
        debug!(tx_hash = ?hash, "transaction pending");
        tokio::time::sleep(poll).await;
    }
}

fn receipt_outcome(hash: TxHash, receipt: &TransactionReceipt) -> Result<Receipt, MarketError> {
    if receipt.status == Some(U64::zero()) {
        return Err(MarketError::Reverted { reason: None });
    }
    Ok(Receipt { tx_hash: hash, block_number: receipt.block_number.map(|n| n.as_u64()) })
}

#[cfg(test)]
#[path = "contract_test.rs"]
mod tests;
