//! Product catalog: enumeration, incremental refresh, and purchases.
//!
//! DESIGN
//! ======
//! The contract offers no "list all" call, so listings are read one
//! identifier at a time from 1 up to `productCount()`. The scan stops at
//! the first zero-identifier slot or the first read failure and never reads
//! past it. A gap in identifiers therefore truncates the catalog; this is
//! the observed contract behaviour and is preserved.
//!
//! Purchases are split so a front-end can show the transaction hash before
//! it confirms:
//!
//! ```text
//! submit_purchase ──► wallet accepts ──► hash cached, listing marked sold
//!        │
//!        └─ rejected/failed ──► error returned, nothing written
//!
//! confirm_purchase ──► receipt (or failure) ──► refresh
//! ```

use abi::{TxHash, U256};
use tracing::{debug, info, warn};

use crate::contract::{MarketContract, Receipt};
use crate::error::MarketError;
use crate::listing::{Listing, ListingCache};
use crate::session::WalletSession;
use crate::store::TxHashCache;

/// Transaction accepted by the wallet but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPurchase {
    pub listing_id: u64,
    pub tx_hash: TxHash,
}

pub struct Catalog {
    cache: ListingCache,
    hashes: TxHashCache,
    count_fallback: u64,
}

impl Catalog {
    #[must_use]
    pub fn new(hashes: TxHashCache, count_fallback: u64) -> Self {
        Self { cache: ListingCache::new(), hashes, count_fallback }
    }

    /// Listings from the last load, in identifier order.
    #[must_use]
    pub fn listings(&self) -> Vec<Listing> {
        self.cache.listings()
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Listing> {
        self.cache.peek(id)
    }

    /// Drop everything cached. Called when the session changes.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// Schedule a re-read of the count after a listing was created.
    pub fn note_created(&mut self) {
        self.cache.invalidate_count();
    }

    /// Full reload: every listing is re-read.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotConnected`] without a session. Individual
    /// read failures end the scan instead of failing it.
    pub async fn load_all(&mut self, session: &WalletSession) -> Result<Vec<Listing>, MarketError> {
        let contract = session.contract()?;
        self.cache.clear();
        enumerate(contract, &mut self.cache, &self.hashes, self.count_fallback, false).await;
        Ok(self.cache.listings())
    }

    /// Incremental reload: only invalidated or unseen identifiers are read.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotConnected`] without a session.
    pub async fn refresh(&mut self, session: &WalletSession) -> Result<Vec<Listing>, MarketError> {
        let contract = session.contract()?;
        enumerate(contract, &mut self.cache, &self.hashes, self.count_fallback, true).await;
        Ok(self.cache.listings())
    }

    /// Send `buyProduct(id)` carrying `price` wei.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotAvailable`] when the cached copy is already
    /// sold, or whatever the wallet reported. On error nothing local changes.
    pub async fn submit_purchase(
        &mut self,
        session: &WalletSession,
        id: u64,
        price: U256,
    ) -> Result<PendingPurchase, MarketError> {
        let contract = session.contract()?;
        if self.cache.peek(id).is_some_and(|listing| !listing.can_purchase()) {
            return Err(MarketError::NotAvailable(id));
        }

        let tx_hash = contract.buy_product(id, price).await.inspect_err(|e| {
            warn!(listing_id = id, error = %e, code = e.error_code(), "purchase not submitted");
        })?;
        info!(listing_id = id, ?tx_hash, "purchase submitted");

        if let Err(e) = self.hashes.record(id, tx_hash) {
            warn!(listing_id = id, error = %e, "could not cache purchase hash");
        }
        self.cache.mark_sold(id, tx_hash);
        Ok(PendingPurchase { listing_id: id, tx_hash })
    }

    /// Wait for `pending` to be mined, then refresh whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the confirmation failure (revert, timeout, transport) after
    /// the refresh has run.
    pub async fn confirm_purchase(
        &mut self,
        session: &WalletSession,
        pending: PendingPurchase,
    ) -> Result<Receipt, MarketError> {
        let outcome = session.contract()?.wait_for_receipt(pending.tx_hash).await;
        match &outcome {
            Ok(receipt) => info!(listing_id = pending.listing_id, tx_hash = %receipt.tx_hash, block = ?receipt.block_number, "purchase confirmed"),
            Err(e) => warn!(listing_id = pending.listing_id, tx_hash = %pending.tx_hash, error = %e, "purchase did not confirm"),
        }
        self.cache.invalidate(pending.listing_id);
        self.refresh(session).await?;
        outcome
    }

    /// Submit and confirm in one step.
    ///
    /// # Errors
    ///
    /// See [`Catalog::submit_purchase`] and [`Catalog::confirm_purchase`].
    pub async fn purchase(&mut self, session: &WalletSession, id: u64, price: U256) -> Result<Receipt, MarketError> {
        let pending = self.submit_purchase(session, id, price).await?;
        self.confirm_purchase(session, pending).await
    }
}

// =============================================================================
// ENUMERATION
// =============================================================================

/// Scan listings 1..=count into `cache`.
///
/// With `reuse` set, fresh cache entries and a cached count are kept and
/// only the rest is read. Sold listings pick up their cached hash.
pub async fn enumerate(
    contract: &dyn MarketContract,
    cache: &mut ListingCache,
    hashes: &TxHashCache,
    count_fallback: u64,
    reuse: bool,
) {
    let count = match cache.count().filter(|_| reuse) {
        Some(count) => count,
        None => match contract.product_count().await {
            Ok(count) => {
                cache.set_count(count);
                count
            }
            Err(e) => {
                warn!(error = %e, fallback = count_fallback, "productCount failed; scanning with fallback bound");
                count_fallback
            }
        },
    };

    let known = hashes.all();
    for id in 1..=count {
        if reuse && cache.fresh(id).is_some() {
            continue;
        }
        match contract.product(id).await {
            Ok(raw) if raw.is_empty_slot() => {
                debug!(listing_id = id, "empty slot; catalog ends here");
                cache.truncate_from(id);
                return;
            }
            Ok(raw) => {
                let mut listing = Listing::from_raw(raw);
                if !listing.available {
                    listing.tx_hash = known.get(&id).copied();
                }
                cache.insert(listing);
            }
            Err(e) => {
                debug!(listing_id = id, error = %e, "listing read failed; catalog ends here");
                cache.truncate_from(id);
                return;
            }
        }
    }
    cache.truncate_from(count.saturating_add(1));
}

/// One-shot scan without a persistent cache.
pub async fn scan_listings(contract: &dyn MarketContract, hashes: &TxHashCache, count_fallback: u64) -> Vec<Listing> {
    let mut cache = ListingCache::new();
    enumerate(contract, &mut cache, hashes, count_fallback, false).await;
    cache.listings()
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
