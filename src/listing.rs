//! Listing model and the identifier-keyed listing cache.
//!
//! DESIGN
//! ======
//! `Listing` mirrors one `products(id)` struct from the contract. The
//! contract is the only source of truth; `tx_hash` is a display-only extra
//! pulled from the local hash cache.
//!
//! `ListingCache` lets views skip re-reading listings that no mutating call
//! has touched. Mutations invalidate exactly what they change: a purchase
//! invalidates its listing id, a create invalidates the count (the new id is
//! past the cached range).

use std::collections::{BTreeMap, BTreeSet};

use abi::market::RawListing;
use abi::units::format_ether;
use abi::{Address, TxHash, U256};
use serde::{Serialize, Serializer};

pub const UNNAMED: &str = "Unnamed";
pub const NO_DESCRIPTION: &str = "No description";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub id: u64,
    pub name: String,
    pub description: String,
    #[serde(serialize_with = "wei_as_decimal")]
    pub price: U256,
    pub owner: Address,
    /// Falls back to `owner` on contracts that do not record a creator.
    pub creator: Address,
    /// Whether `creator` came from the contract rather than the fallback.
    #[serde(skip)]
    pub creator_recorded: bool,
    pub available: bool,
    pub tx_hash: Option<TxHash>,
}

impl Listing {
    /// Convert a non-empty contract slot. Callers filter out the zero
    /// identifier sentinel before calling this.
    #[must_use]
    pub fn from_raw(raw: RawListing) -> Self {
        Self {
            id: raw.product_id,
            name: raw.name,
            description: raw.description,
            price: raw.price,
            owner: raw.owner,
            creator: raw.creator.unwrap_or(raw.owner),
            creator_recorded: raw.creator.is_some(),
            available: raw.is_available,
            tx_hash: None,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() { UNNAMED } else { &self.name }
    }

    #[must_use]
    pub fn display_description(&self) -> &str {
        if self.description.trim().is_empty() { NO_DESCRIPTION } else { &self.description }
    }

    /// Only listings still for sale may be bought.
    #[must_use]
    pub fn can_purchase(&self) -> bool {
        self.available
    }

    #[must_use]
    pub fn price_ether(&self) -> String {
        format_ether(self.price)
    }
}

fn wei_as_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

// =============================================================================
// LISTING CACHE
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct ListingCache {
    entries: BTreeMap<u64, Listing>,
    stale: BTreeSet<u64>,
    count: Option<u64>,
}

impl ListingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached listing for `id`, unless it has been invalidated.
    #[must_use]
    pub fn fresh(&self, id: u64) -> Option<&Listing> {
        if self.stale.contains(&id) {
            return None;
        }
        self.entries.get(&id)
    }

    /// Last known listing count, unless invalidated.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn set_count(&mut self, count: u64) {
        self.count = Some(count);
    }

    pub fn insert(&mut self, listing: Listing) {
        self.stale.remove(&listing.id);
        self.entries.insert(listing.id, listing);
    }

    /// Force the next refresh to re-read `id`.
    pub fn invalidate(&mut self, id: u64) {
        self.stale.insert(id);
    }

    /// Force the next refresh to re-read the listing count.
    pub fn invalidate_count(&mut self) {
        self.count = None;
    }

    /// Optimistically flip a just-purchased listing to sold and schedule a
    /// re-read. Returns `false` when the listing is not cached.
    pub fn mark_sold(&mut self, id: u64, tx_hash: TxHash) -> bool {
        self.invalidate(id);
        match self.entries.get_mut(&id) {
            Some(listing) => {
                listing.available = false;
                listing.tx_hash = Some(tx_hash);
                true
            }
            None => false,
        }
    }

    /// Any cached copy, stale or not.
    #[must_use]
    pub fn peek(&self, id: u64) -> Option<&Listing> {
        self.entries.get(&id)
    }

    /// Drop `id` and everything after it (the scan stopped before them).
    pub fn truncate_from(&mut self, id: u64) {
        self.entries.retain(|k, _| *k < id);
        self.stale.retain(|k| *k < id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stale.clear();
        self.count = None;
    }

    /// Cached listings in identifier order.
    #[must_use]
    pub fn listings(&self) -> Vec<Listing> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "listing_test.rs"]
mod tests;
