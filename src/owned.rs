//! Listings owned by the connected account.
//!
//! Three ways to find them, tried in a fixed precedence chosen once per
//! session from the contract's capabilities:
//!
//! 1. `OwnerIndex`: ask the contract (`getProductsByOwner`).
//! 2. `EventReplay`: replay `ProductSold` logs for this buyer and keep the
//!    ones the buyer still owns.
//! 3. `FullScan`: enumerate the catalog and filter on owner.

use std::collections::BTreeMap;

use abi::Address;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::scan_listings;
use crate::contract::{Capabilities, MarketContract};
use crate::error::MarketError;
use crate::listing::Listing;
use crate::session::WalletSession;
use crate::store::TxHashCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnedStrategy {
    OwnerIndex,
    EventReplay,
    FullScan,
}

impl OwnedStrategy {
    /// Best strategy the contract supports.
    #[must_use]
    pub fn select(caps: Capabilities) -> Self {
        if caps.owner_index {
            Self::OwnerIndex
        } else if caps.sold_events {
            Self::EventReplay
        } else {
            Self::FullScan
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::OwnerIndex => "owner index",
            Self::EventReplay => "sale events",
            Self::FullScan => "full scan",
        }
    }
}

/// Owned listings plus the strategy that found them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnedView {
    pub strategy: OwnedStrategy,
    pub items: Vec<Listing>,
}

pub struct OwnedCollection {
    hashes: TxHashCache,
    count_fallback: u64,
}

impl OwnedCollection {
    #[must_use]
    pub fn new(hashes: TxHashCache, count_fallback: u64) -> Self {
        Self { hashes, count_fallback }
    }

    /// Load with the session's strategy.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotConnected`] without a session, or the
    /// failure of the strategy's primary call (owner index or log query).
    pub async fn load(&self, session: &WalletSession) -> Result<OwnedView, MarketError> {
        let connection = session.connection()?;
        let account = connection.signer().account;
        let strategy = connection.strategy();
        let contract = connection.contract();

        let items = match strategy {
            OwnedStrategy::OwnerIndex => self.by_owner_index(contract, account).await?,
            OwnedStrategy::EventReplay => self.by_event_replay(contract, account).await?,
            OwnedStrategy::FullScan => self.by_full_scan(contract, account).await,
        };
        info!(strategy = strategy.label(), count = items.len(), "owned listings loaded");
        Ok(OwnedView { strategy, items })
    }

    async fn by_owner_index(&self, contract: &dyn MarketContract, account: Address) -> Result<Vec<Listing>, MarketError> {
        let ids = contract.products_by_owner(account).await?;
        let known = self.hashes.all();
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match contract.product(id).await {
                Ok(raw) if raw.is_empty_slot() => debug!(listing_id = id, "owner index points at empty slot"),
                Ok(raw) => {
                    let mut listing = Listing::from_raw(raw);
                    listing.tx_hash = known.get(&id).copied();
                    items.push(listing);
                }
                Err(e) => debug!(listing_id = id, error = %e, "skipping unreadable owned listing"),
            }
        }
        Ok(items)
    }

    async fn by_event_replay(&self, contract: &dyn MarketContract, account: Address) -> Result<Vec<Listing>, MarketError> {
        let events = contract.sold_events(account).await?;
        let mut latest = BTreeMap::new();
        for event in events {
            latest.insert(event.product_id, event.tx_hash);
        }

        let known = self.hashes.all();
        let mut items = Vec::with_capacity(latest.len());
        for (id, event_hash) in latest {
            if id == 0 {
                continue;
            }
            match contract.product(id).await {
                Ok(raw) if raw.is_empty_slot() => debug!(listing_id = id, "sold event for empty slot"),
                Ok(raw) if raw.owner != account => debug!(listing_id = id, "bought but since transferred"),
                Ok(raw) => {
                    let mut listing = Listing::from_raw(raw);
                    listing.tx_hash = known.get(&id).copied().or(event_hash);
                    items.push(listing);
                }
                Err(e) => debug!(listing_id = id, error = %e, "skipping unreadable owned listing"),
            }
        }
        Ok(items)
    }

    async fn by_full_scan(&self, contract: &dyn MarketContract, account: Address) -> Vec<Listing> {
        let listings = scan_listings(contract, &self.hashes, self.count_fallback).await;
        let known = self.hashes.all();
        listings
            .into_iter()
            .filter(|listing| listing.owner == account)
            .map(|mut listing| {
                listing.tx_hash = known.get(&listing.id).copied();
                listing
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "owned_test.rs"]
mod tests;
