//! Per-account activity reconstructed from current listing state.
//!
//! The contract keeps no activity log, so history is inferred: listings the
//! account created, and listings it now owns but did not create. Order is
//! reversed identifier order, which approximates recency. The date shown is
//! when the history was read, not when anything happened on chain.

use abi::{Address, TxHash, U256};
use serde::{Serialize, Serializer};
use time::Date;

use crate::catalog::scan_listings;
use crate::error::MarketError;
use crate::listing::Listing;
use crate::session::WalletSession;
use crate::store::TxHashCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Purchased,
}

impl ActivityKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Purchased => "Purchased",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub kind: ActivityKind,
    pub listing_id: u64,
    pub name: String,
    #[serde(serialize_with = "wei_as_decimal")]
    pub price: U256,
    pub status: &'static str,
    pub tx_hash: Option<TxHash>,
    #[serde(serialize_with = "date_as_iso")]
    pub read_on: Date,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    pub created: usize,
    pub purchased: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct History {
    pub entries: Vec<HistoryEntry>,
    pub summary: HistorySummary,
}

/// How `me` relates to `listing`, if at all.
///
/// With a recorded creator the rule is exact. Without one (legacy layout)
/// an owned listing still for sale counts as created and an owned sold
/// listing as purchased.
#[must_use]
pub fn classify(listing: &Listing, me: Address) -> Option<ActivityKind> {
    if listing.creator_recorded {
        if listing.creator == me {
            return Some(ActivityKind::Created);
        }
        return (listing.owner == me).then_some(ActivityKind::Purchased);
    }
    if listing.owner != me {
        return None;
    }
    Some(if listing.available { ActivityKind::Created } else { ActivityKind::Purchased })
}

/// Status label shown next to an entry.
#[must_use]
pub fn status_label(kind: ActivityKind, available: bool) -> &'static str {
    match (kind, available) {
        (ActivityKind::Created, true) => "For sale",
        (ActivityKind::Created, false) => "Sold",
        (ActivityKind::Purchased, _) => "Completed",
    }
}

/// Build history from an already-enumerated listing set.
#[must_use]
pub fn build_history(listings: &[Listing], me: Address, read_on: Date, hashes: &TxHashCache) -> History {
    let known = hashes.all();
    let mut entries: Vec<HistoryEntry> = listings
        .iter()
        .filter_map(|listing| {
            let kind = classify(listing, me)?;
            Some(HistoryEntry {
                kind,
                listing_id: listing.id,
                name: listing.display_name().to_owned(),
                price: listing.price,
                status: status_label(kind, listing.available),
                tx_hash: known.get(&listing.id).copied().or(listing.tx_hash),
                read_on,
            })
        })
        .collect();
    entries.reverse();

    let created = entries.iter().filter(|e| e.kind == ActivityKind::Created).count();
    let summary = HistorySummary { created, purchased: entries.len() - created, total: entries.len() };
    History { entries, summary }
}

pub struct TransactionHistory {
    hashes: TxHashCache,
    count_fallback: u64,
}

impl TransactionHistory {
    #[must_use]
    pub fn new(hashes: TxHashCache, count_fallback: u64) -> Self {
        Self { hashes, count_fallback }
    }

    /// Re-scan every listing and classify it for the connected account.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotConnected`] without a session.
    pub async fn load(&self, session: &WalletSession) -> Result<History, MarketError> {
        let connection = session.connection()?;
        let me = connection.signer().account;
        let listings = scan_listings(connection.contract(), &self.hashes, self.count_fallback).await;
        let today = time::OffsetDateTime::now_utc().date();
        Ok(build_history(&listings, me, today, &self.hashes))
    }
}

fn wei_as_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn date_as_iso<S: Serializer>(value: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
