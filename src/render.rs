//! Plain-text views for the terminal front-end.
//!
//! Every function here is pure: data in, `String` out. The binary decides
//! where the text goes.

use abi::TxHash;
use abi::units::format_ether;

use crate::error::MarketError;
use crate::explorer::{Explorer, short_address, short_hash};
use crate::history::History;
use crate::listing::Listing;
use crate::owned::OwnedView;
use crate::session::{SessionState, WalletSession};

/// What a listing row offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingAction {
    /// Still for sale.
    Purchase { id: u64, price: String },
    /// Sold, with a known transaction.
    ViewTransaction { url: String },
    /// Sold, but this client never saw the transaction.
    NoTransactionRecord,
}

#[must_use]
pub fn listing_action(listing: &Listing, explorer: &Explorer) -> ListingAction {
    if listing.can_purchase() {
        return ListingAction::Purchase { id: listing.id, price: listing.price_ether() };
    }
    match &listing.tx_hash {
        Some(hash) => ListingAction::ViewTransaction { url: explorer.tx_url(hash) },
        None => ListingAction::NoTransactionRecord,
    }
}

fn action_line(listing: &Listing, explorer: &Explorer) -> String {
    match listing_action(listing, explorer) {
        ListingAction::Purchase { id, price } => format!("buy: aurum buy {id}  ({price} ETH)"),
        ListingAction::ViewTransaction { url } => format!("tx: {url}"),
        ListingAction::NoTransactionRecord => "tx: no local record".to_owned(),
    }
}

fn listing_block(lines: &mut Vec<String>, listing: &Listing, explorer: &Explorer) {
    let badge = if listing.available { "For sale" } else { "Sold" };
    lines.push(format!("#{}  {}  [{badge}]", listing.id, listing.display_name()));
    lines.push(format!("    {}", listing.display_description()));
    lines.push(format!("    price: {} ETH   owner: {}", listing.price_ether(), short_address(&listing.owner)));
    lines.push(format!("    {}", action_line(listing, explorer)));
}

fn finish(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[must_use]
pub fn render_session(session: &WalletSession, explorer: &Explorer) -> String {
    match (session.state(), session.signer()) {
        (SessionState::Connected, Some(signer)) => {
            let strategy = session.strategy().map_or("unknown", |s| s.label());
            format!(
                "Connected: {:#x}\n    {}\nChain: {}\nOwned lookup: {strategy}\n",
                signer.account,
                explorer.address_url(&signer.account),
                signer.chain_id
            )
        }
        (SessionState::Connecting, _) => "Connecting...\n".to_owned(),
        _ => "Not connected.\n".to_owned(),
    }
}

#[must_use]
pub fn render_catalog(listings: &[Listing], explorer: &Explorer) -> String {
    if listings.is_empty() {
        return "No listings yet. Create the first one with `aurum create`.\n".to_owned();
    }
    let for_sale = listings.iter().filter(|l| l.available).count();
    let mut lines = vec![format!("Catalog: {} listings, {for_sale} for sale", listings.len()), String::new()];
    for listing in listings {
        listing_block(&mut lines, listing, explorer);
    }
    finish(&lines)
}

#[must_use]
pub fn render_owned(view: &OwnedView, explorer: &Explorer) -> String {
    if view.items.is_empty() {
        return format!("You do not own any listings yet. (lookup: {})\n", view.strategy.label());
    }
    let mut lines = vec![
        format!("Your jewels: {} (lookup: {})", view.items.len(), view.strategy.label()),
        String::new(),
    ];
    for listing in &view.items {
        lines.push(format!("#{}  {}", listing.id, listing.display_name()));
        lines.push(format!("    {}", listing.display_description()));
        lines.push(format!("    paid: {} ETH", listing.price_ether()));
        lines.push(match &listing.tx_hash {
            Some(hash) => format!("    tx: {}  {}", short_hash(hash), explorer.tx_url(hash)),
            None => "    tx: no local record".to_owned(),
        });
    }
    finish(&lines)
}

#[must_use]
pub fn render_history(history: &History, explorer: &Explorer) -> String {
    if history.entries.is_empty() {
        return "No activity yet.\n".to_owned();
    }
    let s = history.summary;
    let mut lines = vec![
        format!("Activity: {} created, {} purchased, {} total", s.created, s.purchased, s.total),
        String::new(),
    ];
    for entry in &history.entries {
        lines.push(format!(
            "{}  {:<9}  #{} {}  {} ETH  [{}]",
            entry.read_on,
            entry.kind.label(),
            entry.listing_id,
            entry.name,
            format_ether(entry.price),
            entry.status
        ));
        if let Some(hash) = &entry.tx_hash {
            lines.push(format!("    tx: {}", explorer.tx_url(hash)));
        }
    }
    finish(&lines)
}

/// Shown right after the wallet accepts a transaction.
#[must_use]
pub fn render_submitted(what: &str, hash: &TxHash, explorer: &Explorer) -> String {
    format!("{what} submitted: {}\n    {}\n", short_hash(hash), explorer.tx_url(hash))
}

/// Banner for a failed action.
#[must_use]
pub fn render_error(err: &MarketError) -> String {
    format!("error: {}\n", err.user_message())
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
