//! Aurum: client for an on-chain jewelry marketplace.
//!
//! ARCHITECTURE
//! ============
//! ```text
//!  WalletProvider ──► WalletSession ──► &dyn MarketContract
//!   (wallet.rs)        (session.rs)          │
//!                                            ├─► Catalog            (catalog.rs)
//!                                            ├─► OwnedCollection    (owned.rs)
//!                                            ├─► TransactionHistory (history.rs)
//!                                            └─► submit_listing     (listing_form.rs)
//! ```
//!
//! The contract is the source of truth. The only local state is the
//! transaction-hash cache (`store.rs`), used for explorer links, and the
//! in-process listing cache (`listing.rs`). Views render to text in
//! `render.rs`; the `aurum` binary wires everything to a CLI.

pub mod catalog;
pub mod config;
pub mod contract;
pub mod error;
pub mod explorer;
pub mod history;
pub mod listing;
pub mod listing_form;
pub mod owned;
pub mod render;
pub mod session;
pub mod store;
pub mod wallet;

#[cfg(test)]
pub mod test_helpers;

pub use error::MarketError;
