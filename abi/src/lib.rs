//! Contract binding for the jewelry marketplace.
//!
//! Wraps the marketplace's human-readable ABI in an `ethers` [`BaseContract`]
//! so the `aurum` client gets typed calls, listing tuples, and sold-event
//! logs without touching raw words. Also owns ether unit conversion for
//! user-typed prices. It does no I/O.
//!
//! [`BaseContract`]: ethers::contract::BaseContract

pub mod market;
pub mod units;

pub use ethers::types::{Address, TxHash, U256};

/// Error raised while building the binding or decoding contract data.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("invalid contract abi: {0}")]
    Parse(String),
    #[error("could not decode contract data: {0}")]
    Abi(#[from] ethers::abi::AbiError),
    /// An identifier word that should hold a small integer overflowed `u64`.
    #[error("{field} does not fit in u64: {value}")]
    OutOfRange { field: &'static str, value: U256 },
}
