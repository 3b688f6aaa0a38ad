//! Block-explorer links and abbreviated hex for listing rows.

use abi::{Address, TxHash};

use crate::config::DEFAULT_EXPLORER_URL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explorer {
    base_url: String,
}

impl Default for Explorer {
    fn default() -> Self {
        Self::new(DEFAULT_EXPLORER_URL)
    }
}

impl Explorer {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_owned() }
    }

    /// `<base>/tx/<hash>`.
    #[must_use]
    pub fn tx_url(&self, hash: &TxHash) -> String {
        format!("{}/tx/{hash:#x}", self.base_url)
    }

    /// `<base>/address/<address>`.
    #[must_use]
    pub fn address_url(&self, address: &Address) -> String {
        format!("{}/address/{address:#x}", self.base_url)
    }
}

/// `0x1234567890...abcdef12`, the form used in listing rows.
#[must_use]
pub fn short_hash(hash: &TxHash) -> String {
    abbreviate(&format!("{hash:#x}"), 10, 8)
}

/// `0x1234...abcd`.
#[must_use]
pub fn short_address(address: &Address) -> String {
    abbreviate(&format!("{address:#x}"), 6, 4)
}

fn abbreviate(full: &str, head: usize, tail: usize) -> String {
    if full.len() <= head + tail {
        return full.to_owned();
    }
    format!("{}...{}", &full[..head], &full[full.len() - tail..])
}

#[cfg(test)]
#[path = "explorer_test.rs"]
mod tests;
