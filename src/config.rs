//! Client configuration parsed from environment variables.
//!
//! Required:
//! - `AURUM_CONTRACT_ADDRESS`: deployed marketplace contract
//!
//! Optional:
//! - `AURUM_RPC_URL`: wallet / node JSON-RPC endpoint (default `http://127.0.0.1:8545`)
//! - `AURUM_EXPLORER_URL`: block explorer base (default Sepolia Etherscan)
//! - `AURUM_CACHE_PATH`: transaction-hash cache file (default `.aurum/tx_hashes.json`)
//! - `AURUM_LISTING_LAYOUT`: `creator` (default) or `legacy`
//! - `AURUM_OWNER_INDEX`: `detect` (default), `on`, or `off`
//! - `AURUM_SOLD_EVENTS`: `detect` (default), `on`, or `off`
//! - `AURUM_LOG_FROM_BLOCK`: first block scanned for sold events (default 0)
//! - `AURUM_COUNT_FALLBACK`: scan bound when `productCount()` fails (default 20)
//! - `AURUM_RECEIPT_POLL_MS`: receipt polling interval (default 1000)
//! - `AURUM_RECEIPT_TIMEOUT_SECS`: give up waiting for a receipt (default 300)
//! - `AURUM_REQUEST_TIMEOUT_SECS`: per-request timeout (default 30)
//! - `AURUM_CONNECT_TIMEOUT_SECS`: connect timeout (default 10)
//! - `AURUM_WATCH_INTERVAL_MS`: wallet watcher poll interval (default 2000)

use std::path::PathBuf;

use abi::Address;
use abi::market::ListingLayout;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_EXPLORER_URL: &str = "https://sepolia.etherscan.io";
pub const DEFAULT_CACHE_PATH: &str = ".aurum/tx_hashes.json";
pub const DEFAULT_COUNT_FALLBACK: u64 = 20;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1000;
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid {var}={value}: {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

/// Whether an optional contract feature is assumed present, absent, or
/// detected with a trial call at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilityMode {
    #[default]
    Detect,
    On,
    Off,
}

/// What the deployed contract looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContractProfile {
    pub layout: ListingLayout,
    pub owner_index: CapabilityMode,
    pub sold_events: CapabilityMode,
    pub log_from_block: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub poll_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self { poll_ms: DEFAULT_RECEIPT_POLL_MS, timeout_secs: DEFAULT_RECEIPT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub rpc_url: String,
    pub contract: Address,
    pub explorer_url: String,
    pub cache_path: PathBuf,
    pub profile: ContractProfile,
    pub count_fallback: u64,
    pub receipt: ReceiptPolicy,
    pub timeouts: RpcTimeouts,
    pub watch_interval_ms: u64,
}

impl MarketConfig {
    /// Defaults for everything except the contract address.
    #[must_use]
    pub fn new(contract: Address) -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            contract,
            explorer_url: DEFAULT_EXPLORER_URL.to_owned(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            profile: ContractProfile::default(),
            count_fallback: DEFAULT_COUNT_FALLBACK,
            receipt: ReceiptPolicy::default(),
            timeouts: RpcTimeouts::default(),
            watch_interval_ms: DEFAULT_WATCH_INTERVAL_MS,
        }
    }

    /// Build typed config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the contract address is missing or any
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`MarketConfig::from_env`].
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_contract = lookup("AURUM_CONTRACT_ADDRESS").ok_or(ConfigError::Missing { var: "AURUM_CONTRACT_ADDRESS" })?;
        let contract = raw_contract.parse::<Address>().map_err(|e| ConfigError::Invalid {
            var: "AURUM_CONTRACT_ADDRESS",
            value: raw_contract.clone(),
            reason: e.to_string(),
        })?;

        let mut config = Self::new(contract);
        if let Some(url) = lookup("AURUM_RPC_URL") {
            config.rpc_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(url) = lookup("AURUM_EXPLORER_URL") {
            config.explorer_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(path) = lookup("AURUM_CACHE_PATH") {
            config.cache_path = PathBuf::from(path);
        }

        config.profile = ContractProfile {
            layout: parse_layout(lookup("AURUM_LISTING_LAYOUT").as_deref())?,
            owner_index: parse_capability("AURUM_OWNER_INDEX", lookup("AURUM_OWNER_INDEX").as_deref())?,
            sold_events: parse_capability("AURUM_SOLD_EVENTS", lookup("AURUM_SOLD_EVENTS").as_deref())?,
            log_from_block: parse_u64(&lookup, "AURUM_LOG_FROM_BLOCK", 0)?,
        };
        config.count_fallback = parse_u64(&lookup, "AURUM_COUNT_FALLBACK", DEFAULT_COUNT_FALLBACK)?;
        config.receipt = ReceiptPolicy {
            poll_ms: parse_u64(&lookup, "AURUM_RECEIPT_POLL_MS", DEFAULT_RECEIPT_POLL_MS)?,
            timeout_secs: parse_u64(&lookup, "AURUM_RECEIPT_TIMEOUT_SECS", DEFAULT_RECEIPT_TIMEOUT_SECS)?,
        };
        config.timeouts = RpcTimeouts {
            request_secs: parse_u64(&lookup, "AURUM_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, "AURUM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        config.watch_interval_ms = parse_u64(&lookup, "AURUM_WATCH_INTERVAL_MS", DEFAULT_WATCH_INTERVAL_MS)?;

        Ok(config)
    }
}

fn parse_u64<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid { var, value: raw.clone(), reason: e.to_string() }),
    }
}

fn parse_layout(raw: Option<&str>) -> Result<ListingLayout, ConfigError> {
    match raw.unwrap_or("creator") {
        "creator" => Ok(ListingLayout::WithCreator),
        "legacy" => Ok(ListingLayout::Legacy),
        other => Err(ConfigError::Invalid {
            var: "AURUM_LISTING_LAYOUT",
            value: other.to_owned(),
            reason: "expected 'creator' or 'legacy'".to_owned(),
        }),
    }
}

fn parse_capability(var: &'static str, raw: Option<&str>) -> Result<CapabilityMode, ConfigError> {
    match raw.unwrap_or("detect") {
        "detect" => Ok(CapabilityMode::Detect),
        "on" | "true" | "1" => Ok(CapabilityMode::On),
        "off" | "false" | "0" => Ok(CapabilityMode::Off),
        other => Err(ConfigError::Invalid {
            var,
            value: other.to_owned(),
            reason: "expected 'detect', 'on', or 'off'".to_owned(),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
