//! Error taxonomy for wallet and contract calls.
//!
//! DESIGN
//! ======
//! Every failure a view can hit collapses into [`MarketError`]. Call sites
//! never retry; they render [`MarketError::user_message`] and let the user
//! re-trigger the action. Provider failures are classified once, in
//! [`MarketError::from_middleware`], so wallet rejections and contract
//! reverts look the same whether they came from a read or a write.

use abi::BindingError;
use abi::units::UnitError;
use ethers::contract::EthError;
use ethers::providers::{JsonRpcError, MiddlewareError, ProviderError};

use crate::listing_form::FormError;
use crate::store::StoreError;

/// EIP-1193 "user rejected request".
pub const CODE_USER_REJECTED: i64 = 4001;
/// JSON-RPC "invalid params".
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// Geth/anvil code for `execution reverted` with revert data attached.
pub const CODE_EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// No wallet endpoint answered.
    #[error("wallet not available: {0}")]
    WalletNotPresent(String),

    /// The wallet owner declined the request.
    #[error("user rejected the request")]
    UserRejected,

    /// The account cannot cover value plus gas.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// A call argument could not be encoded or was refused by the node.
    #[error("malformed argument: {0}")]
    MalformedArgument(String),

    /// The contract reverted, optionally with a decoded reason string.
    #[error("contract call reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    Reverted { reason: Option<String> },

    /// An operation needed a connected session.
    #[error("wallet not connected")]
    NotConnected,

    /// The wallet returned no accounts.
    #[error("wallet returned no accounts")]
    NoAccounts,

    /// Client-side form validation failed.
    #[error(transparent)]
    Validation(#[from] FormError),

    /// The listing was already sold or does not exist.
    #[error("listing {0} is not available")]
    NotAvailable(u64),

    /// A submitted transaction did not confirm in time.
    #[error("timed out waiting for transaction {0}")]
    ConfirmationTimeout(String),

    /// Return data from the node could not be decoded.
    #[error(transparent)]
    Decode(#[from] BindingError),

    /// Transport or protocol failure talking to the node.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The local key-value store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything that does not fit the categories above.
    #[error("{0}")]
    Unknown(String),
}

impl MarketError {
    /// Classify a provider or middleware failure.
    ///
    /// JSON-RPC error responses are classified by code and message; a body
    /// that is not valid JSON-RPC is an [`MarketError::Rpc`]; anything else
    /// means the endpoint never answered.
    #[must_use]
    pub fn from_middleware<E: MiddlewareError>(err: &E) -> Self {
        if let Some(response) = err.as_error_response() {
            return classify_response(response);
        }
        if let Some(parse) = err.as_serde_error() {
            return Self::Rpc(format!("invalid json-rpc response: {parse}"));
        }
        Self::WalletNotPresent(err.to_string())
    }

    /// Stable machine-readable code for logs and JSON output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::WalletNotPresent(_) => "E_WALLET_NOT_PRESENT",
            Self::UserRejected => "E_USER_REJECTED",
            Self::InsufficientFunds => "E_INSUFFICIENT_FUNDS",
            Self::MalformedArgument(_) => "E_MALFORMED_ARGUMENT",
            Self::Reverted { .. } => "E_REVERTED",
            Self::NotConnected => "E_NOT_CONNECTED",
            Self::NoAccounts => "E_NO_ACCOUNTS",
            Self::Validation(_) => "E_VALIDATION",
            Self::NotAvailable(_) => "E_NOT_AVAILABLE",
            Self::ConfirmationTimeout(_) => "E_CONFIRMATION_TIMEOUT",
            Self::Decode(_) => "E_DECODE",
            Self::Rpc(_) => "E_RPC",
            Self::Store(_) => "E_STORE",
            Self::Unknown(_) => "E_UNKNOWN",
        }
    }

    /// Human-readable banner text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::WalletNotPresent(_) => "No wallet found. Start a wallet endpoint or check AURUM_RPC_URL.".to_owned(),
            Self::UserRejected => "Transaction rejected.".to_owned(),
            Self::InsufficientFunds => "Insufficient funds.".to_owned(),
            Self::MalformedArgument(_) => "Invalid format.".to_owned(),
            Self::Reverted { reason: Some(reason) } => reason.clone(),
            Self::Reverted { reason: None } => "The contract rejected the transaction.".to_owned(),
            Self::NotConnected => "Connect your wallet first.".to_owned(),
            Self::NoAccounts => "The wallet has no accounts to connect.".to_owned(),
            Self::Validation(err) => err.to_string(),
            Self::NotAvailable(id) => format!("Listing #{id} is no longer for sale."),
            Self::ConfirmationTimeout(hash) => format!("Still waiting for {hash}; refresh later."),
            Self::Decode(_) | Self::Rpc(_) | Self::Store(_) | Self::Unknown(_) => format!("Unexpected error: {self}"),
        }
    }
}

impl From<ProviderError> for MarketError {
    fn from(err: ProviderError) -> Self {
        Self::from_middleware(&err)
    }
}

impl From<UnitError> for MarketError {
    fn from(err: UnitError) -> Self {
        Self::Validation(FormError::Price(err))
    }
}

fn classify_response(response: &JsonRpcError) -> MarketError {
    let JsonRpcError { code, message, .. } = response;
    let code = *code;
    let lower = message.to_ascii_lowercase();
    if code == CODE_USER_REJECTED || lower.contains("user rejected") || lower.contains("user denied") {
        return MarketError::UserRejected;
    }
    if lower.contains("insufficient funds") {
        return MarketError::InsufficientFunds;
    }
    if code == CODE_INVALID_PARAMS {
        return MarketError::MalformedArgument(message.clone());
    }

    // `Error(string)` payloads only; custom errors and panics carry no text.
    let reason = response.as_revert_data().and_then(|data| String::decode_with_selector(&data));
    if code == CODE_EXECUTION_REVERTED || reason.is_some() || lower.contains("revert") {
        let reason = reason.or_else(|| revert_reason_from_message(message));
        return MarketError::Reverted { reason };
    }

    MarketError::Unknown(format!("{message} (code {code})"))
}

/// Pull `reason` out of `execution reverted: reason`.
fn revert_reason_from_message(message: &str) -> Option<String> {
    let (_, reason) = message.split_once("reverted:")?;
    let reason = reason.trim();
    (!reason.is_empty()).then(|| reason.to_owned())
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
