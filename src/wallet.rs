//! Wallet provider seam, its `ethers` binding, and the change watcher.
//!
//! SYSTEM CONTEXT
//! ==============
//! The wallet is an EIP-1193 style JSON-RPC endpoint that holds keys and
//! signs `eth_sendTransaction` for the accounts it exposes. A browser wallet
//! pushes `accountsChanged` / `chainChanged`; a JSON-RPC endpoint cannot, so
//! [`spawn_wallet_watcher`] polls and emits the same notifications as
//! [`WalletEvent`]s over a channel.

use std::sync::Arc;
use std::time::Duration;

use abi::market::MarketAbi;
use abi::{Address, U256};
use ethers::providers::{Http, JsonRpcClient, Middleware, MiddlewareError, Provider};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::MarketConfig;
use crate::contract::{MarketContract, RpcMarket};
use crate::error::MarketError;

/// JSON-RPC "method not found".
const CODE_METHOD_NOT_FOUND: i64 = -32601;

/// Capacity of the watcher's event channel.
const EVENT_BUFFER: usize = 16;

/// Account and chain the wallet will sign for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    pub account: Address,
    pub chain_id: u64,
}

/// Wallet-side change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask for account access; may prompt the wallet owner.
    async fn request_accounts(&self) -> Result<Vec<Address>, MarketError>;

    /// Currently exposed accounts, without prompting.
    async fn accounts(&self) -> Result<Vec<Address>, MarketError>;

    async fn chain_id(&self) -> Result<u64, MarketError>;

    /// Contract handle whose writes are signed by `signer`.
    fn bind_contract(&self, signer: &Signer) -> Arc<dyn MarketContract>;
}

// =============================================================================
// JSON-RPC WALLET
// =============================================================================

pub struct RpcWallet<P = Http> {
    provider: Arc<Provider<P>>,
    abi: Arc<MarketAbi>,
    config: MarketConfig,
}

impl RpcWallet<Http> {
    /// Build a wallet bound to `config.rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::WalletNotPresent`] if the URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: MarketConfig) -> Result<Self, MarketError> {
        let url = reqwest::Url::parse(&config.rpc_url)
            .map_err(|e| MarketError::WalletNotPresent(format!("{}: {e}", config.rpc_url)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| MarketError::WalletNotPresent(e.to_string()))?;
        Self::with_provider(Provider::new(Http::new_with_client(url, client)), config)
    }
}

impl<P: JsonRpcClient + 'static> RpcWallet<P> {
    /// Build a wallet over an existing provider.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Decode`] if the contract binding fails to build.
    pub fn with_provider(provider: Provider<P>, config: MarketConfig) -> Result<Self, MarketError> {
        let abi = MarketAbi::new(config.profile.layout)?;
        Ok(Self { provider: Arc::new(provider), abi: Arc::new(abi), config })
    }
}

#[async_trait::async_trait]
impl<P: JsonRpcClient + 'static> WalletProvider for RpcWallet<P> {
    async fn request_accounts(&self) -> Result<Vec<Address>, MarketError> {
        match self.provider.request::<_, Vec<Address>>("eth_requestAccounts", ()).await {
            Err(e) if e.as_error_response().is_some_and(|r| r.code == CODE_METHOD_NOT_FOUND) => {
                debug!("eth_requestAccounts unsupported; falling back to eth_accounts");
                self.accounts().await
            }
            other => Ok(other?),
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, MarketError> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn chain_id(&self) -> Result<u64, MarketError> {
        let id = self.provider.get_chainid().await?;
        if id > U256::from(u64::MAX) {
            return Err(MarketError::Rpc(format!("chain id {id} out of range")));
        }
        Ok(id.low_u64())
    }

    fn bind_contract(&self, signer: &Signer) -> Arc<dyn MarketContract> {
        Arc::new(RpcMarket::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.abi),
            self.config.contract,
            signer.account,
            self.config.profile,
            self.config.receipt,
        ))
    }
}

// =============================================================================
// WATCHER
// =============================================================================

/// What the watcher last saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub accounts: Vec<Address>,
    pub chain_id: Option<u64>,
}

impl WalletSnapshot {
    /// Notifications needed to move from `self` to `next`, accounts first.
    #[must_use]
    pub fn diff(&self, next: &Self) -> Vec<WalletEvent> {
        let mut events = Vec::new();
        if self.accounts != next.accounts {
            events.push(WalletEvent::AccountsChanged(next.accounts.clone()));
        }
        if let Some(chain_id) = next.chain_id {
            if self.chain_id != Some(chain_id) {
                events.push(WalletEvent::ChainChanged(chain_id));
            }
        }
        events
    }
}

async fn snapshot(provider: &dyn WalletProvider) -> Result<WalletSnapshot, MarketError> {
    let accounts = provider.accounts().await?;
    let chain_id = provider.chain_id().await?;
    Ok(WalletSnapshot { accounts, chain_id: Some(chain_id) })
}

/// Poll `provider` every `interval` and emit changes relative to the first
/// successful read. The task ends when the receiver is dropped.
pub fn spawn_wallet_watcher(
    provider: Arc<dyn WalletProvider>,
    interval: Duration,
) -> (JoinHandle<()>, mpsc::Receiver<WalletEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last: Option<WalletSnapshot> = None;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let next = match snapshot(provider.as_ref()).await {
                Ok(next) => next,
                Err(e) => {
                    debug!(error = %e, "wallet poll failed");
                    continue;
                }
            };
            let events = last.as_ref().map(|prev| prev.diff(&next)).unwrap_or_default();
            last = Some(next);
            for event in events {
                info!(?event, "wallet changed");
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }
        debug!("wallet watcher stopped");
    });
    (handle, rx)
}

#[cfg(test)]
#[path = "wallet_test.rs"]
mod tests;
