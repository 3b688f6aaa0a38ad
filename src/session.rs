//! Wallet session state machine.
//!
//! ```text
//!               connect()                 ok
//! Disconnected ───────────► Connecting ─────────► Connected
//!      ▲                        │ err                 │
//!      └────────────────────────┴─────────────────────┘
//!                   disconnect() / no accounts
//! ```
//!
//! Every derived value (account, signer, contract handle, owned strategy)
//! lives in one [`Connection`], so dropping it clears them together. Views
//! borrow the contract through [`WalletSession::contract`]; the borrow
//! cannot outlive a later `disconnect()`, which needs `&mut self`.

use std::sync::Arc;

use abi::{Address, TxHash};
use serde::Serialize;
use tracing::{info, warn};

use crate::contract::{Capabilities, MarketContract};
use crate::error::MarketError;
use crate::listing_form::{ListingDraft, external_reference, now_ms};
use crate::owned::OwnedStrategy;
use crate::wallet::{Signer, WalletEvent, WalletProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything derived from a successful connect.
pub struct Connection {
    signer: Signer,
    contract: Arc<dyn MarketContract>,
    capabilities: Capabilities,
    strategy: OwnedStrategy,
}

impl Connection {
    #[must_use]
    pub fn signer(&self) -> Signer {
        self.signer
    }

    #[must_use]
    pub fn contract(&self) -> &dyn MarketContract {
        self.contract.as_ref()
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    #[must_use]
    pub fn strategy(&self) -> OwnedStrategy {
        self.strategy
    }
}

pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    state: SessionState,
    connection: Option<Connection>,
}

impl WalletSession {
    #[must_use]
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self { provider, state: SessionState::Disconnected, connection: None }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    #[must_use]
    pub fn account(&self) -> Option<Address> {
        self.connection.as_ref().map(|c| c.signer.account)
    }

    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        self.connection.as_ref().map(|c| c.signer.chain_id)
    }

    #[must_use]
    pub fn signer(&self) -> Option<Signer> {
        self.connection.as_ref().map(|c| c.signer)
    }

    #[must_use]
    pub fn strategy(&self) -> Option<OwnedStrategy> {
        self.connection.as_ref().map(|c| c.strategy)
    }

    /// Live connection.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotConnected`] when disconnected.
    pub fn connection(&self) -> Result<&Connection, MarketError> {
        self.connection.as_ref().ok_or(MarketError::NotConnected)
    }

    /// Contract handle bound to the connected signer.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotConnected`] when disconnected.
    pub fn contract(&self) -> Result<&dyn MarketContract, MarketError> {
        self.connection().map(Connection::contract)
    }

    /// Request accounts and bind to the first one.
    ///
    /// # Errors
    ///
    /// Returns the wallet failure; the session is left disconnected.
    pub async fn connect(&mut self) -> Result<Signer, MarketError> {
        self.connect_preferring(None).await
    }

    async fn connect_preferring(&mut self, preferred: Option<Address>) -> Result<Signer, MarketError> {
        self.connection = None;
        self.state = SessionState::Connecting;
        match self.establish(preferred).await {
            Ok(connection) => {
                let signer = connection.signer;
                info!(
                    account = ?signer.account,
                    chain_id = signer.chain_id,
                    strategy = connection.strategy.label(),
                    "wallet connected"
                );
                self.connection = Some(connection);
                self.state = SessionState::Connected;
                Ok(signer)
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "wallet connect failed");
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn establish(&self, preferred: Option<Address>) -> Result<Connection, MarketError> {
        let accounts = self.provider.request_accounts().await?;
        let account = preferred
            .filter(|p| accounts.contains(p))
            .or_else(|| accounts.first().copied())
            .ok_or(MarketError::NoAccounts)?;
        let chain_id = self.provider.chain_id().await?;

        let signer = Signer { account, chain_id };
        let contract = self.provider.bind_contract(&signer);
        let capabilities = contract.capabilities().await;
        let strategy = OwnedStrategy::select(capabilities);
        Ok(Connection { signer, contract, capabilities, strategy })
    }

    /// Drop every derived field. No on-chain effect.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!("wallet disconnected");
        }
        self.state = SessionState::Disconnected;
    }

    /// React to a wallet notification. An empty account list disconnects;
    /// a new account list or chain reconnects a live session. Notifications
    /// arriving while disconnected are ignored.
    ///
    /// # Errors
    ///
    /// Returns the reconnect failure; the session is then disconnected.
    pub async fn handle_event(&mut self, event: WalletEvent) -> Result<SessionState, MarketError> {
        match event {
            WalletEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                self.disconnect();
            }
            WalletEvent::AccountsChanged(accounts) => {
                if self.is_connected() {
                    info!(account = ?accounts.first(), "wallet account changed; reconnecting");
                    self.connect_preferring(accounts.first().copied()).await?;
                }
            }
            WalletEvent::ChainChanged(chain_id) => {
                if self.is_connected() {
                    info!(chain_id, "wallet chain changed; reconnecting");
                    let account = self.account();
                    self.connect_preferring(account).await?;
                }
            }
        }
        Ok(self.state)
    }

    /// Send `createProduct` for a validated draft, tagging it with a fresh
    /// external reference.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotConnected`] or the wallet failure.
    pub async fn submit_listing(&self, draft: &ListingDraft) -> Result<TxHash, MarketError> {
        let contract = self.contract()?;
        let price = abi::units::parse_ether(&draft.price)?;
        let reference = external_reference(now_ms());
        let tx_hash = contract
            .create_product(&draft.name, &draft.description, price, &reference)
            .await
            .inspect_err(|e| warn!(error = %e, code = e.error_code(), "listing not submitted"))?;
        info!(?tx_hash, name = %draft.name, %reference, "listing submitted");
        Ok(tx_hash)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
