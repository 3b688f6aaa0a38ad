use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use aurum::catalog::Catalog;
use aurum::config::{ConfigError, MarketConfig};
use aurum::error::MarketError;
use aurum::explorer::Explorer;
use aurum::history::TransactionHistory;
use aurum::listing_form::ListingForm;
use aurum::owned::OwnedCollection;
use aurum::render;
use aurum::session::WalletSession;
use aurum::store::{FileStore, TxHashCache};
use aurum::wallet::{RpcWallet, WalletProvider, spawn_wallet_watcher};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{Level, error, info};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error("could not render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "aurum", about = "Browse, buy, and list jewelry on the Aurum marketplace contract")]
struct Cli {
    /// Wallet JSON-RPC endpoint; overrides AURUM_RPC_URL.
    #[arg(long)]
    rpc_url: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Log verbosity on stderr (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect the wallet and show account, chain, and owned lookup.
    Status,
    /// List every listing.
    Catalog,
    /// Buy a listing at its current price.
    Buy {
        id: u64,
        /// Return once the wallet accepts, without waiting for a receipt.
        #[arg(long)]
        no_wait: bool,
    },
    /// Show listings owned by the connected account.
    Mine,
    /// Show what the connected account created and bought.
    History,
    /// Create a new listing.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// Price in ETH; `12,50` and `12.50` are both accepted.
        #[arg(long)]
        price: String,
        #[arg(long)]
        no_wait: bool,
    },
    /// Follow wallet account and chain changes.
    Watch,
}

struct App {
    config: MarketConfig,
    provider: Arc<dyn WalletProvider>,
    hashes: TxHashCache,
    explorer: Explorer,
    json: bool,
}

impl App {
    fn new(config: MarketConfig, json: bool) -> Result<Self, CliError> {
        let provider: Arc<dyn WalletProvider> = Arc::new(RpcWallet::new(config.clone())?);
        let hashes = TxHashCache::new(Arc::new(FileStore::new(&config.cache_path)));
        let explorer = Explorer::new(&config.explorer_url);
        Ok(Self { config, provider, hashes, explorer, json })
    }

    async fn connect(&self) -> Result<WalletSession, CliError> {
        let mut session = WalletSession::new(Arc::clone(&self.provider));
        session.connect().await?;
        Ok(session)
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", text());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: could not load .env: {e}");
        }
    }

    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Market(e)) => {
            error!(code = e.error_code(), error = %e, "command failed");
            eprint!("{}", render::render_error(&e));
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = MarketConfig::from_env()?;
    if let Some(url) = cli.rpc_url {
        config.rpc_url = url.trim_end_matches('/').to_owned();
    }
    let app = App::new(config, cli.json)?;

    match cli.command {
        Command::Status => run_status(&app).await,
        Command::Catalog => run_catalog(&app).await,
        Command::Buy { id, no_wait } => run_buy(&app, id, no_wait).await,
        Command::Mine => run_mine(&app).await,
        Command::History => run_history(&app).await,
        Command::Create { name, description, price, no_wait } => {
            run_create(&app, ListingForm::new(name, description, price), no_wait).await
        }
        Command::Watch => run_watch(&app).await,
    }
}

#[derive(Serialize)]
struct StatusView {
    account: Option<String>,
    chain_id: Option<u64>,
    owned_lookup: Option<&'static str>,
}

async fn run_status(app: &App) -> Result<(), CliError> {
    let session = app.connect().await?;
    let view = StatusView {
        account: session.account().map(|a| format!("{a:#x}")),
        chain_id: session.chain_id(),
        owned_lookup: session.strategy().map(|s| s.label()),
    };
    app.emit(&view, || render::render_session(&session, &app.explorer))
}

async fn run_catalog(app: &App) -> Result<(), CliError> {
    let session = app.connect().await?;
    let mut catalog = Catalog::new(app.hashes.clone(), app.config.count_fallback);
    let listings = catalog.load_all(&session).await?;
    app.emit(&listings, || render::render_catalog(&listings, &app.explorer))
}

async fn run_buy(app: &App, id: u64, no_wait: bool) -> Result<(), CliError> {
    let session = app.connect().await?;
    let mut catalog = Catalog::new(app.hashes.clone(), app.config.count_fallback);
    catalog.load_all(&session).await?;
    let price = catalog.get(id).map(|l| l.price).ok_or(MarketError::NotAvailable(id))?;

    let pending = catalog.submit_purchase(&session, id, price).await?;
    eprint!("{}", render::render_submitted("Purchase", &pending.tx_hash, &app.explorer));
    if no_wait {
        return app.emit(&pending.tx_hash, || format!("{:#x}\n", pending.tx_hash));
    }

    let receipt = catalog.confirm_purchase(&session, pending).await?;
    info!(listing_id = id, block = ?receipt.block_number, "purchase confirmed");
    let listing = catalog.get(id).cloned();
    app.emit(&listing, || match &listing {
        Some(listing) => format!("Purchased #{} {}.\n", listing.id, listing.display_name()),
        None => format!("Purchased #{id}.\n"),
    })
}

async fn run_mine(app: &App) -> Result<(), CliError> {
    let session = app.connect().await?;
    let view = OwnedCollection::new(app.hashes.clone(), app.config.count_fallback).load(&session).await?;
    app.emit(&view, || render::render_owned(&view, &app.explorer))
}

async fn run_history(app: &App) -> Result<(), CliError> {
    let session = app.connect().await?;
    let history = TransactionHistory::new(app.hashes.clone(), app.config.count_fallback).load(&session).await?;
    app.emit(&history, || render::render_history(&history, &app.explorer))
}

async fn run_create(app: &App, form: ListingForm, no_wait: bool) -> Result<(), CliError> {
    let draft = form.validate().map_err(MarketError::from)?;
    let session = app.connect().await?;

    let tx_hash = session.submit_listing(&draft).await?;
    eprint!("{}", render::render_submitted("Listing", &tx_hash, &app.explorer));
    if !no_wait {
        let receipt = session.contract()?.wait_for_receipt(tx_hash).await?;
        info!(?tx_hash, block = ?receipt.block_number, "listing confirmed");
    }
    app.emit(&tx_hash, || format!("{tx_hash:#x}\n"))
}

async fn run_watch(app: &App) -> Result<(), CliError> {
    let mut session = app.connect().await?;
    print!("{}", render::render_session(&session, &app.explorer));

    let interval = Duration::from_millis(app.config.watch_interval_ms.max(100));
    let (_handle, mut events) = spawn_wallet_watcher(Arc::clone(&app.provider), interval);
    while let Some(event) = events.recv().await {
        match session.handle_event(event).await {
            Ok(_) => print!("{}", render::render_session(&session, &app.explorer)),
            Err(e) => eprint!("{}", render::render_error(&e)),
        }
    }
    Ok(())
}
