use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use bookledger_bridge::{BridgeConfig, FileSystemWallet, LedgerBridge, NetworkProfile};
use bookledger_server::{AppState, DEFAULT_LISTEN, ServerError, development_network, serve};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bookledger-server", about = "Book catalog HTTP endpoints backed by a ledger")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// Connection profile describing the ledger network.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Wallet directory holding enrolled identities.
    #[arg(long, default_value = "wallet")]
    wallet: PathBuf,

    /// Directory holding the HTML pages.
    #[arg(long, default_value = "pages")]
    pages: PathBuf,

    /// Optional JSON bridge configuration (channel, contract, identity, timeouts).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Commit the sample catalog (`initLedger`) to the channel before serving.
    #[arg(long)]
    seed: bool,

    /// Log filter, e.g. `info` or `bookledger_bridge=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(&args.log)).init();

    let profile = match &args.profile {
        Some(path) => NetworkProfile::from_file(path)?,
        None => NetworkProfile::default(),
    };
    let config = match &args.config {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    }
    .with_network(profile)?;

    let network = development_network(&config, args.seed)?;

    let wallet = FileSystemWallet::new(&args.wallet);
    tracing::info!(wallet = %wallet.root().display(), identity = config.identity(), "using wallet");

    let bridge = Arc::new(LedgerBridge::new(config, Arc::new(wallet), Arc::new(network)));
    let state = AppState::new(bridge, args.pages);

    let listener = TcpListener::bind(args.listen).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    serve(listener, state, shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
