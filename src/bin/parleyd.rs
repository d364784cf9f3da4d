//! Parley Daemon - Multi-client TCP chat relay
//!
//! Accepts TCP clients, asks each for a username, and relays every message
//! a client sends to all other connected clients.
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:8888
//! parleyd
//!
//! # Listen on a specific interface and port
//! parleyd --host 127.0.0.1 --port 9000
//!
//! # More detail
//! RUST_LOG=parleyd=debug parleyd
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parley_protocol::{DEFAULT_PORT, DEFAULT_SERVER_HOST};
use parleyd::{ChatServer, Registry, ServerConfig};

/// Parley daemon - multi-client TCP chat relay
#[derive(Parser, Debug)]
#[command(name = "parleyd", version, about)]
struct Args {
    /// Interface to listen on
    #[arg(short = 'H', long, default_value = DEFAULT_SERVER_HOST)]
    host: String,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("parleyd=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "Parley relay starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let config = ServerConfig::new(args.host, args.port);
    let address = config.address();

    let registry = Registry::new();
    let server = ChatServer::bind(config, registry, cancel_token)
        .await
        .with_context(|| format!("Failed to start relay on {address}"))?;

    server.run().await;

    info!("Parley relay stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
