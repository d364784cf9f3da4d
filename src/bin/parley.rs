//! Parley - Terminal client for the chat relay
//!
//! Connects to a relay, prints everything it receives, and sends each line
//! typed on stdin. The first line answers the username prompt.
//!
//! # Usage
//!
//! ```text
//! parley                    # 127.0.0.1:8888
//! parley 10.0.0.5           # 10.0.0.5:8888
//! parley 10.0.0.5 9000      # 10.0.0.5:9000
//! ```
//!
//! Type `/quit`, `/exit` or `/q` to leave.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use parley_client::{ChatClient, ClientConfig, ClientError, ClientEvent, SessionEnd};
use parley_protocol::{DEFAULT_CLIENT_HOST, DEFAULT_PORT};

// ============================================================================
// CLI Arguments
// ============================================================================

/// Parley - terminal client for the chat relay
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Chat with everyone connected to a Parley relay")]
#[command(version)]
struct Args {
    /// Relay host name or IP address
    #[arg(default_value = DEFAULT_CLIENT_HOST)]
    host: String,

    /// Relay TCP port
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never interleave with chat output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(args));

    // A pending stdin read sits on a blocking thread that cannot be
    // interrupted; waiting for it would hang until the next keypress.
    runtime.shutdown_background();

    result
}

async fn run(args: Args) -> Result<()> {
    let config = ClientConfig::new(args.host, args.port);

    println!("[CONNECTING] Connecting to server {}...", config.address());
    let client = match ChatClient::connect(config).await {
        Ok(client) => client,
        Err(e @ ClientError::ConnectionRefused { .. }) => {
            println!("[ERROR] {e}");
            println!("[INFO] Make sure the server is running");
            println!("[DISCONNECTED] Disconnected from server");
            return Ok(());
        }
        Err(e) => {
            println!("[ERROR] {e}");
            println!("[DISCONNECTED] Disconnected from server");
            return Ok(());
        }
    };

    println!("[CONNECTED] Successfully connected to the server!");
    println!("[INFO] Type your messages and press Enter to send");
    println!("[INFO] Type /quit to disconnect\n");
    print!("> ");
    let _ = std::io::stdout().flush();
    debug!(address = %client.config().address(), "Starting chat session");

    let cancel_token = CancellationToken::new();
    spawn_interrupt_task(cancel_token.clone());

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(event_rx));

    let stdin = BufReader::new(tokio::io::stdin());
    let outcome = client.run(stdin, event_tx, cancel_token).await;

    // The channel closes once the client has stopped, which ends the printer.
    if let Err(e) = printer.await {
        debug!(error = %e, "Printer task failed");
    }

    match outcome {
        Ok(SessionEnd::UserQuit) => println!("[INFO] Disconnecting from server..."),
        Ok(end) => debug!(?end, "Session ended"),
        Err(e) => println!("[ERROR] {e}"),
    }
    println!("[DISCONNECTED] Disconnected from server");

    Ok(())
}

// ============================================================================
// Output
// ============================================================================

async fn print_events(mut event_rx: mpsc::UnboundedReceiver<ClientEvent>) {
    let mut stdout = std::io::stdout();

    while let Some(event) = event_rx.recv().await {
        match event {
            ClientEvent::Message(text) => {
                print!("\n{text}\n> ");
            }
            ClientEvent::Disconnected => {
                println!("\n[DISCONNECTED] Connection to server lost");
            }
            ClientEvent::Error(e) => {
                println!("\n[ERROR] {e}");
            }
        }
        let _ = stdout.flush();
    }
}

fn spawn_interrupt_task(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for Ctrl+C");
            return;
        }
        cancel_token.cancel();
    });
}
