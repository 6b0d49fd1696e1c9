//! Safeguard - default-deny filtering for plain-http requests.
//!
//! This binary wires the pieces together: opens the policy database,
//! spawns the engine task, and serves the HTTP/WebSocket API the
//! browser extension talks to.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use safeguard_core::classifier::PageUrls;
use safeguard_server::{AppState, Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use safeguard_storage::Database;
use safeguard_sync::{Engine, TabCommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Safeguard - default-deny filtering for plain-http requests
#[derive(Parser, Debug)]
#[command(name = "safeguard", version, about)]
struct Args {
    /// Host to bind the API server to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind the API server to
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Database path (defaults to the app data directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// URL of the interstitial page carrying the signed ticket
    #[arg(long, default_value = safeguard_core::classifier::DEFAULT_REDIRECT_TARGET_URL)]
    redirect_target_url: String,

    /// URL of the interactive blocked page
    #[arg(long, default_value = safeguard_core::classifier::DEFAULT_BLOCKED_URL)]
    blocked_url: String,
}

/// Initialize console logging.
fn init_logging(args: &Args) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("safeguard={},warn", args.log_level)));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Drain tab-navigation commands the engine emits for verified handshakes.
///
/// The extension side performs the actual navigation; here each command
/// is surfaced in the log so the flow is observable end to end.
fn spawn_tab_command_drain(mut commands: mpsc::UnboundedReceiver<TabCommand>) {
    tokio::spawn(async move {
        while let Some(TabCommand::Navigate { tab_id, url }) = commands.recv().await {
            info!(tab_id, %url, "Navigating tab to blocked page");
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let db = match &args.db {
        Some(path) => Database::with_path(path),
        None => Database::new(),
    }
    .context("failed to open policy database")?;

    let pages = PageUrls {
        redirect_target: args.redirect_target_url.clone(),
        blocked: args.blocked_url.clone(),
    };

    let (tab_commands, tab_receiver) = mpsc::unbounded_channel();
    spawn_tab_command_drain(tab_receiver);

    let engine =
        Engine::spawn(db, pages, tab_commands).context("failed to start policy engine")?;

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
    };
    let server = Server::with_state(config, AppState::new(engine))
        .context("failed to configure API server")?;

    info!("Safeguard ready on {}", server.addr());
    server.run().await.context("server exited with error")?;

    Ok(())
}
