//! # StudyHub Server
//!
//! Loads configuration, installs structured logging, wires the document store,
//! blob storage, and consistency engine together, and serves the REST API.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use studyhub_api::{build_router, AppState};
use studyhub_db::{storage::LocalBlobStore, Database};
use studyhub_engine::Engine;

/// Command-line overrides. Everything else comes from config.toml / STUDYHUB_* env vars.
#[derive(Parser, Debug)]
#[command(name = "studyhub", version, about = "StudyHub community membership server")]
struct Cli {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(long)]
    port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = studyhub_common::config::init()?;

    // Initialize tracing (structured logging)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "studyhub=debug,tower_http=debug".into());
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }

    tracing::info!("Starting StudyHub v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(config)?;

    let blobs = Arc::new(LocalBlobStore::new(&config.storage.data_dir));
    tracing::info!(data_dir = %config.storage.data_dir, "Blob storage ready");

    let engine = Engine::new(db, config.engine.clone(), blobs);

    let state = AppState {
        engine,
        jwt_secret: config.auth.jwt_secret.clone(),
        identity_url: config.auth.identity_url.clone(),
        http: reqwest::Client::new(),
    };
    let router = build_router(state);

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let addr = SocketAddr::new(host.parse()?, cli.port.unwrap_or(config.server.port));

    tracing::info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
