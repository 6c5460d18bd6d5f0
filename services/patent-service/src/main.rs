use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use patent_core::bootstrap::SessionBootstrap;
use patent_core::document::FsDocumentStore;
use patent_core::executor::FunctionExecutor;
use patent_core::ledger::DuplicateLedger;
use patent_core::registry::SessionRegistry;
use patent_service::bridge::{self, AppState};
use patent_service::config::Config;
use patent_service::prompt_loader;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Voice-driven patent drafting service")]
struct Cli {
    /// Address to listen on, overriding BIND_ADDRESS
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Directory for patent drafts, overriding DOCUMENTS_DIR
    #[arg(long)]
    documents_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    let config = config.with_overrides(args.bind, args.documents_dir);
    tracing::info!("Configuration loaded successfully. Starting patent service...");

    // --- 4. Load Prompts ---
    let bootstrap = match prompt_loader::load_instructions(config.prompts_dir())
        .context("Failed to load assistant instructions")?
    {
        Some(instructions) => {
            tracing::info!("Using instructions from {}", config.prompts_dir().display());
            SessionBootstrap::new(&instructions)
        }
        None => SessionBootstrap::default(),
    };

    // --- 5. Shared Patent State ---
    let store = Arc::new(FsDocumentStore::new(config.documents_dir()));
    let registry = Arc::new(SessionRegistry::new(store));
    let ledger = Arc::new(DuplicateLedger::new(config.duplicate_window()));
    let executor = Arc::new(FunctionExecutor::new(registry, ledger));
    tracing::info!("Patent drafts are stored in {}", config.documents_dir().display());

    // --- 6. Serve ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = bridge::router(AppState::new(executor, bootstrap, &config)).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    tracing::info!("Starting WebSocket server, listening on {}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Patent service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
