//! webmatch-re - Company Website Resolution Service
//!
//! HTTP service that resolves company records (name, city, phone, context)
//! to canonical web domains using tiered multi-source lookup, cross-source
//! consensus, and page content validation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webmatch_common::events::EventBus;

use webmatch_re::adapters::AdapterRegistry;
use webmatch_re::engine::ResolutionEngine;
use webmatch_re::validation::judgment::{JudgmentClient, JudgmentScorer};
use webmatch_re::validation::{ContentFetcher, PageProbe};
use webmatch_re::AppState;

/// Command-line arguments for webmatch-re
#[derive(Parser, Debug)]
#[command(name = "webmatch-re")]
#[command(about = "Company website resolution service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5800", env = "WEBMATCH_PORT")]
    port: u16,

    /// Data folder holding webmatch.db and webmatch.toml
    #[arg(short, long)]
    data_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webmatch_re=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting webmatch-re (Website Resolution) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve data folder
    let data_folder = webmatch_common::config::resolve_data_folder(
        args.data_folder.as_deref(),
        "WEBMATCH_DATA_FOLDER",
    );

    // Step 2: Create data folder if missing
    let initializer = webmatch_common::config::DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize data folder")?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = webmatch_re::db::init_database(&db_path).await?;

    // Step 4: Load service configuration
    let config_path = initializer.config_path();
    let service_toml = webmatch_re::config::load_service_toml(&config_path)?;
    let engine_config = service_toml.engine.clone();

    // Step 5: Resolve adapter API keys (database -> ENV -> TOML)
    let keys = webmatch_re::config::resolve_adapter_keys(&db, &service_toml.keys).await?;

    // Step 6: Judgment client for low-confidence assessment (optional)
    let judgment = match &keys.llm {
        Some(key) => match JudgmentClient::new(
            key.clone(),
            Duration::from_millis(engine_config.judgment_timeout_ms),
        ) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Judgment scoring disabled: {}", e);
                None
            }
        },
        None => {
            warn!("llm_api_key not configured - low-confidence assessment disabled");
            None
        }
    };

    // Step 7: Build adapter registry from configured keys
    let registry = AdapterRegistry::from_config(&keys, judgment.clone())?;

    // Step 8: Resolution engine with page validation
    let fetcher: Arc<dyn ContentFetcher> = Arc::new(PageProbe::new()?);
    let judge = judgment.map(|client| client as Arc<dyn JudgmentScorer>);
    let engine = Arc::new(ResolutionEngine::new(
        engine_config,
        Arc::new(registry),
        fetcher,
        judge,
    ));

    // Step 9: Event bus for SSE broadcasting
    let event_bus = EventBus::new(100); // 100 event capacity

    // Create application state and router
    let state = AppState::new(db, event_bus, engine, config_path);
    let app = webmatch_re::build_router(state);

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
