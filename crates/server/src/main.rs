use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelmatch_core::{
    load_config, validate_config, Enricher, HttpReranker, Library, MatchOrchestrator, Searcher,
    SiteScraper, SqliteLibrary,
};
use reelmatch_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("REELMATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "reelmatch {} configuration loaded (hash {})",
        VERSION,
        &config_hash[..16]
    );
    info!("Database path: {:?}", config.database.path);
    info!("Catalog site: {}", config.site.base_url);

    // Create SQLite library
    let library: Arc<dyn Library> = Arc::new(
        SqliteLibrary::new(&config.database.path).context("Failed to open library database")?,
    );
    info!("Library initialized");

    // Create site scraper (search + detail enrichment)
    let scraper =
        Arc::new(SiteScraper::new(&config.site).context("Failed to create site scraper")?);
    let searcher: Arc<dyn Searcher> = scraper.clone();
    let enricher: Arc<dyn Enricher> = scraper;

    let mut orchestrator =
        MatchOrchestrator::new(searcher, enricher, library, config.matcher.clone());

    // Create re-ranker if enabled
    if config.rerank.enabled {
        match HttpReranker::new(&config.rerank) {
            Ok(reranker) => {
                info!("Re-ranking enabled");
                orchestrator = orchestrator.with_reranker(Arc::new(reranker));
            }
            Err(e) => warn!("Re-ranking disabled: {}", e),
        }
    } else {
        info!("Re-ranking not configured");
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::new(orchestrator)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
