// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `chain` crate:
//!
//! - `GET /health`
//! - `GET /api/v1/blocks`
//! - `POST /api/v1/blocks/mine`
//! - `GET /api/v1/blocks/validity`
//!
//! It embeds a RocksDB-backed ledger and a Prometheus metrics exporter on
//! `/metrics`. An optional chain TOML config path may be given as the first
//! argument.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::{signal, sync::Mutex};

use chain::{
    ChainConfig, DefaultLedger, Ledger, MetricsRegistry, RocksDbLedgerStore,
    logging::init_logging, run_prometheus_http_server,
};
use config::ApiConfig;
use routes::{blocks, health};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    let chain_cfg = match std::env::args().nth(1) {
        Some(path) => match ChainConfig::from_toml_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("fatal error: {e}");
                std::process::exit(1);
            }
        },
        None => ChainConfig::default(),
    };
    init_logging(chain_cfg.logging.format, &chain_cfg.logging.level);

    if let Err(e) = run(chain_cfg).await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(chain_cfg: ChainConfig) -> Result<(), String> {
    let api_cfg = ApiConfig::from_env()?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if chain_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = chain_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Ledger over RocksDB
    // ---------------------------

    let store = RocksDbLedgerStore::connect(&chain_cfg.storage).map_err(|e| e.to_string())?;
    let mut ledger: DefaultLedger = Ledger::new(store, chain_cfg.ledger.clone())
        .map_err(|e| e.to_string())?
        .with_metrics(metrics.ledger.clone());
    ledger.load().map_err(|e| e.to_string())?;
    tracing::info!(height = ledger.height(), "ledger loaded");

    let app_state: SharedState = Arc::new(AppState {
        ledger: Arc::new(Mutex::new(ledger)),
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/blocks", get(blocks::list_blocks))
        .route("/api/v1/blocks/mine", post(blocks::mine_block))
        .route("/api/v1/blocks/validity", get(blocks::validity))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
