// src/main.rs
//
// Mining node over the persistent ledger:
//
// - TOML config (optional path as the first argument)
// - structured logging
// - Prometheus metrics exporter on /metrics
// - RocksDB-backed ledger, revalidated on load
// - a loop that mines one block per `miner.interval_secs` until Ctrl-C.

use std::{sync::Arc, time::Duration};

use tracing::{error, info, warn};

use chain::{
    ChainConfig, DefaultLedger, Ledger, LedgerError, MetricsRegistry, RocksDbLedgerStore,
    logging::init_logging, run_prometheus_http_server,
};

#[tokio::main]
async fn main() {
    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("fatal error: {e}");
            std::process::exit(1);
        }
    };
    init_logging(cfg.logging.format, &cfg.logging.level);

    if let Err(err) = run_node(cfg).await {
        error!("fatal error: {err}");
        std::process::exit(1);
    }
}

fn load_config() -> Result<ChainConfig, String> {
    match std::env::args().nth(1) {
        Some(path) => ChainConfig::from_toml_file(&path).map_err(|e| e.to_string()),
        None => Ok(ChainConfig::default()),
    }
}

async fn run_node(cfg: ChainConfig) -> Result<(), String> {
    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                error!("metrics HTTP server error: {e}");
            }
        });
        info!("metrics exporter listening on http://{addr}/metrics");
    }

    // ---------------------------
    // Ledger over RocksDB
    // ---------------------------

    let store = RocksDbLedgerStore::connect(&cfg.storage).map_err(|e| e.to_string())?;
    let mut ledger: DefaultLedger = Ledger::new(store, cfg.ledger.clone())
        .map_err(|e| e.to_string())?
        .with_metrics(metrics.ledger.clone());
    ledger.load().map_err(|e| e.to_string())?;

    info!(
        path = %cfg.storage.path,
        height = ledger.height(),
        difficulty = ledger.difficulty(),
        interval_secs = cfg.miner.interval_secs,
        "starting miner"
    );

    // ---------------------------
    // Mining loop
    // ---------------------------

    loop {
        // The search is CPU-bound; hand the ledger to the blocking pool and
        // take it back afterwards.
        let (returned, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = ledger.mine_block();
            (ledger, outcome)
        })
        .await
        .map_err(|e| format!("mining task panicked: {e}"))?;
        ledger = returned;

        match outcome {
            Ok(block) => info!(
                index = block.index(),
                hash = %block.hash(),
                proof = block.proof(),
                difficulty = block.mined_difficulty(),
                "mined block"
            ),
            Err(LedgerError::MiningTimeout { attempts }) => {
                warn!(attempts, "proof-of-work budget exhausted; retrying next tick")
            }
            Err(e) => return Err(e.to_string()),
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cfg.miner.interval_secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!(height = ledger.height(), "shutting down");
                return Ok(());
            }
        }
    }
}
