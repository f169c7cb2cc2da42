// src/bin/scp-sim.rs
//
// In-process consensus simulation: one in-memory ledger per node, wired
// into the configured topology, with the first node proposing a block per
// round. Each node's final status is logged once the round settles or the
// settle timeout expires.

use std::{sync::Arc, time::Duration};

use tracing::{error, info, warn};

use chain::{
    ChainConfig, InMemoryLedgerStore, Ledger, MetricsRegistry, NodeId, NodeSpec, NodeState,
    consensus::{NodeHandle, trust_sets},
    logging::init_logging,
    spawn_network,
};

#[tokio::main]
async fn main() {
    let cfg = match std::env::args().nth(1) {
        Some(path) => match ChainConfig::from_toml_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("fatal error: {e}");
                std::process::exit(1);
            }
        },
        None => ChainConfig::default(),
    };
    init_logging(cfg.logging.format, &cfg.logging.level);

    if let Err(err) = run_simulation(cfg).await {
        error!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_simulation(cfg: ChainConfig) -> Result<(), String> {
    let sim = &cfg.simulation;
    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    let ids: Vec<NodeId> = (0..sim.nodes).map(|_| NodeId::random()).collect();
    let trust = trust_sets(sim.topology, &ids);

    let mut specs = Vec::with_capacity(ids.len());
    for (id, trusted) in ids.iter().zip(trust) {
        let mut ledger = Ledger::new(InMemoryLedgerStore::new(), cfg.ledger.clone())
            .map_err(|e| e.to_string())?
            .with_metrics(metrics.ledger.clone());
        ledger.load().map_err(|e| e.to_string())?;
        specs.push(NodeSpec {
            id: *id,
            trusted,
            ledger,
        });
    }

    let handles = spawn_network(specs, Some(metrics.consensus.clone()));
    let Some(proposer) = handles.first() else {
        warn!("simulation configured with zero nodes");
        return Ok(());
    };
    info!(nodes = handles.len(), topology = ?sim.topology, proposer = %proposer.id(), "network up");

    let settle = Duration::from_millis(sim.settle_timeout_ms);
    for round in 1..=sim.proposals {
        let target_height = proposer.status().height + 1;
        proposer.propose().map_err(|e| e.to_string())?;

        let settled = tokio::time::timeout(settle, wait_all(&handles, target_height)).await;
        match settled {
            Ok(Ok(())) => info!(round, height = target_height, "round externalized on every node"),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(round, timeout_ms = sim.settle_timeout_ms, "round did not settle");
                break;
            }
        }
    }

    for handle in &handles {
        let s = handle.status();
        info!(
            node = %s.id,
            state = %s.state,
            height = s.height,
            tip = ?s.tip.map(|h| h.to_hex()),
            latest = ?s.latest_block_hash.map(|h| h.to_hex()),
            recorded_votes = s.recorded_votes,
            "final status"
        );
    }

    for handle in handles {
        handle.shutdown().await.map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn wait_all(
    handles: &[NodeHandle<InMemoryLedgerStore>],
    height: u64,
) -> Result<(), String> {
    for handle in handles {
        handle
            .wait_for(|s| s.height >= height && s.state == NodeState::Idle)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}
