use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::timeout;

use chain::consensus::{MessageBody, NodeHandle, trust_sets};
use chain::{
    InMemoryLedgerStore, Ledger, LedgerConfig, Message, MetricsRegistry, NodeId, NodeSpec,
    NodeState, Topology, spawn_network,
};

const SETTLE: Duration = Duration::from_secs(10);

fn ledger() -> Ledger<InMemoryLedgerStore> {
    let config = LedgerConfig {
        initial_difficulty: 1,
        ..LedgerConfig::default()
    };
    let mut ledger = Ledger::new(InMemoryLedgerStore::new(), config).unwrap();
    ledger.load().unwrap();
    ledger
}

fn specs(topology: Topology, n: usize) -> Vec<NodeSpec<InMemoryLedgerStore>> {
    let ids: Vec<NodeId> = (0..n).map(|_| NodeId::random()).collect();
    trust_sets(topology, &ids)
        .into_iter()
        .zip(&ids)
        .map(|(trusted, id)| NodeSpec {
            id: *id,
            trusted,
            ledger: ledger(),
        })
        .collect()
}

async fn settle_all(handles: &[NodeHandle<InMemoryLedgerStore>], height: u64) {
    for h in handles {
        timeout(
            SETTLE,
            h.wait_for(|s| s.height == height && s.state == NodeState::Idle),
        )
        .await
        .expect("node settles before timeout")
        .expect("node still running");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_mesh_of_five_cannot_reach_quorum() {
    let metrics = MetricsRegistry::new().unwrap();
    let handles = spawn_network(
        specs(Topology::FullMesh, 5),
        Some(metrics.consensus.clone()),
    );

    handles[0].propose().unwrap();

    // Four non-proposers ballot to all five nodes.
    for h in &handles {
        timeout(SETTLE, h.wait_for(|s| s.recorded_votes == 4))
            .await
            .expect("ballots delivered")
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    for h in &handles {
        let s = h.status();
        assert_eq!(s.height, 1, "no node may commit");
        assert_eq!(s.state, NodeState::Nominating);
        assert_eq!(s.latest_block_hash, None);
        assert_eq!(s.recorded_votes, 4);
    }
    assert_eq!(metrics.consensus.quorums_reached_total.get(), 0);
    assert_eq!(metrics.consensus.blocks_externalized_total.get(), 0);

    for h in handles {
        let node = h.shutdown().await.unwrap();
        assert_eq!(node.quorum_threshold(), 8);
        assert!(node.quorum_threshold() > node.trusted().len());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn relay_topology_converges_on_one_tip() {
    let metrics = MetricsRegistry::new().unwrap();
    let handles = spawn_network(specs(Topology::Relay, 5), Some(metrics.consensus.clone()));

    for round in 1..=2u64 {
        handles[0].propose().unwrap();
        settle_all(&handles, round + 1).await;

        let tips: BTreeSet<String> = handles
            .iter()
            .map(|h| h.status().tip.expect("tip").to_hex())
            .collect();
        assert_eq!(tips.len(), 1, "round {round}: nodes disagree on tip");

        for h in &handles {
            let s = h.status();
            assert_eq!(s.latest_block_hash, s.tip);
        }
    }
    assert_eq!(metrics.consensus.quorums_reached_total.get(), 2);

    for h in handles {
        let node = h.shutdown().await.unwrap();
        assert_eq!(node.ledger().height(), 3);
        assert_eq!(node.ledger().validate(), Ok(()));
        // Externalized hashes are pruned from the voting history.
        assert!(node.voting_history().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn injected_commits_spread_and_duplicates_are_ignored() {
    let handles = spawn_network(specs(Topology::Relay, 5), None);
    let proposer = &handles[0];
    let collector = &handles[4];
    let outsider = NodeId::random();
    let block = ledger().prepare_block().unwrap();
    let commit = Message::new(outsider, MessageBody::Commit(block.clone()));

    // The proposer externalizes to the relays, the collector to itself and
    // the proposer.
    proposer.deliver(commit.clone()).unwrap();
    for relay in &handles[1..4] {
        timeout(
            SETTLE,
            relay.wait_for(|s| s.height == 2 && s.state == NodeState::Idle),
        )
        .await
        .expect("relay adopts block")
        .unwrap();
    }
    collector.deliver(commit.clone()).unwrap();
    settle_all(&handles, 2).await;

    collector.deliver(commit).unwrap();
    handles[1]
        .deliver(Message::new(outsider, MessageBody::Externalize(block.clone())))
        .unwrap();

    for h in handles {
        let node = h.shutdown().await.unwrap();
        assert_eq!(node.ledger().height(), 2);
        assert_eq!(node.latest_block_hash(), Some(block.hash()));
        assert_eq!(node.state(), NodeState::Idle);
    }
}
