//! In-process network bootstrap.
//!
//! [`spawn_network`] gives every node its own inbox and command channel,
//! registers the inboxes in one shared [`PeerRegistry`] and spawns one Tokio
//! task per node. The returned [`NodeHandle`]s own the only strong senders,
//! so dropping or shutting down a handle is what stops its node.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{
    mpsc::{UnboundedSender, unbounded_channel},
    watch,
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Topology;
use crate::ledger::Ledger;
use crate::metrics::ConsensusMetrics;
use crate::storage::LedgerStore;
use crate::types::NodeId;

use super::error::ConsensusError;
use super::message::Message;
use super::node::{ConsensusNode, NodeCommand, NodeStatus};
use super::registry::PeerRegistry;

/// Everything needed to start one node.
pub struct NodeSpec<S: LedgerStore> {
    pub id: NodeId,
    pub trusted: BTreeSet<NodeId>,
    pub ledger: Ledger<S>,
}

pub struct NodeHandle<S: LedgerStore> {
    id: NodeId,
    inbox: UnboundedSender<Message>,
    commands: UnboundedSender<NodeCommand>,
    status: watch::Receiver<NodeStatus>,
    task: JoinHandle<ConsensusNode<S>>,
}

impl<S: LedgerStore + Send + 'static> NodeHandle<S> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Asks the node to propose a value on its current tip.
    pub fn propose(&self) -> Result<(), ConsensusError> {
        self.commands
            .send(NodeCommand::Propose)
            .map_err(|_| ConsensusError::NodeStopped(self.id))
    }

    /// Injects a message into the node's inbox as if a peer had sent it.
    pub fn deliver(&self, msg: Message) -> Result<(), ConsensusError> {
        self.inbox
            .send(msg)
            .map_err(|_| ConsensusError::NodeStopped(self.id))
    }

    /// Latest published status.
    pub fn status(&self) -> NodeStatus {
        NodeStatus::clone(&self.status.borrow())
    }

    /// Waits until the node publishes a status matching `pred`.
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&NodeStatus) -> bool,
    ) -> Result<NodeStatus, ConsensusError> {
        let mut rx = self.status.clone();
        let seen = rx
            .wait_for(pred)
            .await
            .map_err(|_| ConsensusError::NodeStopped(self.id))?;
        Ok(NodeStatus::clone(&seen))
    }

    /// Closes both of the node's channels and returns the stopped node.
    pub async fn shutdown(self) -> Result<ConsensusNode<S>, ConsensusError> {
        let Self {
            id,
            inbox,
            commands,
            task,
            ..
        } = self;
        drop(inbox);
        drop(commands);
        task.await.map_err(|_| ConsensusError::NodeStopped(id))
    }
}

/// Builds one trust set per id, in the same order as `ids`.
///
/// - [`Topology::FullMesh`]: every node trusts every id, itself included.
/// - [`Topology::Relay`]: `ids[0]` is the proposer and trusts the relays
///   `ids[1..n-1]`; each relay trusts only the collector `ids[n-1]`; the
///   collector trusts itself and the proposer. The collector's threshold is
///   3, so at least three relays (five nodes) are needed to reach quorum.
pub fn trust_sets(topology: Topology, ids: &[NodeId]) -> Vec<BTreeSet<NodeId>> {
    match topology {
        Topology::FullMesh => {
            let everyone: BTreeSet<NodeId> = ids.iter().copied().collect();
            vec![everyone; ids.len()]
        }
        Topology::Relay => {
            let n = ids.len();
            if n < 3 {
                return vec![BTreeSet::new(); n];
            }
            let proposer = ids[0];
            let collector = ids[n - 1];
            let relays: BTreeSet<NodeId> = ids[1..n - 1].iter().copied().collect();

            let mut sets = Vec::with_capacity(n);
            sets.push(relays);
            sets.extend((1..n - 1).map(|_| BTreeSet::from([collector])));
            sets.push(BTreeSet::from([collector, proposer]));
            sets
        }
    }
}

/// Wires the registry and spawns one task per node.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_network<S>(
    specs: Vec<NodeSpec<S>>,
    metrics: Option<ConsensusMetrics>,
) -> Vec<NodeHandle<S>>
where
    S: LedgerStore + Send + 'static,
{
    let mut registry = PeerRegistry::new();
    let mut inboxes = Vec::with_capacity(specs.len());
    for spec in &specs {
        let (tx, rx) = unbounded_channel();
        registry.register(spec.id, &tx);
        inboxes.push((tx, rx));
    }
    let registry = Arc::new(registry);
    info!(nodes = registry.len(), "spawning consensus network");

    specs
        .into_iter()
        .zip(inboxes)
        .map(|(spec, (inbox, inbox_rx))| {
            let (commands, commands_rx) = unbounded_channel();
            let mut node = ConsensusNode::new(spec.id, spec.trusted, spec.ledger, registry.clone());
            if let Some(m) = &metrics {
                node = node.with_metrics(m.clone());
            }
            let status = node.subscribe();
            let task = tokio::spawn(node.run(inbox_rx, commands_rx));
            NodeHandle {
                id: spec.id,
                inbox,
                commands,
                status,
                task,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::quorum::quorum_threshold;

    fn ids(n: usize) -> Vec<NodeId> {
        (0..n).map(|_| NodeId::random()).collect()
    }

    #[test]
    fn full_mesh_includes_self() {
        let ids = ids(5);
        let sets = trust_sets(Topology::FullMesh, &ids);
        assert_eq!(sets.len(), 5);
        for (id, set) in ids.iter().zip(&sets) {
            assert!(set.contains(id));
            assert_eq!(set.len(), 5);
            assert_eq!(quorum_threshold(set.len()), 8);
        }
    }

    #[test]
    fn relay_routes_ballots_to_one_collector() {
        let ids = ids(5);
        let sets = trust_sets(Topology::Relay, &ids);
        let collector = ids[4];

        assert_eq!(sets[0], ids[1..4].iter().copied().collect());
        for relay in &sets[1..4] {
            assert_eq!(relay, &BTreeSet::from([collector]));
        }
        assert_eq!(sets[4], BTreeSet::from([collector, ids[0]]));
        // Three relays are exactly enough for the collector.
        assert_eq!(quorum_threshold(sets[4].len()), 3);
    }

    #[test]
    fn tiny_relay_has_empty_trust_sets() {
        let sets = trust_sets(Topology::Relay, &ids(2));
        assert!(sets.iter().all(BTreeSet::is_empty));
    }
}
