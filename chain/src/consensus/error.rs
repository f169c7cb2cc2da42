use thiserror::Error;

use crate::ledger::LedgerError;
use crate::types::NodeId;

/// Errors surfaced by a consensus node or its handle.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The node's ledger failed for a reason other than block validity,
    /// typically a store write.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// No inbox is registered for this peer.
    #[error("peer {0} is not registered")]
    PeerUnavailable(NodeId),

    /// The peer's task has exited and its inbox is closed.
    #[error("node {0} has stopped")]
    NodeStopped(NodeId),
}
