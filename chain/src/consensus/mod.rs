//! Quorum consensus among ledger-owning nodes.
//!
//! This module provides:
//!
//! - the message vocabulary ([`message::Message`], [`message::Ballot`]),
//! - node phases ([`state::NodeState`]) and quorum arithmetic ([`quorum`]),
//! - the per-node state machine ([`node::ConsensusNode`]),
//! - a weak, id-indexed inbox directory ([`registry::PeerRegistry`]), and
//! - an in-process bootstrap that runs one task per node ([`network`]).

pub mod error;
pub mod message;
pub mod network;
pub mod node;
pub mod quorum;
pub mod registry;
pub mod state;

pub use error::ConsensusError;
pub use message::{Ballot, Message, MessageBody, MessageKind, MessageTypeError, Vote};
pub use network::{NodeHandle, NodeSpec, spawn_network, trust_sets};
pub use node::{ConsensusNode, NodeCommand, NodeStatus};
pub use quorum::{count_votes, quorum_threshold};
pub use registry::PeerRegistry;
pub use state::NodeState;
