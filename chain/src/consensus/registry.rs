//! Id-indexed directory of node inboxes.
//!
//! The registry holds only weak senders. A node's inbox stays open for as
//! long as its [`super::network::NodeHandle`] lives, and peers never keep
//! each other alive.

use std::collections::HashMap;

use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};

use crate::types::NodeId;

use super::error::ConsensusError;
use super::message::Message;

#[derive(Default)]
pub struct PeerRegistry {
    inboxes: HashMap<NodeId, WeakUnboundedSender<Message>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `inbox` under `id`, replacing any earlier entry.
    pub fn register(&mut self, id: NodeId, inbox: &UnboundedSender<Message>) {
        self.inboxes.insert(id, inbox.downgrade());
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.inboxes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inboxes.is_empty()
    }

    /// Delivers `msg` to `to`'s inbox.
    pub fn send(&self, to: &NodeId, msg: Message) -> Result<(), ConsensusError> {
        let inbox = self
            .inboxes
            .get(to)
            .ok_or(ConsensusError::PeerUnavailable(*to))?;
        let inbox = inbox.upgrade().ok_or(ConsensusError::NodeStopped(*to))?;
        inbox
            .send(msg)
            .map_err(|_| ConsensusError::NodeStopped(*to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::message::MessageBody;
    use crate::types::Block;
    use tokio::sync::mpsc::unbounded_channel;

    fn nomination(from: NodeId) -> Message {
        Message::new(from, MessageBody::Nomination(Block::genesis()))
    }

    #[test]
    fn delivers_to_registered_inbox() {
        let id = NodeId::random();
        let (tx, mut rx) = unbounded_channel();
        let mut registry = PeerRegistry::new();
        registry.register(id, &tx);

        let from = NodeId::random();
        registry.send(&id, nomination(from)).unwrap();
        assert_eq!(rx.try_recv().unwrap().sender, from);
    }

    #[test]
    fn unknown_and_dropped_peers_are_errors() {
        let mut registry = PeerRegistry::new();
        let stranger = NodeId::random();
        assert!(matches!(
            registry.send(&stranger, nomination(stranger)),
            Err(ConsensusError::PeerUnavailable(id)) if id == stranger
        ));

        let gone = NodeId::random();
        let (tx, rx) = unbounded_channel();
        registry.register(gone, &tx);
        drop(tx);
        drop(rx);
        assert!(matches!(
            registry.send(&gone, nomination(gone)),
            Err(ConsensusError::NodeStopped(_))
        ));
    }

    #[test]
    fn registry_does_not_keep_inboxes_open() {
        let id = NodeId::random();
        let (tx, mut rx) = unbounded_channel::<Message>();
        let mut registry = PeerRegistry::new();
        registry.register(id, &tx);
        drop(tx);
        assert!(rx.try_recv().is_err());
        assert!(rx.is_closed());
        assert_eq!(registry.len(), 1);
    }
}
