//! The per-participant consensus state machine.
//!
//! A [`ConsensusNode`] owns its [`Ledger`], drains a single inbox in arrival
//! order and talks to peers only through the shared [`PeerRegistry`]. All
//! handlers are synchronous; the only suspension point is waiting for the
//! next inbox item or local command.
//!
//! Round outline: the proposer mines a candidate and sends NOMINATION to its
//! trust set; idle receivers answer with BALLOT to theirs; a node that sees
//! ballots from `quorum_threshold` distinct senders sends COMMIT; a node
//! that accepts a COMMIT appends the block and announces EXTERNALIZE, which
//! every receiver adopts.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc::UnboundedReceiver, watch};
use tracing::{debug, info, warn};

use crate::ledger::{Ledger, LedgerError};
use crate::metrics::ConsensusMetrics;
use crate::storage::LedgerStore;
use crate::types::{Block, BlockHash, NodeId};

use super::error::ConsensusError;
use super::message::{Ballot, Message, MessageBody, MessageKind, Vote};
use super::quorum;
use super::registry::PeerRegistry;
use super::state::NodeState;

/// Local instructions delivered beside the peer inbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeCommand {
    /// Run [`ConsensusNode::propose_value`].
    Propose,
}

/// Snapshot of a node, published after every handled inbox item or command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    pub id: NodeId,
    pub state: NodeState,
    pub latest_block_hash: Option<BlockHash>,
    pub height: u64,
    pub tip: Option<BlockHash>,
    pub recorded_votes: usize,
}

pub struct ConsensusNode<S: LedgerStore> {
    id: NodeId,
    trusted: BTreeSet<NodeId>,
    quorum_threshold: usize,
    ledger: Ledger<S>,
    state: NodeState,
    current_ballot: Option<Ballot>,
    latest_block_hash: Option<BlockHash>,
    voting_history: HashSet<Vote>,
    peers: Arc<PeerRegistry>,
    status: watch::Sender<NodeStatus>,
    metrics: Option<ConsensusMetrics>,
}

impl<S: LedgerStore> ConsensusNode<S> {
    /// Builds an idle node.
    ///
    /// The quorum threshold is derived from `trusted.len()` here and never
    /// recomputed.
    pub fn new(
        id: NodeId,
        trusted: BTreeSet<NodeId>,
        ledger: Ledger<S>,
        peers: Arc<PeerRegistry>,
    ) -> Self {
        let quorum_threshold = quorum::quorum_threshold(trusted.len());
        let initial = NodeStatus {
            id,
            state: NodeState::Idle,
            latest_block_hash: None,
            height: ledger.height(),
            tip: ledger.tip().map(|b| *b.hash()),
            recorded_votes: 0,
        };
        let (status, _) = watch::channel(initial);
        Self {
            id,
            trusted,
            quorum_threshold,
            ledger,
            state: NodeState::Idle,
            current_ballot: None,
            latest_block_hash: None,
            voting_history: HashSet::new(),
            peers,
            status,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ConsensusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn trusted(&self) -> &BTreeSet<NodeId> {
        &self.trusted
    }

    pub fn quorum_threshold(&self) -> usize {
        self.quorum_threshold
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn latest_block_hash(&self) -> Option<&BlockHash> {
        self.latest_block_hash.as_ref()
    }

    pub fn current_ballot(&self) -> Option<&Ballot> {
        self.current_ballot.as_ref()
    }

    pub fn voting_history(&self) -> &HashSet<Vote> {
        &self.voting_history
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.id,
            state: self.state,
            latest_block_hash: self.latest_block_hash,
            height: self.ledger.height(),
            tip: self.ledger.tip().map(|b| *b.hash()),
            recorded_votes: self.voting_history.len(),
        }
    }

    /// Receiver for the status snapshots this node publishes.
    pub fn subscribe(&self) -> watch::Receiver<NodeStatus> {
        self.status.subscribe()
    }

    /// Single-consumer loop over the inbox and the command channel.
    ///
    /// Returns the node once both channels are closed.
    pub async fn run(
        mut self,
        mut inbox: UnboundedReceiver<Message>,
        mut commands: UnboundedReceiver<NodeCommand>,
    ) -> Self {
        let mut inbox_open = true;
        let mut commands_open = true;
        info!(node = %self.id, trusted = self.trusted.len(), threshold = self.quorum_threshold, "consensus node started");

        while inbox_open || commands_open {
            tokio::select! {
                msg = inbox.recv(), if inbox_open => match msg {
                    Some(msg) => {
                        if let Err(e) = self.handle_message(msg) {
                            warn!(node = %self.id, error = %e, "message handling failed");
                        }
                    }
                    None => inbox_open = false,
                },
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => commands_open = false,
                },
            }
        }

        info!(node = %self.id, state = %self.state, height = self.ledger.height(), "consensus node stopped");
        self
    }

    pub fn handle_command(&mut self, cmd: NodeCommand) {
        match cmd {
            NodeCommand::Propose => match self.propose_value() {
                Ok(Some(hash)) => debug!(node = %self.id, %hash, "proposal sent"),
                Ok(None) => {}
                Err(e) => warn!(node = %self.id, error = %e, "proposal failed"),
            },
        }
        self.publish_status();
    }

    /// Dispatches one inbox message to its handler.
    pub fn handle_message(&mut self, msg: Message) -> Result<(), ConsensusError> {
        let kind = msg.kind();
        if let Some(m) = &self.metrics {
            m.messages_handled_total
                .with_label_values(&[kind.as_str()])
                .inc();
        }
        debug!(node = %self.id, from = %msg.sender, %kind, state = %self.state, "handling message");

        let sender = msg.sender;
        let result = match msg.body {
            MessageBody::Nomination(block) => {
                self.handle_nomination(block);
                Ok(())
            }
            MessageBody::Ballot(ballot) => {
                self.handle_ballot(sender, ballot);
                Ok(())
            }
            MessageBody::Commit(block) => self.handle_commit(block),
            MessageBody::Externalize(block) => {
                self.handle_externalize(block);
                Ok(())
            }
        };
        self.publish_status();
        result
    }

    /// Mines a candidate on this node's tip and nominates it.
    ///
    /// Only acts while idle; otherwise returns `Ok(None)`. The proposer
    /// enters NOMINATING itself and so does not vote on its own candidate.
    pub fn propose_value(&mut self) -> Result<Option<BlockHash>, ConsensusError> {
        if self.state != NodeState::Idle {
            debug!(node = %self.id, state = %self.state, "not idle; proposal skipped");
            return Ok(None);
        }

        let block = self.ledger.prepare_block()?;
        let hash = *block.hash();
        info!(node = %self.id, index = block.index(), %hash, "proposing block");

        self.state = NodeState::Nominating;
        self.current_ballot = Some(Ballot::new(block.clone()));
        self.broadcast(MessageBody::Nomination(block));
        Ok(Some(hash))
    }

    /// `true` once ballots for `hash` came from at least
    /// `quorum_threshold` distinct senders.
    pub fn check_quorum(&self, hash: &BlockHash) -> bool {
        quorum::count_votes(&self.voting_history, hash) >= self.quorum_threshold
    }

    fn handle_nomination(&mut self, block: Block) {
        if self.state != NodeState::Idle {
            debug!(node = %self.id, state = %self.state, "nomination ignored");
            return;
        }
        let ballot = Ballot::new(block);
        self.state = NodeState::Nominating;
        self.current_ballot = Some(ballot.clone());
        self.broadcast(MessageBody::Ballot(ballot));
    }

    fn handle_ballot(&mut self, sender: NodeId, ballot: Ballot) {
        let hash = *ballot.block.hash();
        self.voting_history.insert(Vote {
            kind: MessageKind::Ballot,
            block_hash: hash,
            sender,
            counter: ballot.counter,
        });

        if self.check_quorum(&hash) {
            info!(node = %self.id, %hash, "quorum reached");
            if let Some(m) = &self.metrics {
                m.quorums_reached_total.inc();
            }
            self.state = NodeState::Committing;
            self.broadcast(MessageBody::Commit(ballot.block));
        }
    }

    fn handle_commit(&mut self, block: Block) -> Result<(), ConsensusError> {
        let hash = *block.hash();
        if self.state == NodeState::Externalizing && self.latest_block_hash == Some(hash) {
            return Ok(());
        }
        if self.ledger.contains(&hash) {
            debug!(node = %self.id, %hash, "commit for a block already in the ledger");
            return Ok(());
        }

        match self.ledger.append_block(block.clone()) {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.blocks_externalized_total.inc();
                }
                self.latest_block_hash = Some(hash);
                self.state = NodeState::Externalizing;
                self.broadcast(MessageBody::Externalize(block));
                Ok(())
            }
            Err(LedgerError::BlockValidation(e)) => {
                warn!(node = %self.id, %hash, reason = %e, "dropping invalid committed block");
                if let Some(m) = &self.metrics {
                    m.invalid_commits_total.inc();
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn handle_externalize(&mut self, block: Block) {
        let hash = *block.hash();
        if self.ledger.contains(&hash) {
            self.latest_block_hash = Some(hash);
        } else {
            match self.ledger.append_block(block) {
                Ok(()) => {
                    if let Some(m) = &self.metrics {
                        m.blocks_externalized_total.inc();
                    }
                    self.latest_block_hash = Some(hash);
                }
                Err(e) => {
                    warn!(node = %self.id, %hash, error = %e, "could not adopt externalized block");
                }
            }
        }

        self.voting_history.retain(|v| v.block_hash != hash);
        self.current_ballot = None;
        self.state = NodeState::Idle;
    }

    fn broadcast(&self, body: MessageBody) {
        for peer in &self.trusted {
            if let Err(e) = self.peers.send(peer, Message::new(self.id, body.clone())) {
                warn!(node = %self.id, %peer, kind = %body.kind(), error = %e, "broadcast failed");
            }
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(self.status());
    }
}
