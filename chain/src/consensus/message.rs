//! Typed envelopes exchanged between consensus participants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Block, BlockHash, NodeId};

/// The closed set of consensus message kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Nomination,
    Ballot,
    Commit,
    Externalize,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Nomination,
        MessageKind::Ballot,
        MessageKind::Commit,
        MessageKind::Externalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Nomination => "NOMINATION",
            MessageKind::Ballot => "BALLOT",
            MessageKind::Commit => "COMMIT",
            MessageKind::Externalize => "EXTERNALIZE",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a message is built from a kind outside [`MessageKind::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown consensus message kind {0:?}")]
pub struct MessageTypeError(pub String);

impl FromStr for MessageKind {
    type Err = MessageTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MessageTypeError(s.to_string()))
    }
}

/// A block under vote together with its round counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub block: Block,
    pub counter: u32,
}

impl Ballot {
    /// Counter of the first (and, for now, only) round.
    pub const INITIAL_COUNTER: u32 = 1;

    pub fn new(block: Block) -> Self {
        Self {
            block,
            counter: Self::INITIAL_COUNTER,
        }
    }
}

/// Payload of a [`Message`], one variant per [`MessageKind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    Nomination(Block),
    Ballot(Ballot),
    Commit(Block),
    Externalize(Block),
}

impl MessageBody {
    /// Builds the body for `kind`. Ballots start at the initial counter.
    pub fn from_kind(kind: MessageKind, block: Block) -> Self {
        match kind {
            MessageKind::Nomination => MessageBody::Nomination(block),
            MessageKind::Ballot => MessageBody::Ballot(Ballot::new(block)),
            MessageKind::Commit => MessageBody::Commit(block),
            MessageKind::Externalize => MessageBody::Externalize(block),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Nomination(_) => MessageKind::Nomination,
            MessageBody::Ballot(_) => MessageKind::Ballot,
            MessageBody::Commit(_) => MessageKind::Commit,
            MessageBody::Externalize(_) => MessageKind::Externalize,
        }
    }

    pub fn block(&self) -> &Block {
        match self {
            MessageBody::Nomination(b) | MessageBody::Commit(b) | MessageBody::Externalize(b) => b,
            MessageBody::Ballot(ballot) => &ballot.block,
        }
    }
}

/// One consensus message. Consumed exactly once by the receiving node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub sender: NodeId,
    pub body: MessageBody,
}

impl Message {
    pub fn new(sender: NodeId, body: MessageBody) -> Self {
        Self { sender, body }
    }

    /// Builds a message from a textual kind, rejecting unknown kinds.
    pub fn from_wire(kind: &str, sender: NodeId, block: Block) -> Result<Self, MessageTypeError> {
        let kind: MessageKind = kind.parse()?;
        Ok(Self::new(sender, MessageBody::from_kind(kind, block)))
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn block(&self) -> &Block {
        self.body.block()
    }
}

/// One entry of a node's voting history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Vote {
    pub kind: MessageKind,
    pub block_hash: BlockHash,
    pub sender: NodeId,
    pub counter: u32,
}
