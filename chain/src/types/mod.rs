//! Core domain types used by the chain
//!
//! This module defines strongly-typed hashes, the parent link carried by
//! every block, and the identifiers used by consensus participants. The goal
//! is to avoid "naked" byte buffers and bare strings in public APIs and
//! instead use domain-specific newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Block type, canonical hashing, and the genesis constants.
pub mod block;

pub use block::{Block, GENESIS_PROOF, GENESIS_SENTINEL};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This type is used as the backing representation for block hashes and
/// proof-of-work digests. It is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    ///
    /// The result is deterministic for a given byte slice and is suitable
    /// for use as an identifier or content hash, but it is **not**
    /// a password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex rendering (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let bytes = hex::decode(s).map_err(|_| HashParseError::InvalidHex(s.to_string()))?;
        if bytes.len() != HASH_LEN {
            return Err(HashParseError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Hash256(arr))
    }
}

/// Error returned when a hex string cannot be turned into a hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashParseError {
    #[error("invalid hex encoding: {0:?}")]
    InvalidHex(String),
    #[error("expected 32-byte hash, got {0} bytes")]
    InvalidLength(usize),
}

/// Strongly-typed block hash.
///
/// This is the content hash of a [`Block`], computed as a BLAKE3-256 digest
/// over the block's canonical preimage. It serializes as lowercase hex so
/// that persisted records and API responses carry the familiar digest
/// string rather than a byte array.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BlockHash(pub Hash256);

impl BlockHash {
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BlockHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash256::from_hex(s).map(BlockHash)
    }
}

impl From<BlockHash> for String {
    fn from(h: BlockHash) -> Self {
        h.to_hex()
    }
}

impl TryFrom<String> for BlockHash {
    type Error = HashParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Link from a block to its predecessor.
///
/// The genesis block has no predecessor and carries the reserved sentinel
/// [`GENESIS_SENTINEL`] instead of a digest. Every other block points at
/// the hash of the block before it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ParentLink {
    Genesis,
    Block(BlockHash),
}

impl ParentLink {
    /// Returns the predecessor hash, or `None` for the genesis sentinel.
    pub fn block_hash(&self) -> Option<&BlockHash> {
        match self {
            ParentLink::Genesis => None,
            ParentLink::Block(h) => Some(h),
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, ParentLink::Genesis)
    }
}

impl fmt::Display for ParentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentLink::Genesis => f.write_str(GENESIS_SENTINEL),
            ParentLink::Block(h) => write!(f, "{h}"),
        }
    }
}

impl From<ParentLink> for String {
    fn from(link: ParentLink) -> Self {
        link.to_string()
    }
}

impl TryFrom<String> for ParentLink {
    type Error = HashParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == GENESIS_SENTINEL {
            Ok(ParentLink::Genesis)
        } else {
            s.parse().map(ParentLink::Block)
        }
    }
}

/// Opaque identifier of a consensus participant.
///
/// Identifiers are random UUIDs assigned at bootstrap. They are only used
/// to address inboxes and to count distinct voters, never as a trust anchor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Draws a fresh random identifier.
    pub fn random() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First eight hex digits only, for log lines.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}
