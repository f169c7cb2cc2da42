// chain/src/types/block.rs

//! Block type and hashing.
//!
//! A [`Block`] is immutable once built: its fields are private and the
//! stored `hash` is computed from the other fields at construction time.
//! Blocks read back from storage are reassembled with
//! [`Block::from_parts`], which keeps the persisted hash as-is so that
//! validation can detect tampering.
//!
//! The hash preimage is compact JSON with the keys in lexicographic order
//! (`index`, `mined_difficulty`, `previous_hash`, `proof`, `timestamp`).
//! That ordering is a compatibility contract with every persisted chain and
//! must not change.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::{BlockHash, Hash256, ParentLink};

/// Previous-hash value reserved for the genesis block.
pub const GENESIS_SENTINEL: &str = "0";

/// Fixed proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 1;

/// Index of the genesis block. Indices are 1-based.
pub const GENESIS_INDEX: u64 = 1;

/// Timestamp layout used inside the hash preimage.
const PREIMAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Immutable ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: DateTime<Utc>,
    previous_hash: ParentLink,
    proof: u64,
    mined_difficulty: u32,
    hash: BlockHash,
}

impl Block {
    /// Builds a block and seals it with its canonical hash.
    ///
    /// The timestamp is truncated to microseconds, the precision carried by
    /// the hash preimage.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        previous_hash: ParentLink,
        proof: u64,
        mined_difficulty: u32,
    ) -> Self {
        let timestamp = timestamp.trunc_subsecs(6);
        let hash = Self::digest(index, &timestamp, &previous_hash, proof, mined_difficulty);
        Self {
            index,
            timestamp,
            previous_hash,
            proof,
            mined_difficulty,
            hash,
        }
    }

    /// Reassembles a block from persisted fields without recomputing the hash.
    pub fn from_parts(
        index: u64,
        timestamp: DateTime<Utc>,
        previous_hash: ParentLink,
        proof: u64,
        mined_difficulty: u32,
        hash: BlockHash,
    ) -> Self {
        Self {
            index,
            timestamp,
            previous_hash,
            proof,
            mined_difficulty,
            hash,
        }
    }

    /// The deterministic first block of every ledger.
    ///
    /// Index 1, Unix-epoch timestamp, sentinel previous hash, proof
    /// [`GENESIS_PROOF`] and difficulty 0. Every call yields the same hash.
    pub fn genesis() -> Self {
        Self::new(
            GENESIS_INDEX,
            DateTime::<Utc>::UNIX_EPOCH,
            ParentLink::Genesis,
            GENESIS_PROOF,
            0,
        )
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn previous_hash(&self) -> &ParentLink {
        &self.previous_hash
    }

    pub fn proof(&self) -> u64 {
        self.proof
    }

    pub fn mined_difficulty(&self) -> u32 {
        self.mined_difficulty
    }

    /// The stored hash. Equal to [`Block::compute_hash`] for any block built
    /// with [`Block::new`]; may differ for tampered persisted records.
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// Returns the canonical hash preimage of this block.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        Self::preimage(
            self.index,
            &self.timestamp,
            &self.previous_hash,
            self.proof,
            self.mined_difficulty,
        )
    }

    /// Recomputes the canonical hash from the block's fields.
    pub fn compute_hash(&self) -> BlockHash {
        BlockHash(Hash256::compute(&self.canonical_bytes()))
    }

    /// `true` if the stored hash matches the recomputed one.
    pub fn is_sealed(&self) -> bool {
        self.compute_hash() == self.hash
    }

    fn digest(
        index: u64,
        timestamp: &DateTime<Utc>,
        previous_hash: &ParentLink,
        proof: u64,
        mined_difficulty: u32,
    ) -> BlockHash {
        let bytes = Self::preimage(index, timestamp, previous_hash, proof, mined_difficulty);
        BlockHash(Hash256::compute(&bytes))
    }

    fn preimage(
        index: u64,
        timestamp: &DateTime<Utc>,
        previous_hash: &ParentLink,
        proof: u64,
        mined_difficulty: u32,
    ) -> Vec<u8> {
        // `Value` objects are backed by a sorted map, so keys render in order.
        serde_json::json!({
            "index": index,
            "mined_difficulty": mined_difficulty,
            "previous_hash": previous_hash.to_string(),
            "proof": proof,
            "timestamp": timestamp.format(PREIMAGE_TIMESTAMP_FORMAT).to_string(),
        })
        .to_string()
        .into_bytes()
    }
}
