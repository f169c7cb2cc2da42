use thiserror::Error;

use crate::storage::StoreError;
use crate::types::BlockHash;

/// Why a single block was refused.
///
/// Rejections are recoverable: the offending block is dropped and the chain
/// is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockValidationError {
    #[error("block {index}: stored hash {stored} does not match recomputed {computed}")]
    HashMismatch {
        index: u64,
        stored: BlockHash,
        computed: BlockHash,
    },

    #[error("genesis block must carry the sentinel previous hash")]
    GenesisLink,

    #[error("genesis block must carry proof 1, found {found}")]
    GenesisProof { found: u64 },

    #[error("genesis block must carry difficulty 0, found {found}")]
    GenesisDifficulty { found: u32 },

    #[error("block {index}: previous hash does not match predecessor {expected}")]
    BrokenLink { index: u64, expected: BlockHash },

    #[error("expected block index {expected}, found {found}")]
    NonSequentialIndex { expected: u64, found: u64 },

    #[error("block {index}: proof {proof} does not satisfy difficulty {difficulty}")]
    ProofOfWork {
        index: u64,
        proof: u64,
        difficulty: u32,
    },

    #[error("block {index} has no predecessor to validate against")]
    MissingPredecessor { index: u64 },
}

/// First failure found while walking a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain invalid at block {index}: {reason}")]
pub struct ChainValidationError {
    pub index: u64,
    #[source]
    pub reason: BlockValidationError,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Connection or schema failure in the backing store. Fatal at startup.
    #[error("ledger store error: {0}")]
    Store(#[from] StoreError),

    /// The persisted chain failed revalidation. The node refuses to start
    /// rather than truncating it.
    #[error("persisted chain failed validation: {0}")]
    LoadValidation(#[source] ChainValidationError),

    #[error(transparent)]
    BlockValidation(#[from] BlockValidationError),

    #[error("proof-of-work search gave up after {attempts} attempts")]
    MiningTimeout { attempts: u64 },

    #[error("ledger has no genesis block; load it first")]
    LedgerEmpty,
}
