//! Block and chain validity predicates.
//!
//! These are pure functions over blocks: they never touch storage and
//! never mutate anything, so a rejected candidate leaves every chain
//! exactly as it was.

use crate::types::block::GENESIS_INDEX;
use crate::types::{Block, GENESIS_PROOF, ParentLink};

use super::error::{BlockValidationError, ChainValidationError};
use super::pow;

/// Checks `candidate` against the block it claims to extend.
///
/// The genesis block (index 1) is checked on its own and must not be
/// offered with a predecessor. Every other block needs one.
pub fn validate_block(
    candidate: &Block,
    predecessor: Option<&Block>,
) -> Result<(), BlockValidationError> {
    if candidate.index() == GENESIS_INDEX {
        if let Some(prev) = predecessor {
            return Err(BlockValidationError::NonSequentialIndex {
                expected: prev.index() + 1,
                found: candidate.index(),
            });
        }
        return check_genesis(candidate);
    }

    let prev = predecessor.ok_or(BlockValidationError::MissingPredecessor {
        index: candidate.index(),
    })?;

    check_hash(candidate)?;
    check_link(candidate, prev)?;
    check_index(candidate, prev)?;
    check_proof_of_work(candidate, prev)?;
    Ok(())
}

/// Validates a whole chain front to back, stopping at the first failure.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainValidationError> {
    let mut predecessor: Option<&Block> = None;
    for block in chain {
        validate_block(block, predecessor).map_err(|reason| ChainValidationError {
            index: block.index(),
            reason,
        })?;
        predecessor = Some(block);
    }
    Ok(())
}

fn check_genesis(block: &Block) -> Result<(), BlockValidationError> {
    if !block.previous_hash().is_genesis() {
        return Err(BlockValidationError::GenesisLink);
    }
    if block.proof() != GENESIS_PROOF {
        return Err(BlockValidationError::GenesisProof {
            found: block.proof(),
        });
    }
    if block.mined_difficulty() != 0 {
        return Err(BlockValidationError::GenesisDifficulty {
            found: block.mined_difficulty(),
        });
    }
    check_hash(block)
}

fn check_hash(block: &Block) -> Result<(), BlockValidationError> {
    let computed = block.compute_hash();
    if computed != *block.hash() {
        return Err(BlockValidationError::HashMismatch {
            index: block.index(),
            stored: *block.hash(),
            computed,
        });
    }
    Ok(())
}

fn check_link(block: &Block, prev: &Block) -> Result<(), BlockValidationError> {
    if *block.previous_hash() != ParentLink::Block(*prev.hash()) {
        return Err(BlockValidationError::BrokenLink {
            index: block.index(),
            expected: *prev.hash(),
        });
    }
    Ok(())
}

fn check_index(block: &Block, prev: &Block) -> Result<(), BlockValidationError> {
    let expected = prev.index() + 1;
    if block.index() != expected {
        return Err(BlockValidationError::NonSequentialIndex {
            expected,
            found: block.index(),
        });
    }
    Ok(())
}

fn check_proof_of_work(block: &Block, prev: &Block) -> Result<(), BlockValidationError> {
    // The candidate's own recorded difficulty decides the window, not the
    // validator's current setting.
    let difficulty = pow::effective_difficulty(block.mined_difficulty());
    let target = pow::target_window(block.timestamp(), difficulty);
    if !pow::satisfies(block.proof(), prev.proof(), &target) {
        return Err(BlockValidationError::ProofOfWork {
            index: block.index(),
            proof: block.proof(),
            difficulty: block.mined_difficulty(),
        });
    }
    Ok(())
}
