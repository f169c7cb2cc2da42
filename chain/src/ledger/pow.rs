//! Proof-of-work predicate and nonce search.
//!
//! A proof `n` extending a block with proof `p` is accepted at difficulty
//! `d` when the hex BLAKE3 digest of the decimal rendering of `n² − p²`
//! contains, anywhere, the last `d` digits of the candidate's timestamp
//! rendered as `YYYYMMDDHHMMSS`. The window is clamped to the length of that
//! rendering, so difficulties above it behave like the maximum.

use chrono::{DateTime, Utc};

use crate::types::Hash256;

use super::error::LedgerError;

/// Timestamp rendering the difficulty window is cut from.
pub const TIMESTAMP_DIGITS_FORMAT: &str = "%Y%m%d%H%M%S";

/// Length of [`TIMESTAMP_DIGITS_FORMAT`] output, and the highest useful difficulty.
pub const TIMESTAMP_DIGITS_LEN: usize = 14;

/// Outcome of a successful nonce search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowSolution {
    pub proof: u64,
    /// Number of candidate nonces hashed, including the winning one.
    pub attempts: u64,
}

/// Renders `ts` as `YYYYMMDDHHMMSS`.
pub fn timestamp_digits(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_DIGITS_FORMAT).to_string()
}

/// Clamps a configured difficulty to the timestamp window length.
pub fn effective_difficulty(configured: u32) -> u32 {
    configured.min(TIMESTAMP_DIGITS_LEN as u32)
}

/// Returns the substring a digest must contain at the given difficulty.
///
/// Difficulty 0 yields the empty target, which every digest contains.
pub fn target_window(ts: &DateTime<Utc>, difficulty: u32) -> String {
    let digits = timestamp_digits(ts);
    let take = (difficulty as usize).min(digits.len());
    digits[digits.len() - take..].to_string()
}

/// Hex digest of `proof² − previous_proof²`, or `None` if the operand
/// does not fit in 128-bit signed arithmetic.
pub fn pow_digest(proof: u64, previous_proof: u64) -> Option<String> {
    let p = i128::from(proof);
    let q = i128::from(previous_proof);
    let operand = p.checked_mul(p)?.checked_sub(q.checked_mul(q)?)?;
    Some(Hash256::compute(operand.to_string().as_bytes()).to_hex())
}

/// `true` if `proof` satisfies the predicate for `target`.
pub fn satisfies(proof: u64, previous_proof: u64, target: &str) -> bool {
    pow_digest(proof, previous_proof).is_some_and(|digest| digest.contains(target))
}

/// Brute-forces the smallest proof, starting from 1, that satisfies the
/// predicate for `timestamp` at `difficulty`.
///
/// With `max_attempts = None` the search is unbounded. With a cap, the
/// search gives up with [`LedgerError::MiningTimeout`] once that many
/// nonces have been tried.
pub fn search(
    previous_proof: u64,
    timestamp: &DateTime<Utc>,
    difficulty: u32,
    max_attempts: Option<u64>,
) -> Result<PowSolution, LedgerError> {
    let target = target_window(timestamp, effective_difficulty(difficulty));
    let mut attempts: u64 = 0;

    for nonce in 1..=u64::MAX {
        if max_attempts.is_some_and(|cap| attempts >= cap) {
            return Err(LedgerError::MiningTimeout { attempts });
        }
        attempts += 1;
        if satisfies(nonce, previous_proof, &target) {
            return Ok(PowSolution {
                proof: nonce,
                attempts,
            });
        }
    }

    Err(LedgerError::MiningTimeout { attempts })
}
