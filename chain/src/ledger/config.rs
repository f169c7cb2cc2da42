use serde::Deserialize;

/// Ledger tuning: mining difficulty bounds and the adjustment controller.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Difficulty used for the first mined block.
    pub initial_difficulty: u32,
    /// Floor for difficulty decreases.
    pub min_difficulty: u32,
    /// Cap for difficulty increases. Values above 14 behave like 14.
    pub max_difficulty: u32,
    /// Desired mean mining time per block, in seconds.
    pub target_block_time_secs: f64,
    /// Number of mined blocks between adjustments, and the averaging window.
    pub adjust_interval: usize,
    /// Optional cap on nonces tried per block before giving up.
    pub max_pow_attempts: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: 4,
            min_difficulty: 1,
            max_difficulty: 14,
            target_block_time_secs: 10.0,
            adjust_interval: 10,
            max_pow_attempts: None,
        }
    }
}
