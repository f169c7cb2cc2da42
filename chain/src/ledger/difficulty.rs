//! Adaptive mining difficulty.
//!
//! [`DifficultyAdjuster`] keeps the most recent `adjust_interval` mining
//! durations and nudges the difficulty by one step when their mean leaves
//! the band `target ± 1s`.

use std::collections::VecDeque;

use super::config::LedgerConfig;

/// Width of the dead band around the target block time, in seconds.
pub const HYSTERESIS_SECS: f64 = 1.0;

/// What a call to [`DifficultyAdjuster::adjust`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DifficultyAdjustment {
    Increased { from: u32, to: u32 },
    Decreased { from: u32, to: u32 },
    Unchanged(u32),
}

#[derive(Clone, Debug)]
pub struct DifficultyAdjuster {
    current: u32,
    min: u32,
    max: u32,
    target_secs: f64,
    interval: usize,
    history: VecDeque<f64>,
}

impl DifficultyAdjuster {
    pub fn new(initial: u32, min: u32, max: u32, target_secs: f64, interval: usize) -> Self {
        let interval = interval.max(1);
        Self {
            current: initial.clamp(min, max.max(min)),
            min,
            max: max.max(min),
            target_secs,
            interval,
            history: VecDeque::with_capacity(interval),
        }
    }

    pub fn from_config(cfg: &LedgerConfig) -> Self {
        Self::new(
            cfg.initial_difficulty,
            cfg.min_difficulty,
            cfg.max_difficulty,
            cfg.target_block_time_secs,
            cfg.adjust_interval,
        )
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Records how long one block took to mine.
    pub fn record(&mut self, secs: f64) {
        if self.history.len() == self.interval {
            self.history.pop_front();
        }
        self.history.push_back(secs);
    }

    /// Mean of the recorded window, once a full window is available.
    pub fn window_mean(&self) -> Option<f64> {
        if self.history.len() < self.interval {
            return None;
        }
        Some(self.history.iter().sum::<f64>() / self.history.len() as f64)
    }

    /// Applies one controller step over the current window.
    pub fn adjust(&mut self) -> DifficultyAdjustment {
        let from = self.current;
        let Some(mean) = self.window_mean() else {
            return DifficultyAdjustment::Unchanged(from);
        };

        if mean < self.target_secs - HYSTERESIS_SECS && from < self.max {
            self.current = from + 1;
            DifficultyAdjustment::Increased {
                from,
                to: self.current,
            }
        } else if mean > self.target_secs + HYSTERESIS_SECS && from > self.min {
            self.current = from - 1;
            DifficultyAdjustment::Decreased {
                from,
                to: self.current,
            }
        } else {
            DifficultyAdjustment::Unchanged(from)
        }
    }
}
