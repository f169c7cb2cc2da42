//! The proof-of-work ledger.
//!
//! [`Ledger`] owns the in-memory chain, the backing [`LedgerStore`] and the
//! difficulty controller. The chain only ever grows by [`Ledger::append_block`],
//! which validates the candidate against the current tip and persists it
//! before the in-memory copy is touched; a block that fails either step
//! leaves the ledger unchanged.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::metrics::LedgerMetrics;
use crate::storage::LedgerStore;
use crate::types::{Block, BlockHash, ParentLink};

pub mod config;
pub mod difficulty;
pub mod error;
pub mod pow;
pub mod validation;

pub use config::LedgerConfig;
pub use difficulty::{DifficultyAdjuster, DifficultyAdjustment};
pub use error::{BlockValidationError, ChainValidationError, LedgerError};
pub use pow::PowSolution;
pub use validation::{validate_block, validate_chain};

/// Append-only blockchain over a [`LedgerStore`].
pub struct Ledger<S: LedgerStore> {
    store: S,
    chain: Vec<Block>,
    config: LedgerConfig,
    difficulty: DifficultyAdjuster,
    blocks_mined: u64,
    metrics: Option<LedgerMetrics>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Wraps a connected store and makes sure its schema exists.
    ///
    /// The chain stays empty until [`Ledger::load`] runs.
    pub fn new(mut store: S, config: LedgerConfig) -> Result<Self, LedgerError> {
        store.create_schema_if_absent()?;
        let difficulty = DifficultyAdjuster::from_config(&config);
        Ok(Self {
            store,
            chain: Vec::new(),
            config,
            difficulty,
            blocks_mined: 0,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: LedgerMetrics) -> Self {
        metrics.difficulty.set(i64::from(self.difficulty.current()));
        self.metrics = Some(metrics);
        self
    }

    /// The fixed first block of every ledger.
    pub fn create_genesis() -> Block {
        Block::genesis()
    }

    /// Reconstructs the chain from the store.
    ///
    /// An empty store is seeded with the genesis block. A non-empty one is
    /// revalidated end to end and refused with
    /// [`LedgerError::LoadValidation`] if any block fails.
    pub fn load(&mut self) -> Result<(), LedgerError> {
        let blocks = self.store.select_all_ordered_by_index()?;

        if blocks.is_empty() {
            let genesis = Self::create_genesis();
            self.store.insert(&genesis)?;
            info!(hash = %genesis.hash(), "ledger store empty; persisted genesis block");
            self.chain = vec![genesis];
            return Ok(());
        }

        validation::validate_chain(&blocks).map_err(|e| {
            warn!(index = e.index, reason = %e.reason, "persisted chain is corrupt");
            LedgerError::LoadValidation(e)
        })?;

        let tip = blocks.last().map(|b| *b.hash());
        self.chain = blocks;
        if let Some(tip) = tip {
            info!(height = self.height(), %tip, "ledger loaded");
        }
        Ok(())
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Number of blocks, genesis included.
    pub fn height(&self) -> u64 {
        self.chain.len() as u64
    }

    pub fn tip(&self) -> Option<&Block> {
        self.chain.last()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.chain.iter().rev().any(|b| b.hash() == hash)
    }

    /// Difficulty the next mined block will use.
    pub fn difficulty(&self) -> u32 {
        self.difficulty.current()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Checks `candidate` as the block directly after the current tip.
    pub fn validate_next(&self, candidate: &Block) -> Result<(), BlockValidationError> {
        validation::validate_block(candidate, self.tip())
    }

    /// Revalidates the whole in-memory chain.
    pub fn validate(&self) -> Result<(), ChainValidationError> {
        validation::validate_chain(&self.chain)
    }

    /// Searches for a proof extending `previous_proof` at the current difficulty.
    pub fn proof_of_work(
        &self,
        previous_proof: u64,
        timestamp: &DateTime<Utc>,
    ) -> Result<PowSolution, LedgerError> {
        pow::search(
            previous_proof,
            timestamp,
            self.difficulty.current(),
            self.config.max_pow_attempts,
        )
    }

    /// Mines a candidate on top of the current tip without appending it.
    pub fn prepare_block(&self) -> Result<Block, LedgerError> {
        let tip = self.tip().ok_or(LedgerError::LedgerEmpty)?;
        let timestamp = Utc::now();
        let difficulty = pow::effective_difficulty(self.difficulty.current());

        let solution = self.proof_of_work(tip.proof(), &timestamp)?;
        if let Some(m) = &self.metrics {
            m.pow_attempts.observe(solution.attempts as f64);
        }

        let block = Block::new(
            tip.index() + 1,
            timestamp,
            ParentLink::Block(*tip.hash()),
            solution.proof,
            difficulty,
        );
        debug!(
            index = block.index(),
            proof = block.proof(),
            attempts = solution.attempts,
            difficulty,
            "prepared candidate block"
        );
        Ok(block)
    }

    /// Validates `block` against the tip, persists it and only then extends
    /// the in-memory chain.
    pub fn append_block(&mut self, block: Block) -> Result<(), LedgerError> {
        if let Err(e) = self.validate_next(&block) {
            if let Some(m) = &self.metrics {
                m.blocks_rejected_total.inc();
            }
            warn!(index = block.index(), hash = %block.hash(), reason = %e, "rejected block");
            return Err(e.into());
        }

        self.store.insert(&block)?;

        info!(index = block.index(), hash = %block.hash(), "appended block");
        self.chain.push(block);
        if let Some(m) = &self.metrics {
            m.blocks_appended_total.inc();
        }
        Ok(())
    }

    /// Mines, appends and returns the next block.
    ///
    /// The search time is fed to the difficulty controller, which runs
    /// once every `adjust_interval` mined blocks.
    pub fn mine_block(&mut self) -> Result<Block, LedgerError> {
        let started = Instant::now();
        let block = self.prepare_block()?;
        let elapsed = started.elapsed().as_secs_f64();

        self.append_block(block.clone())?;

        self.difficulty.record(elapsed);
        self.blocks_mined += 1;
        if let Some(m) = &self.metrics {
            m.mining_seconds.observe(elapsed);
        }
        if self.blocks_mined % self.difficulty.interval() as u64 == 0 {
            self.adjust_difficulty();
        }
        Ok(block)
    }

    /// Runs one step of the difficulty controller over the recent window.
    pub fn adjust_difficulty(&mut self) -> DifficultyAdjustment {
        let outcome = self.difficulty.adjust();
        match outcome {
            DifficultyAdjustment::Increased { from, to } => {
                info!(from, to, "mining too fast; difficulty raised")
            }
            DifficultyAdjustment::Decreased { from, to } => {
                info!(from, to, "mining too slow; difficulty lowered")
            }
            DifficultyAdjustment::Unchanged(d) => debug!(difficulty = d, "difficulty unchanged"),
        }
        if let Some(m) = &self.metrics {
            m.difficulty.set(i64::from(self.difficulty.current()));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryLedgerStore, RocksDbConfig, RocksDbLedgerStore, StoreError};
    use prometheus::Registry;
    use tempfile::TempDir;

    fn easy_config() -> LedgerConfig {
        LedgerConfig {
            initial_difficulty: 1,
            min_difficulty: 1,
            max_difficulty: 3,
            target_block_time_secs: 10.0,
            adjust_interval: 10,
            max_pow_attempts: None,
        }
    }

    fn loaded_ledger(config: LedgerConfig) -> Ledger<InMemoryLedgerStore> {
        let mut ledger = Ledger::new(InMemoryLedgerStore::new(), config).unwrap();
        ledger.load().unwrap();
        ledger
    }

    /// Store that accepts a fixed number of inserts, then fails.
    struct FailingStore {
        inner: InMemoryLedgerStore,
        remaining: usize,
    }

    impl LedgerStore for FailingStore {
        fn create_schema_if_absent(&mut self) -> Result<(), StoreError> {
            self.inner.create_schema_if_absent()
        }

        fn insert(&mut self, block: &Block) -> Result<(), StoreError> {
            if self.remaining == 0 {
                return Err(StoreError::Connection("disk unplugged".into()));
            }
            self.remaining -= 1;
            self.inner.insert(block)
        }

        fn select_all_ordered_by_index(&self) -> Result<Vec<Block>, StoreError> {
            self.inner.select_all_ordered_by_index()
        }
    }

    #[test]
    fn load_seeds_empty_store_with_genesis() {
        let ledger = loaded_ledger(easy_config());
        assert_eq!(ledger.height(), 1);
        assert_eq!(ledger.tip(), Some(&Ledger::<InMemoryLedgerStore>::create_genesis()));
        assert_eq!(ledger.store.len(), 1);
    }

    #[test]
    fn mining_before_load_fails_with_ledger_empty() {
        let mut ledger = Ledger::new(InMemoryLedgerStore::new(), easy_config()).unwrap();
        assert!(matches!(ledger.mine_block(), Err(LedgerError::LedgerEmpty)));
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn mined_blocks_extend_a_valid_chain() {
        let mut ledger = loaded_ledger(easy_config());
        for expected_height in 2..=4 {
            let block = ledger.mine_block().unwrap();
            assert_eq!(block.index(), expected_height);
            assert_eq!(ledger.height(), expected_height);
            assert!(ledger.contains(block.hash()));
        }
        assert_eq!(ledger.validate(), Ok(()));
        assert_eq!(ledger.store.len(), 4);
    }

    #[test]
    fn invalid_block_is_rejected_without_mutation() {
        let registry = Registry::new();
        let metrics = LedgerMetrics::register(&registry).unwrap();
        let mut ledger = loaded_ledger(easy_config()).with_metrics(metrics.clone());

        let block = ledger.mine_block().unwrap();
        let err = ledger.append_block(block.clone()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::BlockValidation(BlockValidationError::NonSequentialIndex { .. })
        ));
        assert_eq!(ledger.height(), 2);
        assert_eq!(metrics.blocks_appended_total.get(), 1);
        assert_eq!(metrics.blocks_rejected_total.get(), 1);
    }

    #[test]
    fn failed_persist_does_not_advance_chain() {
        let store = FailingStore {
            inner: InMemoryLedgerStore::new(),
            remaining: 1,
        };
        let mut ledger = Ledger::new(store, easy_config()).unwrap();
        ledger.load().unwrap();

        let err = ledger.mine_block().unwrap_err();
        assert!(matches!(err, LedgerError::Store(StoreError::Connection(_))));
        assert_eq!(ledger.height(), 1);
        assert_eq!(ledger.store.inner.len(), 1);
    }

    #[test]
    fn capped_search_reports_mining_timeout() {
        let config = LedgerConfig {
            initial_difficulty: 14,
            max_difficulty: 14,
            max_pow_attempts: Some(1),
            ..easy_config()
        };
        let mut ledger = loaded_ledger(config);
        assert!(matches!(
            ledger.mine_block(),
            Err(LedgerError::MiningTimeout { attempts: 1 })
        ));
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn fast_mining_raises_difficulty_after_interval() {
        let config = LedgerConfig {
            target_block_time_secs: 1_000.0,
            adjust_interval: 2,
            ..easy_config()
        };
        let mut ledger = loaded_ledger(config);

        ledger.mine_block().unwrap();
        assert_eq!(ledger.difficulty(), 1);
        ledger.mine_block().unwrap();
        assert_eq!(ledger.difficulty(), 2);

        let next = ledger.mine_block().unwrap();
        assert_eq!(next.mined_difficulty(), 2);
    }

    #[test]
    fn reload_from_rocksdb_restores_chain() {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };

        let mined = {
            let store = RocksDbLedgerStore::connect(&cfg).unwrap();
            let mut ledger = Ledger::new(store, easy_config()).unwrap();
            ledger.load().unwrap();
            ledger.mine_block().unwrap();
            ledger.mine_block().unwrap();
            ledger.chain().to_vec()
        };

        let store = RocksDbLedgerStore::connect(&cfg).unwrap();
        let mut ledger = Ledger::new(store, easy_config()).unwrap();
        ledger.load().unwrap();
        assert_eq!(ledger.chain(), mined.as_slice());
        assert_eq!(ledger.height(), 3);
    }

    #[test]
    fn corrupt_store_is_refused_at_load() {
        let mut source = loaded_ledger(easy_config());
        let b2 = source.mine_block().unwrap();

        let mut store = InMemoryLedgerStore::new();
        store.create_schema_if_absent().unwrap();
        store.insert(&Block::genesis()).unwrap();
        let tampered = Block::from_parts(
            b2.index(),
            *b2.timestamp(),
            *b2.previous_hash(),
            b2.proof() + 1,
            b2.mined_difficulty(),
            *b2.hash(),
        );
        store.insert(&tampered).unwrap();

        let mut ledger = Ledger::new(store, easy_config()).unwrap();
        match ledger.load() {
            Err(LedgerError::LoadValidation(e)) => assert_eq!(e.index, 2),
            other => panic!("expected LoadValidation, got {other:?}"),
        }
        assert_eq!(ledger.height(), 0);
    }
}
