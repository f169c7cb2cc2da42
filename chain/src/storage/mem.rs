//! In-memory ledger store.
//!
//! Used by unit tests and by every simulated consensus node. Blocks are
//! kept in a `BTreeMap` keyed by index, so reads come back ordered, with a
//! separate hash set enforcing hash uniqueness.

use std::collections::{BTreeMap, HashSet};

use crate::types::{Block, BlockHash};

use super::{LedgerStore, StoreError};

/// In-memory implementation of [`LedgerStore`].
#[derive(Default)]
pub struct InMemoryLedgerStore {
    blocks: BTreeMap<u64, Block>,
    hashes: HashSet<BlockHash>,
    schema_ready: bool,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty store. The schema still has to be created.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        if self.schema_ready {
            Ok(())
        } else {
            Err(StoreError::Schema("blocks table does not exist".into()))
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn create_schema_if_absent(&mut self) -> Result<(), StoreError> {
        self.schema_ready = true;
        Ok(())
    }

    fn insert(&mut self, block: &Block) -> Result<(), StoreError> {
        self.ensure_schema()?;
        if self.blocks.contains_key(&block.index()) {
            return Err(StoreError::DuplicateIndex(block.index()));
        }
        if self.hashes.contains(block.hash()) {
            return Err(StoreError::DuplicateHash(*block.hash()));
        }
        self.hashes.insert(*block.hash());
        self.blocks.insert(block.index(), block.clone());
        Ok(())
    }

    fn select_all_ordered_by_index(&self) -> Result<Vec<Block>, StoreError> {
        self.ensure_schema()?;
        Ok(self.blocks.values().cloned().collect())
    }
}
