//! Storage backends for the ledger.
//!
//! This module defines the [`LedgerStore`] trait the ledger persists
//! through, and two implementations of it:
//!
//! - an in-memory store ([`mem::InMemoryLedgerStore`]) for tests and for
//!   simulated consensus nodes,
//! - a RocksDB-backed store ([`rocksdb::RocksDbLedgerStore`]) for a
//!   persistent miner.

use thiserror::Error;

use crate::types::{Block, BlockHash};

pub mod mem;
pub mod rocksdb;

pub use mem::InMemoryLedgerStore;
pub use self::rocksdb::{RocksDbConfig, RocksDbLedgerStore};

/// Storage-level error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database could not be opened.
    #[error("cannot open ledger store: {0}")]
    Connection(String),

    /// The schema is missing or could not be created.
    #[error("ledger schema error: {0}")]
    Schema(String),

    #[error("a block with index {0} is already stored")]
    DuplicateIndex(u64),

    #[error("a block with hash {0} is already stored")]
    DuplicateHash(BlockHash),

    /// A stored record could not be encoded or decoded.
    #[error("ledger record codec error: {0}")]
    Codec(String),

    #[error("rocksdb error: {0}")]
    RocksDb(#[from] ::rocksdb::Error),
}

/// Append-only persistence for blocks.
///
/// Both `index` and `hash` are unique across stored blocks; an insert that
/// would violate either fails without writing anything.
pub trait LedgerStore {
    /// Creates the backing tables or column families if they do not exist.
    /// Idempotent.
    fn create_schema_if_absent(&mut self) -> Result<(), StoreError>;

    /// Persists one block.
    fn insert(&mut self, block: &Block) -> Result<(), StoreError>;

    /// Returns every stored block in ascending index order.
    fn select_all_ordered_by_index(&self) -> Result<Vec<Block>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_store_trait_is_object_safe() {
        fn use_trait_object(store: &mut dyn LedgerStore) -> usize {
            store.create_schema_if_absent().unwrap();
            store.select_all_ordered_by_index().unwrap().len()
        }

        let mut store = InMemoryLedgerStore::new();
        assert_eq!(use_trait_object(&mut store), 0);
    }
}
