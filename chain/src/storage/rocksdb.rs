//! RocksDB-backed ledger store.
//!
//! Blocks are persisted in two column families:
//!
//! - `"blocks"`: big-endian `index` (8 bytes) -> bincode-encoded record,
//! - `"hashes"`: block hash (32 bytes) -> big-endian `index`.
//!
//! Big-endian keys make RocksDB's byte ordering coincide with index
//! ordering, so a forward scan of `"blocks"` is already sorted.

use std::{path::Path, sync::Arc};

use chrono::DateTime;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch,
};
use serde::{Deserialize, Serialize};

use crate::types::{Block, BlockHash, Hash256, ParentLink};

use super::{LedgerStore, StoreError};

const CF_BLOCKS: &str = "blocks";
const CF_HASHES: &str = "hashes";

/// Configuration for [`RocksDbLedgerStore`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/ledger-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// On-disk record. Plain field types keep the encoding independent of how
/// the in-memory types choose to serialize.
#[derive(Serialize, Deserialize)]
struct StoredBlock {
    index: u64,
    timestamp_micros: i64,
    previous_hash: String,
    proof: u64,
    mined_difficulty: u32,
    hash: [u8; 32],
}

impl From<&Block> for StoredBlock {
    fn from(b: &Block) -> Self {
        Self {
            index: b.index(),
            timestamp_micros: b.timestamp().timestamp_micros(),
            previous_hash: b.previous_hash().to_string(),
            proof: b.proof(),
            mined_difficulty: b.mined_difficulty(),
            hash: *b.hash().as_bytes(),
        }
    }
}

impl TryFrom<StoredBlock> for Block {
    type Error = StoreError;

    fn try_from(r: StoredBlock) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp_micros(r.timestamp_micros).ok_or_else(|| {
            StoreError::Codec(format!(
                "block {}: timestamp {} out of range",
                r.index, r.timestamp_micros
            ))
        })?;
        let previous_hash = ParentLink::try_from(r.previous_hash)
            .map_err(|e| StoreError::Codec(format!("block {}: {e}", r.index)))?;
        Ok(Block::from_parts(
            r.index,
            timestamp,
            previous_hash,
            r.proof,
            r.mined_difficulty,
            BlockHash(Hash256(r.hash)),
        ))
    }
}

/// RocksDB-backed implementation of [`LedgerStore`].
pub struct RocksDbLedgerStore {
    db: DB,
}

impl RocksDbLedgerStore {
    /// Opens (or creates) the database at `cfg.path`.
    ///
    /// Column families are declared up front when `create_if_missing` is set;
    /// otherwise [`LedgerStore::create_schema_if_absent`] creates them.
    pub fn connect(cfg: &RocksDbConfig) -> Result<Self, StoreError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let existing = DB::list_cf(&opts, path).unwrap_or_default();
        let mut names: Vec<String> = vec!["default".to_string()];
        if cfg.create_if_missing {
            names.extend([CF_BLOCKS.to_string(), CF_HASHES.to_string()]);
        }
        for name in existing {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let cfs = names
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", cfg.path)))?;

        Ok(Self { db })
    }

    fn cf(&self, name: &'static str) -> Result<Arc<BoundColumnFamily<'_>>, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Schema(format!("missing column family {name:?}")))
    }

    fn encode_block(block: &Block) -> Result<Vec<u8>, StoreError> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(StoredBlock::from(block), cfg)
            .map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode_block(bytes: &[u8]) -> Result<Block, StoreError> {
        let cfg = bincode::config::standard();
        let (record, _): (StoredBlock, usize) = bincode::serde::decode_from_slice(bytes, cfg)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        Block::try_from(record)
    }
}

impl LedgerStore for RocksDbLedgerStore {
    fn create_schema_if_absent(&mut self) -> Result<(), StoreError> {
        for name in [CF_BLOCKS, CF_HASHES] {
            if self.db.cf_handle(name).is_none() {
                self.db.create_cf(name, &Options::default())?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, block: &Block) -> Result<(), StoreError> {
        let cf_blocks = self.cf(CF_BLOCKS)?;
        let cf_hashes = self.cf(CF_HASHES)?;

        let index_key = block.index().to_be_bytes();
        let hash_key = block.hash().as_bytes();

        if self.db.get_cf(&cf_blocks, index_key)?.is_some() {
            return Err(StoreError::DuplicateIndex(block.index()));
        }
        if self.db.get_cf(&cf_hashes, hash_key)?.is_some() {
            return Err(StoreError::DuplicateHash(*block.hash()));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_blocks, index_key, Self::encode_block(block)?);
        batch.put_cf(&cf_hashes, hash_key, index_key);
        self.db.write(batch)?;
        Ok(())
    }

    fn select_all_ordered_by_index(&self) -> Result<Vec<Block>, StoreError> {
        let cf_blocks = self.cf(CF_BLOCKS)?;
        self.db
            .iterator_cf(&cf_blocks, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item?;
                Self::decode_block(&value)
            })
            .collect()
    }
}
