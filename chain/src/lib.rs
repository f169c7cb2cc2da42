//! Chain library crate.
//!
//! This crate provides the building blocks of a proof-of-work ledger whose
//! next entry is agreed on by a small quorum-voting network:
//!
//! - strongly-typed domain types (`types`),
//! - the ledger with validation, PoW search and difficulty control (`ledger`),
//! - storage backends behind the `LedgerStore` trait (`storage`),
//! - the quorum consensus state machine and its in-process network (`consensus`),
//! - Prometheus-based metrics (`metrics`),
//! - logging setup (`logging`),
//! - and a top-level configuration (`config`).
//!
//! Higher-level binaries compose these pieces into a mining node, a
//! consensus simulator and an HTTP gateway.

pub mod config;
pub mod consensus;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-export top-level configuration types.
pub use config::{
    ChainConfig, ConfigError, LoggingConfig, MetricsConfig, MinerConfig, SimulationConfig,
    Topology,
};

// Re-export the ledger and its errors.
pub use ledger::{
    BlockValidationError, ChainValidationError, DifficultyAdjuster, Ledger, LedgerConfig,
    LedgerError,
};

// Re-export "core" consensus types.
pub use consensus::{
    ConsensusError, ConsensusNode, Message, MessageKind, MessageTypeError, NodeHandle, NodeSpec,
    NodeState, NodeStatus, spawn_network,
};

// Re-export storage backends.
pub use storage::{InMemoryLedgerStore, LedgerStore, RocksDbConfig, RocksDbLedgerStore, StoreError};

// Re-export metrics registry and exporter.
pub use metrics::{ConsensusMetrics, LedgerMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Ledger over the persistent RocksDB store, as used by the mining node.
pub type DefaultLedger = Ledger<RocksDbLedgerStore>;
