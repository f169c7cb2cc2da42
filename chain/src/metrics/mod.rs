//! Metrics and instrumentation for the chain.
//!
//! This module defines Prometheus-compatible metrics for the ledger and the
//! consensus nodes, and a small HTTP exporter that serves `/metrics` in
//! Prometheus text format.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use chain::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Hand clones of the typed handles to the components:
//! let ledger = Ledger::new(store, cfg)?.with_metrics(registry.ledger.clone());
//! ```

pub mod prometheus;

pub use self::prometheus::{
    ConsensusMetrics, LedgerMetrics, MetricsRegistry, run_prometheus_http_server,
};
