//! Top-level configuration for the chain binaries.
//!
//! This module aggregates configuration for:
//!
//! - the ledger (difficulty bounds and controller),
//! - storage (RocksDB path and creation flags),
//! - the metrics exporter (enable flag + listen address),
//! - logging (format and level),
//! - the mining loop and the consensus simulation.
//!
//! Every section is optional in a TOML file; missing keys keep their
//! defaults.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::ledger::LedgerConfig;
use crate::logging::LogFormat;
use crate::storage::RocksDbConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9898)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. `"info"` or `"info,chain::consensus=debug"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: "info".to_string(),
        }
    }
}

/// Mining loop of the `chain` binary.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Pause between mined blocks, in seconds.
    pub interval_secs: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// Trust wiring used by the `scp-sim` binary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Every node trusts every node, itself included.
    #[default]
    FullMesh,
    /// Proposer -> relays -> collector -> proposer; see
    /// [`crate::consensus::network::trust_sets`].
    Relay,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub nodes: usize,
    pub topology: Topology,
    /// Rounds proposed by the first node.
    pub proposals: usize,
    /// How long to wait for each round to settle, in milliseconds.
    pub settle_timeout_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nodes: 5,
            topology: Topology::FullMesh,
            proposals: 1,
            settle_timeout_ms: 5_000,
        }
    }
}

/// Top-level configuration for a chain process.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub ledger: LedgerConfig,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    pub miner: MinerConfig,
    pub simulation: SimulationConfig,
}

impl ChainConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = ChainConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.ledger.initial_difficulty, 4);
        assert_eq!(cfg.ledger.max_difficulty, 14);
        assert_eq!(cfg.ledger.adjust_interval, 10);
        assert_eq!(cfg.ledger.max_pow_attempts, None);
        assert_eq!(cfg.storage.path, "data/ledger-db");
        assert_eq!(cfg.metrics.listen_addr.port(), 9898);
        assert_eq!(cfg.logging.format, LogFormat::Human);
        assert_eq!(cfg.simulation.topology, Topology::FullMesh);
    }

    #[test]
    fn partial_sections_override_only_named_keys() {
        let cfg = ChainConfig::from_toml_str(
            r#"
            [ledger]
            initial_difficulty = 2
            max_pow_attempts = 500000

            [logging]
            format = "json"

            [simulation]
            topology = "relay"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.ledger.initial_difficulty, 2);
        assert_eq!(cfg.ledger.min_difficulty, 1);
        assert_eq!(cfg.ledger.max_pow_attempts, Some(500_000));
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.simulation.topology, Topology::Relay);
        assert_eq!(cfg.simulation.nodes, 5);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert!(matches!(
            ChainConfig::from_toml_str("[logging]\nformat = \"xml\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ChainConfig::from_toml_file("/definitely/not/here.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
