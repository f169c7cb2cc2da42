//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry together with strongly-typed ledger and consensus metrics, and
//! an async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, warn};

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Ledger-related Prometheus metrics.
///
/// Updated by [`crate::ledger::Ledger`] on every append and mined block.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Blocks validated and persisted, whether mined locally or received.
    pub blocks_appended_total: IntCounter,
    /// Candidate blocks refused by validation.
    pub blocks_rejected_total: IntCounter,
    /// Wall-clock time of a successful proof-of-work search, in seconds.
    pub mining_seconds: Histogram,
    /// Nonces tried per successful proof-of-work search.
    pub pow_attempts: Histogram,
    /// Difficulty the next block will be mined at.
    pub difficulty: IntGauge,
}

impl LedgerMetrics {
    /// Registers ledger metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_appended_total = IntCounter::with_opts(Opts::new(
            "ledger_blocks_appended_total",
            "Total number of blocks appended to the ledger",
        ))?;
        registry.register(Box::new(blocks_appended_total.clone()))?;

        let blocks_rejected_total = IntCounter::with_opts(Opts::new(
            "ledger_blocks_rejected_total",
            "Total number of candidate blocks rejected by validation",
        ))?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        let mining_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_mining_seconds",
                "Time spent searching for a proof of work, in seconds",
            )
            .buckets(vec![
                0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0,
            ]),
        )?;
        registry.register(Box::new(mining_seconds.clone()))?;

        let pow_attempts = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_pow_attempts",
                "Nonces hashed per successful proof-of-work search",
            )
            .buckets(prometheus::exponential_buckets(1.0, 4.0, 12)?),
        )?;
        registry.register(Box::new(pow_attempts.clone()))?;

        let difficulty = IntGauge::with_opts(Opts::new(
            "ledger_difficulty",
            "Current proof-of-work difficulty",
        ))?;
        registry.register(Box::new(difficulty.clone()))?;

        Ok(Self {
            blocks_appended_total,
            blocks_rejected_total,
            mining_seconds,
            pow_attempts,
            difficulty,
        })
    }
}

/// Consensus-related Prometheus metrics.
///
/// Shared by every node in a process; each node updates the same series.
#[derive(Clone)]
pub struct ConsensusMetrics {
    /// Messages drained from node inboxes, by message kind.
    pub messages_handled_total: IntCounterVec,
    /// Times a node saw enough ballots to move to COMMITTING.
    pub quorums_reached_total: IntCounter,
    /// Blocks appended through COMMIT or EXTERNALIZE.
    pub blocks_externalized_total: IntCounter,
    /// COMMIT messages dropped because the block failed validation.
    pub invalid_commits_total: IntCounter,
}

impl ConsensusMetrics {
    /// Registers consensus metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let messages_handled_total = IntCounterVec::new(
            Opts::new(
                "consensus_messages_handled_total",
                "Total number of consensus messages handled, by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(messages_handled_total.clone()))?;

        let quorums_reached_total = IntCounter::with_opts(Opts::new(
            "consensus_quorums_reached_total",
            "Total number of ballots that reached the quorum threshold",
        ))?;
        registry.register(Box::new(quorums_reached_total.clone()))?;

        let blocks_externalized_total = IntCounter::with_opts(Opts::new(
            "consensus_blocks_externalized_total",
            "Total number of blocks appended through consensus",
        ))?;
        registry.register(Box::new(blocks_externalized_total.clone()))?;

        let invalid_commits_total = IntCounter::with_opts(Opts::new(
            "consensus_invalid_commits_total",
            "Total number of committed blocks dropped as invalid",
        ))?;
        registry.register(Box::new(invalid_commits_total.clone()))?;

        Ok(Self {
            messages_handled_total,
            quorums_reached_total,
            blocks_externalized_total,
            invalid_commits_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the typed metric sets.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ledger: LedgerMetrics,
    pub consensus: ConsensusMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// (namespace `chain`) and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let ledger = LedgerMetrics::register(&registry)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        Ok(Self {
            registry,
            ledger,
            consensus,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    debug!(%addr, "metrics exporter listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                warn!(error = %err, "prometheus HTTP connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.method(), req.uri().path(), &metrics))
}

fn route(method: &Method, path: &str, metrics: &MetricsRegistry) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => {
            let mut resp = Response::new(Full::new(Bytes::from(metrics.gather_text())));
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            resp
        }
        _ => {
            let mut resp = Response::new(Full::new(Bytes::from("not found")));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn ledger_and_consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let ledger = LedgerMetrics::register(&registry).expect("register ledger metrics");
        let consensus = ConsensusMetrics::register(&registry).expect("register consensus metrics");

        ledger.blocks_appended_total.inc();
        ledger.mining_seconds.observe(0.4);
        ledger.pow_attempts.observe(17.0);
        ledger.difficulty.set(5);
        consensus
            .messages_handled_total
            .with_label_values(&["BALLOT"])
            .inc();
        consensus.quorums_reached_total.inc();

        let metric_families = registry.gather();
        assert_eq!(metric_families.len(), 9);
    }

    #[test]
    fn metrics_registry_gather_text_is_namespaced() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.ledger.difficulty.set(3);
        registry
            .consensus
            .messages_handled_total
            .with_label_values(&["COMMIT"])
            .inc();
        let text = registry.gather_text();
        assert!(text.contains("chain_ledger_difficulty 3"));
        assert!(text.contains("chain_consensus_messages_handled_total{kind=\"COMMIT\"} 1"));
    }

    #[tokio::test]
    async fn exporter_routes_metrics_and_404s() {
        let registry = MetricsRegistry::new().expect("create metrics registry");

        let ok = route(&Method::GET, "/metrics", &registry);
        assert_eq!(ok.status(), StatusCode::OK);
        let body = ok.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("chain_ledger_blocks_appended_total"));

        let missing = route(&Method::GET, "/other", &registry);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let wrong_method = route(&Method::POST, "/metrics", &registry);
        assert_eq!(wrong_method.status(), StatusCode::NOT_FOUND);
    }
}
