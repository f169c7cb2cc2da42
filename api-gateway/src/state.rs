//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use chain::DefaultLedger;

/// Shared state held by the request handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// The persistent ledger. Every mutation goes through this lock, so
    /// appends stay strictly sequential.
    pub ledger: Arc<Mutex<DefaultLedger>>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
