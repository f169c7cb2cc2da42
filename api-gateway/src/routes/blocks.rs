//! Read, validate and mine endpoints over the shared ledger.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::{info, warn};

use chain::{Block, LedgerError};

use crate::state::SharedState;

/// Response body for `GET /api/v1/blocks`.
#[derive(Debug, Serialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub len: usize,
}

/// Response body for `POST /api/v1/blocks/mine`.
#[derive(Debug, Serialize)]
pub struct MinedBlockResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub block: Block,
}

/// Response body for `GET /api/v1/blocks/validity`.
#[derive(Debug, Serialize)]
pub struct ValidityResponse {
    pub valid: bool,
    pub message: String,
    pub failing_index: Option<u64>,
}

/// `GET /api/v1/blocks`
pub async fn list_blocks(State(state): State<SharedState>) -> Json<ChainResponse> {
    let ledger = state.ledger.lock().await;
    let chain = ledger.chain().to_vec();
    Json(ChainResponse {
        len: chain.len(),
        chain,
    })
}

/// `POST /api/v1/blocks/mine`
///
/// Runs the proof-of-work search on the blocking pool while holding the
/// ledger lock, so concurrent mine requests queue up behind each other.
pub async fn mine_block(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<MinedBlockResponse>), (StatusCode, String)> {
    let mut ledger = state.ledger.clone().lock_owned().await;

    let outcome = tokio::task::spawn_blocking(move || ledger.mine_block())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("mining task failed: {e}"),
            )
        })?;

    match outcome {
        Ok(block) => {
            info!(index = block.index(), hash = %block.hash(), "mined block via API");
            Ok((
                StatusCode::CREATED,
                Json(MinedBlockResponse {
                    message: "new block mined",
                    block,
                }),
            ))
        }
        Err(e @ LedgerError::MiningTimeout { .. }) => {
            warn!(error = %e, "mine request timed out");
            Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
        Err(e) => {
            warn!(error = %e, "mine request failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// `GET /api/v1/blocks/validity`
pub async fn validity(State(state): State<SharedState>) -> Json<ValidityResponse> {
    let ledger = state.ledger.lock().await;
    let response = match ledger.validate() {
        Ok(()) => ValidityResponse {
            valid: true,
            message: "the chain is valid".to_string(),
            failing_index: None,
        },
        Err(e) => ValidityResponse {
            valid: false,
            message: e.to_string(),
            failing_index: Some(e.index),
        },
    };
    Json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chain::{Ledger, LedgerConfig, RocksDbConfig, RocksDbLedgerStore};
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    use crate::state::AppState;

    fn state_with(cfg: LedgerConfig, tmp: &TempDir) -> SharedState {
        let store = RocksDbLedgerStore::connect(&RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        })
        .unwrap();
        let mut ledger = Ledger::new(store, cfg).unwrap();
        ledger.load().unwrap();
        Arc::new(AppState {
            ledger: Arc::new(Mutex::new(ledger)),
        })
    }

    fn easy() -> LedgerConfig {
        LedgerConfig {
            initial_difficulty: 1,
            ..LedgerConfig::default()
        }
    }

    #[tokio::test]
    async fn fresh_ledger_lists_genesis_and_is_valid() {
        let tmp = TempDir::new().unwrap();
        let state = state_with(easy(), &tmp);

        let Json(chain) = list_blocks(State(state.clone())).await;
        assert_eq!(chain.len, 1);
        assert_eq!(chain.chain[0], Block::genesis());

        let Json(v) = validity(State(state)).await;
        assert!(v.valid);
        assert_eq!(v.failing_index, None);
    }

    #[tokio::test]
    async fn mining_appends_and_reports_block() {
        let tmp = TempDir::new().unwrap();
        let state = state_with(easy(), &tmp);

        let (status, Json(mined)) = mine_block(State(state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(mined.block.index(), 2);

        let body = serde_json::to_value(&mined).unwrap();
        assert_eq!(body["message"], "new block mined");
        assert_eq!(body["index"], 2);

        let Json(chain) = list_blocks(State(state)).await;
        assert_eq!(chain.len, 2);
    }

    #[tokio::test]
    async fn exhausted_pow_budget_is_service_unavailable() {
        let tmp = TempDir::new().unwrap();
        let cfg = LedgerConfig {
            initial_difficulty: 14,
            max_pow_attempts: Some(1),
            ..LedgerConfig::default()
        };
        let state = state_with(cfg, &tmp);

        let (status, _) = mine_block(State(state)).await.unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
