use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::InstrumentSyncStatus;
use crate::services::{StockSync, SyncOutcome};
use crate::worker::{Scheduler, SchedulerState};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::SweepInProgress => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(serde_json::json!({
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub scheduler: SchedulerState,
    pub sweep_running: bool,
    pub instruments: Vec<InstrumentSyncStatus>,
}

/// GET /health
pub async fn health_handler(State(scheduler): State<Scheduler>) -> impl IntoResponse {
    let state = scheduler.state().await;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "scheduler": state,
        })),
    )
}

/// GET /sync/status - latest sync run per instrument
pub async fn sync_status_handler(
    State(scheduler): State<Scheduler>,
    State(sync): State<Arc<StockSync>>,
) -> Result<Json<StatusResponse>, AppError> {
    let instruments = sync.database().latest_sync_status().await?;

    Ok(Json(StatusResponse {
        scheduler: scheduler.state().await,
        sweep_running: scheduler.is_sweep_running(),
        instruments,
    }))
}

/// POST /sync/run - start a full sweep in the background
pub async fn run_sweep_handler(State(scheduler): State<Scheduler>) -> Result<Response, AppError> {
    let _handle = scheduler.trigger_now()?;
    info!("Manual sweep triggered");

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "started" })),
    )
        .into_response())
}

/// POST /sync/run/{symbol} - sync one symbol and wait for the result
pub async fn run_symbol_handler(
    State(scheduler): State<Scheduler>,
    Path(symbol): Path<String>,
) -> Result<Response, AppError> {
    let outcome = scheduler.run_symbol(&symbol).await.map_err(|e| {
        warn!(symbol = %symbol, error = %e, "Rejecting manual sync");
        e
    })?;
    let status = match &outcome {
        SyncOutcome::Success { .. } => StatusCode::OK,
        SyncOutcome::UnknownSymbol => {
            return Err(AppError::NotFound(format!("Unknown symbol: {}", symbol)))
        }
        SyncOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        SyncOutcome::StoreError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    Ok((status, Json(outcome)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncConfig;
    use crate::services::clock::ManualClock;
    use crate::test_support::{bar, seeded_database, FakeProvider};
    use tempfile::tempdir;

    async fn state(dir: &tempfile::TempDir, provider: Arc<FakeProvider>) -> (Scheduler, Arc<StockSync>) {
        let db = seeded_database(dir, &["AAPL", "MSFT"]).await;
        let clock = Arc::new(ManualClock::new());
        let sync = Arc::new(StockSync::new(db, provider, clock.clone()));
        let scheduler = Scheduler::new(sync.clone(), &SyncConfig::default(), clock).unwrap();
        (scheduler, sync)
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            AppError::SweepInProgress.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database("locked".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_run_symbol_handler() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::new());
        provider.set_bars("AAPL", vec![bar(2024, 3, 4, 100.0, 105.0)]);
        let (scheduler, sync) = state(&temp_dir, provider).await;

        let response = run_symbol_handler(State(scheduler.clone()), Path("aapl".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let missing = run_symbol_handler(State(scheduler.clone()), Path("ZZZZ".to_string())).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        // Unscripted symbol: no data, run fails
        let failed = run_symbol_handler(State(scheduler), Path("MSFT".to_string()))
            .await
            .unwrap();
        assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

        let aapl = sync.database().find_instrument("AAPL").await.unwrap().unwrap();
        assert_eq!(sync.database().count_price_points(aapl.id).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sweep_and_symbol_sync_exclude_each_other() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::new());
        let (scheduler, _sync) = state(&temp_dir, provider.clone()).await;

        let gate = provider.hold_next_fetch();
        let single = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { run_symbol_handler(State(scheduler), Path("AAPL".to_string())).await }
        });
        provider.fetch_started().await;

        let sweep = run_sweep_handler(State(scheduler.clone())).await;
        assert!(matches!(sweep, Err(AppError::SweepInProgress)));

        gate.notify_one();
        single.await.unwrap().unwrap();

        // And the other way round
        let gate = provider.hold_next_fetch();
        let sweep = run_sweep_handler(State(scheduler.clone())).await.unwrap();
        assert_eq!(sweep.status(), StatusCode::ACCEPTED);
        provider.fetch_started().await;

        let conflict = run_symbol_handler(State(scheduler.clone()), Path("MSFT".to_string())).await;
        assert_eq!(conflict.unwrap_err().into_response().status(), StatusCode::CONFLICT);

        gate.notify_one();
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_sweep_trigger_conflicts_while_running() {
        let temp_dir = tempdir().unwrap();
        let (scheduler, sync) = state(&temp_dir, Arc::new(FakeProvider::new())).await;

        let first = run_sweep_handler(State(scheduler.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        // The guard is taken before the sweep task is spawned
        assert!(scheduler.is_sweep_running());
        let second = run_sweep_handler(State(scheduler.clone())).await;
        assert!(matches!(second, Err(AppError::SweepInProgress)));

        scheduler.stop().await;

        let Json(status) = sync_status_handler(State(scheduler), State(sync)).await.unwrap();
        assert_eq!(status.instruments.len(), 2);
        assert!(!status.sweep_running);
        assert_eq!(status.scheduler, SchedulerState::Idle);
    }
}
