pub mod api;

use crate::error::Result;
use crate::services::StockSync;
use crate::worker::Scheduler;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub sync: Arc<StockSync>,
}

impl FromRef<AppState> for Scheduler {
    fn from_ref(app_state: &AppState) -> Scheduler {
        app_state.scheduler.clone()
    }
}

impl FromRef<AppState> for Arc<StockSync> {
    fn from_ref(app_state: &AppState) -> Arc<StockSync> {
        app_state.sync.clone()
    }
}

pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/sync/status", get(api::sync_status_handler))
        .route("/sync/run", post(api::run_sweep_handler))
        .route("/sync/run/{symbol}", post(api::run_symbol_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the operator surface until `shutdown` resolves
pub async fn serve<F>(app_state: AppState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Registering routes:");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /sync/status");
    tracing::info!("  POST /sync/run");
    tracing::info!("  POST /sync/run/{{symbol}}");

    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
