use axum::extract::State;
use axum::{routing::get, Json, Router};
use gpuvm_collector::dispatcher::CycleReport;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the inventory database is unreachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    /// VMs currently held in the cache (fresh or awaiting eviction).
    pub cached_targets: usize,
    /// Most recently finished collection cycle.
    pub last_cycle: Option<CycleReport>,
}

/// GET /health -- service, database and collector status. Always 200.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match state.dispatcher.inventory().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Inventory database unreachable");
            false
        }
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        cached_targets: state.cache.len().await,
        last_cycle: state.dispatcher.last_report().await,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
