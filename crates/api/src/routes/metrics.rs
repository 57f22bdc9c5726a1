use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use gpuvm_core::exposition::ExpositionMerger;

use crate::state::AppState;

/// Content type of the text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics -- every fresh VM reading merged into one document.
///
/// Always succeeds. Stale readings are evicted by the read; VMs whose
/// probes keep failing simply drop out once their last reading expires.
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache.snapshot_fresh().await;

    let mut merger = ExpositionMerger::new();
    for (vm_id, text) in &snapshot {
        merger.add_target(*vm_id, text);
    }
    let body = merger.render();

    tracing::debug!(
        vms = snapshot.len(),
        families = merger.family_count(),
        dropped_lines = merger.dropped_lines(),
        bytes = body.len(),
        "Serving merged metrics",
    );

    ([(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}
