//! Liveness and readiness probes.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::router::GatewayState;

/// `GET /health/liveness` — always 200. No dependencies, never blocks, safe
/// as a container liveness probe.
pub async fn liveness(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "alive",
            "service": state.config.gateway.service_name,
        })),
    )
}

/// `GET /health/readiness` — 200 with per-dependency status. `degraded`
/// means the gateway still answers (classifier fallbacks, cache misses) but
/// a dependency is unreachable.
pub async fn readiness(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let slm_ok = state.slm_client.health_check().await.is_ok();
    let store_ok = state.store.is_connected();

    let status = if slm_ok { "healthy" } else { "degraded" };
    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "slm_backend": if slm_ok { "healthy" } else { "unreachable" },
            "store": if store_ok { "connected" } else { "disabled" },
            "uptime_secs": state.started_at.elapsed().as_secs(),
        })),
    )
}
