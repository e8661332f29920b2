//! Routing endpoints — `POST /route` and `POST /classify`.
//!
//! Intentionally a thin layer: all orchestration lives in [`crate::router`].
//! Handlers validate the body, delegate, and attach the decision latency to
//! the recorded entry.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::models::{RouteRequest, MAX_QUERY_CHARS};
use crate::router::GatewayState;

/// Assemble the full gateway router. Middlewares (request-id, tenant
/// context, tracing) are layered on in `main`.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/route", post(route_query))
        .route("/classify", post(classify_query))
        .route("/health/liveness", get(super::health::liveness))
        .route("/health/readiness", get(super::health::readiness))
        .route("/metrics", get(super::metrics::metrics))
        .merge(super::auth::router())
        .with_state(state)
}

fn validate(req: &RouteRequest) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let chars = req.query.chars().count();
    if chars == 0 || chars > MAX_QUERY_CHARS {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": format!("query must be between 1 and {MAX_QUERY_CHARS} characters")
            })),
        ));
    }
    Ok(())
}

/// `POST /route` — decide the inference tier for a query.
pub async fn route_query(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RouteRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = validate(&req) {
        return rejection.into_response();
    }

    let started = std::time::Instant::now();
    let decision = crate::router::route(&state, &req).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(latency_ms, tier = %decision.tier, "route decided");

    (StatusCode::OK, Json(decision)).into_response()
}

/// `POST /classify` — classification only, always fresh. Diagnostics aid.
pub async fn classify_query(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RouteRequest>,
) -> impl IntoResponse {
    if let Err(rejection) = validate(&req) {
        return rejection.into_response();
    }

    let classification = crate::router::classify(&state, &req).await;
    (StatusCode::OK, Json(classification)).into_response()
}
