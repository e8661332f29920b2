//! Tenant-context middleware.
//!
//! The upstream gateway terminates authentication and injects trusted
//! headers; this middleware turns them into a request-scoped
//! [`TenantContext`] extension. No global scoping: handlers receive the
//! context as an explicit extracted value and fail loudly if the layer is
//! missing.
//!
//! Headers consumed:
//! - `X-Tenant-ID`    — UUID of the authenticated tenant (required on
//!   protected paths)
//! - `X-User-ID`, `X-User-Role` — informational
//! - `X-Dev-Tenant-ID` — development-only override
//!
//! Public paths (health, login, verify, docs, metrics) bypass enforcement.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::router::GatewayState;

use super::request_id::RequestId;

/// Demo tenant injected in development when no header is present.
pub const DEMO_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Paths that never require tenant context.
const PUBLIC_PATHS: &[&str] = &[
    "/health/liveness",
    "/health/readiness",
    "/auth/login",
    "/auth/verify",
    "/docs",
    "/metrics",
];

/// Request-scoped tenant identity, immutable for the request lifetime.
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant_id: String,
    pub user_id: String,
    pub role: String,
    pub request_id: String,
}

/// Axum middleware establishing [`TenantContext`] on every protected path.
pub async fn tenant_context_middleware(
    State(state): State<Arc<GatewayState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    let tenant_id = match header("x-tenant-id").or_else(|| header("x-dev-tenant-id")) {
        Some(id) => id,
        None if state.config.is_development() => DEMO_TENANT_ID.to_string(),
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing tenant context. Ensure the request is routed through the gateway."
                })),
            )
                .into_response();
        }
    };

    if Uuid::parse_str(&tenant_id).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Invalid X-Tenant-ID format: {tenant_id:?}") })),
        )
            .into_response();
    }

    // The request-id middleware runs outside this one and always sets the
    // extension; an empty id here means the layers are mis-ordered.
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let ctx = TenantContext {
        tenant_id,
        user_id: header("x-user-id").unwrap_or_else(|| "unknown".to_string()),
        role: header("x-user-role").unwrap_or_else(|| "analyst".to_string()),
        request_id,
    };

    let span = tracing::info_span!(
        "tenant",
        tenant_id = %ctx.tenant_id,
        request_id = %ctx.request_id
    );
    req.extensions_mut().insert(ctx);

    use tracing::Instrument as _;
    next.run(req).instrument(span).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    use crate::auth::{SigningSecret, TokenAuthority};
    use crate::config::Config;
    use crate::router::GatewayState;
    use crate::store::KvStore;

    use super::{TenantContext, DEMO_TENANT_ID};

    fn state(env: &str) -> Arc<GatewayState> {
        let mut config = Config::default();
        config.gateway.env = env.to_string();
        let tokens = TokenAuthority::new(
            &config.auth,
            SigningSecret::new("test-secret".into()).unwrap(),
        )
        .unwrap();
        Arc::new(GatewayState::new(Arc::new(config), KvStore::memory(), tokens))
    }

    async fn echo_tenant(ctx: Option<Extension<TenantContext>>) -> String {
        ctx.map(|Extension(c)| c.tenant_id).unwrap_or_else(|| "none".into())
    }

    fn app(state: Arc<GatewayState>) -> Router {
        Router::new()
            .route("/protected", get(echo_tenant))
            .route("/health/liveness", get(echo_tenant))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                super::tenant_context_middleware,
            ))
            .layer(middleware::from_fn(
                crate::api::request_id::request_id_middleware,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn missing_tenant_header_is_401_outside_development() {
        let resp = app(state("production"))
            .oneshot(Request::get("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn development_injects_the_demo_tenant() {
        let resp = app(state("development"))
            .oneshot(Request::get("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), 256).await.unwrap();
        assert_eq!(&body[..], DEMO_TENANT_ID.as_bytes());
    }

    #[tokio::test]
    async fn valid_tenant_header_is_passed_through() {
        let resp = app(state("production"))
            .oneshot(
                Request::get("/protected")
                    .header("x-tenant-id", "11111111-2222-3333-4444-555555555555")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), 256).await.unwrap();
        assert_eq!(&body[..], b"11111111-2222-3333-4444-555555555555");
    }

    #[tokio::test]
    async fn dev_override_header_is_honoured() {
        let resp = app(state("production"))
            .oneshot(
                Request::get("/protected")
                    .header("x-dev-tenant-id", "11111111-2222-3333-4444-555555555555")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_tenant_uuid_is_400() {
        let resp = app(state("production"))
            .oneshot(
                Request::get("/protected")
                    .header("x-tenant-id", "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn public_paths_bypass_tenant_enforcement() {
        let resp = app(state("production"))
            .oneshot(Request::get("/health/liveness").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), 256).await.unwrap();
        assert_eq!(&body[..], b"none");
    }

    #[tokio::test]
    async fn request_id_is_echoed_on_the_response() {
        let resp = app(state("development"))
            .oneshot(
                Request::get("/protected")
                    .header("x-request-id", "req-abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get("x-request-id").unwrap(),
            "req-abc-123"
        );
    }

    #[tokio::test]
    async fn request_id_is_generated_when_absent() {
        let resp = app(state("development"))
            .oneshot(Request::get("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert!(!id.is_empty());
    }
}
