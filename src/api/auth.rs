//! Auth endpoints — login, verify, logout, authorize, me.
//!
//! Local login exists for development and service accounts only; outside
//! development it returns 403 and callers are expected to authenticate
//! through the platform's SSO edge. Every 401 carries `WWW-Authenticate`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::models::{AbacRequest, LoginRequest, TokenClaims, TokenResponse, UserRole};
use crate::router::GatewayState;

use super::tenant::DEMO_TENANT_ID;

/// Auth sub-router, merged into the main gateway router.
pub fn router() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        .route("/auth/logout", post(logout))
        .route("/auth/authorize", post(authorize))
        .route("/auth/me", get(me))
}

fn unauthorized(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "error": detail })),
    )
        .into_response()
}

/// Extract and verify the bearer token, including the revocation check.
async fn bearer_claims(
    state: &GatewayState,
    headers: &HeaderMap,
) -> Result<TokenClaims, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    state
        .tokens
        .verify(&state.store, token)
        .await
        .map_err(|e| unauthorized(&e.to_string()))
}

/// Development demo accounts. Real deployments log in through SSO.
fn demo_user(email: &str) -> Option<(&'static str, UserRole)> {
    match email {
        "admin@demo.local" => Some(("demo-admin-001", UserRole::Admin)),
        "analyst@demo.local" => Some(("demo-analyst-001", UserRole::Analyst)),
        "ds@demo.local" => Some(("demo-ds-001", UserRole::DataScientist)),
        _ => None,
    }
}

const DEMO_PASSWORD: &str = "gateway-dev";

/// `POST /auth/login` — issue a token for a demo account (development only).
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<LoginRequest>,
) -> Response {
    if !state.config.is_development() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Local login disabled outside development. Use SSO."
            })),
        )
            .into_response();
    }

    let Some((user_id, role)) = demo_user(&req.email) else {
        return unauthorized("Invalid credentials");
    };
    if req.password != DEMO_PASSWORD {
        return unauthorized("Invalid credentials");
    }

    let tenant_id = DEMO_TENANT_ID;
    match state
        .tokens
        .issue(user_id, tenant_id, role, &req.email, None)
    {
        Ok((token, _claims)) => {
            info!(user_id, tenant_id, tenant_slug = %req.tenant_slug, "login succeeded");
            (
                StatusCode::OK,
                Json(TokenResponse {
                    access_token: token,
                    token_type: "bearer".to_string(),
                    expires_in: state.tokens.default_lifetime_minutes() * 60,
                    tenant_id: tenant_id.to_string(),
                    role,
                }),
            )
                .into_response()
        }
        Err(e) => crate::error::AppError::from(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

/// `POST /auth/verify` — edge-callable token verification. 200 + claims on
/// success, 401 on invalid/expired/revoked.
pub async fn verify(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<VerifyRequest>,
) -> Response {
    let Some(token) = req.token.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing token" })),
        )
            .into_response();
    };

    match state.tokens.verify(&state.store, &token).await {
        Ok(claims) => (
            StatusCode::OK,
            Json(json!({
                "valid": true,
                "user_id": claims.sub,
                "tenant_id": claims.tenant_id,
                "role": claims.role,
                "exp": claims.exp,
            })),
        )
            .into_response(),
        Err(e) => unauthorized(&e.to_string()),
    }
}

/// `POST /auth/logout` — revoke the presented token until its natural
/// expiry.
pub async fn logout(State(state): State<Arc<GatewayState>>, headers: HeaderMap) -> Response {
    let claims = match bearer_claims(&state, &headers).await {
        Ok(claims) => claims,
        Err(rejection) => return rejection,
    };

    state.tokens.revoke(&state.store, &claims).await;
    (
        StatusCode::OK,
        Json(json!({ "status": "logged_out", "jti": claims.jti })),
    )
        .into_response()
}

/// `POST /auth/authorize` — evaluate an ABAC request for the caller.
///
/// Callers may only ask about themselves: a request whose user or tenant
/// differs from the token's is rejected before the engine runs.
pub async fn authorize(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(req): Json<AbacRequest>,
) -> Response {
    let claims = match bearer_claims(&state, &headers).await {
        Ok(claims) => claims,
        Err(rejection) => return rejection,
    };

    if req.user_id != claims.sub || req.tenant_id != claims.tenant_id {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Cannot evaluate policy for a different user or tenant"
            })),
        )
            .into_response();
    }

    let decision = state.policy.evaluate(&req);
    info!(
        user_id = %req.user_id,
        tenant_id = %req.tenant_id,
        resource = %req.resource_type,
        action = %req.action,
        allowed = decision.allowed,
        "policy decision"
    );
    (StatusCode::OK, Json(decision)).into_response()
}

/// `GET /auth/me` — the caller's non-sensitive claims.
pub async fn me(State(state): State<Arc<GatewayState>>, headers: HeaderMap) -> Response {
    let claims = match bearer_claims(&state, &headers).await {
        Ok(claims) => claims,
        Err(rejection) => return rejection,
    };

    (
        StatusCode::OK,
        Json(json!({
            "user_id": claims.sub,
            "tenant_id": claims.tenant_id,
            "role": claims.role,
            "exp": claims.exp,
        })),
    )
        .into_response()
}
