use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::info;

mod api;
mod auth;
mod classifiers;
mod config;
mod decision;
mod decisions;
mod error;
mod models;
mod router;
mod store;
mod telemetry;

pub use config::Config;
pub use error::AppError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a Docker HEALTHCHECK, hit the liveness probe and exit
    // immediately. Avoids needing curl/wget in the container image.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    // Load config
    let config_path = std::env::var("SLMG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/slm-gateway/config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialise tracing (+ optional OTLP export)
    telemetry::init(&config)?;

    info!(
        port = config.gateway.port,
        env = %config.gateway.env,
        "slm-gateway starting"
    );

    // Signing secret is the one startup-fatal dependency.
    let secret = auth::resolve_signing_secret(&config.auth, config.is_development()).await?;
    let tokens = auth::TokenAuthority::new(&config.auth, secret)?;

    // Shared key-value store; unreachable Redis degrades, never aborts.
    let store = store::KvStore::connect(&config.store.url).await;

    let config = Arc::new(config);
    let state = Arc::new(router::GatewayState::new(Arc::clone(&config), store, tokens));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.gateway.port).parse()?;
    info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let trace_layer = tower_http::trace::TraceLayer::new_for_http()
        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO));

    let app = api::gateway::router(Arc::clone(&state))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            api::tenant::tenant_context_middleware,
        ))
        .layer(axum::middleware::from_fn(api::request_id::request_id_middleware))
        .layer(trace_layer);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("gateway server error")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Lightweight healthcheck: GET /health/liveness and exit 0 on 200,
/// 1 otherwise. Invoked via `slm-gateway --healthcheck`.
async fn healthcheck() -> anyhow::Result<()> {
    let port = std::env::var("SLMG_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8020);

    let url = format!("http://127.0.0.1:{port}/health/liveness");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
