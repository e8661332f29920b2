//! Tracing subscriber and optional OTLP span export.
//!
//! Without an `otlp_endpoint` the gateway logs locally through the fmt
//! layer only. With one, spans are batch-exported over OTLP/gRPC and every
//! request span (tenant id, request id, tier) reaches the collector.
//! A synchronously-failing exporter build is a fatal startup error.

use anyhow::Context;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Initialise the global tracing subscriber. Call once, before anything
/// logs.
pub fn init(config: &Config) -> anyhow::Result<()> {
    let default_filter = config
        .gateway
        .log_level
        .clone()
        .unwrap_or_else(|| "slm_gateway=info,tower_http=warn".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer();

    match &config.telemetry.otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()
                .context("building OTLP span exporter")?;

            let provider = TracerProvider::builder()
                .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    config.gateway.service_name.clone(),
                )]))
                .build();

            let tracer = provider.tracer("slm-gateway");
            opentelemetry::global::set_tracer_provider(provider);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    Ok(())
}
