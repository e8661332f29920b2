//! Configuration types for slm-gateway.
//!
//! Config is loaded once at startup from a TOML file and validated before the
//! server opens any ports. Invalid configs are rejected with a clear error
//! rather than silently falling back to defaults. Configuration is immutable
//! after process start; to change routing behaviour, deploy a new instance
//! (the decision cache TTL is short enough that stale entries age out in
//! minutes).
//!
//! Secrets never live in the file — the `[auth]` section names the
//! environment variable (or secret-store URL) they are resolved from.
//!
//! # Example
//! ```toml
//! [gateway]
//! port = 8020
//!
//! [slm]
//! base_url = "http://localhost:11434"
//! intent_model = "phi3.5"
//! complexity_model = "gemma2:2b"
//!
//! [store]
//! url = "redis://127.0.0.1:6379"
//!
//! [routing.models.cloud]
//! default = "claude-sonnet-4-6"
//! SQL     = "codestral:22b"
//! ```

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::{InferenceTier, IntentLabel, SensitivityLevel};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Small-model classifier backend wiring.
    #[serde(default)]
    pub slm: SlmConfig,

    /// Shared key-value store (decision cache + revocation set).
    #[serde(default)]
    pub store: StoreConfig,

    /// Decision-tree thresholds, latency budgets, and tier model maps.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Token authority settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-role column sensitivity gate overrides, keyed by role name.
    /// Roles absent here keep their compiled-in defaults.
    #[serde(default)]
    pub abac: HashMap<String, SensitivityLevel>,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.routing;

        anyhow::ensure!(
            (0.0..=1.0).contains(&r.confidence_threshold),
            "routing.confidence_threshold must be within [0, 1], got {}",
            r.confidence_threshold
        );

        anyhow::ensure!(
            r.complexity_simple_max < r.complexity_medium_max
                && r.complexity_medium_max < r.complexity_complex_max
                && r.complexity_complex_max < 1.0,
            "complexity cutoffs must be strictly increasing and below 1.0 \
             (simple {} < medium {} < complex {} < 1.0)",
            r.complexity_simple_max,
            r.complexity_medium_max,
            r.complexity_complex_max
        );

        for tier in [
            InferenceTier::Edge,
            InferenceTier::Slm,
            InferenceTier::Cloud,
            InferenceTier::Rlm,
        ] {
            anyhow::ensure!(
                !r.models.for_tier(tier).default.is_empty(),
                "routing.models.{tier} must name a default model"
            );
        }

        anyhow::ensure!(
            self.auth.token_lifetime_minutes > 0
                && self.auth.max_token_lifetime_minutes >= self.auth.token_lifetime_minutes,
            "auth token lifetimes must be positive and max >= default"
        );

        anyhow::ensure!(
            self.auth.algorithm == "HS256"
                || self.auth.algorithm == "HS384"
                || self.auth.algorithm == "HS512",
            "auth.algorithm must be one of HS256/HS384/HS512, got `{}`",
            self.auth.algorithm
        );

        Ok(())
    }

    /// True when running with development conveniences (tenant bypass,
    /// local demo login).
    pub fn is_development(&self) -> bool {
        self.gateway.env == "development"
    }
}

/// Core gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Listener port (default: 8020).
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Service name reported on health endpoints and trace resources.
    #[serde(default = "defaults::service_name")]
    pub service_name: String,

    /// `"development"` enables the dev tenant bypass and local login.
    #[serde(default = "defaults::env")]
    pub env: String,

    /// Number of recent routing decisions kept in memory for `/metrics`
    /// (default: 500).
    #[serde(default = "defaults::decision_log_capacity")]
    pub decision_log_capacity: usize,

    /// Log level override (also controlled by `RUST_LOG` env var).
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty gateway section must deserialize")
    }
}

/// Small-model backend used by the intent and complexity classifiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlmConfig {
    /// Base URL of the `/api/chat` backend.
    #[serde(default = "defaults::slm_base_url")]
    pub base_url: String,

    /// Model answering intent classification calls.
    #[serde(default = "defaults::intent_model")]
    pub intent_model: String,

    /// Model answering complexity scoring calls.
    #[serde(default = "defaults::complexity_model")]
    pub complexity_model: String,

    /// Per-call timeout in milliseconds (default: 15 000). A timeout is not
    /// a routing failure — it triggers the classifier's rule-based fallback.
    #[serde(default = "defaults::slm_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SlmConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty slm section must deserialize")
    }
}

/// Shared key-value store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// `redis://…` for a real deployment, `memory` for an in-process map
    /// (single node, tests), `disabled` to run without cache or revocation
    /// persistence.
    #[serde(default = "defaults::store_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty store section must deserialize")
    }
}

/// Decision-tree parameters and tier wiring.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Decision cache TTL in seconds (default: 300).
    #[serde(default = "defaults::cache_ttl_s")]
    pub cache_ttl_s: u64,

    /// Intent confidence below this escalates to cloud (default: 0.85).
    #[serde(default = "defaults::confidence_threshold")]
    pub confidence_threshold: f64,

    /// Complexity score bucket boundaries.
    #[serde(default = "defaults::complexity_simple_max")]
    pub complexity_simple_max: f64,
    #[serde(default = "defaults::complexity_medium_max")]
    pub complexity_medium_max: f64,
    #[serde(default = "defaults::complexity_complex_max")]
    pub complexity_complex_max: f64,

    /// Published per-tier latency budgets.
    #[serde(default)]
    pub latency_budgets_ms: LatencyBudgets,

    /// Per-tier intent → model maps.
    #[serde(default)]
    pub models: TierModelMaps,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty routing section must deserialize")
    }
}

/// Maximum latency the downstream executor may spend per tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatencyBudgets {
    #[serde(default = "defaults::latency_edge_ms")]
    pub edge: u64,
    #[serde(default = "defaults::latency_slm_ms")]
    pub slm: u64,
    #[serde(default = "defaults::latency_cloud_ms")]
    pub cloud: u64,
    #[serde(default = "defaults::latency_rlm_ms")]
    pub rlm: u64,
}

impl LatencyBudgets {
    pub fn for_tier(&self, tier: InferenceTier) -> u64 {
        match tier {
            InferenceTier::Edge => self.edge,
            InferenceTier::Slm => self.slm,
            InferenceTier::Cloud => self.cloud,
            InferenceTier::Rlm => self.rlm,
        }
    }
}

impl Default for LatencyBudgets {
    fn default() -> Self {
        toml::from_str("").expect("empty latency section must deserialize")
    }
}

/// Intent → model lookup for one tier. Extend the map, not the decision
/// function: the tree never sees model names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierModels {
    pub default: String,
    /// Intent-specific overrides, keyed by the UPPERCASE intent label.
    #[serde(flatten, default)]
    pub by_intent: HashMap<IntentLabel, String>,
}

impl TierModels {
    pub fn select(&self, intent: IntentLabel) -> &str {
        self.by_intent
            .get(&intent)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }

    fn named(default: &str) -> Self {
        Self {
            default: default.to_string(),
            by_intent: HashMap::new(),
        }
    }
}

/// All four tier model maps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierModelMaps {
    #[serde(default = "defaults::edge_models")]
    pub edge: TierModels,
    #[serde(default = "defaults::slm_models")]
    pub slm: TierModels,
    #[serde(default = "defaults::cloud_models")]
    pub cloud: TierModels,
    #[serde(default = "defaults::rlm_models")]
    pub rlm: TierModels,
}

impl TierModelMaps {
    pub fn for_tier(&self, tier: InferenceTier) -> &TierModels {
        match tier {
            InferenceTier::Edge => &self.edge,
            InferenceTier::Slm => &self.slm,
            InferenceTier::Cloud => &self.cloud,
            InferenceTier::Rlm => &self.rlm,
        }
    }
}

impl Default for TierModelMaps {
    fn default() -> Self {
        Self {
            edge: defaults::edge_models(),
            slm: defaults::slm_models(),
            cloud: defaults::cloud_models(),
            rlm: defaults::rlm_models(),
        }
    }
}

/// Token authority settings. The secret itself is resolved at startup from
/// the environment or the secret store, never from this file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Environment variable holding the signing secret.
    #[serde(default = "defaults::signing_secret_env")]
    pub signing_secret_env: String,

    /// Optional secret-store URL (KV-v2 style). When set, the secret is
    /// fetched from here instead of the environment; the store token comes
    /// from `secret_store_token_env`.
    #[serde(default)]
    pub secret_store_url: Option<String>,

    #[serde(default = "defaults::secret_store_token_env")]
    pub secret_store_token_env: String,

    /// Signing algorithm (HS256/HS384/HS512), fixed at process start.
    #[serde(default = "defaults::algorithm")]
    pub algorithm: String,

    /// Key id embedded in issued claims.
    #[serde(default = "defaults::key_id")]
    pub key_id: String,

    /// Default token lifetime in minutes (default: 60).
    #[serde(default = "defaults::token_lifetime_minutes")]
    pub token_lifetime_minutes: i64,

    /// Hard cap on any requested lifetime (default: 1440 = 24 h).
    #[serde(default = "defaults::max_token_lifetime_minutes")]
    pub max_token_lifetime_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty auth section must deserialize")
    }
}

/// Trace export settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// OTLP/gRPC collector endpoint, e.g. `http://otel-collector:4317`.
    /// Unset = no span export, local logging only.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

mod defaults {
    use super::TierModels;

    pub fn port() -> u16 { 8020 }
    pub fn service_name() -> String { "slm-gateway".into() }
    pub fn env() -> String { "development".into() }
    pub fn decision_log_capacity() -> usize { 500 }

    pub fn slm_base_url() -> String { "http://localhost:11434".into() }
    pub fn intent_model() -> String { "phi3.5".into() }
    pub fn complexity_model() -> String { "gemma2:2b".into() }
    pub fn slm_timeout_ms() -> u64 { 15_000 }

    pub fn store_url() -> String { "redis://127.0.0.1:6379".into() }

    pub fn cache_ttl_s() -> u64 { 300 }
    pub fn confidence_threshold() -> f64 { 0.85 }
    pub fn complexity_simple_max() -> f64 { 0.35 }
    pub fn complexity_medium_max() -> f64 { 0.65 }
    pub fn complexity_complex_max() -> f64 { 0.85 }

    pub fn latency_edge_ms() -> u64 { 100 }
    pub fn latency_slm_ms() -> u64 { 500 }
    pub fn latency_cloud_ms() -> u64 { 5_000 }
    pub fn latency_rlm_ms() -> u64 { 60_000 }

    pub fn edge_models() -> TierModels { TierModels::named("phi3.5") }
    pub fn slm_models() -> TierModels { TierModels::named("phi3.5") }
    pub fn cloud_models() -> TierModels { TierModels::named("claude-sonnet-4-6") }
    pub fn rlm_models() -> TierModels { TierModels::named("deepseek-r1:32b") }

    pub fn signing_secret_env() -> String { "SLMG_SIGNING_SECRET".into() }
    pub fn secret_store_token_env() -> String { "SLMG_SECRET_STORE_TOKEN".into() }
    pub fn algorithm() -> String { "HS256".into() }
    pub fn key_id() -> String { "gateway-key-1".into() }
    pub fn token_lifetime_minutes() -> i64 { 60 }
    pub fn max_token_lifetime_minutes() -> i64 { 1_440 }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize")
    }
}
