//! Routing orchestration — the brain of the gateway.
//!
//! A `/route` call runs four steps: consult the decision cache, classify the
//! query on three axes (intent and complexity concurrently, sensitivity
//! inline), run the decision tree, and write the cache. The whole operation
//! is total: whatever goes wrong mid-flight, the caller gets a well-formed
//! [`RouteDecision`].
//!
//! Ordering matters for safety: the sensitivity detector is rule-based and
//! non-networked, so regulated data is identified and gated before any
//! fallible step runs. The degraded-mode envelope (cloud / internal) can
//! therefore never be handed a query the safety gate should have kept
//! on-premises.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::auth::{PolicyEngine, TokenAuthority};
use crate::classifiers::{ComplexityScorer, IntentClassifier, SensitivityDetector, SlmChatClient};
use crate::config::Config;
use crate::decision::{determine_tier, latency_budget_ms, select_model};
use crate::decisions::DecisionLog;
use crate::models::{
    Classification, ComplexityLevel, InferenceTier, IntentLabel, RouteDecision, RouteRequest,
    SensitivityLevel,
};
use crate::store::KvStore;

/// Shared application state injected into every request handler via
/// [`axum::extract::State`]. Configuration is immutable after startup.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub intent: IntentClassifier,
    pub complexity: ComplexityScorer,
    pub sensitivity: SensitivityDetector,
    /// Shared key-value store: decision cache + revocation set.
    pub store: KvStore,
    pub tokens: TokenAuthority,
    pub policy: PolicyEngine,
    /// Ring buffer of recent decisions, rendered by `/metrics`.
    pub decisions: Arc<DecisionLog>,
    /// Health probe handle for the classifier backend.
    pub slm_client: SlmChatClient,
    pub started_at: std::time::Instant,
}

impl GatewayState {
    /// Wire the production classifier set from configuration.
    pub fn new(config: Arc<Config>, store: KvStore, tokens: TokenAuthority) -> Self {
        let slm_client = SlmChatClient::new(&config.slm.base_url, config.slm.timeout_ms);
        let intent = IntentClassifier::Slm(crate::classifiers::SlmIntentClassifier::new(
            slm_client.clone(),
            config.slm.intent_model.clone(),
        ));
        let complexity = ComplexityScorer::Slm(crate::classifiers::SlmComplexityScorer::new(
            slm_client.clone(),
            config.slm.complexity_model.clone(),
        ));
        let policy = PolicyEngine::with_gate_overrides(&config.abac);
        let decisions = Arc::new(DecisionLog::new(config.gateway.decision_log_capacity));

        Self {
            config,
            intent,
            complexity,
            sensitivity: SensitivityDetector,
            store,
            tokens,
            policy,
            decisions,
            slm_client,
            started_at: std::time::Instant::now(),
        }
    }
}

/// Cache key: `route:` + first 16 hex chars of sha256(query).
fn cache_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("route:{}", &digest[..16])
}

/// Route a query to the optimal inference tier.
///
/// Total: never errors, never panics on well-formed input. The cache is
/// advisory — its absence changes latency, never the tier.
#[tracing::instrument(
    skip(state, req),
    fields(tenant_id = %req.tenant_id, tier = tracing::field::Empty, cached = tracing::field::Empty)
)]
pub async fn route(state: &GatewayState, req: &RouteRequest) -> RouteDecision {
    let started = std::time::Instant::now();

    // Sensitivity first: rule-based, synchronous, cannot fail. Everything
    // downstream (forced tiers, cache hits, the degraded envelope) is
    // checked against it.
    let (sensitivity, sensitivity_conf) = state.sensitivity.detect(&req.query);

    if let Some(forced) = req.force_tier {
        if sensitivity.is_regulated() && forced.is_off_premises() {
            info!(%forced, %sensitivity, "forced tier violates the safety gate — ignoring override");
        } else {
            let decision = forced_decision(state, forced, sensitivity, sensitivity_conf);
            record(state, req, &decision, false, started);
            return decision;
        }
    }

    let key = cache_key(&req.query);
    if let Some(cached) = cache_lookup(state, &key).await {
        tracing::Span::current().record("tier", cached.tier.to_string().as_str());
        tracing::Span::current().record("cached", true);
        record(state, req, &cached, false, started);
        return cached;
    }

    let decision = match classify_and_decide(state, req, sensitivity, sensitivity_conf).await {
        Ok(decision) => decision,
        Err(e) => {
            error!(error = %e, "routing orchestration failed — returning safe default");
            let decision = fallback_decision(state, &e);
            record(state, req, &decision, true, started);
            return decision;
        }
    };

    tracing::Span::current().record("tier", decision.tier.to_string().as_str());
    tracing::Span::current().record("cached", false);

    cache_write(state, &key, &decision).await;
    record(state, req, &decision, false, started);

    info!(
        tier = %decision.tier,
        model = %decision.model,
        intent = %decision.intent,
        complexity = %decision.complexity,
        sensitivity = %decision.sensitivity,
        confidence = decision.confidence,
        "routing decision"
    );

    decision
}

/// Classify without routing — diagnostics endpoint. Always fresh, no cache
/// read or write.
pub async fn classify(state: &GatewayState, req: &RouteRequest) -> Classification {
    let (sensitivity, sensitivity_conf) = state.sensitivity.detect(&req.query);
    let ((intent, intent_conf), (_score, complexity, complexity_conf)) = tokio::join!(
        state.intent.classify(&req.query),
        state.complexity.score(&req.query, &state.config.routing),
    );

    Classification {
        intent,
        intent_confidence: intent_conf,
        complexity,
        complexity_confidence: complexity_conf,
        sensitivity,
        sensitivity_confidence: sensitivity_conf,
        reasoning: None,
    }
}

/// The classification + decision core, separated so the public [`route`]
/// can catch any residual failure and answer with the safe default.
async fn classify_and_decide(
    state: &GatewayState,
    req: &RouteRequest,
    sensitivity: SensitivityLevel,
    sensitivity_conf: f64,
) -> anyhow::Result<RouteDecision> {
    let routing = &state.config.routing;

    // Intent and complexity are network-bound and independent — run them
    // concurrently on this task. Wall time ≈ max of the two.
    let ((intent, intent_conf), (complexity_score, complexity, complexity_conf)) = tokio::join!(
        state.intent.classify(&req.query),
        state.complexity.score(&req.query, routing),
    );

    let (tier, reason) = determine_tier(
        complexity,
        sensitivity,
        intent_conf,
        complexity_score,
        routing,
    );
    let model = select_model(routing, tier, intent);

    Ok(RouteDecision {
        tier,
        model,
        intent,
        complexity,
        sensitivity,
        confidence: intent_conf.min(complexity_conf).min(sensitivity_conf),
        latency_budget_ms: latency_budget_ms(routing, tier),
        routing_reason: reason,
        classification: Classification {
            intent,
            intent_confidence: intent_conf,
            complexity,
            complexity_confidence: complexity_conf,
            sensitivity,
            sensitivity_confidence: sensitivity_conf,
            reasoning: None,
        },
        cached: false,
    })
}

/// Synthesized decision for an explicitly forced tier. Never cached.
fn forced_decision(
    state: &GatewayState,
    tier: InferenceTier,
    sensitivity: SensitivityLevel,
    sensitivity_conf: f64,
) -> RouteDecision {
    let routing = &state.config.routing;
    RouteDecision {
        tier,
        model: select_model(routing, tier, IntentLabel::General),
        intent: IntentLabel::General,
        complexity: ComplexityLevel::Medium,
        sensitivity,
        confidence: 1.0,
        latency_budget_ms: latency_budget_ms(routing, tier),
        routing_reason: format!("Forced tier: {tier}"),
        classification: Classification {
            intent: IntentLabel::General,
            intent_confidence: 1.0,
            complexity: ComplexityLevel::Medium,
            complexity_confidence: 1.0,
            sensitivity,
            sensitivity_confidence: sensitivity_conf,
            reasoning: None,
        },
        cached: false,
    }
}

/// The degraded-mode envelope: cloud tier, internal sensitivity. Internal
/// routes to cloud and never to edge, and regulated queries were already
/// gated before anything fallible ran.
fn fallback_decision(state: &GatewayState, error: &anyhow::Error) -> RouteDecision {
    let routing = &state.config.routing;
    let message: String = error.to_string().chars().take(50).collect();
    RouteDecision {
        tier: InferenceTier::Cloud,
        model: routing.models.cloud.default.clone(),
        intent: IntentLabel::General,
        complexity: ComplexityLevel::Medium,
        sensitivity: SensitivityLevel::Internal,
        confidence: 0.5,
        latency_budget_ms: latency_budget_ms(routing, InferenceTier::Cloud),
        routing_reason: format!("Fallback: router error ({message})"),
        classification: Classification {
            intent: IntentLabel::General,
            intent_confidence: 0.5,
            complexity: ComplexityLevel::Medium,
            complexity_confidence: 0.5,
            sensitivity: SensitivityLevel::Internal,
            sensitivity_confidence: 0.5,
            reasoning: None,
        },
        cached: false,
    }
}

/// Cache read. A deserialization failure or an entry that would violate the
/// safety gate both read as a miss.
async fn cache_lookup(state: &GatewayState, key: &str) -> Option<RouteDecision> {
    let raw = state.store.get(key).await?;
    let mut decision: RouteDecision = match serde_json::from_str(&raw) {
        Ok(d) => d,
        Err(e) => {
            debug!(key, error = %e, "cached decision unreadable — treating as miss");
            return None;
        }
    };

    // The gate outranks the cache: a poisoned or stale entry must not
    // route regulated data off-premises.
    if decision.sensitivity.is_regulated() && decision.tier.is_off_premises() {
        debug!(key, "cached decision violates the safety gate — discarding");
        return None;
    }

    decision.cached = true;
    Some(decision)
}

/// Cache write — fire-and-forget.
async fn cache_write(state: &GatewayState, key: &str, decision: &RouteDecision) {
    match serde_json::to_string(decision) {
        Ok(serialized) => {
            state
                .store
                .set_ex(
                    key,
                    &serialized,
                    Duration::from_secs(state.config.routing.cache_ttl_s),
                )
                .await;
        }
        Err(e) => debug!(error = %e, "decision serialization failed — not cached"),
    }
}

fn record(
    state: &GatewayState,
    req: &RouteRequest,
    decision: &RouteDecision,
    fallback: bool,
    started: std::time::Instant,
) {
    let mut entry = crate::decisions::DecisionEntry::new(
        &req.tenant_id,
        decision.tier,
        &decision.model,
        decision.intent,
        decision.complexity,
        decision.sensitivity,
        decision.confidence,
    )
    .with_latency(started.elapsed().as_millis() as u64);
    if decision.cached {
        entry = entry.mark_cached();
    }
    if fallback {
        entry = entry.mark_fallback();
    }
    state.decisions.push(entry);
}
