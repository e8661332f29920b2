//! Prometheus-compatible `/metrics` endpoint.
//!
//! All metrics are derived from the in-memory decision ring-buffer. Because
//! the buffer has a fixed capacity, values represent a **sliding window** of
//! recent requests rather than lifetime counters — hence `TYPE gauge`
//! throughout; values may decrease as old entries rotate out.
//!
//! Metric families:
//! - `slmg_window_size`        — entries currently in the ring buffer
//! - `slmg_requests`           — per-tier/sensitivity/cached request counts
//! - `slmg_latency_ms_sum`     — sum of decision latency per tier (for avg)
//! - `slmg_latency_ms_count`   — denominator matching the sum above
//! - `slmg_cache_hits_total`   — decisions served from the cache
//! - `slmg_fallbacks_total`    — decisions from the degraded-mode envelope

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::router::GatewayState;

/// `GET /metrics` — renders Prometheus text format.
pub async fn metrics(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let entries = state.decisions.recent(usize::MAX).await;

    // --- aggregate ---
    let window_size = entries.len();
    let mut cache_hits: u64 = 0;
    let mut fallbacks: u64 = 0;

    // (tier, sensitivity, cached) → count
    let mut request_counts: HashMap<(String, String, bool), u64> = HashMap::new();
    // tier → (latency_sum_ms, count)
    let mut latency: HashMap<String, (u64, u64)> = HashMap::new();

    for e in &entries {
        if e.cached {
            cache_hits += 1;
        }
        if e.fallback {
            fallbacks += 1;
        }

        *request_counts
            .entry((e.tier.to_string(), e.sensitivity.to_string(), e.cached))
            .or_default() += 1;

        let lat = latency.entry(e.tier.to_string()).or_default();
        lat.0 += e.latency_ms;
        lat.1 += 1;
    }

    // --- render ---
    let mut out = String::with_capacity(1024);

    out.push_str("# HELP slmg_window_size Number of decisions currently held in the ring-buffer window.\n");
    out.push_str("# TYPE slmg_window_size gauge\n");
    out.push_str(&format!("slmg_window_size {window_size}\n\n"));

    out.push_str("# HELP slmg_requests Routing decisions in the current window, labelled by tier, sensitivity, and cache outcome.\n");
    out.push_str("# TYPE slmg_requests gauge\n");
    let mut req_rows: Vec<_> = request_counts.iter().collect();
    req_rows.sort_by(|a, b| a.0.cmp(b.0));
    for ((tier, sensitivity, cached), count) in req_rows {
        let cached_str = if *cached { "true" } else { "false" };
        out.push_str(&format!(
            "slmg_requests{{tier=\"{tier}\",sensitivity=\"{sensitivity}\",cached=\"{cached_str}\"}} {count}\n"
        ));
    }
    out.push('\n');

    out.push_str("# HELP slmg_latency_ms_sum Sum of decision latency (ms) in the current window, grouped by tier.\n");
    out.push_str("# TYPE slmg_latency_ms_sum gauge\n");
    out.push_str("# HELP slmg_latency_ms_count Number of observations for the latency sum above.\n");
    out.push_str("# TYPE slmg_latency_ms_count gauge\n");
    let mut lat_rows: Vec<_> = latency.iter().collect();
    lat_rows.sort_by(|a, b| a.0.cmp(b.0));
    for (tier, (sum, count)) in lat_rows {
        out.push_str(&format!("slmg_latency_ms_sum{{tier=\"{tier}\"}} {sum}\n"));
        out.push_str(&format!("slmg_latency_ms_count{{tier=\"{tier}\"}} {count}\n"));
    }
    out.push('\n');

    out.push_str("# HELP slmg_cache_hits_total Decisions served from the cache in the current window.\n");
    out.push_str("# TYPE slmg_cache_hits_total gauge\n");
    out.push_str(&format!("slmg_cache_hits_total {cache_hits}\n\n"));

    out.push_str("# HELP slmg_fallbacks_total Decisions produced by the degraded-mode envelope in the current window.\n");
    out.push_str("# TYPE slmg_fallbacks_total gauge\n");
    out.push_str(&format!("slmg_fallbacks_total {fallbacks}\n"));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        out,
    )
}

#[cfg(test)]
mod tests {
    use crate::decisions::{DecisionEntry, DecisionLog};
    use crate::models::{ComplexityLevel, InferenceTier, IntentLabel, SensitivityLevel};

    fn entry(tier: InferenceTier, latency_ms: u64) -> DecisionEntry {
        DecisionEntry::new(
            "t1",
            tier,
            "m",
            IntentLabel::General,
            ComplexityLevel::Simple,
            SensitivityLevel::Public,
            0.9,
        )
        .with_latency(latency_ms)
    }

    #[tokio::test]
    async fn window_reflects_pushed_entries() {
        let log = DecisionLog::new(100);
        log.push(entry(InferenceTier::Edge, 12));
        log.push(entry(InferenceTier::Cloud, 48).mark_cached());
        log.push(entry(InferenceTier::Cloud, 50).mark_fallback());

        let entries = log.recent(usize::MAX).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.iter().filter(|e| e.cached).count(), 1);
        assert_eq!(entries.iter().filter(|e| e.fallback).count(), 1);
    }

    #[tokio::test]
    async fn latency_sums_group_by_tier() {
        let log = DecisionLog::new(100);
        log.push(entry(InferenceTier::Cloud, 30));
        log.push(entry(InferenceTier::Cloud, 70));
        log.push(entry(InferenceTier::Edge, 5));

        let entries = log.recent(usize::MAX).await;
        let cloud_sum: u64 = entries
            .iter()
            .filter(|e| e.tier == InferenceTier::Cloud)
            .map(|e| e.latency_ms)
            .sum();
        assert_eq!(cloud_sum, 100);
    }
}
