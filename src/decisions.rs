//! In-memory log of recent routing decisions.
//!
//! [`DecisionLog`] is a fixed-capacity ring-buffer: once full, the oldest
//! entry is evicted to make room for the newest. This gives a bounded, O(1)
//! memory footprint regardless of request volume. The `/metrics` endpoint
//! renders its aggregate view; nothing here is persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{ComplexityLevel, InferenceTier, IntentLabel, SensitivityLevel};

/// Fixed-capacity ring-buffer of recent [`DecisionEntry`] records.
///
/// Safe to share across threads via `Arc<DecisionLog>`. [`push`][Self::push]
/// uses a non-blocking `try_lock` so it never delays the routing hot path;
/// under lock contention the entry is silently dropped.
pub struct DecisionLog {
    capacity: usize,
    entries: Mutex<VecDeque<DecisionEntry>>,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record a routing decision. Best-effort and non-blocking.
    pub fn push(&self, entry: DecisionEntry) {
        if let Ok(mut entries) = self.entries.try_lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Return up to `limit` recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<DecisionEntry> {
        let entries = self.entries.lock().await;
        entries.iter().rev().take(limit).cloned().collect()
    }
}

/// One routing decision as observed at the `/route` handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    /// Unique record id.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Tenant that issued the request.
    pub tenant_id: String,
    pub tier: InferenceTier,
    pub model: String,
    pub intent: IntentLabel,
    pub complexity: ComplexityLevel,
    pub sensitivity: SensitivityLevel,
    pub confidence: f64,
    /// Served from the decision cache.
    pub cached: bool,
    /// Produced by the degraded-mode envelope.
    pub fallback: bool,
    /// Time spent making the decision, not the downstream inference.
    pub latency_ms: u64,
}

impl DecisionEntry {
    pub fn new(
        tenant_id: &str,
        tier: InferenceTier,
        model: &str,
        intent: IntentLabel,
        complexity: ComplexityLevel,
        sensitivity: SensitivityLevel,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            tenant_id: tenant_id.to_string(),
            tier,
            model: model.to_string(),
            intent,
            complexity,
            sensitivity,
            confidence,
            cached: false,
            fallback: false,
            latency_ms: 0,
        }
    }

    pub fn mark_cached(mut self) -> Self {
        self.cached = true;
        self
    }

    pub fn mark_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(tier: InferenceTier, latency_ms: u64) -> DecisionEntry {
        DecisionEntry::new(
            "tenant-1",
            tier,
            "test-model",
            IntentLabel::General,
            ComplexityLevel::Simple,
            SensitivityLevel::Public,
            0.9,
        )
        .with_latency(latency_ms)
    }

    // -----------------------------------------------------------------------
    // Basic push / read
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn push_and_retrieve_single_entry() {
        let log = DecisionLog::new(10);
        log.push(make_entry(InferenceTier::Edge, 42));

        let recent = log.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tier, InferenceTier::Edge);
        assert_eq!(recent[0].latency_ms, 42);
    }

    #[tokio::test]
    async fn recent_returns_entries_newest_first() {
        let log = DecisionLog::new(10);
        log.push(make_entry(InferenceTier::Edge, 1));
        log.push(make_entry(InferenceTier::Cloud, 2));
        log.push(make_entry(InferenceTier::Rlm, 3));

        let recent = log.recent(10).await;
        assert_eq!(recent[0].tier, InferenceTier::Rlm);
        assert_eq!(recent[1].tier, InferenceTier::Cloud);
        assert_eq!(recent[2].tier, InferenceTier::Edge);
    }

    #[tokio::test]
    async fn oldest_entry_evicted_when_capacity_exceeded() {
        let log = DecisionLog::new(3);
        log.push(make_entry(InferenceTier::Edge, 1));
        log.push(make_entry(InferenceTier::Slm, 2));
        log.push(make_entry(InferenceTier::Cloud, 3));
        log.push(make_entry(InferenceTier::Rlm, 4));

        let all = log.recent(100).await;
        assert_eq!(all.len(), 3);
        assert!(!all.iter().any(|e| e.tier == InferenceTier::Edge));
        assert!(all.iter().any(|e| e.tier == InferenceTier::Rlm));
    }

    #[test]
    fn entries_have_unique_ids() {
        let a = make_entry(InferenceTier::Edge, 1);
        let b = make_entry(InferenceTier::Edge, 1);
        assert_ne!(a.id, b.id);
    }
}
