//! Complexity scoring — how hard is the query, on a 0..1 scale?
//!
//! The raw score is what matters downstream; the level is always derived
//! from the score with the configured bucket boundaries, including on the
//! SLM path, so `level == bucket(score)` holds everywhere.

use serde_json::Value;
use tracing::warn;

use crate::config::RoutingConfig;
use crate::models::ComplexityLevel;

use super::slm::{extract_json_object, SlmChatClient};

/// Confidence reported on the SLM path.
pub const SLM_CONFIDENCE: f64 = 0.82;
/// Confidence reported on the heuristic fallback path.
pub const HEURISTIC_CONFIDENCE: f64 = 0.65;

const COMPLEXITY_SYSTEM_PROMPT: &str = "\
You are a query complexity estimator for a data analytics AI platform.
Score the complexity of the user query from 0.0 to 1.0 based on:

- 0.0-0.35 SIMPLE: Single table lookup, basic aggregation, factual question
  Example: \"Show total sales for last month\"
- 0.35-0.65 MEDIUM: Multi-step analysis, comparisons, joins across 2-3 tables
  Example: \"Compare revenue across regions and highlight top performers\"
- 0.65-0.85 COMPLEX: Causal analysis, multi-hop reasoning, statistical tests
  Example: \"What factors drove the Q3 revenue drop? Show contributing variables\"
- 0.85-1.0 EXPERT: Causal inference, forecasting with confounders, hypothesis testing
  Example: \"Build a causal model to estimate the impact of the price change on churn\"

Respond ONLY with valid JSON:
{\"score\": <0.0-1.0>, \"level\": \"<simple|medium|complex|expert>\", \"factors\": [\"factor1\", \"factor2\"]}
";

/// Strong signals of multi-step or statistical reasoning: +0.08 each.
const COMPLEX_WORDS: &[&str] = &[
    "why", "cause", "because", "explain why", "reason",
    "compare", "correlation", "regression", "statistical",
    "forecast", "predict", "causal", "hypothesis",
    "multi", "across", "segment", "cohort", "attribution",
    "counterfactual", "confound", "a/b test", "significance",
];

/// Ordinary analysis vocabulary: +0.04 each.
const MEDIUM_WORDS: &[&str] = &[
    "trend", "breakdown", "by region", "by segment", "over time",
    "growth", "change", "vs", "versus", "top", "bottom", "rank",
    "percentage", "ratio", "average", "group by",
];

/// Map a raw score to its level using the configured cutoffs.
pub fn bucket(score: f64, routing: &RoutingConfig) -> ComplexityLevel {
    if score <= routing.complexity_simple_max {
        ComplexityLevel::Simple
    } else if score <= routing.complexity_medium_max {
        ComplexityLevel::Medium
    } else if score <= routing.complexity_complex_max {
        ComplexityLevel::Complex
    } else {
        ComplexityLevel::Expert
    }
}

/// Zero-dependency complexity estimate: keyword hits plus a length bonus on
/// a 0.2 baseline, capped at 1.0.
pub fn heuristic_complexity(query: &str, routing: &RoutingConfig) -> (f64, ComplexityLevel) {
    let q = query.to_lowercase();
    let mut score = 0.2;

    score += 0.08 * COMPLEX_WORDS.iter().filter(|w| q.contains(**w)).count() as f64;
    score += 0.04 * MEDIUM_WORDS.iter().filter(|w| q.contains(**w)).count() as f64;

    let words = query.split_whitespace().count();
    if words > 50 {
        score += 0.10;
    } else if words > 25 {
        score += 0.05;
    }

    let score = score.min(1.0);
    (score, bucket(score, routing))
}

/// SLM-backed complexity scorer with the heuristic fallback built in.
pub struct SlmComplexityScorer {
    chat: SlmChatClient,
    model: String,
}

impl SlmComplexityScorer {
    pub fn new(chat: SlmChatClient, model: String) -> Self {
        Self { chat, model }
    }

    /// Score a query. Infallible: failures degrade to the heuristic.
    /// Returns (raw score, level, confidence).
    pub async fn score(
        &self,
        query: &str,
        routing: &RoutingConfig,
    ) -> (f64, ComplexityLevel, f64) {
        match self.primary(query, routing).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, fallback = "heuristic", "complexity scorer SLM call failed");
                let (score, level) = heuristic_complexity(query, routing);
                (score, level, HEURISTIC_CONFIDENCE)
            }
        }
    }

    async fn primary(
        &self,
        query: &str,
        routing: &RoutingConfig,
    ) -> anyhow::Result<(f64, ComplexityLevel, f64)> {
        let content = self
            .chat
            .chat(&self.model, COMPLEXITY_SYSTEM_PROMPT, query)
            .await?;

        let object = extract_json_object(&content)
            .ok_or_else(|| anyhow::anyhow!("no JSON object in reply: {:.200}", content))?;
        let data: Value = serde_json::from_str(object)?;

        let raw = data
            .get("score")
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow::anyhow!("reply missing score field"))?;
        let score = raw.clamp(0.0, 1.0);

        Ok((score, bucket(score, routing), SLM_CONFIDENCE))
    }
}
