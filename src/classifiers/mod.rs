//! Classifier capabilities and their implementations.
//!
//! Each capability is an enum over concrete implementations, chosen once at
//! wiring time — the router only ever sees the enum. Adding a variant (a
//! different prompt, model, or backend) extends the enum and the wiring,
//! never the router.

mod complexity;
mod intent;
mod sensitivity;
mod slm;

pub use complexity::{bucket, heuristic_complexity, SlmComplexityScorer, HEURISTIC_CONFIDENCE, SLM_CONFIDENCE};
pub use intent::{rule_based_intent, SlmIntentClassifier, RULE_CONFIDENCE, RULE_DEFAULT_CONFIDENCE};
pub use sensitivity::SensitivityDetector;
pub use slm::{extract_json_object, SlmChatClient};

use crate::config::RoutingConfig;
use crate::models::{ComplexityLevel, IntentLabel};

/// Intent capability: `classify(query) → (label, confidence)`.
pub enum IntentClassifier {
    /// Small-model backend with the rule-based fallback built in.
    Slm(SlmIntentClassifier),
    /// Keyword rules only — no network.
    Rules,
    /// Deterministic wiring double; returns the same verdict for every query.
    Fixed(IntentLabel, f64),
}

impl IntentClassifier {
    pub async fn classify(&self, query: &str) -> (IntentLabel, f64) {
        match self {
            Self::Slm(classifier) => classifier.classify(query).await,
            Self::Rules => rule_based_intent(query),
            Self::Fixed(label, confidence) => (*label, *confidence),
        }
    }
}

/// Complexity capability: `score(query) → (raw score, level, confidence)`.
pub enum ComplexityScorer {
    /// Small-model backend with the heuristic fallback built in.
    Slm(SlmComplexityScorer),
    /// Keyword heuristic only — no network.
    Heuristic,
    /// Deterministic wiring double; the level is still bucketed from the
    /// score so the consistency invariant holds.
    Fixed(f64, f64),
}

impl ComplexityScorer {
    pub async fn score(
        &self,
        query: &str,
        routing: &RoutingConfig,
    ) -> (f64, ComplexityLevel, f64) {
        match self {
            Self::Slm(scorer) => scorer.score(query, routing).await,
            Self::Heuristic => {
                let (score, level) = heuristic_complexity(query, routing);
                (score, level, HEURISTIC_CONFIDENCE)
            }
            Self::Fixed(score, confidence) => (*score, bucket(*score, routing), *confidence),
        }
    }
}
