//! The routing decision tree — a pure function from classification to tier.
//!
//! Rules are evaluated top-down, first match wins. The first rule is the
//! safety gate: regulated data never leaves the premises, regardless of
//! classifier confidence, forced-tier overrides, or anything the cache
//! claims. Model selection is a separate per-tier lookup so the tree stays
//! oblivious to model names.

use crate::config::RoutingConfig;
use crate::models::{ComplexityLevel, InferenceTier, IntentLabel, SensitivityLevel};

/// Decide which tier should answer. Returns (tier, routing reason).
pub fn determine_tier(
    complexity: ComplexityLevel,
    sensitivity: SensitivityLevel,
    intent_confidence: f64,
    complexity_score: f64,
    routing: &RoutingConfig,
) -> (InferenceTier, String) {
    // Safety gate: regulated data cannot go to cloud or edge.
    if sensitivity.is_regulated() {
        if complexity == ComplexityLevel::Expert {
            return (
                InferenceTier::Rlm,
                format!("RLM local (sensitivity={sensitivity}, complexity=expert)"),
            );
        }
        return (
            InferenceTier::Slm,
            format!("Local SLM enforced (sensitivity={sensitivity})"),
        );
    }

    // Unsure what the query even asks for — escalate to cloud.
    if intent_confidence < routing.confidence_threshold {
        return (
            InferenceTier::Cloud,
            format!("Escalated: low intent confidence ({intent_confidence:.2})"),
        );
    }

    if complexity == ComplexityLevel::Simple && complexity_score <= routing.complexity_simple_max {
        return (
            InferenceTier::Edge,
            "Edge: simple query, high confidence".to_string(),
        );
    }

    if matches!(complexity, ComplexityLevel::Simple | ComplexityLevel::Medium) {
        return (
            InferenceTier::Cloud,
            format!("Cloud LLM: complexity={complexity}"),
        );
    }

    if complexity == ComplexityLevel::Complex {
        return (
            InferenceTier::Cloud,
            "Cloud LLM: complex query (no reasoning chain needed)".to_string(),
        );
    }

    (
        InferenceTier::Rlm,
        format!("RLM: expert complexity (score={complexity_score:.2})"),
    )
}

/// Pick the concrete model within a tier for the given intent.
pub fn select_model(routing: &RoutingConfig, tier: InferenceTier, intent: IntentLabel) -> String {
    routing.models.for_tier(tier).select(intent).to_string()
}

/// Published latency budget for a tier.
pub fn latency_budget_ms(routing: &RoutingConfig, tier: InferenceTier) -> u64 {
    routing.latency_budgets_ms.for_tier(tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routing() -> RoutingConfig {
        RoutingConfig::default()
    }

    const ALL_COMPLEXITIES: [ComplexityLevel; 4] = [
        ComplexityLevel::Simple,
        ComplexityLevel::Medium,
        ComplexityLevel::Complex,
        ComplexityLevel::Expert,
    ];

    // -----------------------------------------------------------------------
    // Safety gate
    // -----------------------------------------------------------------------

    #[test]
    fn restricted_data_never_leaves_the_premises() {
        for complexity in ALL_COMPLEXITIES {
            let (tier, _) = determine_tier(
                complexity,
                SensitivityLevel::Restricted,
                0.99,
                0.1,
                &routing(),
            );
            assert!(
                matches!(tier, InferenceTier::Slm | InferenceTier::Rlm),
                "restricted data routed to {tier} for {complexity}"
            );
        }
    }

    #[test]
    fn confidential_data_never_leaves_the_premises() {
        for complexity in ALL_COMPLEXITIES {
            let (tier, _) = determine_tier(
                complexity,
                SensitivityLevel::Confidential,
                0.99,
                0.1,
                &routing(),
            );
            assert!(matches!(tier, InferenceTier::Slm | InferenceTier::Rlm));
        }
    }

    #[test]
    fn regulated_expert_goes_to_local_reasoning_model() {
        let (tier, reason) = determine_tier(
            ComplexityLevel::Expert,
            SensitivityLevel::Restricted,
            0.95,
            0.92,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Rlm);
        assert!(reason.contains("restricted"));
        assert!(reason.contains("expert"));
    }

    #[test]
    fn safety_gate_ignores_low_intent_confidence() {
        // Low confidence would normally escalate to cloud — the gate wins.
        let (tier, _) = determine_tier(
            ComplexityLevel::Simple,
            SensitivityLevel::Confidential,
            0.10,
            0.1,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Slm);
    }

    // -----------------------------------------------------------------------
    // Confidence escalation
    // -----------------------------------------------------------------------

    #[test]
    fn low_intent_confidence_escalates_to_cloud() {
        let (tier, reason) = determine_tier(
            ComplexityLevel::Simple,
            SensitivityLevel::Public,
            0.60,
            0.2,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Cloud);
        assert!(reason.to_lowercase().contains("confidence"));
    }

    #[test]
    fn confidence_exactly_at_threshold_does_not_escalate() {
        let (tier, _) = determine_tier(
            ComplexityLevel::Simple,
            SensitivityLevel::Public,
            0.85,
            0.2,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Edge);
    }

    // -----------------------------------------------------------------------
    // Complexity ladder
    // -----------------------------------------------------------------------

    #[test]
    fn simple_public_low_score_routes_edge() {
        let (tier, reason) = determine_tier(
            ComplexityLevel::Simple,
            SensitivityLevel::Public,
            0.95,
            0.2,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Edge);
        assert!(reason.to_lowercase().contains("simple") || reason.to_lowercase().contains("edge"));
    }

    #[test]
    fn simple_with_score_above_edge_cutoff_routes_cloud() {
        let mut r = routing();
        r.complexity_simple_max = 0.35;
        // Level simple but score just above the edge cutoff
        let (tier, _) = determine_tier(
            ComplexityLevel::Simple,
            SensitivityLevel::Public,
            0.95,
            0.36,
            &r,
        );
        assert_eq!(tier, InferenceTier::Cloud);
    }

    #[test]
    fn medium_public_routes_cloud() {
        let (tier, _) = determine_tier(
            ComplexityLevel::Medium,
            SensitivityLevel::Public,
            0.90,
            0.55,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Cloud);
    }

    #[test]
    fn complex_public_routes_cloud() {
        let (tier, _) = determine_tier(
            ComplexityLevel::Complex,
            SensitivityLevel::Public,
            0.90,
            0.75,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Cloud);
    }

    #[test]
    fn expert_public_routes_rlm() {
        let (tier, _) = determine_tier(
            ComplexityLevel::Expert,
            SensitivityLevel::Public,
            0.92,
            0.92,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Rlm);
    }

    #[test]
    fn internal_sensitivity_is_not_gated() {
        let (tier, _) = determine_tier(
            ComplexityLevel::Medium,
            SensitivityLevel::Internal,
            0.90,
            0.5,
            &routing(),
        );
        assert_eq!(tier, InferenceTier::Cloud);
    }

    // -----------------------------------------------------------------------
    // Model selection + budgets
    // -----------------------------------------------------------------------

    #[test]
    fn select_model_honours_intent_overrides() {
        let mut r = routing();
        r.models
            .cloud
            .by_intent
            .insert(IntentLabel::Sql, "codestral:22b".into());
        assert_eq!(select_model(&r, InferenceTier::Cloud, IntentLabel::Sql), "codestral:22b");
        assert_eq!(
            select_model(&r, InferenceTier::Cloud, IntentLabel::Report),
            r.models.cloud.default
        );
    }

    #[test]
    fn latency_budget_follows_configuration() {
        let r = routing();
        assert_eq!(latency_budget_ms(&r, InferenceTier::Edge), 100);
        assert_eq!(latency_budget_ms(&r, InferenceTier::Slm), 500);
        assert_eq!(latency_budget_ms(&r, InferenceTier::Cloud), 5_000);
        assert_eq!(latency_budget_ms(&r, InferenceTier::Rlm), 60_000);
    }
}
