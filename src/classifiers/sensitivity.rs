//! Sensitivity detection — which regulatory class does the query touch?
//!
//! Rule-based only: no network call, deterministic, auditable, and
//! sub-millisecond. This is deliberate — the safety gate in the decision
//! tree depends on this classifier, so it must keep working when every
//! model backend is down.
//!
//! Decision order, first match wins:
//! 1. PII patterns in the query text → restricted
//! 2. restricted keywords → restricted
//! 3. confidential keywords → confidential
//! 4. internal keywords → internal
//! 5. otherwise public

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::models::SensitivityLevel;

/// Lightweight PII patterns: email, NANP-style phone, US SSN, Visa and
/// Mastercard numbers, passport-like identifiers.
static PII_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b",
        r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
        r"\b\d{3}-\d{2}-\d{4}\b",
        r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14})\b",
        r"\b[A-Z]{2}\d{6}[A-Z]\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("PII pattern must compile"))
    .collect()
});

const RESTRICTED_KEYWORDS: &[&str] = &[
    "ssn", "social security", "passport", "credit card", "bank account",
    "national insurance", "ni number", "medical record", "diagnosis",
    "prescription", "patient", "salary", "payroll", "compensation",
    "personal email", "home address", "date of birth", "dob",
];

const CONFIDENTIAL_KEYWORDS: &[&str] = &[
    "employee", "staff", "hr data", "performance review", "disciplinary",
    "financial report", "revenue", "profit", "margin", "ebitda",
    "customer pii", "user data", "personal data", "private", "confidential",
    "internal only", "trade secret", "ip address", "access log",
];

const INTERNAL_KEYWORDS: &[&str] = &[
    "internal", "company data", "proprietary", "non-public",
    "customer list", "vendor", "contract",
];

/// Rule-based sensitivity detector. Stateless; constructible anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensitivityDetector;

impl SensitivityDetector {
    /// Classify a query. Returns (level, confidence).
    pub fn detect(&self, query: &str) -> (SensitivityLevel, f64) {
        for pattern in PII_PATTERNS.iter() {
            if pattern.is_match(query) {
                warn!(pattern = &pattern.as_str()[..pattern.as_str().len().min(30)],
                      "PII pattern matched in query text");
                return (SensitivityLevel::Restricted, 0.98);
            }
        }

        let q = query.to_lowercase();

        if RESTRICTED_KEYWORDS.iter().any(|kw| q.contains(kw)) {
            return (SensitivityLevel::Restricted, 0.90);
        }
        if CONFIDENTIAL_KEYWORDS.iter().any(|kw| q.contains(kw)) {
            return (SensitivityLevel::Confidential, 0.82);
        }
        if INTERNAL_KEYWORDS.iter().any(|kw| q.contains(kw)) {
            return (SensitivityLevel::Internal, 0.75);
        }

        (SensitivityLevel::Public, 0.88)
    }
}
