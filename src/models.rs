//! Wire and domain types shared across the gateway.
//!
//! Everything here is a plain data carrier: the routing logic lives in
//! [`crate::decision`] and [`crate::router`], the policy logic in
//! [`crate::auth`]. Enum wire casing matches the platform contract — intents
//! are UPPERCASE, everything else lowercase.

use serde::{Deserialize, Serialize};

/// Maximum accepted query length in characters.
pub const MAX_QUERY_CHARS: usize = 32_000;

/// What kind of work the user wants performed (12-way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentLabel {
    Eda,
    Sql,
    Forecast,
    Anomaly,
    Report,
    Visualise,
    Clean,
    Model,
    Explain,
    Search,
    Code,
    General,
}

impl IntentLabel {
    /// Parse a label case-insensitively, as SLM replies are not reliable
    /// about casing.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_uppercase().as_str() {
            "EDA" => Self::Eda,
            "SQL" => Self::Sql,
            "FORECAST" => Self::Forecast,
            "ANOMALY" => Self::Anomaly,
            "REPORT" => Self::Report,
            "VISUALISE" => Self::Visualise,
            "CLEAN" => Self::Clean,
            "MODEL" => Self::Model,
            "EXPLAIN" => Self::Explain,
            "SEARCH" => Self::Search,
            "CODE" => Self::Code,
            "GENERAL" => Self::General,
            _ => return None,
        })
    }
}

impl std::fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Eda => "EDA",
            Self::Sql => "SQL",
            Self::Forecast => "FORECAST",
            Self::Anomaly => "ANOMALY",
            Self::Report => "REPORT",
            Self::Visualise => "VISUALISE",
            Self::Clean => "CLEAN",
            Self::Model => "MODEL",
            Self::Explain => "EXPLAIN",
            Self::Search => "SEARCH",
            Self::Code => "CODE",
            Self::General => "GENERAL",
        })
    }
}

/// Estimated cognitive difficulty of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    Medium,
    Complex,
    Expert,
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
            Self::Expert => "expert",
        })
    }
}

/// Regulatory class of the data a query touches.
///
/// Variant order is the severity order, so `Ord` gives the rank directly:
/// `Public < Internal < Confidential < Restricted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl SensitivityLevel {
    /// Regulated data must never leave the premises.
    pub fn is_regulated(self) -> bool {
        matches!(self, Self::Confidential | Self::Restricted)
    }
}

impl std::fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        })
    }
}

/// One of the four inference backends, distinguished by latency budget and
/// privacy posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceTier {
    /// In-browser / edge micro-model.
    Edge,
    /// Local small language model.
    Slm,
    /// Hosted frontier model.
    Cloud,
    /// Local reasoning model.
    Rlm,
}

impl InferenceTier {
    /// Off-premises tiers, forbidden for regulated data.
    pub fn is_off_premises(self) -> bool {
        matches!(self, Self::Edge | Self::Cloud)
    }
}

impl std::fmt::Display for InferenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Edge => "edge",
            Self::Slm => "slm",
            Self::Cloud => "cloud",
            Self::Rlm => "rlm",
        })
    }
}

// ---------------------------------------------------------------------------
// Routing request / response
// ---------------------------------------------------------------------------

/// Body of `POST /route` and `POST /classify`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteRequest {
    pub query: String,
    pub tenant_id: String,
    #[serde(default)]
    pub context_tokens: u32,
    /// Admin/testing override. The safety gate still applies.
    #[serde(default)]
    pub force_tier: Option<InferenceTier>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Full three-axis classification of a query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Classification {
    pub intent: IntentLabel,
    pub intent_confidence: f64,
    pub complexity: ComplexityLevel,
    pub complexity_confidence: f64,
    pub sensitivity: SensitivityLevel,
    pub sensitivity_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// The routing verdict returned to callers and stored in the decision cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteDecision {
    pub tier: InferenceTier,
    /// Exact model name the caller should invoke.
    pub model: String,
    pub intent: IntentLabel,
    pub complexity: ComplexityLevel,
    pub sensitivity: SensitivityLevel,
    /// min(intent, complexity, sensitivity) confidence.
    pub confidence: f64,
    pub latency_budget_ms: u64,
    pub routing_reason: String,
    pub classification: Classification,
    #[serde(default)]
    pub cached: bool,
}

// ---------------------------------------------------------------------------
// Auth: roles, claims, login
// ---------------------------------------------------------------------------

/// Platform roles used in token claims and ABAC decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Analyst,
    DataScientist,
    Viewer,
    /// Data Protection Officer.
    Dpo,
    /// Digital-worker service account.
    Worker,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::Analyst => "analyst",
            Self::DataScientist => "data_scientist",
            Self::Viewer => "viewer",
            Self::Dpo => "dpo",
            Self::Worker => "worker",
        })
    }
}

/// Actions a role may perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
    Execute,
    Admin,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Execute => "execute",
            Self::Admin => "admin",
        })
    }
}

/// Signed token claims. The email never appears in clear — only the
/// tenant-scoped HMAC pseudonym.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenClaims {
    /// User id.
    pub sub: String,
    pub tenant_id: String,
    pub role: UserRole,
    /// HMAC-SHA256 pseudonym, 32 hex chars.
    pub email_hash: String,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Not-before, Unix seconds.
    pub nbf: i64,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Signing key id.
    pub kid: String,
    /// Token id, addresses the revocation entry.
    pub jti: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub tenant_slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until expiry.
    pub expires_in: i64,
    pub tenant_id: String,
    pub role: UserRole,
}

// ---------------------------------------------------------------------------
// ABAC
// ---------------------------------------------------------------------------

/// One access-control question: may `role` perform `action` on this resource?
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbacRequest {
    pub user_id: String,
    pub tenant_id: String,
    pub role: UserRole,
    pub action: Action,
    /// Open set: dataset, model, notebook, dashboard, report, worker, gdpr,
    /// audit_log, dsr, …
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default = "default_sensitivity")]
    pub resource_sensitivity: SensitivityLevel,
    #[serde(default)]
    pub column_names: Vec<String>,
}

fn default_sensitivity() -> SensitivityLevel {
    SensitivityLevel::Public
}

/// Allow/deny plus the column partition for allowed reads.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbacDecision {
    pub allowed: bool,
    pub reason: String,
    /// Columns the caller must not see in clear.
    #[serde(default)]
    pub masked_columns: Vec<String>,
    /// Columns the caller may see.
    #[serde(default)]
    pub allowed_columns: Vec<String>,
}
