//! ABAC policy engine — attribute-based access control.
//!
//! A stateless pure function over a denormalized allow matrix: anything not
//! listed is denied. On top of the action decision sits column-level
//! masking: each role has a sensitivity gate, and once a resource reaches
//! that gate, PII-looking column names are masked rather than the request
//! denied. Masking never turns an allow into a deny.
//!
//! Cross-tenant checks happen at the HTTP handler, before this engine runs.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::models::{AbacDecision, AbacRequest, Action, SensitivityLevel, UserRole};

/// Actions a role may take on a resource type. Admin is handled by the
/// wildcard in [`is_action_allowed`] and has no rows here.
fn role_permissions(role: UserRole, resource_type: &str) -> &'static [Action] {
    use Action::*;
    match (role, resource_type) {
        (UserRole::DataScientist, "dataset") => &[Read, Write],
        (UserRole::DataScientist, "model") => &[Read, Write, Execute],
        (UserRole::DataScientist, "notebook") => &[Read, Write, Execute],
        (UserRole::DataScientist, "dashboard") => &[Read, Write],
        (UserRole::DataScientist, "report") => &[Read],
        (UserRole::DataScientist, "worker") => &[Read],

        (UserRole::Analyst, "dataset") => &[Read],
        (UserRole::Analyst, "dashboard") => &[Read, Write],
        (UserRole::Analyst, "report") => &[Read],
        (UserRole::Analyst, "worker") => &[Read],

        (UserRole::Viewer, "dashboard") => &[Read],
        (UserRole::Viewer, "report") => &[Read],

        (UserRole::Dpo, "gdpr") => &[Read, Write, Execute],
        (UserRole::Dpo, "audit_log") => &[Read],
        (UserRole::Dpo, "dsr") => &[Read, Write, Execute],

        (UserRole::Worker, "dataset") => &[Read],
        (UserRole::Worker, "dashboard") => &[Read, Write],
        (UserRole::Worker, "report") => &[Read, Write],
        (UserRole::Worker, "model") => &[Read, Execute],

        _ => &[],
    }
}

fn is_action_allowed(role: UserRole, resource_type: &str, action: Action) -> bool {
    // Admin wildcard: every action on every resource in the same tenant.
    if role == UserRole::Admin {
        return true;
    }
    role_permissions(role, resource_type).contains(&action)
}

/// Column names containing any of these substrings are masked once the
/// resource sensitivity reaches the role's gate.
const PII_COLUMN_PATTERNS: &[&str] = &[
    "email", "phone", "address", "ssn", "passport", "dob", "birth",
    "salary", "income", "credit_card", "national_id", "ip_address",
    "name", "firstname", "lastname", "surname",
];

fn default_gate(role: UserRole) -> SensitivityLevel {
    match role {
        UserRole::Admin => SensitivityLevel::Restricted,
        UserRole::DataScientist => SensitivityLevel::Confidential,
        UserRole::Analyst => SensitivityLevel::Internal,
        UserRole::Viewer => SensitivityLevel::Public,
        // DPO sees PII — it is their job to handle subject requests.
        UserRole::Dpo => SensitivityLevel::Restricted,
        UserRole::Worker => SensitivityLevel::Confidential,
    }
}

const ALL_ROLES: [UserRole; 6] = [
    UserRole::Admin,
    UserRole::Analyst,
    UserRole::DataScientist,
    UserRole::Viewer,
    UserRole::Dpo,
    UserRole::Worker,
];

/// Evaluates policy only; holds nothing but the per-role column gates.
pub struct PolicyEngine {
    gates: HashMap<UserRole, SensitivityLevel>,
}

impl PolicyEngine {
    /// Engine with the compiled-in gates.
    pub fn new() -> Self {
        Self::with_gate_overrides(&HashMap::new())
    }

    /// Engine with per-role gate overrides from configuration; unknown role
    /// names are ignored.
    pub fn with_gate_overrides(overrides: &HashMap<String, SensitivityLevel>) -> Self {
        let mut gates = HashMap::new();
        for role in ALL_ROLES {
            let gate = overrides
                .get(&role.to_string())
                .copied()
                .unwrap_or_else(|| default_gate(role));
            gates.insert(role, gate);
        }
        Self { gates }
    }

    /// Evaluate one access question.
    pub fn evaluate(&self, req: &AbacRequest) -> AbacDecision {
        if !is_action_allowed(req.role, &req.resource_type, req.action) {
            let reason = format!(
                "Role '{}' is not permitted to '{}' on resource type '{}'",
                req.role, req.action, req.resource_type
            );
            info!(
                user_id = %req.user_id,
                tenant_id = %req.tenant_id,
                role = %req.role,
                action = %req.action,
                resource = %req.resource_type,
                "access denied"
            );
            return AbacDecision {
                allowed: false,
                reason,
                masked_columns: Vec::new(),
                allowed_columns: Vec::new(),
            };
        }

        let (masked, visible) = self.compute_column_masks(
            req.role,
            req.resource_sensitivity,
            &req.column_names,
        );

        let mut reason = format!(
            "Allowed: role='{}', action='{}', resource='{}'",
            req.role, req.action, req.resource_type
        );
        if !masked.is_empty() {
            reason.push_str(&format!(
                " | {} column(s) masked for sensitivity={}",
                masked.len(),
                req.resource_sensitivity
            ));
        }

        debug!(
            user_id = %req.user_id,
            role = %req.role,
            action = %req.action,
            masked_count = masked.len(),
            "access allowed"
        );

        AbacDecision {
            allowed: true,
            reason,
            masked_columns: masked,
            allowed_columns: visible,
        }
    }

    /// Partition columns into (masked, visible).
    fn compute_column_masks(
        &self,
        role: UserRole,
        resource_sensitivity: SensitivityLevel,
        column_names: &[String],
    ) -> (Vec<String>, Vec<String>) {
        if column_names.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let gate = self
            .gates
            .get(&role)
            .copied()
            .unwrap_or(SensitivityLevel::Public);
        if resource_sensitivity < gate {
            // Resource is below the role's gate — nothing to hide.
            return (Vec::new(), column_names.to_vec());
        }

        let mut masked = Vec::new();
        let mut visible = Vec::new();
        for col in column_names {
            let lower = col.to_lowercase();
            if PII_COLUMN_PATTERNS.iter().any(|pat| lower.contains(pat)) {
                masked.push(col.clone());
            } else {
                visible.push(col.clone());
            }
        }
        (masked, visible)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}
