// SPDX-License-Identifier: Apache-2.0

//! Value types produced and consumed by the security gate.

use serde::{Deserialize, Serialize};

/// Risk classification for a SQL statement.
///
/// Ordered: a higher level never yields a more permissive decision than a
/// lower one for the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Safe,
    Warning,
    Dangerous,
    Blocked,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Safe => "safe",
            SecurityLevel::Warning => "warning",
            SecurityLevel::Dangerous => "dangerous",
            SecurityLevel::Blocked => "blocked",
        }
    }
}

/// PII detection outcome for a SQL statement.
///
/// `Blocked` is reserved for stricter policies (role-based denial); the
/// default policy only ever emits `None` or `Detected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PiiFlag {
    None,
    Detected,
    Blocked,
}

impl Default for PiiFlag {
    fn default() -> Self {
        Self::None
    }
}

/// Result of a security gate evaluation.
///
/// Created once per SQL string, never mutated. `is_safe` is derived from
/// `level` against the configured block threshold at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityCheck {
    /// Overall risk classification
    pub level: SecurityLevel,
    /// PII detection outcome
    #[serde(default)]
    pub pii_flag: PiiFlag,
    /// Tags of blocking rules that matched, in rule-declaration order
    pub blocked_operations: Vec<String>,
    /// Human-readable warnings from warning-class rules
    pub warnings: Vec<String>,
    /// Heuristic structural cost (not an execution-plan cost)
    pub estimated_cost: u32,
    /// Whether the statement may proceed to execution
    pub is_safe: bool,
}
