// SPDX-License-Identifier: Apache-2.0

//! Crate-level error taxonomy.
//!
//! Gate, validator, and sanitizer outcomes are deterministic results,
//! never unexpected panics. Executor failures are the only class that is
//! translated before reaching an end user: `user_message` gives the
//! categorized, safe text while `Display` keeps the original for logs.

use thiserror::Error;

use crate::executor::ExecutorError;
use crate::gate::types::SecurityCheck;

/// Unified error type for the query pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The SQL failed the security gate. Carries the full verdict so the
    /// caller can explain which operation, PII column, or cost tripped it.
    #[error("query denied by security gate: level {}", .check.level.as_str())]
    PolicyViolation { check: SecurityCheck },

    /// The SQL does not start with SELECT or cannot be scanned.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// Table-access validation found names outside the allow-list.
    /// Equivalent in severity to a BLOCKED verdict.
    #[error("unauthorized tables referenced: {}", .tables.join(", "))]
    UnauthorizedTable { tables: Vec<String> },

    /// The executor failed on a query that passed the gate.
    #[error(transparent)]
    Execution(#[from] ExecutorError),

    /// Fatal startup error: glossary, settings, or rule set failed to
    /// load. The process must fail closed, not open.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl QueryError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput { message: msg.into() }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration { message: msg.into() }
    }

    /// Categorized message safe to surface to an end user. Never leaks
    /// internal executor error text.
    pub fn user_message(&self) -> String {
        match self {
            Self::PolicyViolation { check } => {
                if check.blocked_operations.is_empty() {
                    format!("query denied: risk level {}", check.level.as_str())
                } else {
                    format!(
                        "query denied: blocked operations ({})",
                        check.blocked_operations.join(", ")
                    )
                }
            }
            Self::MalformedInput { .. } => "only SELECT queries are supported".to_string(),
            Self::UnauthorizedTable { tables } => {
                format!("access to tables not permitted: {}", tables.join(", "))
            }
            Self::Execution(e) => e.user_message().to_string(),
            Self::Configuration { .. } => "service is not configured correctly".to_string(),
        }
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, QueryError>;
