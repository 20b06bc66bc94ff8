// SPDX-License-Identifier: Apache-2.0

//! Execution governor and executor boundary.
//!
//! The governor enforces the statement timeout and row ceiling and
//! surfaces executor failures as typed errors. The database itself sits
//! behind the [`QueryExecutor`] trait; whether one is configured at all is
//! an explicit capability variant, not a nullable field.

pub mod postgres;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Typed executor failure. Never a crash, never silent truncation.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("statement timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("syntax error: {message}")]
    SyntaxError { message: String },

    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("no database executor is configured")]
    NotConfigured,
}

impl ExecutorError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError { message: msg.into() }
    }

    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed { message: msg.into() }
    }

    /// User-safe category text; the detailed message stays in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "query timed out, try a simpler question",
            Self::ConnectionFailed { .. } => "database temporarily unavailable",
            Self::SyntaxError { .. } => "the generated query could not be executed",
            Self::ExecutionFailed { .. } => "query execution failed",
            Self::NotConfigured => "no database is configured",
        }
    }
}

/// Result alias for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// One row as an ordered column→value mapping.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Result of an executed query. Column order is preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Row>,
    pub columns: Vec<String>,
    pub row_count: u64,
    pub execution_time_ms: u64,
    /// The SQL actually run (post-sanitization)
    pub sql: String,
}

/// Boundary to the database. One connection (or equivalent handle) is
/// acquired per call and released on every exit path; cancellation of an
/// over-deadline statement is delegated to the engine's native timeout.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement under a timeout and row ceiling.
    async fn execute(
        &self,
        sql: &str,
        timeout: Duration,
        max_rows: u64,
    ) -> ExecutorResult<QueryResult>;

    /// Check the statement is plannable without materializing results.
    async fn validate_syntax(&self, sql: &str) -> ExecutorResult<bool>;

    /// Verify the backing connection is alive.
    async fn test_connection(&self) -> ExecutorResult<()>;
}

/// Whether a real executor is available. Call sites must handle both
/// branches explicitly; there is no optional field to null-check.
#[derive(Clone)]
pub enum ExecutorHandle {
    Configured(Arc<dyn QueryExecutor>),
    Unconfigured,
}

/// Enforces the configured timeout and row ceiling around the executor.
pub struct ExecutionGovernor {
    handle: ExecutorHandle,
    timeout: Duration,
    max_rows: u64,
}

impl ExecutionGovernor {
    pub fn new(handle: ExecutorHandle, timeout_seconds: u64, max_rows: u64) -> Self {
        match &handle {
            ExecutorHandle::Configured(_) => debug!("execution governor using configured executor"),
            ExecutorHandle::Unconfigured => {
                info!("no executor configured, running in demo mode");
            }
        }

        Self {
            handle,
            timeout: Duration::from_secs(timeout_seconds),
            max_rows,
        }
    }

    /// Run an approved, sanitized statement.
    pub async fn run(&self, sql: &str, max_rows: Option<u64>) -> ExecutorResult<QueryResult> {
        let max_rows = max_rows.unwrap_or(self.max_rows).min(self.max_rows);

        match &self.handle {
            ExecutorHandle::Configured(executor) => {
                executor.execute(sql, self.timeout, max_rows).await
            }
            ExecutorHandle::Unconfigured => Ok(demo_result(sql)),
        }
    }

    /// Syntax-only validation; in demo mode only the SELECT prefix is
    /// checked, matching what the gate already enforced.
    pub async fn validate_syntax(&self, sql: &str) -> ExecutorResult<bool> {
        match &self.handle {
            ExecutorHandle::Configured(executor) => executor.validate_syntax(sql).await,
            ExecutorHandle::Unconfigured => {
                Ok(crate::gate::sanitize::starts_with_select(sql))
            }
        }
    }

    /// Whether a live database connection is available.
    pub async fn test_connection(&self) -> bool {
        match &self.handle {
            ExecutorHandle::Configured(executor) => executor.test_connection().await.is_ok(),
            ExecutorHandle::Unconfigured => false,
        }
    }
}

/// Demo-mode result: no data, but the column list extracted from the
/// SELECT clause so callers can render a shape.
fn demo_result(sql: &str) -> QueryResult {
    let columns = extract_columns(sql);
    QueryResult {
        data: Vec::new(),
        columns,
        row_count: 0,
        execution_time_ms: 0,
        sql: sql.to_string(),
    }
}

fn select_clause() -> &'static Regex {
    static SELECT: OnceLock<Regex> = OnceLock::new();
    SELECT.get_or_init(|| Regex::new(r"(?is)SELECT\s+(.*?)\s+FROM").unwrap())
}

fn alias_suffix() -> &'static Regex {
    static ALIAS: OnceLock<Regex> = OnceLock::new();
    ALIAS.get_or_init(|| Regex::new(r"(?i)\s+AS\s+(\w+)\s*$").unwrap())
}

/// Best-effort column name extraction from the SELECT list. Aliases win;
/// bare function calls fall back to the function name.
fn extract_columns(sql: &str) -> Vec<String> {
    let Some(captures) = select_clause().captures(sql) else {
        return vec!["column1".to_string()];
    };

    let mut columns = Vec::new();
    for raw in captures[1].split(',') {
        let item = raw.trim();
        if item.is_empty() {
            continue;
        }

        let name = if let Some(captures) = alias_suffix().captures(item) {
            captures[1].to_string()
        } else if let Some(paren) = item.find('(') {
            item[..paren].trim().to_string()
        } else {
            item.to_string()
        };

        if !name.is_empty() && !columns.contains(&name) {
            columns.push(name);
        }
    }

    if columns.is_empty() {
        columns.push("column1".to_string());
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_run_returns_demo_shape() {
        let governor = ExecutionGovernor::new(ExecutorHandle::Unconfigured, 30, 1000);
        let result = governor
            .run("SELECT order_id, SUM(revenue) AS total FROM sales", None)
            .await
            .unwrap();
        assert_eq!(result.row_count, 0);
        assert_eq!(result.columns, vec!["order_id", "total"]);
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_syntax_check() {
        let governor = ExecutionGovernor::new(ExecutorHandle::Unconfigured, 30, 1000);
        assert!(governor.validate_syntax("SELECT 1").await.unwrap());
        assert!(!governor.validate_syntax("DELETE FROM t").await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfigured_connection_is_down() {
        let governor = ExecutionGovernor::new(ExecutorHandle::Unconfigured, 30, 1000);
        assert!(!governor.test_connection().await);
    }

    #[test]
    fn test_extract_columns_plain_and_function() {
        assert_eq!(extract_columns("SELECT a, b FROM t"), vec!["a", "b"]);
        assert_eq!(extract_columns("SELECT COUNT(*) FROM t"), vec!["COUNT"]);
        assert_eq!(
            extract_columns("SELECT SUM(x) AS total, y FROM t"),
            vec!["total", "y"]
        );
    }

    #[test]
    fn test_extract_columns_fallback() {
        assert_eq!(extract_columns("nonsense"), vec!["column1"]);
    }

    #[test]
    fn test_user_messages_are_categorized() {
        let err = ExecutorError::Timeout { timeout_ms: 30_000 };
        assert_eq!(err.user_message(), "query timed out, try a simpler question");
        assert!(ExecutorError::connection_failed("secret host")
            .user_message()
            .contains("unavailable"));
    }

    #[tokio::test]
    async fn test_row_ceiling_clamped_to_governor_max() {
        // The caller may lower the ceiling but never raise it.
        struct Probe;
        #[async_trait]
        impl QueryExecutor for Probe {
            async fn execute(
                &self,
                sql: &str,
                _timeout: Duration,
                max_rows: u64,
            ) -> ExecutorResult<QueryResult> {
                Ok(QueryResult {
                    data: Vec::new(),
                    columns: Vec::new(),
                    row_count: max_rows,
                    execution_time_ms: 0,
                    sql: sql.to_string(),
                })
            }
            async fn validate_syntax(&self, _sql: &str) -> ExecutorResult<bool> {
                Ok(true)
            }
            async fn test_connection(&self) -> ExecutorResult<()> {
                Ok(())
            }
        }

        let governor =
            ExecutionGovernor::new(ExecutorHandle::Configured(Arc::new(Probe)), 30, 100);
        let lowered = governor.run("SELECT 1", Some(10)).await.unwrap();
        assert_eq!(lowered.row_count, 10);
        let raised = governor.run("SELECT 1", Some(10_000)).await.unwrap();
        assert_eq!(raised.row_count, 100);
    }
}
