// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL executor.
//!
//! Implements [`QueryExecutor`] over a SQLx connection pool. Each call
//! acquires one pooled connection for its duration and releases it on
//! every exit path. The statement timeout is set per call with
//! `SET LOCAL` inside a transaction, so the engine itself aborts an
//! over-deadline statement; no watchdog thread is involved.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as SqlxRow};
use tracing::{debug, error, warn};

use super::{ExecutorError, ExecutorResult, QueryExecutor, QueryResult, Row};

/// SQLSTATE raised when `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    /// Connect a pool to the given database URL.
    pub async fn connect(database_url: &str) -> ExecutorResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| ExecutorError::connection_failed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, shared pools).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_error(e: sqlx::Error, timeout: Duration) -> ExecutorError {
        match &e {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                if code == QUERY_CANCELED {
                    ExecutorError::Timeout { timeout_ms: timeout.as_millis() as u64 }
                } else if code.starts_with("42") {
                    // Class 42: syntax error or access rule violation
                    ExecutorError::syntax_error(db.message().to_string())
                } else {
                    ExecutorError::execution_failed(db.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ExecutorError::connection_failed(e.to_string())
            }
            _ => ExecutorError::execution_failed(e.to_string()),
        }
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(
        &self,
        sql: &str,
        timeout: Duration,
        max_rows: u64,
    ) -> ExecutorResult<QueryResult> {
        let start = Instant::now();

        // A transaction scopes SET LOCAL so the timeout never leaks into
        // the pooled connection's next borrower.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::map_error(e, timeout))?;

        let set_timeout = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_error(e, timeout))?;

        let rows = sqlx::query(sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                error!(error = %e, "query execution failed");
                Self::map_error(e, timeout)
            })?;

        tx.commit().await.map_err(|e| Self::map_error(e, timeout))?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let fetched = rows.len() as u64;
        let capped = fetched.min(max_rows) as usize;
        if (fetched as usize) > capped {
            warn!(fetched, max_rows, "row ceiling reached, truncating result");
        }

        let data: Vec<Row> = rows[..capped].iter().map(convert_row).collect();
        let execution_time_ms = start.elapsed().as_millis() as u64;
        debug!(rows = data.len(), execution_time_ms, "query executed");

        Ok(QueryResult {
            row_count: data.len() as u64,
            data,
            columns,
            execution_time_ms,
            sql: sql.to_string(),
        })
    }

    async fn validate_syntax(&self, sql: &str) -> ExecutorResult<bool> {
        let explain = format!("EXPLAIN {}", sql);
        match sqlx::query(&explain).fetch_all(&self.pool).await {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(_)) => Ok(false),
            Err(e) => Err(Self::map_error(e, Duration::ZERO)),
        }
    }

    async fn test_connection(&self) -> ExecutorResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ExecutorError::connection_failed(e.to_string()))
    }
}

/// Convert a SQLx row to an ordered column→JSON mapping. Values are
/// extracted with a typed fallback chain; anything unrecognized becomes a
/// null rather than an error.
fn convert_row(row: &PgRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        out.insert(column.name().to_string(), extract_value(row, column.ordinal()));
    }
    out
}

fn extract_value(row: &PgRow, idx: usize) -> serde_json::Value {
    use serde_json::Value;

    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|f| Value::from(f as f64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return v.map(|dt| Value::from(dt.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        return v.map(|d| Value::from(d.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
        return v.unwrap_or(Value::Null);
    }

    serde_json::Value::Null
}
