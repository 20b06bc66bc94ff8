// SPDX-License-Identifier: Apache-2.0

//! Query pipeline.
//!
//! Orchestrates the guarded path from candidate SQL to rows:
//! non-SELECT reject → security gate → table-access validation →
//! sanitizer → execution governor, with one audit entry per attempt.
//! A failed check short-circuits and reports the verdict instead of
//! executing; there is no retry logic here.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditStore};
use crate::config::Settings;
use crate::error::{PipelineResult, QueryError};
use crate::executor::{ExecutionGovernor, ExecutorHandle, QueryResult};
use crate::gate::sanitize::{sanitize, starts_with_select};
use crate::gate::tables::validate_table_access;
use crate::gate::types::{PiiFlag, SecurityCheck, SecurityLevel};
use crate::gate::SecurityGate;
use crate::generator::{GeneratorHandle, QueryRequest};
use crate::glossary::GlossaryService;

/// The guarded query pipeline.
pub struct QueryPipeline {
    gate: SecurityGate,
    glossary: Arc<GlossaryService>,
    governor: ExecutionGovernor,
    generator: GeneratorHandle,
    audit: Arc<AuditStore>,
    settings: Settings,
}

impl QueryPipeline {
    pub fn new(
        glossary: Arc<GlossaryService>,
        settings: Settings,
        executor: ExecutorHandle,
        generator: GeneratorHandle,
    ) -> Result<Self, QueryError> {
        let gate = SecurityGate::new(Arc::clone(&glossary), &settings)?;
        let governor = ExecutionGovernor::new(
            executor,
            settings.query_timeout_seconds,
            settings.max_query_rows,
        );
        let audit = Arc::new(AuditStore::new(
            settings.audit_dir.clone(),
            settings.max_audit_entries,
        ));

        Ok(Self {
            gate,
            glossary,
            governor,
            generator,
            audit,
            settings,
        })
    }

    /// Evaluate candidate SQL without executing it. Pure.
    pub fn check_query_security(&self, sql: &str, user_role: &str) -> SecurityCheck {
        self.gate.check(sql, user_role)
    }

    /// Execute SQL that has already passed the gate: table validation,
    /// sanitization, then the governor.
    pub async fn execute_query(
        &self,
        sql: &str,
        max_rows: Option<u64>,
    ) -> PipelineResult<QueryResult> {
        let permissions = self.glossary.permissions();
        let unauthorized = validate_table_access(sql, permissions.permitted_tables());
        if !unauthorized.is_empty() {
            warn!(tables = ?unauthorized, "unauthorized table access denied");
            return Err(QueryError::UnauthorizedTable { tables: unauthorized });
        }

        let sanitized = sanitize(
            sql,
            self.settings.limit_cost_threshold,
            self.settings.default_row_cap,
        )?;

        Ok(self.governor.run(&sanitized, max_rows).await?)
    }

    /// Full guarded path for one candidate SQL string. Every attempt is
    /// audited, whether it executes or is denied.
    pub async fn handle(
        &self,
        request: &QueryRequest,
        sql: &str,
    ) -> PipelineResult<QueryResult> {
        // Structural requirement first, before any pattern matching runs.
        if !starts_with_select(sql) {
            let check = SecurityCheck {
                level: SecurityLevel::Blocked,
                pii_flag: PiiFlag::None,
                blocked_operations: vec!["non_select".to_string()],
                warnings: Vec::new(),
                estimated_cost: 0,
                is_safe: false,
            };
            self.record(request, sql, check, None, Some("not a SELECT statement"));
            return Err(QueryError::malformed("only SELECT statements are allowed"));
        }

        let check = self.gate.check(sql, &request.user_role);
        if !check.is_safe {
            self.record(request, sql, check.clone(), None, None);
            return Err(QueryError::PolicyViolation { check });
        }

        match self.execute_query(sql, request.max_rows).await {
            Ok(result) => {
                info!(
                    rows = result.row_count,
                    execution_time_ms = result.execution_time_ms,
                    "query executed"
                );
                self.record(request, sql, check, Some(&result), None);
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                self.record(request, sql, check, None, Some(&message));
                Err(e)
            }
        }
    }

    /// Generate SQL for a natural-language question and run it through
    /// the guarded path. Generator output is untrusted regardless of its
    /// confidence score.
    pub async fn ask(&self, request: &QueryRequest) -> PipelineResult<QueryResult> {
        let generated = self.generator.generate(request).await;

        if generated.needs_clarification {
            return Err(QueryError::malformed(format!(
                "question needs clarification: {}",
                generated.clarification_questions.join("; ")
            )));
        }

        let sql = generated.sql.ok_or_else(|| {
            QueryError::malformed(
                generated
                    .error
                    .unwrap_or_else(|| "generator produced no SQL".to_string()),
            )
        })?;

        self.handle(request, &sql).await
    }

    /// Audit log access.
    pub fn audit(&self) -> &AuditStore {
        &self.audit
    }

    fn record(
        &self,
        request: &QueryRequest,
        sql: &str,
        check: SecurityCheck,
        result: Option<&QueryResult>,
        error: Option<&str>,
    ) {
        let mut entry = AuditEntry::new(
            request.user_id.clone(),
            request.question.clone(),
            sql.to_string(),
            check,
        );
        if let Some(result) = result {
            entry.execution_time_ms = Some(result.execution_time_ms);
            entry.row_count = Some(result.row_count);
        }
        entry.error = error.map(|e| e.to_string());
        self.audit.log(entry);
    }
}
