// SPDX-License-Identifier: Apache-2.0

//! NL→SQL generator boundary.
//!
//! The generation call itself lives outside this crate. Whatever SQL
//! comes back is fully untrusted text, regardless of the reported
//! confidence score; the pipeline gates it exactly as it would gate
//! user-supplied SQL.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A natural-language query request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub user_id: String,
    #[serde(default = "default_role")]
    pub user_role: String,
    #[serde(default)]
    pub max_rows: Option<u64>,
}

fn default_role() -> String {
    "manager".to_string()
}

/// Output of the generator collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSql {
    /// The candidate SQL, if one was produced
    pub sql: Option<String>,
    /// Generator self-reported confidence, 0.0–1.0. Informational only;
    /// never relaxes gating.
    pub confidence: f32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub needs_clarification: bool,
    #[serde(default)]
    pub clarification_questions: Vec<String>,
}

/// The generation collaborator.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, request: &QueryRequest) -> GeneratedSql;
}

/// Whether a generator is available. Both branches are handled
/// explicitly at call sites.
#[derive(Clone)]
pub enum GeneratorHandle {
    Configured(Arc<dyn SqlGenerator>),
    Unconfigured,
}

impl GeneratorHandle {
    /// Produce SQL for a question, or the unconfigured-service answer.
    pub async fn generate(&self, request: &QueryRequest) -> GeneratedSql {
        match self {
            Self::Configured(generator) => generator.generate(request).await,
            Self::Unconfigured => GeneratedSql {
                sql: None,
                confidence: 0.0,
                error: Some("SQL generator is not configured".to_string()),
                needs_clarification: false,
                clarification_questions: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_generator_reports_error() {
        let handle = GeneratorHandle::Unconfigured;
        let request = QueryRequest {
            question: "total revenue last month".to_string(),
            user_id: "u1".to_string(),
            user_role: "manager".to_string(),
            max_rows: None,
        };
        let out = handle.generate(&request).await;
        assert!(out.sql.is_none());
        assert!(out.error.is_some());
        assert_eq!(out.confidence, 0.0);
    }
}
