// SPDX-License-Identifier: Apache-2.0

//! Application settings.
//!
//! Constructed once at process start and passed by reference into the
//! gate, validator, and governor constructors. No ambient globals.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::gate::types::SecurityLevel;

/// Policy applied when the PII scan detects a sensitive column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiPolicy {
    /// Flag as detected; the level becomes DANGEROUS
    Flag,
    /// Treat detection as a hard block
    Block,
}

impl Default for PiiPolicy {
    fn default() -> Self {
        Self::Flag
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Postgres connection string; absent means demo mode
    #[serde(default)]
    pub database_url: Option<String>,
    /// Default maximum rows an execution may return
    #[serde(default = "default_max_query_rows")]
    pub max_query_rows: u64,
    /// Statement timeout applied per execution
    #[serde(default = "default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,
    /// Estimated-cost ceiling above which the gate appends a warning
    #[serde(default = "default_max_query_cost")]
    pub max_query_cost: u32,
    /// Estimated cost above which the sanitizer caps uncapped queries
    #[serde(default = "default_limit_cost_threshold")]
    pub limit_cost_threshold: u32,
    /// Row cap the sanitizer appends to expensive uncapped queries
    #[serde(default = "default_row_cap")]
    pub default_row_cap: u64,
    /// What a PII detection does to the verdict
    #[serde(default)]
    pub pii_policy: PiiPolicy,
    /// Levels at or above this threshold are denied
    #[serde(default = "default_block_threshold")]
    pub block_threshold: SecurityLevel,
    /// Path to the business glossary YAML
    #[serde(default = "default_glossary_path")]
    pub glossary_path: String,
    /// Directory for the audit log
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,
    /// Maximum audit entries retained before rotation
    #[serde(default = "default_max_audit_entries")]
    pub max_audit_entries: usize,
}

fn default_max_query_rows() -> u64 {
    1_000_000
}

fn default_query_timeout_seconds() -> u64 {
    30
}

fn default_max_query_cost() -> u32 {
    1000
}

fn default_limit_cost_threshold() -> u32 {
    500
}

fn default_row_cap() -> u64 {
    10_000
}

fn default_block_threshold() -> SecurityLevel {
    SecurityLevel::Dangerous
}

fn default_glossary_path() -> String {
    "data/business_glossary.yaml".to_string()
}

fn default_audit_dir() -> String {
    "data".to_string()
}

fn default_max_audit_entries() -> usize {
    10_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_query_rows: default_max_query_rows(),
            query_timeout_seconds: default_query_timeout_seconds(),
            max_query_cost: default_max_query_cost(),
            limit_cost_threshold: default_limit_cost_threshold(),
            default_row_cap: default_row_cap(),
            pii_policy: PiiPolicy::default(),
            block_threshold: default_block_threshold(),
            glossary_path: default_glossary_path(),
            audit_dir: default_audit_dir(),
            max_audit_entries: default_max_audit_entries(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields defaults; a
    /// present-but-invalid file is a configuration error (fail closed).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("failed to read settings {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            QueryError::configuration(format!("failed to parse settings {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_query_rows, 1_000_000);
        assert_eq!(settings.query_timeout_seconds, 30);
        assert_eq!(settings.limit_cost_threshold, 500);
        assert_eq!(settings.default_row_cap, 10_000);
        assert_eq!(settings.pii_policy, PiiPolicy::Flag);
        assert_eq!(settings.block_threshold, SecurityLevel::Dangerous);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = Settings::load("/nonexistent/settings.json").unwrap();
        assert_eq!(settings.max_query_cost, 1000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"query_timeout_seconds": 5, "pii_policy": "block"}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.query_timeout_seconds, 5);
        assert_eq!(settings.pii_policy, PiiPolicy::Block);
        assert_eq!(settings.max_query_rows, 1_000_000);
    }

    #[test]
    fn test_invalid_file_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
