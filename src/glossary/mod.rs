// SPDX-License-Identifier: Apache-2.0

//! Glossary loading and read-only permission snapshots.
//!
//! The glossary is loaded once at startup; a failed load is fatal so the
//! process never serves traffic with a partially loaded policy set. The
//! gate and validator consume [`Permissions`] snapshots and re-fetch them
//! per check, so a reload takes effect without restarting consumers.

pub mod types;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use regex::Regex;
use tracing::info;

use crate::error::QueryError;
pub use types::{BusinessTerm, ColumnDefinition, Glossary, TableMapping, TermCategory};

/// Read-only view over the glossary's security-relevant metadata,
/// computed once per load. PII matchers are whole-word regexes over the
/// bare column name: intentionally conservative, no alias resolution.
pub struct Permissions {
    permitted_tables: BTreeSet<String>,
    pii_columns: BTreeSet<String>,
    pii_matchers: Vec<Regex>,
}

impl Permissions {
    fn from_glossary(glossary: &Glossary) -> Self {
        let pii_columns: BTreeSet<String> = glossary.pii_columns().into_iter().collect();

        let pii_matchers = pii_columns
            .iter()
            .filter_map(|qualified| qualified.rsplit('.').next())
            .filter_map(|column| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(column))).ok()
            })
            .collect();

        Self {
            permitted_tables: glossary.permitted_tables().into_iter().collect(),
            pii_columns,
            pii_matchers,
        }
    }

    /// Tables allowed to appear after FROM/JOIN.
    pub fn permitted_tables(&self) -> &BTreeSet<String> {
        &self.permitted_tables
    }

    /// Fully-qualified `table.column` names flagged sensitive.
    pub fn pii_columns(&self) -> &BTreeSet<String> {
        &self.pii_columns
    }

    /// Compiled whole-word matchers, one per PII column name.
    pub fn pii_matchers(&self) -> &[Regex] {
        &self.pii_matchers
    }
}

/// Owns the loaded glossary and the current permission snapshot.
pub struct GlossaryService {
    path: Option<PathBuf>,
    glossary: RwLock<Glossary>,
    permissions: RwLock<Arc<Permissions>>,
}

impl GlossaryService {
    /// Load the glossary from a YAML file. Fails closed on any error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let glossary = read_glossary(path)?;
        info!(version = %glossary.version, path = %path.display(), "glossary loaded");

        Ok(Self {
            path: Some(path.to_path_buf()),
            permissions: RwLock::new(Arc::new(Permissions::from_glossary(&glossary))),
            glossary: RwLock::new(glossary),
        })
    }

    /// Build a service from an in-memory glossary (tests, embedded policy).
    pub fn from_glossary(glossary: Glossary) -> Self {
        Self {
            path: None,
            permissions: RwLock::new(Arc::new(Permissions::from_glossary(&glossary))),
            glossary: RwLock::new(glossary),
        }
    }

    /// Re-read the glossary file and swap in a fresh permission snapshot.
    /// On failure the previous glossary stays in effect.
    pub fn reload(&self) -> Result<(), QueryError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| QueryError::configuration("glossary has no backing file"))?;
        let glossary = read_glossary(path)?;
        info!(version = %glossary.version, "glossary reloaded");

        *self.permissions.write().unwrap() = Arc::new(Permissions::from_glossary(&glossary));
        *self.glossary.write().unwrap() = glossary;
        Ok(())
    }

    /// Current permission snapshot. Cheap; callers re-fetch per check.
    pub fn permissions(&self) -> Arc<Permissions> {
        Arc::clone(&self.permissions.read().unwrap())
    }

    /// Look up a term by canonical name or synonym.
    pub fn find_term(&self, text: &str) -> Option<BusinessTerm> {
        let glossary = self.glossary.read().unwrap();
        let needle = text.trim().to_lowercase();
        if let Some(term) = glossary.terms.get(&needle) {
            return Some(term.clone());
        }
        glossary.term_by_synonym(text).cloned()
    }

    /// Extract business terms referenced by a natural-language question:
    /// single words first, then bigrams.
    pub fn extract_business_terms(&self, question: &str) -> Vec<BusinessTerm> {
        let words: Vec<String> = question
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string())
            .filter(|w| !w.is_empty())
            .collect();

        let mut terms: Vec<BusinessTerm> = Vec::new();
        let mut push_unique = |term: BusinessTerm, terms: &mut Vec<BusinessTerm>| {
            if !terms.iter().any(|t| t.canonical_name == term.canonical_name) {
                terms.push(term);
            }
        };

        for word in &words {
            if let Some(term) = self.find_term(word) {
                push_unique(term, &mut terms);
            }
        }
        for pair in words.windows(2) {
            if let Some(term) = self.find_term(&format!("{} {}", pair[0], pair[1])) {
                push_unique(term, &mut terms);
            }
        }

        terms
    }

    /// Terms related to a canonical name: same category, or at least one
    /// required table in common.
    pub fn related_terms(&self, canonical_name: &str) -> Vec<BusinessTerm> {
        let glossary = self.glossary.read().unwrap();
        let Some(term) = glossary.terms.get(canonical_name) else {
            return Vec::new();
        };

        glossary
            .terms
            .values()
            .filter(|other| other.canonical_name != term.canonical_name)
            .filter(|other| {
                other.category == term.category
                    || other
                        .required_tables
                        .iter()
                        .any(|t| term.required_tables.contains(t))
            })
            .cloned()
            .collect()
    }

    /// Schema of a mapped table, if present.
    pub fn table_schema(&self, table: &str) -> Option<TableMapping> {
        self.glossary.read().unwrap().table_mappings.get(table).cloned()
    }

    /// Glossary version string.
    pub fn version(&self) -> String {
        self.glossary.read().unwrap().version.clone()
    }
}

fn read_glossary(path: &Path) -> Result<Glossary, QueryError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        QueryError::configuration(format!("failed to read glossary {}: {}", path.display(), e))
    })?;
    serde_yaml::from_str(&content).map_err(|e| {
        QueryError::configuration(format!("failed to parse glossary {}: {}", path.display(), e))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Small glossary used across the crate's tests: `sales` and `products`
    /// permitted, `customer_id` and `email` flagged PII.
    pub(crate) fn synthetic_glossary() -> Glossary {
        let mut terms = BTreeMap::new();
        terms.insert(
            "revenue".to_string(),
            BusinessTerm {
                canonical_name: "revenue".to_string(),
                synonyms: vec!["turnover".to_string(), "total sales".to_string()],
                expression: "SUM(amount)".to_string(),
                description: "Total revenue across orders".to_string(),
                required_tables: vec!["sales".to_string()],
                default_grain: "day".to_string(),
                owner: "finance".to_string(),
                category: TermCategory::Financial,
                is_pii: false,
            },
        );

        let mut table_mappings = BTreeMap::new();
        table_mappings.insert(
            "sales".to_string(),
            TableMapping {
                description: "Sales facts".to_string(),
                columns: vec![
                    ColumnDefinition {
                        name: "order_id".to_string(),
                        data_type: "bigint".to_string(),
                        description: String::new(),
                        is_pii: false,
                    },
                    ColumnDefinition {
                        name: "customer_id".to_string(),
                        data_type: "bigint".to_string(),
                        description: String::new(),
                        is_pii: true,
                    },
                    ColumnDefinition {
                        name: "revenue".to_string(),
                        data_type: "numeric".to_string(),
                        description: String::new(),
                        is_pii: false,
                    },
                ],
            },
        );
        table_mappings.insert(
            "products".to_string(),
            TableMapping {
                description: "Product catalog".to_string(),
                columns: vec![ColumnDefinition {
                    name: "product_id".to_string(),
                    data_type: "bigint".to_string(),
                    description: String::new(),
                    is_pii: false,
                }],
            },
        );
        table_mappings.insert(
            "customers".to_string(),
            TableMapping {
                description: "Customer directory".to_string(),
                columns: vec![ColumnDefinition {
                    name: "email".to_string(),
                    data_type: "text".to_string(),
                    description: String::new(),
                    is_pii: true,
                }],
            },
        );

        Glossary {
            version: "test".to_string(),
            last_updated: "2024-01-01".to_string(),
            terms,
            table_mappings,
        }
    }

    #[test]
    fn test_permissions_snapshot() {
        let service = GlossaryService::from_glossary(synthetic_glossary());
        let permissions = service.permissions();
        assert!(permissions.permitted_tables().contains("sales"));
        assert!(permissions.pii_columns().contains("sales.customer_id"));
        assert_eq!(permissions.pii_matchers().len(), 2);
    }

    #[test]
    fn test_load_missing_file_fails_closed() {
        assert!(GlossaryService::load("/nonexistent/glossary.yaml").is_err());
    }

    #[test]
    fn test_load_and_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glossary.yaml");
        let yaml = serde_yaml::to_string(&synthetic_glossary()).unwrap();
        std::fs::write(&path, &yaml).unwrap();

        let service = GlossaryService::load(&path).unwrap();
        assert_eq!(service.version(), "test");

        let mut updated = synthetic_glossary();
        updated.version = "test2".to_string();
        updated.table_mappings.remove("products");
        std::fs::write(&path, serde_yaml::to_string(&updated).unwrap()).unwrap();

        service.reload().unwrap();
        assert_eq!(service.version(), "test2");
        assert!(!service.permissions().permitted_tables().contains("products"));
    }

    #[test]
    fn test_related_terms_by_category_and_table() {
        let mut glossary = synthetic_glossary();
        glossary.terms.insert(
            "margin".to_string(),
            BusinessTerm {
                canonical_name: "margin".to_string(),
                synonyms: vec![],
                expression: "SUM(amount - cost)".to_string(),
                description: "Gross margin".to_string(),
                required_tables: vec!["sales".to_string()],
                default_grain: "day".to_string(),
                owner: "finance".to_string(),
                category: TermCategory::Financial,
                is_pii: false,
            },
        );

        let service = GlossaryService::from_glossary(glossary);
        let related = service.related_terms("revenue");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].canonical_name, "margin");
        assert!(service.related_terms("unknown").is_empty());
    }

    #[test]
    fn test_extract_business_terms() {
        let service = GlossaryService::from_glossary(synthetic_glossary());
        let terms = service.extract_business_terms("What was the turnover last month?");
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].canonical_name, "revenue");

        let bigram = service.extract_business_terms("show total sales by region");
        assert_eq!(bigram.len(), 1);
    }
}
