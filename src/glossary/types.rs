// SPDX-License-Identifier: Apache-2.0

//! Business glossary data model.
//!
//! The glossary is the single source of the table allow-list and the PII
//! column index consumed by the security gate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Category of a business term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermCategory {
    Financial,
    Time,
    Product,
    Location,
    Customer,
    Sales,
}

/// A named, canonical business metric with synonyms and a SQL expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessTerm {
    pub canonical_name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub expression: String,
    pub description: String,
    #[serde(default)]
    pub required_tables: Vec<String>,
    pub default_grain: String,
    pub owner: String,
    pub category: TermCategory,
    #[serde(default)]
    pub is_pii: bool,
}

/// A column in a mapped table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_pii: bool,
}

/// A table exposed to query generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMapping {
    #[serde(default)]
    pub description: String,
    pub columns: Vec<ColumnDefinition>,
}

/// The complete business glossary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Glossary {
    pub version: String,
    pub last_updated: String,
    pub terms: BTreeMap<String, BusinessTerm>,
    pub table_mappings: BTreeMap<String, TableMapping>,
}

impl Glossary {
    /// Fully-qualified `table.column` names of every PII-flagged column.
    pub fn pii_columns(&self) -> Vec<String> {
        self.table_mappings
            .iter()
            .flat_map(|(table, mapping)| {
                mapping
                    .columns
                    .iter()
                    .filter(|c| c.is_pii)
                    .map(move |c| format!("{}.{}", table, c.name))
            })
            .collect()
    }

    /// Table names allowed to appear in FROM/JOIN clauses.
    pub fn permitted_tables(&self) -> Vec<String> {
        self.table_mappings.keys().cloned().collect()
    }

    /// Case-insensitive synonym lookup.
    pub fn term_by_synonym(&self, text: &str) -> Option<&BusinessTerm> {
        let needle = text.trim().to_lowercase();
        self.terms.values().find(|term| {
            term.synonyms
                .iter()
                .any(|synonym| synonym.to_lowercase() == needle)
        })
    }
}
