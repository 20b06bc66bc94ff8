// SPDX-License-Identifier: Apache-2.0

//! Table-access validation.
//!
//! Cross-checks every table referenced after FROM/JOIN against the
//! glossary allow-list. This runs as a second defense layer after the
//! gate, not inside it: an unauthorized name is a hard deny.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

fn table_ref_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)\bFROM\s+(\w+)").unwrap(),
            Regex::new(r"(?i)\bJOIN\s+(\w+)").unwrap(),
        ]
    })
}

/// Return every table referenced in FROM/JOIN clauses that is not in the
/// allow-list: FROM references first, then JOIN references. Duplicates
/// are not collapsed.
pub fn validate_table_access(sql: &str, permitted: &BTreeSet<String>) -> Vec<String> {
    let mut unauthorized = Vec::new();

    for pattern in table_ref_patterns() {
        for captures in pattern.captures_iter(sql) {
            let table = &captures[1];
            if !permitted.contains(table) {
                unauthorized.push(table.to_string());
            }
        }
    }

    unauthorized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permitted() -> BTreeSet<String> {
        ["sales", "products"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_permitted_table_passes() {
        let result = validate_table_access("SELECT a FROM sales", &permitted());
        assert!(result.is_empty());
    }

    #[test]
    fn test_unauthorized_table_reported() {
        let result = validate_table_access("SELECT a FROM unauthorized_table", &permitted());
        assert_eq!(result, vec!["unauthorized_table"]);
    }

    #[test]
    fn test_join_tables_checked() {
        let result = validate_table_access(
            "SELECT a FROM sales JOIN secret_table ON sales.id = secret_table.id",
            &permitted(),
        );
        assert_eq!(result, vec!["secret_table"]);
    }

    #[test]
    fn test_mixed_case_keywords() {
        let result = validate_table_access("select a from hidden join products on x", &permitted());
        assert_eq!(result, vec!["hidden"]);
    }

    #[test]
    fn test_duplicates_allowed() {
        let result = validate_table_access(
            "SELECT a FROM ghost WHERE b IN (SELECT b FROM ghost)",
            &permitted(),
        );
        assert_eq!(result.len(), 2);
    }
}
