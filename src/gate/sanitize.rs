// SPDX-License-Identifier: Apache-2.0

//! Post-approval query rewriting.
//!
//! Runs only after the gate has approved a statement. Adds a provenance
//! comment so downstream systems can tell generated SQL from hand-written
//! SQL, and caps the row count of expensive uncapped queries.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::QueryError;
use crate::gate::cost::estimate_cost;

/// Provenance marker prepended to every sanitized statement.
/// `v=1` is the marker format version, not the ruleset version.
const PROVENANCE_COMMENT: &str = "/* AGENT:GEN v=1 */";

fn limit_clause() -> &'static Regex {
    static LIMIT: OnceLock<Regex> = OnceLock::new();
    LIMIT.get_or_init(|| Regex::new(r"(?i)\bLIMIT\s+\d+\b").unwrap())
}

/// Rewrite an approved statement for execution.
///
/// Fails with [`QueryError::MalformedInput`] unless the statement begins
/// with SELECT (leading whitespace trimmed, case-insensitive). If the
/// statement has no LIMIT clause and its estimated cost exceeds
/// `limit_cost_threshold`, appends `LIMIT {default_row_cap}`.
pub fn sanitize(
    sql: &str,
    limit_cost_threshold: u32,
    default_row_cap: u64,
) -> Result<String, QueryError> {
    let trimmed = sql.trim();
    if !starts_with_select(trimmed) {
        return Err(QueryError::malformed("only SELECT statements are allowed"));
    }

    let mut sanitized = trimmed.to_string();
    if !limit_clause().is_match(&sanitized) && estimate_cost(&sanitized) > limit_cost_threshold {
        sanitized.push_str(&format!(" LIMIT {}", default_row_cap));
    }

    Ok(format!("{}\n{}", PROVENANCE_COMMENT, sanitized))
}

/// Whether the trimmed statement begins with SELECT.
///
/// This is the single structural requirement enforced before any pattern
/// matching runs; the pipeline calls it first, independent of the gate.
pub fn starts_with_select(sql: &str) -> bool {
    sql.trim()
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("SELECT"))
        .unwrap_or(false)
}
