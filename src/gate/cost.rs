// SPDX-License-Identifier: Apache-2.0

//! Structural cost heuristic.
//!
//! Assigns a synthetic cost to a SQL string from structural counts alone.
//! This is a gating signal, not an execution-plan estimate, and must never
//! be presented to users as one.

use std::sync::OnceLock;

use regex::Regex;

/// Base cost of any statement.
const BASE_COST: u32 = 10;
/// Added per JOIN occurrence.
const JOIN_COST: u32 = 50;
/// Added once if GROUP BY is present.
const GROUP_BY_COST: u32 = 100;
/// Added once if ORDER BY is present.
const ORDER_BY_COST: u32 = 50;
/// Added per parenthesized sub-SELECT.
const SUBQUERY_COST: u32 = 200;
/// Added per window function (`OVER (`).
const WINDOW_COST: u32 = 150;

struct CostPatterns {
    join: Regex,
    group_by: Regex,
    order_by: Regex,
    subquery: Regex,
    window: Regex,
}

fn patterns() -> &'static CostPatterns {
    static PATTERNS: OnceLock<CostPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CostPatterns {
        join: Regex::new(r"(?i)\bJOIN\b").unwrap(),
        group_by: Regex::new(r"(?i)\bGROUP\s+BY\b").unwrap(),
        order_by: Regex::new(r"(?i)\bORDER\s+BY\b").unwrap(),
        subquery: Regex::new(r"(?i)\([^)]*SELECT[^)]*\)").unwrap(),
        window: Regex::new(r"(?i)\bOVER\s*\(").unwrap(),
    })
}

/// Estimate a synthetic execution cost from the statement's structure.
pub fn estimate_cost(sql: &str) -> u32 {
    let p = patterns();

    let mut cost = BASE_COST;
    cost += p.join.find_iter(sql).count() as u32 * JOIN_COST;
    if p.group_by.is_match(sql) {
        cost += GROUP_BY_COST;
    }
    if p.order_by.is_match(sql) {
        cost += ORDER_BY_COST;
    }
    cost += p.subquery.find_iter(sql).count() as u32 * SUBQUERY_COST;
    cost += p.window.find_iter(sql).count() as u32 * WINDOW_COST;

    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_cost_for_plain_select() {
        assert_eq!(estimate_cost("SELECT revenue FROM sales"), BASE_COST);
    }

    #[test]
    fn test_join_adds_fifty_each() {
        let base = estimate_cost("SELECT a FROM t1");
        let one = estimate_cost("SELECT a FROM t1 JOIN t2 ON t1.id = t2.id");
        let two = estimate_cost("SELECT a FROM t1 JOIN t2 ON x JOIN t3 ON y");
        assert_eq!(one, base + JOIN_COST);
        assert_eq!(two, base + 2 * JOIN_COST);
    }

    #[test]
    fn test_group_and_order_by() {
        let cost = estimate_cost("SELECT a, SUM(b) FROM t GROUP BY a ORDER BY a");
        assert_eq!(cost, BASE_COST + GROUP_BY_COST + ORDER_BY_COST);
    }

    #[test]
    fn test_subquery_adds_at_least_two_hundred() {
        let base = estimate_cost("SELECT a FROM t");
        let sub = estimate_cost("SELECT a FROM t WHERE b IN (SELECT b FROM u)");
        assert!(sub >= base + SUBQUERY_COST);
    }

    #[test]
    fn test_window_function() {
        let cost = estimate_cost("SELECT RANK() OVER (PARTITION BY a) FROM t");
        assert_eq!(cost, BASE_COST + WINDOW_COST);
    }

    #[test]
    fn test_monotonic_in_structure() {
        let simple = estimate_cost("SELECT a FROM t");
        let complex =
            estimate_cost("SELECT a, SUM(b) FROM t JOIN u ON x GROUP BY a ORDER BY 1");
        assert!(complex > simple);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            estimate_cost("select a from t join u on x"),
            estimate_cost("SELECT a FROM t JOIN u ON x")
        );
    }
}
