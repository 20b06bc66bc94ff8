// SPDX-License-Identifier: Apache-2.0

//! Built-in pattern rule table.
//!
//! The rule set is an explicit, ordered table of (regex, tag, class)
//! triples so a rule can be reviewed or added without touching the
//! decision logic in the gate.

/// Classification of a pattern rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleClass {
    /// A match vetoes execution outright
    Blocking,
    /// A match is flagged but does not deny by itself
    Warning,
}

/// A single pattern rule before compilation.
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    /// Stable tag reported in `blocked_operations` / warning text
    pub tag: &'static str,
    /// Case-insensitive regex, whole-word boundaries where applicable
    pub pattern: &'static str,
    /// Whether a match blocks or warns
    pub class: RuleClass,
}

/// Rule table version, recorded so audits can tie a decision to the rule
/// set that produced it.
pub const RULESET_VERSION: u32 = 1;

/// Built-in rules, in evaluation order.
pub const BUILTIN_RULES: &[PatternRule] = &[
    // Blocking: destructive / privileged intent
    PatternRule {
        tag: "dml_ddl",
        pattern: r"\b(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "bulk_io",
        pattern: r"\b(COPY|UNLOAD|LOAD)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "privilege",
        pattern: r"\b(GRANT|REVOKE|DENY)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "procedural",
        pattern: r"\b(EXEC|EXECUTE|CALL)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "timing",
        pattern: r"\b(pg_sleep|sleep|waitfor)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "system_namespace",
        pattern: r"\b(SYSTEM|ADMIN|ROOT)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "catalog_access",
        pattern: r"\b(INFORMATION_SCHEMA|pg_catalog|sys)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "union_exfiltration",
        pattern: r"\b(UNION\s+SELECT|UNION\s+ALL)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "tautology_clause",
        pattern: r"\b(HAVING\s+1=1|WHERE\s+1=1)\b",
        class: RuleClass::Blocking,
    },
    PatternRule {
        tag: "tautology_boolean",
        pattern: r"\b(OR\s+1=1|AND\s+1=1)\b",
        class: RuleClass::Blocking,
    },
    // Warnings: inefficiency / risk smells
    PatternRule {
        tag: "select_star",
        pattern: r"\bSELECT\s+\*",
        class: RuleClass::Warning,
    },
    PatternRule {
        tag: "ordinal_order_by",
        pattern: r"\bORDER\s+BY\s+\d+\b",
        class: RuleClass::Warning,
    },
    PatternRule {
        tag: "large_limit",
        pattern: r"\bLIMIT\s+\d{4,}\b",
        class: RuleClass::Warning,
    },
    PatternRule {
        tag: "many_joins",
        pattern: r"\bJOIN\b.*\bJOIN\b.*\bJOIN\b",
        class: RuleClass::Warning,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtin_patterns_compile() {
        for rule in BUILTIN_RULES {
            let compiled = regex::Regex::new(&format!("(?i){}", rule.pattern));
            assert!(compiled.is_ok(), "rule '{}' failed to compile", rule.tag);
        }
    }

    #[test]
    fn test_blocking_rules_precede_warning_rules() {
        let first_warning = BUILTIN_RULES
            .iter()
            .position(|r| r.class == RuleClass::Warning)
            .unwrap();
        assert!(BUILTIN_RULES[..first_warning]
            .iter()
            .all(|r| r.class == RuleClass::Blocking));
    }

    #[test]
    fn test_tags_are_unique() {
        let mut tags: Vec<_> = BUILTIN_RULES.iter().map(|r| r.tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), BUILTIN_RULES.len());
    }
}
