// SPDX-License-Identifier: Apache-2.0

//! SQL Security Gate
//!
//! The decision engine that classifies untrusted, LLM-generated SQL before
//! execution. The gate combines blocking/warning pattern matches, PII
//! column references, and a structural cost estimate into a single
//! immutable [`SecurityCheck`] verdict.
//!
//! The gate deliberately does not parse SQL. It performs conservative
//! pattern classification over raw text: false positives are the safe
//! failure direction here, false negatives are not acceptable.

pub mod cost;
pub mod patterns;
pub mod sanitize;
pub mod tables;
pub mod types;

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::{PiiPolicy, Settings};
use crate::error::QueryError;
use crate::glossary::GlossaryService;
use patterns::{PatternRule, RuleClass, BUILTIN_RULES};
use types::{PiiFlag, SecurityCheck, SecurityLevel};

/// A compiled pattern rule.
struct CompiledRule {
    tag: &'static str,
    regex: Regex,
    class: RuleClass,
}

/// The security gate. Immutable after construction; safe to share across
/// request tasks without locking. Permissions are re-fetched from the
/// glossary on every check so a glossary reload takes effect immediately.
pub struct SecurityGate {
    rules: Vec<CompiledRule>,
    glossary: Arc<GlossaryService>,
    pii_policy: PiiPolicy,
    block_threshold: SecurityLevel,
    max_query_cost: u32,
}

impl SecurityGate {
    /// Compile the built-in rule table against the given glossary.
    ///
    /// A builtin pattern that fails to compile is a configuration error:
    /// the process must not serve traffic with a partial rule set.
    pub fn new(glossary: Arc<GlossaryService>, settings: &Settings) -> Result<Self, QueryError> {
        let rules = compile_rules(BUILTIN_RULES)?;

        Ok(Self {
            rules,
            glossary,
            pii_policy: settings.pii_policy,
            block_threshold: settings.block_threshold,
            max_query_cost: settings.max_query_cost,
        })
    }

    /// Evaluate an arbitrary string claiming to be a single SELECT
    /// statement. No well-formedness is assumed.
    pub fn check(&self, sql: &str, user_role: &str) -> SecurityCheck {
        let permissions = self.glossary.permissions();

        // 1. Blocking scan: tags in declaration order, duplicates allowed
        let blocked_operations: Vec<String> = self
            .rules
            .iter()
            .filter(|r| r.class == RuleClass::Blocking && r.regex.is_match(sql))
            .map(|r| r.tag.to_string())
            .collect();

        // 2. PII scan
        let mut pii_flag = PiiFlag::None;
        for matcher in permissions.pii_matchers() {
            if matcher.is_match(sql) {
                pii_flag = match self.pii_policy {
                    PiiPolicy::Flag => PiiFlag::Detected,
                    PiiPolicy::Block => PiiFlag::Blocked,
                };
                break;
            }
        }

        // 3. Warning scan
        let mut warnings: Vec<String> = self
            .rules
            .iter()
            .filter(|r| r.class == RuleClass::Warning && r.regex.is_match(sql))
            .map(|r| format!("potentially inefficient pattern: {}", r.tag))
            .collect();

        // 4. Cost estimate, with a warning above the configured ceiling
        let estimated_cost = cost::estimate_cost(sql);
        if estimated_cost > self.max_query_cost {
            warnings.push(format!(
                "estimated cost {} exceeds ceiling {}",
                estimated_cost, self.max_query_cost
            ));
        }

        // 5. Level derivation: destructive intent is an absolute veto,
        //    PII outranks inefficiency but does not hard-block by default
        let level = if !blocked_operations.is_empty() || pii_flag == PiiFlag::Blocked {
            SecurityLevel::Blocked
        } else if pii_flag == PiiFlag::Detected {
            SecurityLevel::Dangerous
        } else if !warnings.is_empty() {
            SecurityLevel::Warning
        } else {
            SecurityLevel::Safe
        };

        // 6. The allow/deny cut is the configured threshold, one knob
        let is_safe = level < self.block_threshold;

        if !is_safe {
            warn!(
                level = level.as_str(),
                user_role,
                blocked = blocked_operations.len(),
                "query denied by security gate"
            );
        } else {
            debug!(level = level.as_str(), estimated_cost, "query passed security gate");
        }

        SecurityCheck {
            level,
            pii_flag,
            blocked_operations,
            warnings,
            estimated_cost,
            is_safe,
        }
    }
}

fn compile_rules(rules: &[PatternRule]) -> Result<Vec<CompiledRule>, QueryError> {
    rules
        .iter()
        .map(|rule| {
            Regex::new(&format!("(?i){}", rule.pattern))
                .map(|regex| CompiledRule {
                    tag: rule.tag,
                    regex,
                    class: rule.class,
                })
                .map_err(|e| {
                    QueryError::configuration(format!(
                        "builtin rule '{}' failed to compile: {}",
                        rule.tag, e
                    ))
                })
        })
        .collect()
}
