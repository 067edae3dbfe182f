//! Checker for the `forbid_call` rule.
//!
//! # Detected Patterns
//!
//! A file calling any target named by the constraint value. Call targets
//! are matched exactly as the parser recorded them (e.g. `eval`,
//! `db.raw_query`).

use arch_warden_core::{CheckContext, Constraint, RuleChecker, Violation};

use crate::target_values;

/// Violation code for forbid-call.
pub const CODE: &str = "R003";

/// Rule name for forbid-call.
pub const NAME: &str = "forbid_call";

/// Reports calls to forbidden targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForbidCall;

impl ForbidCall {
    /// Creates a new checker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuleChecker for ForbidCall {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, constraint: &Constraint, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(value) = &constraint.value else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        for target in target_values(value) {
            if ctx.model.calls.iter().any(|c| c == target) {
                let mut violation = Violation::new(
                    CODE,
                    NAME,
                    constraint.severity,
                    format!("call to '{target}' is forbidden"),
                )
                .with_value(value.clone())
                .with_source(constraint.source.clone());
                if let Some(why) = &constraint.why {
                    violation = violation.with_fix(why.clone());
                }
                violations.push(violation);
            }
        }
        violations
    }
}
