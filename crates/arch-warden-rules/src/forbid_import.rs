//! Checker for the `forbid_import` rule.
//!
//! # Detected Patterns
//!
//! A file importing any module named by the constraint value. Matching
//! follows the semantic model: exact specifier, `.../<name>` suffix, or
//! substring.
//!
//! # Good Patterns
//!
//! ```text
//! # @arch app.service         (forbids flask)
//! import company.http.client
//! ```

use arch_warden_core::{CheckContext, Constraint, Location, RuleChecker, Violation};
use tracing::debug;

use crate::target_values;

/// Violation code for forbid-import.
pub const CODE: &str = "R001";

/// Rule name for forbid-import.
pub const NAME: &str = "forbid_import";

/// Reports imports of forbidden modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForbidImport;

impl ForbidImport {
    /// Creates a new checker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuleChecker for ForbidImport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, constraint: &Constraint, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(value) = &constraint.value else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        for target in target_values(value) {
            if let Some(import) = ctx.model.find_import(target) {
                debug!(file = %ctx.file.display(), target, "forbidden import found");
                let mut violation = Violation::new(
                    CODE,
                    NAME,
                    constraint.severity,
                    format!("import of '{target}' is forbidden"),
                )
                .with_value(value.clone())
                .with_location(Location::new(import.line, import.column))
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
