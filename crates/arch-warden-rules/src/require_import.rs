//! Checker for the `require_import` rule.
//!
//! # Detected Patterns
//!
//! A file missing an import the architecture mandates. With a list value,
//! every named module must be imported; each absent one is reported
//! separately.
//!
//! # Good Patterns
//!
//! ```text
//! # @arch app.handler         (requires company.logging)
//! import company.logging
//! ```

use arch_warden_core::{CheckContext, Constraint, RuleChecker, Violation};

use crate::target_values;

/// Violation code for require-import.
pub const CODE: &str = "R002";

/// Rule name for require-import.
pub const NAME: &str = "require_import";

/// Reports mandated imports that are absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireImport;

impl RequireImport {
    /// Creates a new checker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuleChecker for RequireImport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, constraint: &Constraint, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(value) = &constraint.value else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        for target in target_values(value) {
            if !ctx.model.imports_module(target) {
                let mut violation = Violation::new(
                    CODE,
                    NAME,
                    constraint.severity,
                    format!("required import '{target}' is missing"),
                )
                .with_value(value.clone())
                .with_source(constraint.source.clone());
                violation = match &constraint.why {
                    Some(why) => violation.with_fix(why.clone()),
                    None => violation.with_fix(format!("add `import {target}`")),
                };
                violations.push(violation);
            }
        }
        violations
    }
}
