//! Checker for the `require_decorator` rule.
//!
//! # Detected Patterns
//!
//! A file lacking a decorator the architecture mandates. The `@` prefix is
//! optional on both the declared value and the parsed decorator.
//!
//! # Good Patterns
//!
//! ```text
//! # @arch app.endpoint        (requires authenticated)
//! @authenticated
//! def handler(): ...
//! ```

use arch_warden_core::{CheckContext, Constraint, RuleChecker, Violation};

use crate::target_values;

/// Violation code for require-decorator.
pub const CODE: &str = "R004";

/// Rule name for require-decorator.
pub const NAME: &str = "require_decorator";

/// Reports mandated decorators that are absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireDecorator;

impl RequireDecorator {
    /// Creates a new checker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuleChecker for RequireDecorator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, constraint: &Constraint, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(value) = &constraint.value else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        for target in target_values(value) {
            if !ctx.model.has_decorator(target) {
                let bare = target.trim_start_matches('@');
                let mut violation = Violation::new(
                    CODE,
                    NAME,
                    constraint.severity,
                    format!("required decorator '{target}' is missing"),
                )
                .with_value(value.clone())
                .with_source(constraint.source.clone());
                violation = match &constraint.why {
                    Some(why) => violation.with_fix(why.clone()),
                    None => violation.with_fix(format!("decorate with `@{bare}`")),
                };
                violations.push(violation);
            }
        }
        violations
    }
}
