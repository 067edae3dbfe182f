//! Rule checker contract and registry.

use crate::model::{Constraint, SemanticModel};
use crate::types::Violation;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Context handed to a rule checker for one file.
pub struct CheckContext<'a> {
    /// Path of the file under evaluation.
    pub file: &'a Path,
    /// The file's parsed semantic model.
    pub model: &'a SemanticModel,
    /// Resolved architecture id.
    pub architecture: &'a str,
}

/// A pluggable per-rule checker.
///
/// Checkers receive one resolved [`Constraint`] at a time and report the
/// violations it produces against the file. They never gate themselves:
/// skip lists, severity filters, `applies_when`, `unless` and `when`
/// clauses are all applied by the engine before dispatch.
pub trait RuleChecker: Send + Sync {
    /// Rule name this checker handles (e.g. `forbid_import`).
    fn name(&self) -> &'static str;

    /// Checks one constraint against a file.
    fn check(&self, constraint: &Constraint, ctx: &CheckContext<'_>) -> Vec<Violation>;
}

/// Maps a rule name to its checker; absence skips the constraint silently.
pub trait RuleCheckerRegistry: Send + Sync {
    /// Returns the checker registered for `rule`, if any.
    fn checker_for(&self, rule: &str) -> Option<Arc<dyn RuleChecker>>;
}

/// Default name-keyed checker registry.
#[derive(Default)]
pub struct NamedCheckerRegistry {
    checkers: HashMap<String, Arc<dyn RuleChecker>>,
}

impl NamedCheckerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a checker under its own name.
    pub fn register(&mut self, checker: Arc<dyn RuleChecker>) {
        self.checkers.insert(checker.name().to_string(), checker);
    }

    /// Number of registered checkers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// True when no checkers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl RuleCheckerRegistry for NamedCheckerRegistry {
    fn checker_for(&self, rule: &str) -> Option<Arc<dyn RuleChecker>> {
        self.checkers.get(rule).cloned()
    }
}
