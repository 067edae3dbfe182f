//! Language-neutral semantic model and resolved architecture types.
//!
//! The per-language parsers and the inheritance resolver live behind the
//! contracts in [`crate::collaborators`]; this module only defines the
//! shapes the engine consumes.

use crate::types::{RuleValue, Severity};
use serde::{Deserialize, Serialize};

/// One import statement extracted from a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Module specifier as written in the source (e.g. `flask`, `./util`).
    pub specifier: String,
    /// Line number (1-indexed).
    #[serde(default)]
    pub line: usize,
    /// Column number (1-indexed).
    #[serde(default)]
    pub column: usize,
}

impl Import {
    /// Creates a new import.
    #[must_use]
    pub fn new(specifier: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            specifier: specifier.into(),
            line,
            column,
        }
    }
}

/// Parsed structure of one source file, language-neutral from the
/// engine's viewpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticModel {
    /// Imported modules.
    pub imports: Vec<Import>,
    /// Declared class names.
    pub classes: Vec<String>,
    /// Declared function names.
    pub functions: Vec<String>,
    /// Decorators present in the file (with or without `@` prefix).
    pub decorators: Vec<String>,
    /// Call targets observed in the file.
    pub calls: Vec<String>,
}

impl SemanticModel {
    /// Tests whether the file carries the named decorator.
    ///
    /// The `@` prefix is optional on both sides.
    #[must_use]
    pub fn has_decorator(&self, name: &str) -> bool {
        let wanted = name.trim_start_matches('@');
        self.decorators
            .iter()
            .any(|d| d.trim_start_matches('@') == wanted)
    }

    /// Tests whether the file imports a module whose specifier equals,
    /// contains, or ends with `/<name>`.
    #[must_use]
    pub fn imports_module(&self, name: &str) -> bool {
        let suffix = format!("/{name}");
        self.imports.iter().any(|imp| {
            imp.specifier == name
                || imp.specifier.ends_with(&suffix)
                || imp.specifier.contains(name)
        })
    }

    /// Returns the first import matching `name` per [`Self::imports_module`]
    /// semantics, for violation locations.
    #[must_use]
    pub fn find_import(&self, name: &str) -> Option<&Import> {
        let suffix = format!("/{name}");
        self.imports.iter().find(|imp| {
            imp.specifier == name
                || imp.specifier.ends_with(&suffix)
                || imp.specifier.contains(name)
        })
    }
}

/// One resolved rule belonging to an architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Rule name (e.g. `forbid_import`), used to look up the checker.
    pub rule: String,
    /// Severity of violations this constraint produces.
    pub severity: Severity,
    /// The value(s) the rule targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    /// Explanation of why the rule exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    /// Content pattern; the constraint only applies when the raw file text
    /// matches. A malformed pattern means the constraint does not apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_when: Option<String>,
    /// Declarative exceptions; satisfying any one skips the constraint.
    /// Entries are tagged `@intent:`, `decorator:`, `import:` or unprefixed
    /// (treated as an import exception).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unless: Vec<String>,
    /// Conditional predicate evaluated by the condition collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<serde_json::Value>,
    /// Identifier of the architecture or mixin that declared this rule.
    pub source: String,
}

impl Constraint {
    /// Creates a bare constraint with the given rule, severity and source.
    #[must_use]
    pub fn new(rule: impl Into<String>, severity: Severity, source: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            value: None,
            why: None,
            applies_when: None,
            unless: Vec::new(),
            when: None,
            source: source.into(),
        }
    }

    /// Sets the targeted value(s).
    #[must_use]
    pub fn with_value(mut self, value: impl Into<RuleValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the `why` explanation.
    #[must_use]
    pub fn with_why(mut self, why: impl Into<String>) -> Self {
        self.why = Some(why.into());
        self
    }

    /// Sets the content applicability pattern.
    #[must_use]
    pub fn applies_when(mut self, pattern: impl Into<String>) -> Self {
        self.applies_when = Some(pattern.into());
        self
    }

    /// Adds an `unless` exception.
    #[must_use]
    pub fn unless(mut self, exception: impl Into<String>) -> Self {
        self.unless.push(exception.into());
        self
    }

    /// Sets the conditional predicate.
    #[must_use]
    pub fn when(mut self, predicate: serde_json::Value) -> Self {
        self.when = Some(predicate);
        self
    }
}

/// A fully resolved architecture: the flattened rule set a file is
/// checked against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedArchitecture {
    /// Architecture id (e.g. `app.service`).
    pub id: String,
    /// Flattened constraint list.
    pub constraints: Vec<Constraint>,
    /// Non-enforced hints attached to the architecture.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    /// Intents the architecture expects files to declare.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_intents: Vec<String>,
    /// Inheritance chain, root first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inheritance_chain: Vec<String>,
    /// Mixins merged into the rule set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_mixins: Vec<String>,
    /// At most one file may resolve to a singleton architecture.
    #[serde(default)]
    pub singleton: bool,
}

/// Conflict kind for forbidden inline mixins.
pub const CONFLICT_MIXIN_INLINE_FORBIDDEN: &str = "mixin_inline_forbidden";
/// Conflict kind for architectures that only accept inline mixins.
pub const CONFLICT_MIXIN_INLINE_ONLY: &str = "mixin_inline_only";

/// A conflict reported by the architecture resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Conflict kind (e.g. `mixin_inline_forbidden`).
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Output of the architecture resolver collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// The resolved architecture.
    pub architecture: ResolvedArchitecture,
    /// Conflicts encountered while resolving.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
}
