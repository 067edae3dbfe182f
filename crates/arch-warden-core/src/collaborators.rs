//! Collaborator contracts the engine consumes.
//!
//! The engine orchestrates; parsing, inheritance resolution and predicate
//! evaluation are supplied behind these traits and resolved through
//! registries at lookup time.

use crate::engine::EngineError;
use crate::model::{Resolution, SemanticModel};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Parses one source file into a language-neutral semantic model.
#[async_trait]
pub trait SourceParser: Send + Sync {
    /// Parses `content` read from `path`.
    async fn parse(&self, path: &Path, content: &str) -> Result<SemanticModel, EngineError>;

    /// Releases any pooled resources held by the parser.
    fn dispose(&self) {}
}

/// Maps a file extension to a registered parser.
pub trait ParserRegistry: Send + Sync {
    /// Returns the parser for `extension` (without the leading dot), if any.
    fn parser_for(&self, extension: &str) -> Option<Arc<dyn SourceParser>>;

    /// Disposes every registered parser.
    fn dispose(&self) {}
}

/// Default extension-keyed parser registry.
#[derive(Default)]
pub struct ExtensionParserRegistry {
    parsers: HashMap<String, Arc<dyn SourceParser>>,
}

impl ExtensionParserRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parser for a file extension (case-insensitive, no dot).
    pub fn register(&mut self, extension: impl Into<String>, parser: Arc<dyn SourceParser>) {
        self.parsers.insert(extension.into().to_lowercase(), parser);
    }
}

impl ParserRegistry for ExtensionParserRegistry {
    fn parser_for(&self, extension: &str) -> Option<Arc<dyn SourceParser>> {
        self.parsers.get(&extension.to_lowercase()).cloned()
    }

    fn dispose(&self) {
        for parser in self.parsers.values() {
            parser.dispose();
        }
    }
}

/// Resolves an architecture id (plus inline mixins) into a flattened
/// rule set by walking inheritance and mixin chains.
#[async_trait]
pub trait ArchitectureResolver: Send + Sync {
    /// Resolves `arch_id`, merging `inline_mixins` declared on the file's tag.
    ///
    /// # Errors
    ///
    /// Fails when the architecture id is unknown.
    async fn resolve(
        &self,
        arch_id: &str,
        inline_mixins: &[String],
    ) -> Result<Resolution, EngineError>;
}

/// File-local context handed to the condition evaluator.
pub struct ConditionContext<'a> {
    /// The parsed semantic model.
    pub model: &'a SemanticModel,
    /// Path of the file under evaluation.
    pub file: &'a Path,
}

/// Evaluates a constraint's `when` predicate against a file.
pub trait ConditionEvaluator: Send + Sync {
    /// Returns true when the predicate is satisfied (the constraint applies).
    fn satisfied(&self, predicate: &serde_json::Value, ctx: &ConditionContext<'_>) -> bool;
}

/// Condition evaluator used when none is configured: every predicate is
/// satisfied, so conditional constraints always apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSatisfied;

impl ConditionEvaluator for AlwaysSatisfied {
    fn satisfied(&self, _predicate: &serde_json::Value, _ctx: &ConditionContext<'_>) -> bool {
        true
    }
}

/// Set of known intent names, used for suggestion lookup.
pub trait IntentRegistry: Send + Sync {
    /// Tests whether `intent` is a known intent.
    fn contains(&self, intent: &str) -> bool;

    /// Returns all known intent names.
    fn names(&self) -> Vec<String>;
}

/// In-memory intent registry.
#[derive(Debug, Clone, Default)]
pub struct StaticIntentRegistry {
    names: BTreeSet<String>,
}

impl StaticIntentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Into<String>> FromIterator<S> for StaticIntentRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntentRegistry for StaticIntentRegistry {
    fn contains(&self, intent: &str) -> bool {
        self.names.contains(intent)
    }

    fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Import;

    struct NullParser;

    #[async_trait]
    impl SourceParser for NullParser {
        async fn parse(&self, _path: &Path, _content: &str) -> Result<SemanticModel, EngineError> {
            Ok(SemanticModel::default())
        }
    }

    #[test]
    fn registry_lookup_is_case_insensitive() {
        let mut registry = ExtensionParserRegistry::new();
        registry.register("PY", Arc::new(NullParser));
        assert!(registry.parser_for("py").is_some());
        assert!(registry.parser_for("Py").is_some());
        assert!(registry.parser_for("ts").is_none());
    }

    #[test]
    fn static_intent_registry() {
        let registry: StaticIntentRegistry = ["payment", "api"].into_iter().collect();
        assert!(registry.contains("payment"));
        assert!(!registry.contains("cache"));
        assert_eq!(registry.names(), vec!["api".to_string(), "payment".to_string()]);
    }

    #[test]
    fn always_satisfied_applies_constraints() {
        let model = SemanticModel {
            imports: vec![Import::new("os", 1, 1)],
            ..SemanticModel::default()
        };
        let ctx = ConditionContext {
            model: &model,
            file: Path::new("a.py"),
        };
        assert!(AlwaysSatisfied.satisfied(&serde_json::json!({"any": true}), &ctx));
    }
}
