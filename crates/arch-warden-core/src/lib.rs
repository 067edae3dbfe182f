//! # arch-warden-core
//!
//! Core engine for architecture governance validation.
//!
//! Files declare the architecture they belong to with comment annotations
//! (`@arch`, `@intent`, `@arch-override`); the engine checks each file's
//! parsed structure against the resolved architecture's constraints. It
//! includes:
//!
//! - [`ValidationEngine`] for orchestrating single-file and batch evaluation
//! - [`RuleChecker`] trait for pluggable per-rule checks
//! - [`SourceParser`] and [`ArchitectureResolver`] traits for the
//!   language-specific and rule-store collaborators
//! - [`Violation`] and [`ValidationResult`] for representing verdicts
//!
//! ## Example
//!
//! ```ignore
//! use arch_warden_core::{ValidationEngine, ValidateOptions};
//!
//! let engine = ValidationEngine::builder()
//!     .resolver(resolver)
//!     .parser_registry(parsers)
//!     .checker_registry(checkers)
//!     .build()?;
//!
//! let batch = engine.evaluate_batch(&paths, &ValidateOptions::new()).await;
//! print!("{}", batch.format_report());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod annotations;
mod collaborators;
mod config;
mod engine;
mod model;
mod overrides;
mod rule;
mod similarity;
mod types;

pub use annotations::{
    AnnotationParser, ArchTag, CommentAnnotationParser, FileAnnotations, OverrideDecl,
};
pub use collaborators::{
    AlwaysSatisfied, ArchitectureResolver, ConditionContext, ConditionEvaluator,
    ExtensionParserRegistry, IntentRegistry, ParserRegistry, SourceParser, StaticIntentRegistry,
};
pub use config::{
    ConfigError, EngineConfig, MissingWhyPolicy, OverridePolicy, UndefinedIntentPolicy,
    UntaggedPolicy,
};
pub use engine::{
    ContentCache, EngineError, ValidateOptions, ValidationEngine, ValidationEngineBuilder,
};
pub use model::{
    Conflict, Constraint, Import, Resolution, ResolvedArchitecture, SemanticModel,
    CONFLICT_MIXIN_INLINE_FORBIDDEN, CONFLICT_MIXIN_INLINE_ONLY,
};
pub use overrides::{
    apply_overrides, OverrideOutcome, OverrideValidation, OverrideValidator,
    PolicyOverrideValidator,
};
pub use rule::{CheckContext, NamedCheckerRegistry, RuleChecker, RuleCheckerRegistry};
pub use similarity::SimilarityScorer;
pub use types::{
    ActiveOverride, BatchSummary, BatchValidationResult, Location, RuleValue, Severity, Timings,
    ValidationResult, ValidationStatus, Violation,
};
