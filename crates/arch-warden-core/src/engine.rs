//! The constraint validation engine.
//!
//! Orchestrates one file's evaluation pipeline (annotations → parser →
//! resolution → constraint gating → checkers → overrides → verdict) and the
//! bounded-concurrency batch evaluation with per-file failure isolation and
//! the cross-file singleton check.

use crate::annotations::{AnnotationParser, CommentAnnotationParser};
use crate::collaborators::{
    AlwaysSatisfied, ArchitectureResolver, ConditionContext, ConditionEvaluator,
    ExtensionParserRegistry, IntentRegistry, ParserRegistry, StaticIntentRegistry,
};
use crate::config::{ConfigError, EngineConfig, MissingWhyPolicy, UndefinedIntentPolicy, UntaggedPolicy};
use crate::model::{SemanticModel, CONFLICT_MIXIN_INLINE_FORBIDDEN, CONFLICT_MIXIN_INLINE_ONLY};
use crate::overrides::{apply_overrides, OverrideValidator, PolicyOverrideValidator};
use crate::rule::{CheckContext, NamedCheckerRegistry, RuleCheckerRegistry};
use crate::similarity::SimilarityScorer;
use crate::types::{
    BatchValidationResult, Location, Severity, Timings, ValidationResult, Violation,
};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// IO error reading a file.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Error parsing a source file.
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Path to the file that failed to parse.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// Architecture resolution failure.
    #[error("Cannot resolve architecture `{id}`: {message}")]
    Resolve {
        /// The unresolvable architecture id.
        id: String,
        /// Resolver error message.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required collaborator was not configured.
    #[error("No {0} configured")]
    MissingCollaborator(&'static str),

    /// Opaque collaborator failure.
    #[error("{0}")]
    Collaborator(String),
}

/// Shared file-content cache, keyed by path with write-once-per-key
/// semantics. Pass one handle to several engines to avoid duplicate I/O.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl ContentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached content for `path`, if present.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<str>> {
        self.entries.read().ok()?.get(path).cloned()
    }

    /// Inserts content for `path`, keeping the first write if the key is
    /// already populated. Re-reads of the same path within one run produce
    /// identical content.
    pub fn insert(&self, path: &Path, content: String) -> Arc<str> {
        let content: Arc<str> = Arc::from(content);
        if let Ok(mut entries) = self.entries.write() {
            return entries
                .entry(path.to_path_buf())
                .or_insert(content)
                .clone();
        }
        content
    }

    /// Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |e| e.len())
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all cached content.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

/// Caller options for one evaluation call.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Promote all final warnings to errors.
    pub strict: bool,
    /// Rule names to skip entirely.
    pub skip_rules: Vec<String>,
    /// When given, only constraints with these severities are evaluated.
    pub severities: Option<Vec<Severity>>,
    /// Batch concurrency; overrides the configured value.
    pub concurrency: Option<usize>,
}

impl ValidateOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables strict mode.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Adds a rule name to skip.
    #[must_use]
    pub fn skip_rule(mut self, rule: impl Into<String>) -> Self {
        self.skip_rules.push(rule.into());
        self
    }

    /// Restricts evaluation to the given severities.
    #[must_use]
    pub fn severities(mut self, severities: Vec<Severity>) -> Self {
        self.severities = Some(severities);
        self
    }

    /// Sets the batch concurrency.
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

/// Builder for configuring a [`ValidationEngine`].
#[derive(Default)]
pub struct ValidationEngineBuilder {
    config: Option<EngineConfig>,
    annotations: Option<Arc<dyn AnnotationParser>>,
    parsers: Option<Arc<dyn ParserRegistry>>,
    resolver: Option<Arc<dyn ArchitectureResolver>>,
    conditions: Option<Arc<dyn ConditionEvaluator>>,
    override_validator: Option<Arc<dyn OverrideValidator>>,
    checkers: Option<Arc<dyn RuleCheckerRegistry>>,
    intents: Option<Arc<dyn IntentRegistry>>,
    content_cache: Option<Arc<ContentCache>>,
}

impl ValidationEngineBuilder {
    /// Creates a new builder with default collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the annotation parser (default: [`CommentAnnotationParser`]).
    #[must_use]
    pub fn annotation_parser(mut self, parser: Arc<dyn AnnotationParser>) -> Self {
        self.annotations = Some(parser);
        self
    }

    /// Sets the parser registry (default: empty).
    #[must_use]
    pub fn parser_registry(mut self, registry: Arc<dyn ParserRegistry>) -> Self {
        self.parsers = Some(registry);
        self
    }

    /// Sets the architecture resolver (required).
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn ArchitectureResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the condition evaluator (default: every predicate satisfied).
    #[must_use]
    pub fn condition_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.conditions = Some(evaluator);
        self
    }

    /// Sets the override validator (default: [`PolicyOverrideValidator`]).
    #[must_use]
    pub fn override_validator(mut self, validator: Arc<dyn OverrideValidator>) -> Self {
        self.override_validator = Some(validator);
        self
    }

    /// Sets the rule checker registry (default: empty).
    #[must_use]
    pub fn checker_registry(mut self, registry: Arc<dyn RuleCheckerRegistry>) -> Self {
        self.checkers = Some(registry);
        self
    }

    /// Sets the intent registry (default: empty).
    #[must_use]
    pub fn intent_registry(mut self, registry: Arc<dyn IntentRegistry>) -> Self {
        self.intents = Some(registry);
        self
    }

    /// Shares a file-content cache across engines or calls.
    #[must_use]
    pub fn content_cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.content_cache = Some(cache);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if no architecture resolver was configured.
    pub fn build(self) -> Result<ValidationEngine, EngineError> {
        let resolver = self
            .resolver
            .ok_or(EngineError::MissingCollaborator("architecture resolver"))?;

        Ok(ValidationEngine {
            inner: Arc::new(EngineInner {
                config: self.config.unwrap_or_default(),
                annotations: self
                    .annotations
                    .unwrap_or_else(|| Arc::new(CommentAnnotationParser::new())),
                parsers: self
                    .parsers
                    .unwrap_or_else(|| Arc::new(ExtensionParserRegistry::new())),
                resolver,
                conditions: self.conditions.unwrap_or_else(|| Arc::new(AlwaysSatisfied)),
                override_validator: self
                    .override_validator
                    .unwrap_or_else(|| Arc::new(PolicyOverrideValidator::new())),
                checkers: self
                    .checkers
                    .unwrap_or_else(|| Arc::new(NamedCheckerRegistry::new())),
                intents: self
                    .intents
                    .unwrap_or_else(|| Arc::new(StaticIntentRegistry::new())),
                scorer: SimilarityScorer::new(),
                content_cache: self.content_cache.unwrap_or_default(),
            }),
        })
    }
}

struct EngineInner {
    config: EngineConfig,
    annotations: Arc<dyn AnnotationParser>,
    parsers: Arc<dyn ParserRegistry>,
    resolver: Arc<dyn ArchitectureResolver>,
    conditions: Arc<dyn ConditionEvaluator>,
    override_validator: Arc<dyn OverrideValidator>,
    checkers: Arc<dyn RuleCheckerRegistry>,
    intents: Arc<dyn IntentRegistry>,
    scorer: SimilarityScorer,
    content_cache: Arc<ContentCache>,
}

impl EngineInner {
    async fn read_content(&self, path: &Path) -> Result<Arc<str>, EngineError> {
        if let Some(content) = self.content_cache.get(path) {
            return Ok(content);
        }
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(self.content_cache.insert(path, text))
    }
}

/// The constraint validation engine.
///
/// Cheap to clone; clones share collaborators, configuration and caches.
#[derive(Clone)]
pub struct ValidationEngine {
    inner: Arc<EngineInner>,
}

impl ValidationEngine {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> ValidationEngineBuilder {
        ValidationEngineBuilder::new()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Evaluates a single file.
    ///
    /// # Errors
    ///
    /// In isolation this propagates collaborator errors (unreadable file,
    /// parser failure). Within [`Self::evaluate_batch`] such errors are
    /// caught and converted to synthetic S999 failure results instead.
    pub async fn evaluate_file(
        &self,
        path: &Path,
        options: &ValidateOptions,
    ) -> Result<ValidationResult, EngineError> {
        let (result, _) = self.evaluate_inner(path, options).await?;
        Ok(result)
    }

    /// Evaluates many files under bounded concurrency.
    ///
    /// Results are returned in input order. One file's failure never aborts
    /// the batch: it becomes a synthetic `fail` result with code S999. After
    /// all files are evaluated, the singleton-architecture check runs over
    /// the combined results.
    pub async fn evaluate_batch(
        &self,
        paths: &[PathBuf],
        options: &ValidateOptions,
    ) -> BatchValidationResult {
        let batch_size = options
            .concurrency
            .or(self.inner.config.concurrency)
            .unwrap_or_else(default_batch_size)
            .max(1);

        info!(files = paths.len(), batch_size, "starting batch validation");

        let mut results = Vec::with_capacity(paths.len());
        let mut singleton_archs: HashSet<String> = HashSet::new();

        for chunk in paths.chunks(batch_size) {
            let mut handles = Vec::with_capacity(chunk.len());
            for path in chunk {
                let engine = self.clone();
                let path = path.clone();
                let options = options.clone();
                handles.push(tokio::spawn(async move {
                    engine.evaluate_inner(&path, &options).await
                }));
            }

            // Settle-all join, index-aligned back onto this chunk's slice.
            for (handle, path) in handles.into_iter().zip(chunk) {
                let result = match handle.await {
                    Ok(Ok((result, singleton))) => {
                        if singleton {
                            if let Some(arch) = &result.architecture {
                                singleton_archs.insert(arch.clone());
                            }
                        }
                        result
                    }
                    Ok(Err(e)) => {
                        warn!(file = %path.display(), error = %e, "file evaluation failed");
                        synthetic_failure(path, &e.to_string())
                    }
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "file evaluation panicked");
                        synthetic_failure(path, &e.to_string())
                    }
                };
                results.push(result);
            }
        }

        check_singletons(&mut results, &singleton_archs);

        let batch = BatchValidationResult::from_results(results);
        info!(
            passed = batch.summary.passed,
            warned = batch.summary.warned,
            failed = batch.summary.failed,
            "batch validation complete"
        );
        batch
    }

    /// Releases pooled collaborator resources and drops engine caches.
    pub fn dispose(&self) {
        self.inner.parsers.dispose();
        self.inner.scorer.clear();
        self.inner.content_cache.clear();
    }

    async fn evaluate_inner(
        &self,
        path: &Path,
        options: &ValidateOptions,
    ) -> Result<(ValidationResult, bool), EngineError> {
        let started = Instant::now();
        debug!(file = %path.display(), "evaluating");

        let content = self.inner.read_content(path).await?;
        let annotations = self.inner.annotations.parse(&content);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let Some(parser) = self.inner.parsers.parser_for(&extension) else {
            debug!(file = %path.display(), extension, "no parser registered, skipping");
            let mut result = ValidationResult::skipped(
                path,
                format!("no parser registered for `.{extension}` files"),
            );
            result.timings.total_ms = elapsed_ms(started);
            return Ok((result, false));
        };

        let parse_started = Instant::now();
        let model = parser.parse(path, &content).await?;
        let parse_ms = elapsed_ms(parse_started);

        let Some(tag) = annotations.tag.clone() else {
            let mut result = untagged_result(path, self.inner.config.untagged, options.strict);
            result.timings = Timings {
                parse_ms,
                resolve_ms: 0.0,
                validate_ms: 0.0,
                total_ms: elapsed_ms(started),
            };
            return Ok((result, false));
        };

        let resolve_started = Instant::now();
        let resolution = match self
            .inner
            .resolver
            .resolve(&tag.id, &annotations.inline_mixins)
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                debug!(file = %path.display(), architecture = %tag.id, "resolution failed");
                // No resolved architecture: the id stays unset so the batch
                // singleton check never groups this file.
                let mut result = ValidationResult::passing(path);
                result.errors.push(
                    Violation::new(
                        "S002",
                        "unresolved_architecture",
                        Severity::Error,
                        format!("cannot resolve architecture `{}`: {e}", tag.id),
                    )
                    .with_value(tag.id.as_str())
                    .with_location(Location::new(tag.line, tag.column)),
                );
                result.recompute();
                result.timings = Timings {
                    parse_ms,
                    resolve_ms: elapsed_ms(resolve_started),
                    validate_ms: 0.0,
                    total_ms: elapsed_ms(started),
                };
                return Ok((result, false));
            }
        };
        let resolve_ms = elapsed_ms(resolve_started);
        let architecture = &resolution.architecture;

        let validate_started = Instant::now();
        let mut candidates: Vec<Violation> = Vec::new();

        for conflict in &resolution.conflicts {
            if conflict.kind == CONFLICT_MIXIN_INLINE_FORBIDDEN
                || conflict.kind == CONFLICT_MIXIN_INLINE_ONLY
            {
                candidates.push(
                    Violation::new(
                        "E027",
                        conflict.kind.clone(),
                        Severity::Warning,
                        conflict.message.clone(),
                    )
                    .with_source(architecture.id.clone()),
                );
            }
        }

        for intent in &architecture.expected_intents {
            if !annotations.intents.iter().any(|i| i == intent) {
                candidates.push(
                    Violation::new(
                        "E028",
                        "expected_intent",
                        Severity::Warning,
                        format!(
                            "architecture `{}` expects intent '{intent}'",
                            architecture.id
                        ),
                    )
                    .with_value(intent.as_str())
                    .with_source(architecture.id.clone())
                    .with_fix(format!("add an `@intent {intent}` annotation")),
                );
            }
        }

        let check_ctx = CheckContext {
            file: path,
            model: &model,
            architecture: &architecture.id,
        };
        let condition_ctx = ConditionContext {
            model: &model,
            file: path,
        };

        for constraint in &architecture.constraints {
            if options.skip_rules.iter().any(|r| r == &constraint.rule) {
                debug!(rule = %constraint.rule, "skipped by caller");
                continue;
            }
            if let Some(allowed) = &options.severities {
                if !allowed.contains(&constraint.severity) {
                    continue;
                }
            }
            if let Some(pattern) = &constraint.applies_when {
                // A malformed pattern means "does not apply", never an error.
                match regex::Regex::new(pattern) {
                    Ok(re) if re.is_match(&content) => {}
                    _ => continue,
                }
            }
            if constraint
                .unless
                .iter()
                .any(|ex| exception_satisfied(ex, &annotations.intents, &model))
            {
                continue;
            }
            if let Some(predicate) = &constraint.when {
                if !self.inner.conditions.satisfied(predicate, &condition_ctx) {
                    continue;
                }
            }

            if constraint.rule.starts_with("forbid_") && constraint.why.is_none() {
                match self.inner.config.missing_why {
                    MissingWhyPolicy::Ignore => {}
                    policy => {
                        let severity = if policy == MissingWhyPolicy::Error {
                            Severity::Error
                        } else {
                            Severity::Warning
                        };
                        candidates.push(
                            Violation::new(
                                "C001",
                                "missing_why",
                                severity,
                                format!(
                                    "rule '{}' forbids values without explaining why",
                                    constraint.rule
                                ),
                            )
                            .with_value(constraint.rule.as_str())
                            .with_source("config"),
                        );
                    }
                }
            }

            if let Some(checker) = self.inner.checkers.checker_for(&constraint.rule) {
                candidates.extend(checker.check(constraint, &check_ctx));
            }
        }

        if self.inner.config.undefined_intent != UndefinedIntentPolicy::Ignore {
            let severity = if self.inner.config.undefined_intent == UndefinedIntentPolicy::Error {
                Severity::Error
            } else {
                Severity::Warning
            };
            for intent in &annotations.intents {
                if !self.inner.intents.contains(intent) {
                    let suggestions = self.inner.scorer.suggest(intent, self.inner.intents.names());
                    let mut violation = Violation::new(
                        "I001",
                        "undefined_intent",
                        severity,
                        format!("unknown intent '{intent}'"),
                    )
                    .with_value(intent.as_str())
                    .with_source("config");
                    if !suggestions.is_empty() {
                        violation =
                            violation.with_fix(format!("did you mean: {}?", suggestions.join(", ")));
                    }
                    candidates.push(violation);
                }
            }
        }

        let outcome = apply_overrides(
            candidates,
            &annotations.overrides,
            self.inner.override_validator.as_ref(),
            &self.inner.config,
        );

        let mut result = ValidationResult::passing(path);
        result.architecture = Some(architecture.id.clone());
        result.inheritance_chain = architecture.inheritance_chain.clone();
        result.applied_mixins = architecture.applied_mixins.clone();
        result.errors = outcome.errors;
        result.warnings = outcome.warnings;
        result.overrides_active = outcome.active;
        if options.strict {
            promote_warnings(&mut result);
        }
        result.recompute();
        result.timings = Timings {
            parse_ms,
            resolve_ms,
            validate_ms: elapsed_ms(validate_started),
            total_ms: elapsed_ms(started),
        };

        Ok((result, architecture.singleton))
    }
}

/// Builds the terminal result for an untagged file per policy.
fn untagged_result(path: &Path, policy: UntaggedPolicy, strict: bool) -> ValidationResult {
    let mut result = ValidationResult::passing(path);
    let violation = |severity| {
        Violation::new(
            "S001",
            "missing_arch_tag",
            severity,
            "file declares no architecture tag",
        )
        .with_fix("add an `@arch <architecture>` annotation")
    };
    match policy {
        UntaggedPolicy::Deny => result.errors.push(violation(Severity::Error)),
        UntaggedPolicy::Warn => result.warnings.push(violation(Severity::Warning)),
        UntaggedPolicy::Allow => {}
    }
    if strict {
        promote_warnings(&mut result);
    }
    result.recompute();
    result
}

/// Promotes all warnings to errors and clears the warning list.
fn promote_warnings(result: &mut ValidationResult) {
    let promoted: Vec<Violation> = result
        .warnings
        .drain(..)
        .map(|mut v| {
            v.severity = Severity::Error;
            v
        })
        .collect();
    result.errors.extend(promoted);
}

/// Synthesizes the S999 failure result used for per-file batch isolation.
fn synthetic_failure(path: &Path, message: &str) -> ValidationResult {
    let mut result = ValidationResult::passing(path);
    result.errors.push(Violation::new(
        "S999",
        "engine_failure",
        Severity::Error,
        message,
    ));
    result.recompute();
    result
}

/// Appends an E027 error to every result sharing a singleton architecture
/// that more than one file resolved to, flipping those results to fail.
fn check_singletons(results: &mut [ValidationResult], singleton_archs: &HashSet<String>) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, result) in results.iter().enumerate() {
        if let Some(arch) = &result.architecture {
            if singleton_archs.contains(arch) {
                groups.entry(arch.clone()).or_default().push(idx);
            }
        }
    }

    for (arch, indices) in groups {
        if indices.len() < 2 {
            continue;
        }
        for &idx in &indices {
            let siblings: Vec<String> = indices
                .iter()
                .filter(|&&other| other != idx)
                .map(|&other| results[other].file.display().to_string())
                .collect();
            results[idx].push_violation(
                Violation::new(
                    "E027",
                    "singleton_architecture",
                    Severity::Error,
                    format!(
                        "architecture `{arch}` allows a single file but is also used by {}",
                        siblings.join(", ")
                    ),
                )
                .with_source(arch.clone()),
            );
        }
    }
}

/// Tests whether one `unless` exception is satisfied by the file.
fn exception_satisfied(exception: &str, intents: &[String], model: &SemanticModel) -> bool {
    if let Some(name) = exception.strip_prefix("@intent:") {
        intents.iter().any(|i| i == name)
    } else if let Some(name) = exception.strip_prefix("decorator:") {
        model.has_decorator(name)
    } else {
        let name = exception.strip_prefix("import:").unwrap_or(exception);
        model.imports_module(name)
    }
}

/// Default batch size: three quarters of available parallelism, kept
/// between 2 and 16.
fn default_batch_size() -> usize {
    let available = std::thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get);
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    let scaled = (available as f64 * 0.75).round() as usize;
    scaled.clamp(2, 16)
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
