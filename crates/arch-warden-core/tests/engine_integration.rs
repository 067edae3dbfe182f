//! Integration test: the validation engine end-to-end.
//!
//! Uses a line-oriented stub parser and an in-memory resolver to exercise
//! the full annotation → parse → resolve → constraint → override pipeline,
//! including batch isolation and the singleton architecture check.

use arch_warden_core::{
    ArchitectureResolver, ConditionContext, ConditionEvaluator, Conflict, Constraint, EngineConfig,
    EngineError, ExtensionParserRegistry, Import, Location, NamedCheckerRegistry, Resolution,
    ResolvedArchitecture, RuleChecker, RuleValue, Severity, SemanticModel, SourceParser,
    StaticIntentRegistry, UntaggedPolicy, ValidateOptions, ValidationEngine, ValidationStatus,
    Violation, CheckContext,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Stub collaborators ──

/// Parses `import X`, `decorator X` and `call X` lines; fails on a marker.
struct LineParser;

#[async_trait]
impl SourceParser for LineParser {
    async fn parse(&self, path: &Path, content: &str) -> Result<SemanticModel, EngineError> {
        if content.contains("!!parse-error!!") {
            return Err(EngineError::Parse {
                path: path.to_path_buf(),
                message: "unbalanced brackets".to_string(),
            });
        }
        let mut model = SemanticModel::default();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(spec) = trimmed.strip_prefix("import ") {
                model.imports.push(Import::new(spec.trim(), idx + 1, 1));
            } else if let Some(name) = trimmed.strip_prefix("decorator ") {
                model.decorators.push(name.trim().to_string());
            } else if let Some(target) = trimmed.strip_prefix("call ") {
                model.calls.push(target.trim().to_string());
            }
        }
        Ok(model)
    }
}

struct MapResolver {
    archs: HashMap<String, Resolution>,
}

#[async_trait]
impl ArchitectureResolver for MapResolver {
    async fn resolve(
        &self,
        arch_id: &str,
        _inline_mixins: &[String],
    ) -> Result<Resolution, EngineError> {
        self.archs
            .get(arch_id)
            .cloned()
            .ok_or_else(|| EngineError::Resolve {
                id: arch_id.to_string(),
                message: "unknown architecture".to_string(),
            })
    }
}

struct ForbidImportChecker;

impl RuleChecker for ForbidImportChecker {
    fn name(&self) -> &'static str {
        "forbid_import"
    }

    fn check(&self, constraint: &Constraint, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(value) = &constraint.value else {
            return Vec::new();
        };
        let targets: Vec<String> = match value {
            RuleValue::One(v) => vec![v.clone()],
            RuleValue::Many(vs) => vs.clone(),
        };
        let mut violations = Vec::new();
        for target in targets {
            if let Some(import) = ctx.model.find_import(&target) {
                violations.push(
                    Violation::new(
                        "E001",
                        "forbid_import",
                        constraint.severity,
                        format!("import of '{target}' is forbidden"),
                    )
                    .with_value(value.clone())
                    .with_location(Location::new(import.line, import.column))
                    .with_source(constraint.source.clone()),
                );
            }
        }
        violations
    }
}

// ── Fixture helpers ──

fn forbid_flask(severity: Severity) -> Constraint {
    Constraint::new("forbid_import", severity, "app.service")
        .with_value("flask")
        .with_why("services must stay framework-free")
}

fn arch(id: &str, constraints: Vec<Constraint>) -> Resolution {
    Resolution {
        architecture: ResolvedArchitecture {
            id: id.to_string(),
            constraints,
            ..ResolvedArchitecture::default()
        },
        conflicts: Vec::new(),
    }
}

fn build_engine(config: EngineConfig, archs: Vec<(&str, Resolution)>) -> ValidationEngine {
    let mut parsers = ExtensionParserRegistry::new();
    parsers.register("py", Arc::new(LineParser));

    let mut checkers = NamedCheckerRegistry::new();
    checkers.register(Arc::new(ForbidImportChecker));

    let resolver = MapResolver {
        archs: archs
            .into_iter()
            .map(|(id, r)| (id.to_string(), r))
            .collect(),
    };

    let intents: StaticIntentRegistry = ["payment", "api", "legacy"].into_iter().collect();

    ValidationEngine::builder()
        .config(config)
        .parser_registry(Arc::new(parsers))
        .checker_registry(Arc::new(checkers))
        .resolver(Arc::new(resolver))
        .intent_registry(Arc::new(intents))
        .build()
        .expect("engine should build")
}

fn service_engine() -> ValidationEngine {
    build_engine(
        EngineConfig::default(),
        vec![(
            "app.service",
            arch("app.service", vec![forbid_flask(Severity::Error)]),
        )],
    )
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("fixture should write");
    path
}

// ── Single file ──

#[tokio::test]
async fn unregistered_extension_is_skipped_pass() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.txt", "# @arch app.service\n");

    let result = service_engine()
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();

    assert_eq!(result.status, ValidationStatus::Pass);
    assert!(result.skipped);
    assert!(result.skip_reason.as_deref().unwrap_or("").contains("txt"));
}

#[tokio::test]
async fn forbidden_import_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "svc.py", "# @arch app.service\nimport flask\n");

    let result = service_engine()
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();

    assert_eq!(result.status, ValidationStatus::Fail);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, "E001");
    assert_eq!(result.errors[0].source, "app.service");
    assert_eq!(result.errors[0].location, Some(Location::new(2, 1)));
    assert_eq!(result.architecture.as_deref(), Some("app.service"));
}

#[tokio::test]
async fn wildcard_override_suppresses_and_is_recorded() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "svc.py",
        "# @arch app.service\n# @arch-override forbid_import * reason=\"framework migration\"\nimport flask\n",
    );

    let result = service_engine()
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();

    assert_eq!(result.status, ValidationStatus::Pass);
    assert!(result.errors.is_empty());
    assert_eq!(result.overrides_active.len(), 1);
    assert_eq!(result.overrides_active[0].rule, "forbid_import");
    assert_eq!(result.overrides_active[0].value, "*");
}

#[tokio::test]
async fn repeated_evaluation_is_stable() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "svc.py",
        "# @arch app.service\n# @arch-override forbid_import flask reason=\"migration\"\nimport flask\n",
    );

    let engine = service_engine();
    let first = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    let second = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.error_count, second.error_count);
    assert_eq!(first.warning_count, second.warning_count);
    assert_eq!(
        first.overrides_active.len(),
        second.overrides_active.len()
    );
}

#[tokio::test]
async fn skip_rules_option_drops_constraint() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "svc.py", "# @arch app.service\nimport flask\n");

    let result = service_engine()
        .evaluate_file(&path, &ValidateOptions::new().skip_rule("forbid_import"))
        .await
        .unwrap();

    assert_eq!(result.status, ValidationStatus::Pass);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn severity_filter_limits_evaluated_constraints() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "svc.py", "# @arch app.service\nimport flask\n");

    let engine = build_engine(
        EngineConfig::default(),
        vec![(
            "app.service",
            arch("app.service", vec![forbid_flask(Severity::Warning)]),
        )],
    );

    let result = engine
        .evaluate_file(
            &path,
            &ValidateOptions::new().severities(vec![Severity::Error]),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ValidationStatus::Pass);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn applies_when_gates_on_file_content() {
    let dir = TempDir::new().unwrap();
    let gated = forbid_flask(Severity::Error).applies_when("legacy_router");
    let engine = build_engine(
        EngineConfig::default(),
        vec![("app.service", arch("app.service", vec![gated]))],
    );

    let without = write_file(&dir, "a.py", "# @arch app.service\nimport flask\n");
    let with = write_file(
        &dir,
        "b.py",
        "# @arch app.service\nimport flask\ncall legacy_router\n",
    );

    let clean = engine
        .evaluate_file(&without, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(clean.status, ValidationStatus::Pass);

    let flagged = engine
        .evaluate_file(&with, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(flagged.status, ValidationStatus::Fail);
}

#[tokio::test]
async fn malformed_applies_when_never_applies() {
    let dir = TempDir::new().unwrap();
    let gated = forbid_flask(Severity::Error).applies_when("[unclosed");
    let engine = build_engine(
        EngineConfig::default(),
        vec![("app.service", arch("app.service", vec![gated]))],
    );
    let path = write_file(&dir, "a.py", "# @arch app.service\nimport flask\n");

    let result = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Pass);
}

#[tokio::test]
async fn unless_intent_exception_skips_constraint() {
    let dir = TempDir::new().unwrap();
    let excepted = forbid_flask(Severity::Error).unless("@intent:legacy");
    let engine = build_engine(
        EngineConfig::default(),
        vec![("app.service", arch("app.service", vec![excepted]))],
    );
    let path = write_file(
        &dir,
        "a.py",
        "# @arch app.service\n# @intent legacy\nimport flask\n",
    );

    let result = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Pass);
}

#[tokio::test]
async fn unless_decorator_exception_skips_constraint() {
    let dir = TempDir::new().unwrap();
    let excepted = forbid_flask(Severity::Error).unless("decorator:legacy_shim");
    let engine = build_engine(
        EngineConfig::default(),
        vec![("app.service", arch("app.service", vec![excepted]))],
    );
    let path = write_file(
        &dir,
        "a.py",
        "# @arch app.service\nimport flask\ndecorator legacy_shim\n",
    );

    let result = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Pass);
}

#[tokio::test]
async fn when_predicate_gates_constraint() {
    /// Satisfied only when the predicate carries `"enabled": true`.
    struct FlagCondition;

    impl ConditionEvaluator for FlagCondition {
        fn satisfied(&self, predicate: &serde_json::Value, _ctx: &ConditionContext<'_>) -> bool {
            predicate
                .get("enabled")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        }
    }

    let dir = TempDir::new().unwrap();

    let mut parsers = ExtensionParserRegistry::new();
    parsers.register("py", Arc::new(LineParser));
    let mut checkers = NamedCheckerRegistry::new();
    checkers.register(Arc::new(ForbidImportChecker));
    let resolver = MapResolver {
        archs: [
            (
                "app.gated".to_string(),
                arch(
                    "app.gated",
                    vec![forbid_flask(Severity::Error)
                        .when(serde_json::json!({"enabled": false}))],
                ),
            ),
            (
                "app.live".to_string(),
                arch(
                    "app.live",
                    vec![forbid_flask(Severity::Error)
                        .when(serde_json::json!({"enabled": true}))],
                ),
            ),
        ]
        .into_iter()
        .collect(),
    };
    let engine = ValidationEngine::builder()
        .parser_registry(Arc::new(parsers))
        .checker_registry(Arc::new(checkers))
        .condition_evaluator(Arc::new(FlagCondition))
        .resolver(Arc::new(resolver))
        .build()
        .expect("engine should build");

    // Unsatisfied predicate skips the constraint outright.
    let gated = write_file(&dir, "gated.py", "# @arch app.gated\nimport flask\n");
    let result = engine
        .evaluate_file(&gated, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Pass);
    assert!(result.errors.is_empty());

    // Satisfied predicate lets the checker fire.
    let live = write_file(&dir, "live.py", "# @arch app.live\nimport flask\n");
    let result = engine
        .evaluate_file(&live, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Fail);
    assert_eq!(result.errors[0].code, "E001");
}

#[tokio::test]
async fn strict_mode_promotes_all_warnings() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(
        EngineConfig::default(),
        vec![(
            "app.service",
            arch(
                "app.service",
                vec![
                    forbid_flask(Severity::Error),
                    Constraint::new("forbid_import", Severity::Warning, "app.service")
                        .with_value("requests")
                        .with_why("use the shared http client"),
                ],
            ),
        )],
    );
    let path = write_file(
        &dir,
        "a.py",
        "# @arch app.service\nimport flask\nimport requests\n",
    );

    let relaxed = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(relaxed.error_count, 1);
    assert_eq!(relaxed.warning_count, 1);

    let strict = engine
        .evaluate_file(&path, &ValidateOptions::new().strict())
        .await
        .unwrap();
    assert_eq!(strict.error_count, 2);
    assert_eq!(strict.warning_count, 0);
    assert!(strict.errors.iter().all(|v| v.severity == Severity::Error));
}

#[tokio::test]
async fn untagged_file_denied_by_policy() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(
        EngineConfig {
            untagged: UntaggedPolicy::Deny,
            ..EngineConfig::default()
        },
        vec![("app.service", arch("app.service", vec![]))],
    );
    let path = write_file(&dir, "a.py", "import os\n");

    let result = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Fail);
    assert_eq!(result.errors[0].code, "S001");
}

#[tokio::test]
async fn unresolved_architecture_fails_with_s002() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.py", "# @arch app.ghost\n");

    let result = service_engine()
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Fail);
    assert_eq!(result.errors[0].code, "S002");
    assert!(result.errors[0].message.contains("app.ghost"));
    // The id never resolved, so the result carries no architecture.
    assert!(result.architecture.is_none());
}

#[tokio::test]
async fn mixin_conflict_surfaces_as_warning() {
    let dir = TempDir::new().unwrap();
    let mut resolution = arch("app.service", vec![]);
    resolution.conflicts.push(Conflict {
        kind: "mixin_inline_forbidden".to_string(),
        message: "architecture `app.service` forbids inline mixins".to_string(),
    });
    let engine = build_engine(EngineConfig::default(), vec![("app.service", resolution)]);
    let path = write_file(&dir, "a.py", "# @arch app.service with cache\n");

    let result = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Warn);
    assert_eq!(result.warnings[0].code, "E027");
    assert_eq!(result.warnings[0].source, "app.service");
}

#[tokio::test]
async fn missing_expected_intent_warns_with_e028() {
    let dir = TempDir::new().unwrap();
    let mut resolution = arch("app.service", vec![]);
    resolution.architecture.expected_intents = vec!["payment".to_string()];
    let engine = build_engine(EngineConfig::default(), vec![("app.service", resolution)]);

    let missing = write_file(&dir, "a.py", "# @arch app.service\n");
    let result = engine
        .evaluate_file(&missing, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Warn);
    assert_eq!(result.warnings[0].code, "E028");

    let declared = write_file(&dir, "b.py", "# @arch app.service\n# @intent payment\n");
    let result = engine
        .evaluate_file(&declared, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Pass);
}

#[tokio::test]
async fn unknown_intent_warns_with_suggestion() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.py", "# @arch app.service\n# @intent paymnt\n");

    let result = service_engine()
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();

    let i001 = result
        .warnings
        .iter()
        .find(|v| v.code == "I001")
        .expect("unknown intent should be reported");
    assert_eq!(i001.source, "config");
    assert!(i001
        .fix
        .as_deref()
        .is_some_and(|f| f.contains("payment")));
}

#[tokio::test]
async fn missing_why_on_forbid_rule_warns_with_c001() {
    let dir = TempDir::new().unwrap();
    let bare = Constraint::new("forbid_import", Severity::Error, "app.service").with_value("flask");
    let engine = build_engine(
        EngineConfig::default(),
        vec![("app.service", arch("app.service", vec![bare]))],
    );
    let path = write_file(&dir, "a.py", "# @arch app.service\n");

    let result = engine
        .evaluate_file(&path, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(result.status, ValidationStatus::Warn);
    assert_eq!(result.warnings[0].code, "C001");
    assert_eq!(result.warnings[0].source, "config");
}

// ── Batch ──

#[tokio::test]
async fn batch_preserves_input_order_and_isolates_failures() {
    let dir = TempDir::new().unwrap();
    let good_a = write_file(&dir, "a.py", "# @arch app.service\n");
    let broken = write_file(&dir, "b.py", "# @arch app.service\n!!parse-error!!\n");
    let good_c = write_file(&dir, "c.py", "# @arch app.service\nimport flask\n");

    let engine = service_engine();
    let batch = engine
        .evaluate_batch(
            &[good_a.clone(), broken.clone(), good_c.clone()],
            &ValidateOptions::new().concurrency(2),
        )
        .await;

    assert_eq!(batch.results.len(), 3);
    assert_eq!(batch.results[0].file, good_a);
    assert_eq!(batch.results[1].file, broken);
    assert_eq!(batch.results[2].file, good_c);

    // The broken file becomes a synthetic failure, siblings are unaffected.
    assert_eq!(batch.results[1].errors[0].code, "S999");
    assert_eq!(batch.results[1].status, ValidationStatus::Fail);

    let solo_a = engine
        .evaluate_file(&good_a, &ValidateOptions::new())
        .await
        .unwrap();
    let solo_c = engine
        .evaluate_file(&good_c, &ValidateOptions::new())
        .await
        .unwrap();
    assert_eq!(batch.results[0].status, solo_a.status);
    assert_eq!(batch.results[2].status, solo_c.status);
    assert_eq!(batch.results[2].error_count, solo_c.error_count);

    assert_eq!(batch.summary.total, 3);
    assert_eq!(batch.summary.failed, 2);
    assert_eq!(batch.summary.passed, 1);
    assert!(batch.has_failures());
}

#[tokio::test]
async fn singleton_architecture_fails_every_member() {
    let dir = TempDir::new().unwrap();
    let mut singleton = arch("app.config", vec![]);
    singleton.architecture.singleton = true;
    let engine = build_engine(
        EngineConfig::default(),
        vec![
            ("app.config", singleton),
            ("app.service", arch("app.service", vec![])),
        ],
    );

    let a = write_file(&dir, "a.py", "# @arch app.config\n");
    let b = write_file(&dir, "b.py", "# @arch app.config\n");
    let c = write_file(&dir, "c.py", "# @arch app.service\n");

    let batch = engine
        .evaluate_batch(&[a, b, c], &ValidateOptions::new())
        .await;

    for result in &batch.results[..2] {
        assert_eq!(result.status, ValidationStatus::Fail);
        let e027 = result
            .errors
            .iter()
            .find(|v| v.code == "E027")
            .expect("singleton breach should be reported");
        assert_eq!(e027.source, "app.config");
        assert_eq!(e027.severity, Severity::Error);
    }
    assert_eq!(batch.results[2].status, ValidationStatus::Pass);
}

#[tokio::test]
async fn unresolved_file_stays_out_of_singleton_group() {
    struct NoMixinResolver {
        inner: MapResolver,
    }

    #[async_trait]
    impl ArchitectureResolver for NoMixinResolver {
        async fn resolve(
            &self,
            arch_id: &str,
            inline_mixins: &[String],
        ) -> Result<Resolution, EngineError> {
            if !inline_mixins.is_empty() {
                return Err(EngineError::Resolve {
                    id: arch_id.to_string(),
                    message: format!("unknown mixin `{}`", inline_mixins.join(", ")),
                });
            }
            self.inner.resolve(arch_id, inline_mixins).await
        }
    }

    let dir = TempDir::new().unwrap();
    let mut singleton = arch("app.config", vec![]);
    singleton.architecture.singleton = true;

    let mut parsers = ExtensionParserRegistry::new();
    parsers.register("py", Arc::new(LineParser));
    let resolver = NoMixinResolver {
        inner: MapResolver {
            archs: [("app.config".to_string(), singleton)].into_iter().collect(),
        },
    };
    let engine = ValidationEngine::builder()
        .parser_registry(Arc::new(parsers))
        .resolver(Arc::new(resolver))
        .build()
        .expect("engine should build");

    // b.py declares the same singleton tag but fails resolution, so only
    // a.py actually resolves to the architecture: no singleton breach.
    let a = write_file(&dir, "a.py", "# @arch app.config\n");
    let b = write_file(&dir, "b.py", "# @arch app.config with bogus\n");

    let batch = engine.evaluate_batch(&[a, b], &ValidateOptions::new()).await;

    assert_eq!(batch.results[0].status, ValidationStatus::Pass);
    assert!(batch.results[0].errors.iter().all(|v| v.code != "E027"));
    assert_eq!(batch.results[1].errors[0].code, "S002");
    assert!(batch.results[1].architecture.is_none());
}

#[tokio::test]
async fn singleton_single_use_passes() {
    let dir = TempDir::new().unwrap();
    let mut singleton = arch("app.config", vec![]);
    singleton.architecture.singleton = true;
    let engine = build_engine(EngineConfig::default(), vec![("app.config", singleton)]);

    let a = write_file(&dir, "a.py", "# @arch app.config\n");
    let batch = engine.evaluate_batch(&[a], &ValidateOptions::new()).await;
    assert_eq!(batch.results[0].status, ValidationStatus::Pass);
}
