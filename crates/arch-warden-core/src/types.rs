//! Core types for validation verdicts and violations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity level for constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning that should be addressed but does not fail validation.
    Warning,
    /// Error that fails validation.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The value a rule was declared against.
///
/// Rules may target a single value or a list of values at once
/// (e.g. a list of forbidden imports).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// A single scalar value.
    One(String),
    /// A list of values.
    Many(Vec<String>),
}

impl RuleValue {
    /// Normalizes the value to a single string; lists are comma-joined.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::One(v) => v.clone(),
            Self::Many(vs) => vs.join(","),
        }
    }

    /// Tests whether the value equals or (for lists) contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Self::One(v) => v == needle,
            Self::Many(vs) => vs.iter().any(|v| v == needle),
        }
    }

    /// Returns true if this is a list value.
    #[must_use]
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }
}

impl From<&str> for RuleValue {
    fn from(v: &str) -> Self {
        Self::One(v.to_string())
    }
}

impl From<Vec<String>> for RuleValue {
    fn from(vs: Vec<String>) -> Self {
        Self::Many(vs)
    }
}

/// Source code location (1-indexed line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

impl Location {
    /// Creates a new location.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A detected rule breach.
///
/// Immutable once produced; the batch singleton check may append *new*
/// violations to an existing result, but never edits one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Violation code (e.g. "S001", "E027").
    pub code: String,
    /// Rule name (e.g. "forbid_import").
    pub rule: String,
    /// The offending value, if the rule targets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    /// Severity of this violation.
    pub severity: Severity,
    /// Location in the file, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Human-readable message.
    pub message: String,
    /// Identifier of the rule's defining source: a specific architecture or
    /// mixin id, or `engine`/`config`/`override` for synthesized violations.
    pub source: String,
    /// Optional hint on how to fix the violation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Violation {
    /// Creates a new violation with source `engine`.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            rule: rule.into(),
            value: None,
            severity,
            location: None,
            message: message.into(),
            source: "engine".to_string(),
            fix: None,
        }
    }

    /// Sets the offending value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<RuleValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the defining source identifier.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.code, self.message)?;
        if let Some(loc) = self.location {
            write!(f, " at {}:{}", loc.line, loc.column)?;
        }
        Ok(())
    }
}

/// A successfully validated, currently-in-force exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveOverride {
    /// The rule this override suppresses.
    pub rule: String,
    /// The targeted value, or `*` for any value.
    pub value: String,
    /// Mandatory justification.
    pub reason: String,
    /// Optional expiry date (ISO `YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Optional ticket reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Optional approver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// Optional warning attached during validation (e.g. "expires soon").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Per-file validation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// No final errors or warnings.
    Pass,
    /// Final warnings only.
    Warn,
    /// At least one final error.
    Fail,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Timing breakdown of one file evaluation, in fractional milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timings {
    /// Time spent parsing the file into a semantic model.
    pub parse_ms: f64,
    /// Time spent resolving the architecture.
    pub resolve_ms: f64,
    /// Time spent evaluating constraints and overrides.
    pub validate_ms: f64,
    /// Wall-clock total for the evaluation.
    pub total_ms: f64,
}

/// The per-file validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Final verdict.
    pub status: ValidationStatus,
    /// Path of the evaluated file.
    pub file: PathBuf,
    /// Resolved architecture id; `None` if untagged or unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Full inheritance chain of the resolved architecture.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inheritance_chain: Vec<String>,
    /// Mixins applied during resolution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_mixins: Vec<String>,
    /// Final (post-override) error violations.
    pub errors: Vec<Violation>,
    /// Final (post-override) warning violations.
    pub warnings: Vec<Violation>,
    /// Overrides that suppressed a violation.
    pub overrides_active: Vec<ActiveOverride>,
    /// True when there are zero final errors.
    pub passed: bool,
    /// Number of final errors.
    pub error_count: usize,
    /// Number of final warnings.
    pub warning_count: usize,
    /// Phase timing breakdown.
    pub timings: Timings,
    /// True when no parser was registered for this file type.
    #[serde(default)]
    pub skipped: bool,
    /// Why the file was skipped, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl ValidationResult {
    /// Creates an empty passing result for `file`.
    #[must_use]
    pub fn passing(file: impl Into<PathBuf>) -> Self {
        Self {
            status: ValidationStatus::Pass,
            file: file.into(),
            architecture: None,
            inheritance_chain: Vec::new(),
            applied_mixins: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            overrides_active: Vec::new(),
            passed: true,
            error_count: 0,
            warning_count: 0,
            timings: Timings::default(),
            skipped: false,
            skip_reason: None,
        }
    }

    /// Creates a skipped pass result (no parser registered for the file type).
    #[must_use]
    pub fn skipped(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        let mut result = Self::passing(file);
        result.skipped = true;
        result.skip_reason = Some(reason.into());
        result
    }

    /// Recomputes status, `passed` and counts from the violation lists.
    pub fn recompute(&mut self) {
        self.error_count = self.errors.len();
        self.warning_count = self.warnings.len();
        self.passed = self.errors.is_empty();
        self.status = if !self.errors.is_empty() {
            ValidationStatus::Fail
        } else if !self.warnings.is_empty() {
            ValidationStatus::Warn
        } else {
            ValidationStatus::Pass
        };
    }

    /// Appends a violation after the result was built, flipping the status
    /// to fail for error-level additions. Used by the batch singleton check.
    pub fn push_violation(&mut self, violation: Violation) {
        match violation.severity {
            Severity::Error => self.errors.push(violation),
            Severity::Warning => self.warnings.push(violation),
        }
        self.recompute();
    }

    /// Formats the result for terminal output.
    #[must_use]
    pub fn format_report(&self) -> String {
        use std::fmt::Write;
        let mut out = format!("{} {}", self.status, self.file.display());
        if let Some(arch) = &self.architecture {
            let _ = write!(out, " ({arch})");
        }
        if self.skipped {
            if let Some(reason) = &self.skip_reason {
                let _ = write!(out, " [skipped: {reason}]");
            }
        }
        let _ = writeln!(out);
        for v in self.errors.iter().chain(&self.warnings) {
            let _ = writeln!(out, "  {v}");
            if let Some(fix) = &v.fix {
                let _ = writeln!(out, "    = help: {fix}");
            }
        }
        for ov in &self.overrides_active {
            let _ = write!(out, "  override active: {} ({})", ov.rule, ov.reason);
            if let Some(warning) = &ov.warning {
                let _ = write!(out, " [{warning}]");
            }
            let _ = writeln!(out);
        }
        out
    }
}

/// Aggregate counts over one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of files evaluated.
    pub total: usize,
    /// Files with status `pass`.
    pub passed: usize,
    /// Files with status `fail`.
    pub failed: usize,
    /// Files with status `warn`.
    pub warned: usize,
    /// Total final error violations.
    pub errors: usize,
    /// Total final warning violations.
    pub warnings: usize,
    /// Total active overrides.
    pub overrides_active: usize,
}

/// Ordered results of a batch evaluation plus aggregate summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchValidationResult {
    /// Per-file results, in input order.
    pub results: Vec<ValidationResult>,
    /// Aggregate counts.
    pub summary: BatchSummary,
}

impl BatchValidationResult {
    /// Builds a batch result, computing the summary in a single pass.
    #[must_use]
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..BatchSummary::default()
        };
        for r in &results {
            match r.status {
                ValidationStatus::Pass => summary.passed += 1,
                ValidationStatus::Warn => summary.warned += 1,
                ValidationStatus::Fail => summary.failed += 1,
            }
            summary.errors += r.error_count;
            summary.warnings += r.warning_count;
            summary.overrides_active += r.overrides_active.len();
        }
        Self { results, summary }
    }

    /// Returns true if any file failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Formats a per-file report followed by the summary line.
    #[must_use]
    pub fn format_report(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for r in &self.results {
            out.push_str(&r.format_report());
        }
        let s = &self.summary;
        let _ = writeln!(
            out,
            "\n{} file(s): {} passed, {} warned, {} failed ({} error(s), {} warning(s), {} override(s) active)",
            s.total, s.passed, s.warned, s.failed, s.errors, s.warnings, s.overrides_active
        );
        out
    }
}
