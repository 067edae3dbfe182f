//! Override validation and matching.
//!
//! Declared overrides are validated first; an invalid declaration becomes an
//! O003 error in its own right and never participates in matching. Valid
//! overrides then suppress matching violations, which are dropped entirely
//! and recorded as [`ActiveOverride`]s.

use crate::annotations::OverrideDecl;
use crate::config::{EngineConfig, OverridePolicy};
use crate::types::{ActiveOverride, Location, Severity, Violation};
use chrono::{Days, NaiveDate, Utc};

/// Outcome of validating one declared override.
#[derive(Debug, Clone, Default)]
pub struct OverrideValidation {
    /// Whether the declaration is acceptable.
    pub valid: bool,
    /// Validation failures.
    pub errors: Vec<String>,
    /// Non-fatal remarks (e.g. "expires soon").
    pub warnings: Vec<String>,
}

/// Validates declared overrides against policy.
pub trait OverrideValidator: Send + Sync {
    /// Validates one declaration.
    fn validate(&self, decl: &OverrideDecl, policy: &OverridePolicy) -> OverrideValidation;
}

/// Default validator enforcing the configured [`OverridePolicy`]:
/// mandatory reason, well-formed and in-window expiry, ticket format.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyOverrideValidator;

impl PolicyOverrideValidator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl OverrideValidator for PolicyOverrideValidator {
    fn validate(&self, decl: &OverrideDecl, policy: &OverridePolicy) -> OverrideValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if policy.require_reason
            && decl.reason.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            errors.push(format!("override for '{}' is missing a reason", decl.rule));
        }

        if let Some(expires) = &decl.expires {
            match NaiveDate::parse_from_str(expires, "%Y-%m-%d") {
                Err(_) => {
                    errors.push(format!(
                        "invalid expiry date '{expires}' (expected YYYY-MM-DD)"
                    ));
                }
                Ok(date) => {
                    let today = Utc::now().date_naive();
                    if date < today {
                        errors.push(format!("override expired on {expires}"));
                    } else if date > today + Days::new(u64::from(policy.max_expiry_days)) {
                        errors.push(format!(
                            "expiry {expires} exceeds the {}-day maximum window",
                            policy.max_expiry_days
                        ));
                    } else if date <= today + Days::new(u64::from(policy.expiry_warning_days)) {
                        warnings.push(format!("expires soon ({expires})"));
                    }
                }
            }
        }

        if let (Some(pattern), Some(ticket)) = (&policy.ticket_pattern, &decl.ticket) {
            if let Ok(re) = regex::Regex::new(pattern) {
                if !re.is_match(ticket) {
                    errors.push(format!(
                        "ticket '{ticket}' does not match required format {pattern}"
                    ));
                }
            }
        }

        OverrideValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Final violation lists after override application.
#[derive(Debug, Default)]
pub struct OverrideOutcome {
    /// Final error violations (unmatched errors plus O003/O005).
    pub errors: Vec<Violation>,
    /// Final warning violations.
    pub warnings: Vec<Violation>,
    /// Overrides that suppressed at least one violation.
    pub active: Vec<ActiveOverride>,
}

/// Applies declared overrides to the candidate violations of one file.
///
/// O003 and O005 violations synthesized here are always errors and can
/// never themselves be overridden.
pub fn apply_overrides(
    candidates: Vec<Violation>,
    declared: &[OverrideDecl],
    validator: &dyn OverrideValidator,
    config: &EngineConfig,
) -> OverrideOutcome {
    let mut outcome = OverrideOutcome::default();
    let mut own_violations = Vec::new();

    if declared.len() > config.max_overrides_per_file {
        own_violations.push(
            Violation::new(
                "O005",
                "override_limit",
                Severity::Error,
                format!(
                    "{} overrides declared, per-file maximum is {}",
                    declared.len(),
                    config.max_overrides_per_file
                ),
            )
            .with_source("override"),
        );
    }

    // Partition declarations: invalid ones become O003 errors and are
    // excluded from matching.
    let mut valid: Vec<(&OverrideDecl, Option<String>)> = Vec::new();
    for decl in declared {
        let validation = validator.validate(decl, &config.override_policy);
        if validation.valid {
            valid.push((decl, validation.warnings.first().cloned()));
        } else {
            own_violations.push(
                Violation::new(
                    "O003",
                    "invalid_override",
                    Severity::Error,
                    format!(
                        "invalid override for '{}': {}",
                        decl.rule,
                        validation.errors.join("; ")
                    ),
                )
                .with_location(Location::new(decl.line, 1))
                .with_source("override"),
            );
        }
    }

    let mut matched: Vec<bool> = vec![false; valid.len()];
    for violation in candidates {
        let hit = valid
            .iter()
            .position(|(decl, _)| override_matches(&violation, decl));
        match hit {
            Some(idx) => {
                if !matched[idx] {
                    matched[idx] = true;
                    let (decl, warning) = &valid[idx];
                    outcome.active.push(ActiveOverride {
                        rule: decl.rule.clone(),
                        value: decl.value.clone().unwrap_or_else(|| "*".to_string()),
                        reason: decl.reason.clone().unwrap_or_default(),
                        expires: decl.expires.clone(),
                        ticket: decl.ticket.clone(),
                        approved_by: decl.approved_by.clone(),
                        warning: warning.clone(),
                    });
                }
                // Matched violations are dropped entirely.
            }
            None => match violation.severity {
                Severity::Error => outcome.errors.push(violation),
                Severity::Warning => outcome.warnings.push(violation),
            },
        }
    }

    outcome.errors.extend(own_violations);
    outcome
}

/// Tests whether a valid override suppresses a violation.
fn override_matches(violation: &Violation, decl: &OverrideDecl) -> bool {
    if violation.rule != decl.rule {
        return false;
    }
    let target = decl.value.as_deref().unwrap_or("*");
    if target == "*" {
        return true;
    }
    // List-valued constraints report the one value that triggered inside
    // single quotes in the message.
    if violation.message.contains(&format!("'{target}'")) {
        return true;
    }
    match &violation.value {
        Some(value) => value.normalized() == target || (value.is_many() && value.contains(target)),
        None => false,
    }
}
