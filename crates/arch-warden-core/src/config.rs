//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Policy for files carrying no architecture tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntaggedPolicy {
    /// Untagged files fail with a single S001 error.
    Deny,
    /// Untagged files pass with a single S001 warning.
    Warn,
    /// Untagged files pass clean.
    #[default]
    Allow,
}

/// Policy for `forbid_*` rules declared without a `why` explanation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingWhyPolicy {
    /// Do not report.
    Ignore,
    /// Report a C001 warning.
    #[default]
    Warn,
    /// Report a C001 error.
    Error,
}

/// Policy for declared intents absent from the intent registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedIntentPolicy {
    /// Do not report.
    Ignore,
    /// Report an I001 warning.
    #[default]
    Warning,
    /// Report an I001 error.
    Error,
}

/// Validation policy for declared overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverridePolicy {
    /// Whether a non-empty reason is mandatory.
    #[serde(default = "default_true")]
    pub require_reason: bool,
    /// Maximum allowed expiry window, in days from today.
    #[serde(default = "default_max_expiry_days")]
    pub max_expiry_days: u32,
    /// Days before expiry at which an "expires soon" warning is attached.
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: u32,
    /// Regex a ticket reference must match, when one is given.
    #[serde(default)]
    pub ticket_pattern: Option<String>,
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self {
            require_reason: true,
            max_expiry_days: default_max_expiry_days(),
            expiry_warning_days: default_expiry_warning_days(),
            ticket_pattern: None,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Policy for untagged files.
    #[serde(default)]
    pub untagged: UntaggedPolicy,
    /// Policy for `forbid_*` rules without a `why`.
    #[serde(default)]
    pub missing_why: MissingWhyPolicy,
    /// Policy for intents missing from the registry.
    #[serde(default)]
    pub undefined_intent: UndefinedIntentPolicy,
    /// Maximum declared overrides per file before an O005 error.
    #[serde(default = "default_max_overrides")]
    pub max_overrides_per_file: usize,
    /// Batch concurrency; when unset, derived from available parallelism.
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Override validation policy.
    #[serde(default)]
    pub override_policy: OverridePolicy,
}

// The serde defaults only cover deserialization, so Default::default()
// must produce the same values by hand.
impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            untagged: UntaggedPolicy::default(),
            missing_why: MissingWhyPolicy::default(),
            undefined_intent: UndefinedIntentPolicy::default(),
            max_overrides_per_file: default_max_overrides(),
            concurrency: None,
            override_policy: OverridePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_max_expiry_days() -> u32 {
    90
}

fn default_expiry_warning_days() -> u32 {
    14
}

fn default_max_overrides() -> usize {
    10
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },
}
