//! # arch-warden-rules
//!
//! Built-in rule checkers for arch-warden.
//!
//! This crate provides the standard checkers dispatched by the validation
//! engine for the common governance rules.
//!
//! ## Available Rules
//!
//! | Code | Name | Description |
//! |------|------|-------------|
//! | R001 | `forbid_import` | Forbids importing the named modules |
//! | R002 | `require_import` | Requires the named modules to be imported |
//! | R003 | `forbid_call` | Forbids calling the named targets |
//! | R004 | `require_decorator` | Requires the named decorators to be present |
//!
//! ## Usage
//!
//! ```ignore
//! use arch_warden_core::ValidationEngine;
//! use arch_warden_rules::builtin_registry;
//!
//! let engine = ValidationEngine::builder()
//!     .resolver(resolver)
//!     .checker_registry(std::sync::Arc::new(builtin_registry()))
//!     .build()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod forbid_call;
mod forbid_import;
mod require_decorator;
mod require_import;

pub use forbid_call::ForbidCall;
pub use forbid_import::ForbidImport;
pub use require_decorator::RequireDecorator;
pub use require_import::RequireImport;

use arch_warden_core::{NamedCheckerRegistry, RuleValue};
use std::sync::Arc;

/// Builds a registry holding every built-in checker.
#[must_use]
pub fn builtin_registry() -> NamedCheckerRegistry {
    let mut registry = NamedCheckerRegistry::new();
    registry.register(Arc::new(ForbidImport::new()));
    registry.register(Arc::new(RequireImport::new()));
    registry.register(Arc::new(ForbidCall::new()));
    registry.register(Arc::new(RequireDecorator::new()));
    registry
}

/// Flattens a constraint value into its individual targets.
pub(crate) fn target_values(value: &RuleValue) -> Vec<&str> {
    match value {
        RuleValue::One(v) => vec![v.as_str()],
        RuleValue::Many(vs) => vs.iter().map(String::as_str).collect(),
    }
}
