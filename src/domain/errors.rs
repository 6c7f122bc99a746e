//! Domain error types
//!
//! This module defines the error hierarchy for Strata. Every failure the
//! resolution engine can report is a variant of [`StrataError`]; secret
//! backends report [`BackendError`], which the registry wraps before it
//! reaches the caller.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Main Strata error type
///
/// Source Reader and Interpolation Resolver errors abort a load before any
/// mapping reaches the schema. Schema failures are always reported as
/// [`StrataError::SchemaValidation`], enriched with suggestions and provenance.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Malformed line in an override file
    #[error("Parse error in {path} at line {line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    /// `${NAME}` token that names neither a resolved key nor an environment variable
    #[error("Unresolved reference ${{{token}}} in value of {key}")]
    UnresolvedReference { token: String, key: String },

    /// Interpolation references that loop back on themselves
    #[error("Cyclic reference: {}", .cycle.join(" -> "))]
    CyclicReference { cycle: Vec<String> },

    /// Flat keys that cannot be arranged into a tree
    #[error("Key mapping error: {0}")]
    KeyMapping(String),

    /// Field-level failures reported by the schema
    #[error("Configuration validation failed:\n{}", render_field_errors(.errors))]
    SchemaValidation { errors: Vec<FieldError> },

    /// Keys present in override files that the schema does not declare
    #[error("Unknown configuration keys in strict mode: {}", .unknown.join(", "))]
    StrictModeViolation {
        unknown: Vec<String>,
        suggestions: BTreeMap<String, String>,
    },

    /// Secret reference naming a backend that was never registered
    #[error("Secret backend '{name}' not registered. Available: {}", .available.join(", "))]
    UnknownBackend {
        name: String,
        available: Vec<String>,
    },

    /// Backend failure while fetching a secret
    #[error("Failed to resolve secret '{key}' from backend '{backend}': {source}")]
    SecretResolution {
        backend: String,
        key: String,
        source: BackendError,
    },

    /// Text that looks like a secret reference but cannot be parsed
    #[error("Invalid secret reference: {0}")]
    InvalidSecretReference(String),

    /// Engine or manifest configuration problems
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StrataError {
    /// Process exit status for this error kind
    ///
    /// `1` is reserved for a diagnosis that failed without an error.
    pub fn exit_code(&self) -> i32 {
        match self {
            StrataError::SchemaValidation { .. }
            | StrataError::StrictModeViolation { .. }
            | StrataError::Configuration(_) => 2,
            StrataError::Parse { .. }
            | StrataError::UnresolvedReference { .. }
            | StrataError::CyclicReference { .. }
            | StrataError::KeyMapping(_) => 3,
            StrataError::UnknownBackend { .. }
            | StrataError::SecretResolution { .. }
            | StrataError::InvalidSecretReference(_) => 4,
            StrataError::Io(_) | StrataError::Serialization(_) => 5,
        }
    }
}

/// Secret backend errors
///
/// Backends never expose their SDK or HTTP client error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend has no secret under the requested key
    #[error("secret not found: {0}")]
    NotFound(String),

    /// Credentials missing or rejected
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with something we cannot read
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The backend itself is misconfigured
    #[error("backend misconfigured: {0}")]
    Configuration(String),
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Flat key of the field (e.g. `DATABASE__HOST`)
    pub field: String,

    /// What went wrong
    pub message: String,

    /// Closest known key, when one is near enough to be a likely typo
    pub suggestion: Option<String>,

    /// Source that supplied the offending value, if any
    pub source: Option<String>,
}

impl FieldError {
    /// Creates a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
            source: None,
        }
    }

    /// Sets the suggested key
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Sets the provenance of the offending value
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (from {source})")?;
        }
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " - did you mean {suggestion}?")?;
        }
        Ok(())
    }
}

fn render_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// Conversion from std::io::Error
impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        StrataError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for StrataError {
    fn from(err: toml::de::Error) -> Self {
        StrataError::Configuration(format!("TOML parse error: {err}"))
    }
}
