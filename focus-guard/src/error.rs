//! Error types for the focus-guard validation library.
//!
//! All errors are represented by the [`FocusError`] enum. Structural errors
//! (schema, version, cyclic constraints, unresolved rule conflicts) abort a
//! run; a predicate that simply does not hold is never an error and shows up
//! as a failed outcome in the report instead.

use thiserror::Error;

/// The main error type for focus-guard.
#[derive(Error, Debug)]
pub enum FocusError {
    /// A rule or dataset does not line up with the column schema.
    #[error("Schema error: {message}")]
    Schema {
        /// Human-readable error message
        message: String,
        /// The column involved, when there is one
        column: Option<String>,
    },

    /// The requested catalog version is not one of the supported versions.
    #[error("Unsupported FOCUS version '{version}' (supported: {})", supported.join(", "))]
    UnsupportedVersion {
        /// The version that was requested
        version: String,
        /// The versions that are available
        supported: Vec<String>,
    },

    /// The synthesizer could not find a generation order for the columns.
    #[error("Cyclic constraint between columns: {}", columns.join(" -> "))]
    CyclicConstraint {
        /// Columns left over once every orderable column was placed
        columns: Vec<String>,
    },

    /// Two contradicting rules share a priority so neither can win.
    #[error("Rules '{first}' and '{second}' conflict on column '{column}' with equal priority {priority}")]
    ConflictingRules {
        /// Column both rules constrain
        column: String,
        /// Rule declared first in the catalog
        first: String,
        /// Rule declared second in the catalog
        second: String,
        /// The shared priority
        priority: i32,
    },

    /// A predicate could not be applied to a value.
    #[error("Evaluation of rule '{rule_id}' failed: {message}")]
    Evaluation {
        /// Rule being evaluated
        rule_id: String,
        /// Detailed error message
        message: String,
    },

    /// The catalog itself is malformed.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, FocusError>`.
pub type Result<T> = std::result::Result<T, FocusError>;

impl FocusError {
    /// Creates a schema error that is not tied to a single column.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            column: None,
        }
    }

    /// Creates a schema error about a specific column.
    pub fn schema_column(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            column: Some(column.into()),
        }
    }

    /// Creates an evaluation error for a rule.
    pub fn evaluation(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid catalog error.
    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        Self::InvalidCatalog(message.into())
    }

    /// Returns true for errors that must abort a whole validation run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. }
                | Self::UnsupportedVersion { .. }
                | Self::CyclicConstraint { .. }
                | Self::ConflictingRules { .. }
                | Self::InvalidCatalog(_)
        )
    }
}

impl From<serde_json::Error> for FocusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<FocusError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            FocusError::Internal(inner) => FocusError::Internal(format!("{msg}: {inner}")),
            other => FocusError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                FocusError::Internal(inner) => FocusError::Internal(format!("{msg}: {inner}")),
                other => FocusError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}
