//! Error types for filter compilation and list queries.

use thiserror::Error;

/// Errors raised while compiling or executing a list query.
///
/// Everything except [`SpsError::Database`] is raised before the query
/// reaches the executor.
#[derive(Debug, Error)]
pub enum SpsError {
    /// The caller broke a structural contract: unknown operator token,
    /// malformed filter or skeleton shape, unknown platform.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// User input was rejected: disallowed field or operator, bad sort
    /// direction, wrong value arity.
    #[error("validation error: {0}")]
    Validation(String),

    /// A field-level value transform failed.
    #[error("value transform for \"{field}\" failed: {message}")]
    Transform { field: String, message: String },

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl SpsError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        SpsError::Configuration(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SpsError::Validation(message.into())
    }

    /// Whether the error should be reported to the client as bad input
    /// (a 4xx in HTTP terms) rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SpsError::Validation(_) | SpsError::Transform { .. })
    }
}

/// Result type alias using SpsError.
pub type SpsResult<T> = Result<T, SpsError>;
