//! Domain-level errors.
//!
//! These errors represent schema rule violations.
//! They are independent of infrastructure concerns (database, filesystem).

use thiserror::Error;

/// Domain-specific errors for schema rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Schema document is malformed or violates a naming rule
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Schema differs from the stored one in an unsupported way
    #[error("Unsupported schema change: {0}")]
    SchemaChange(String),
}

impl DomainError {
    /// Create an invalid schema error
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        DomainError::InvalidSchema(msg.into())
    }

    /// Create a schema change error
    pub fn schema_change(msg: impl Into<String>) -> Self {
        DomainError::SchemaChange(msg.into())
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
