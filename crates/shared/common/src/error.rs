//! Unified error handling for the suite store.
//!
//! Provides a single error type for the database wrapper, the schema loader
//! and the command-line front end.

use domain::DomainError;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    // Schema loading
    #[error("Could not load schema '{path}': {message}")]
    SchemaFile { path: String, message: String },

    #[error(transparent)]
    Domain(#[from] DomainError),

    // External errors
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::SchemaFile { .. } => "SCHEMA_FILE_ERROR",
            AppError::Domain(DomainError::SchemaChange(_)) => "SCHEMA_CHANGE",
            AppError::Domain(_) => "INVALID_SCHEMA",
            #[cfg(feature = "database")]
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self, what: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, what: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(what.into()))
    }
}

/// Convenience constructors
impl AppError {
    pub fn schema_file(path: impl Into<String>, message: impl ToString) -> Self {
        AppError::SchemaFile {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
