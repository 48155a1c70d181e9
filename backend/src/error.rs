//! Error handling for the StockLedger backend
//!
//! One error type for every service; callers map the stable `code()` string
//! onto their own transport (HTTP status, job retry, ...).

use shared::units::UnitConversionError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Unit conversion across dimensions. Always fatal, never coerced.
    #[error(transparent)]
    IncompatibleUnits(#[from] UnitConversionError),

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::IncompatibleUnits(_) => "INCOMPATIBLE_UNITS",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Serialization failures and deadlocks may be retried by the caller;
    /// the ledger itself never retries in-process.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
