//! Error types and result handling for email event ingestion.
//!
//! Defines a structured error taxonomy with stable codes for client
//! disambiguation and HTTP status mapping. Client errors (malformed
//! payloads) are rejected before any store access; storage failures
//! surface with their underlying description and no automatic retry.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Service-level error with codes for ingestion requests.
#[derive(Debug, Error)]
pub enum MailsinkError {
    /// Request body is not valid JSON (E1001).
    #[error("[E1001] Invalid JSON body: {0}")]
    InvalidJson(String),

    /// Payload has no `type` field (E1002).
    ///
    /// Rejected before any store access.
    #[error("[E1002] Missing event type in payload")]
    MissingEventType,

    /// Webhook signature verification failed (E1003).
    #[error("[E1003] Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Storage query, insert, or upsert failed (E2001).
    ///
    /// Covers an insert that returns no created record.
    #[error("[E2001] Storage failure: {0}")]
    Storage(#[from] CoreError),

    /// Generic error for wrapping other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MailsinkError {
    /// Returns the stable error code for client disambiguation.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "E1001",
            Self::MissingEventType => "E1002",
            Self::InvalidSignature(_) => "E1003",
            Self::Storage(_) => "E2001",
            Self::Other(_) => "E9999",
        }
    }

    /// Returns whether the fault lies with the caller.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson(_) | Self::MissingEventType | Self::InvalidSignature(_)
        )
    }
}
