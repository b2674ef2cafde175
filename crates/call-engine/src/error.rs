//! Error types for the call engine.

/// Errors surfaced by orchestration and the control surface.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Input failed validation.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The requesting agent does not own the call being acted on.
    #[error("not authorized: {reason}")]
    Authorization { reason: String },

    /// No matching record (active call, agent, log entry).
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A control-plane request against the telephony provider failed.
    #[error("provider request failed: {message}")]
    Provider { message: String },

    /// The database layer failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn validation(reason: impl Into<String>) -> Self {
        EngineError::Validation { reason: reason.into() }
    }

    pub fn authorization(reason: impl Into<String>) -> Self {
        EngineError::Authorization { reason: reason.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound { what: what.into() }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        EngineError::Provider { message: message.into() }
    }
}

/// Result alias used throughout the call engine.
pub type EngineResult<T> = Result<T, EngineError>;
