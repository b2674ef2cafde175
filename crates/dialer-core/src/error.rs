//! Error types for the power dialer.

use dialwave_client_core::ClientError;

use crate::session::DialerPhase;

/// Errors surfaced by the sequencer.
///
/// Failures to fetch or place the next call are session-fatal by policy:
/// the sequencer aborts to idle and clears its local queue state rather
/// than looping over a lead list under an unrecoverable condition.
#[derive(Debug, thiserror::Error)]
pub enum DialerError {
    /// The call device is not registered; a session cannot start.
    #[error("call device is not ready")]
    DeviceNotReady,

    /// A dialer session is already running (global singleton).
    #[error("a dialer session is already active")]
    SessionAlreadyActive,

    /// The operation is not legal in the current phase.
    #[error("invalid dialer phase for {action}: {phase}")]
    InvalidPhase { action: &'static str, phase: DialerPhase },

    /// Input failed validation (bad status or follow-up date).
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The lead queue collaborator failed.
    #[error("lead queue error: {message}")]
    LeadQueue { message: String },

    /// The durable skip store failed.
    #[error("skip store error: {message}")]
    SkipStore { message: String },

    /// A call operation failed underneath the sequencer.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DialerError {
    pub fn validation(reason: impl Into<String>) -> Self {
        DialerError::Validation { reason: reason.into() }
    }

    pub fn lead_queue(message: impl Into<String>) -> Self {
        DialerError::LeadQueue { message: message.into() }
    }

    pub fn skip_store(message: impl Into<String>) -> Self {
        DialerError::SkipStore { message: message.into() }
    }
}

/// Result alias used throughout dialer-core.
pub type DialerResult<T> = Result<T, DialerError>;
