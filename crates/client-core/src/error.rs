//! Error types for client-side call coordination.

use crate::call::{CallId, CallState};

/// Errors surfaced by the call manager.
///
/// The policy split matters more than the variants themselves: a
/// [`ClientError::Device`] failure never tears the client down: calling
/// simply stays unavailable until the next qualifying user interaction
/// re-triggers device initialization. A [`ClientError::Provider`] failure
/// during hold or transfer leaves call state untouched; during hangup the
/// local state is forced to idle regardless and the backend reconciles via
/// the termination webhook.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// No call matches the given id.
    #[error("call not found: {call_id}")]
    CallNotFound { call_id: CallId },

    /// There is no pending incoming call to accept or reject.
    #[error("no incoming call to act on")]
    NoIncomingCall,

    /// The operation is not legal in the current call state.
    #[error("invalid call state for {action}: {current}")]
    InvalidCallState { action: &'static str, current: CallState },

    /// Input failed validation.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The server rejected the action for an agent that does not own the call.
    #[error("not authorized: {reason}")]
    Authorization { reason: String },

    /// The media device failed to initialize or register.
    #[error("media device error: {message}")]
    Device { message: String },

    /// A control-plane request against the provider failed.
    #[error("control plane request failed: {message}")]
    Provider { message: String },

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ClientError {
    pub fn device(message: impl Into<String>) -> Self {
        ClientError::Device { message: message.into() }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        ClientError::Provider { message: message.into() }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        ClientError::Validation { reason: reason.into() }
    }
}

/// Result alias used throughout client-core.
pub type ClientResult<T> = Result<T, ClientError>;
