//! Call session types.
//!
//! [`CallSession`] is the single client-resident record of the live call.
//! It is owned exclusively by the call state machine and is destroyed
//! (reset to the idle default) on every termination path, so no call-scoped
//! field can leak into the next call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dialwave_relay_core::{AgentId, CallSid, ConferenceSid};

/// Unique client-side identifier for a call.
pub type CallId = uuid::Uuid;

/// Client-observed state of the live call.
///
/// Transitions are monotonic (`Idle → Connecting → Ringing → InProgress`)
/// with the single exception of the hold toggle between `InProgress` and
/// `OnHold`. Any disconnect, cancel, or error collapses the machine back to
/// `Idle` in one atomic reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No call in progress.
    Idle,
    /// A connect was requested; the media layer is setting up.
    Connecting,
    /// The remote end is being alerted.
    Ringing,
    /// Media is flowing.
    InProgress,
    /// Server-confirmed hold.
    OnHold,
}

impl CallState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CallState::Idle)
    }

    /// States in which a call is established on the provider side.
    pub fn is_established(&self) -> bool {
        matches!(self, CallState::InProgress | CallState::OnHold)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallState::Idle => "idle",
            CallState::Connecting => "connecting",
            CallState::Ringing => "ringing",
            CallState::InProgress => "in_progress",
            CallState::OnHold => "on_hold",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a call relative to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Outbound,
    Inbound,
}

pub use dialwave_relay_core::TransferMode;

/// Descriptor for a transfer the agent has initiated but that has not yet
/// terminated this leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInProgress {
    pub target: AgentId,
    pub mode: TransferMode,
    pub started_at: DateTime<Utc>,
}

/// The client-resident record of the one live call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    pub call_id: Option<CallId>,
    pub direction: Option<CallDirection>,
    pub remote_number: Option<String>,
    pub state: CallState,
    /// Local-only microphone mute; no provider round trip.
    pub muted: bool,
    /// Provider leg identifier, once known.
    pub call_sid: Option<CallSid>,
    /// Conference the leg is attached to, once known.
    pub conference_sid: Option<ConferenceSid>,
    /// Pending transfer, if the agent initiated one.
    pub transfer: Option<TransferInProgress>,
}

impl Default for CallSession {
    fn default() -> Self {
        Self {
            call_id: None,
            direction: None,
            remote_number: None,
            state: CallState::Idle,
            muted: false,
            call_sid: None,
            conference_sid: None,
            transfer: None,
        }
    }
}

impl CallSession {
    /// The idle session every termination path resets to.
    pub fn reset() -> Self {
        Self::default()
    }
}

/// An unanswered incoming call, held outside the main state machine until
/// the agent accepts or rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCallInfo {
    pub call_sid: CallSid,
    pub from_number: String,
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_is_clean_idle() {
        let session = CallSession::default();
        assert!(session.state.is_idle());
        assert!(!session.muted);
        assert!(session.call_id.is_none());
        assert!(session.conference_sid.is_none());
        assert!(session.transfer.is_none());
    }

    #[test]
    fn test_established_states() {
        assert!(CallState::InProgress.is_established());
        assert!(CallState::OnHold.is_established());
        assert!(!CallState::Ringing.is_established());
        assert!(!CallState::Idle.is_established());
    }
}
