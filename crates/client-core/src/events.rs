//! Client event surface.
//!
//! The manager publishes everything that happens to the call over a
//! broadcast channel and, optionally, to a registered
//! [`ClientEventHandler`]. Both views carry the same payloads; the channel
//! suits subscribers that fold events into their own state (the power
//! dialer watches call-state changes this way), the handler suits
//! application callbacks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dialwave_relay_core::{AgentId, AgentStatus};

use crate::call::{CallId, CallState, IncomingCallInfo};

/// What to do with an incoming call offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    Accept,
    Reject,
    /// Leave the offer pending for the application to act on later.
    Ignore,
}

/// Details of a call state transition.
#[derive(Debug, Clone)]
pub struct CallStatusInfo {
    pub call_id: Option<CallId>,
    pub new_state: CallState,
    pub previous_state: CallState,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Events published by the call manager.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The call state machine moved.
    CallStateChanged { info: CallStatusInfo },
    /// A new incoming call is offered.
    IncomingCall { info: IncomingCallInfo },
    /// Local mute toggled.
    MuteChanged { muted: bool, timestamp: DateTime<Utc> },
    /// A non-fatal problem the agent should see (e.g. a hold request the
    /// server rejected).
    Warning { message: String, timestamp: DateTime<Utc> },
    /// Another agent's presence changed, relayed from the server.
    AgentStatusChanged {
        agent_id: AgentId,
        status: AgentStatus,
        timestamp: DateTime<Utc>,
    },
}

/// Application callback surface.
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// Decide what to do with an incoming call offer.
    async fn on_incoming_call(&self, info: IncomingCallInfo) -> CallAction;

    /// Observe call state transitions.
    async fn on_call_state_changed(&self, info: CallStatusInfo);

    /// Observe user-visible warnings. Default: ignore.
    async fn on_warning(&self, _message: String) {}
}
