//! Normalized real-time channel events.
//!
//! These are the events fanned out to connected clients after the call
//! engine has persisted the authoritative state change. The channel is not
//! buffered and is never replayed; clients that miss events resync from
//! request/response reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentStatus;
use crate::ids::{AgentId, CallSid, ConferenceSid};
use crate::webhook::ProviderWebhook;

/// Events broadcast to clients over the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChannelEvent {
    /// An outbound call was placed on behalf of an agent.
    CallOutboundStarted {
        agent_id: AgentId,
        conference_sid: ConferenceSid,
        to_number: String,
        timestamp: DateTime<Utc>,
    },
    /// The provider reported the conference as started.
    ConferenceStarted {
        conference_sid: ConferenceSid,
        timestamp: DateTime<Utc>,
    },
    /// A leg joined the conference.
    ParticipantJoined {
        conference_sid: ConferenceSid,
        call_sid: CallSid,
        timestamp: DateTime<Utc>,
    },
    /// The conference ended and the call record was finalized.
    CallEnded {
        conference_sid: ConferenceSid,
        timestamp: DateTime<Utc>,
    },
    /// Hold state changed for a call, confirmed against the provider.
    HoldChanged {
        conference_sid: ConferenceSid,
        on_hold: bool,
        timestamp: DateTime<Utc>,
    },
    /// An agent's presence changed.
    AgentStatusChanged {
        agent_id: AgentId,
        status: AgentStatus,
        timestamp: DateTime<Utc>,
    },
}

/// Map a provider webhook to the channel event it should fan out as.
///
/// Returns `None` for webhooks that update state without notifying clients
/// (participant-left, recording-ready). The caller is responsible for
/// persisting authoritative state before broadcasting the returned event.
pub fn normalize(webhook: &ProviderWebhook) -> Option<ChannelEvent> {
    match webhook {
        ProviderWebhook::ConferenceStarted { conference_sid, timestamp } => {
            Some(ChannelEvent::ConferenceStarted {
                conference_sid: conference_sid.clone(),
                timestamp: *timestamp,
            })
        }
        ProviderWebhook::ParticipantJoined { conference_sid, call_sid, timestamp, .. } => {
            Some(ChannelEvent::ParticipantJoined {
                conference_sid: conference_sid.clone(),
                call_sid: call_sid.clone(),
                timestamp: *timestamp,
            })
        }
        ProviderWebhook::ConferenceEnded { conference_sid, timestamp } => {
            Some(ChannelEvent::CallEnded {
                conference_sid: conference_sid.clone(),
                timestamp: *timestamp,
            })
        }
        ProviderWebhook::ParticipantLeft { .. } | ProviderWebhook::RecordingReady { .. } => None,
    }
}
