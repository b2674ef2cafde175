//! Raw webhook payloads delivered by the telephony provider.
//!
//! Delivery order is not guaranteed and retries are at-least-once, so every
//! consumer of these payloads must be safe to execute more than once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CallSid, ConferenceSid};

/// Role of a participant leg, as labelled when the leg was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// An agent leg; carries the agent id the leg was dialed for.
    Agent { agent_id: String },
    /// The external party's leg.
    External,
}

/// Webhook events the provider posts to the call engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProviderWebhook {
    ConferenceStarted {
        conference_sid: ConferenceSid,
        timestamp: DateTime<Utc>,
    },
    ParticipantJoined {
        conference_sid: ConferenceSid,
        call_sid: CallSid,
        role: ParticipantRole,
        timestamp: DateTime<Utc>,
    },
    ParticipantLeft {
        conference_sid: ConferenceSid,
        call_sid: CallSid,
        role: ParticipantRole,
        timestamp: DateTime<Utc>,
    },
    ConferenceEnded {
        conference_sid: ConferenceSid,
        timestamp: DateTime<Utc>,
    },
    RecordingReady {
        conference_sid: ConferenceSid,
        recording_url: String,
        duration_secs: Option<i64>,
        timestamp: DateTime<Utc>,
    },
}

impl ProviderWebhook {
    /// The conference this webhook concerns.
    pub fn conference_sid(&self) -> &ConferenceSid {
        match self {
            ProviderWebhook::ConferenceStarted { conference_sid, .. }
            | ProviderWebhook::ParticipantJoined { conference_sid, .. }
            | ProviderWebhook::ParticipantLeft { conference_sid, .. }
            | ProviderWebhook::ConferenceEnded { conference_sid, .. }
            | ProviderWebhook::RecordingReady { conference_sid, .. } => conference_sid,
        }
    }
}
