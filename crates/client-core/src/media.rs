//! Media-session seam.
//!
//! The actual audio transport lives with the telephony provider's client
//! SDK; this crate only needs a narrow control surface over it plus the
//! stream of progress events it reports. Keeping the seam as a trait lets
//! the state machine and manager be exercised end-to-end with an in-memory
//! fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dialwave_relay_core::CallSid;

use crate::error::ClientResult;

/// Progress events reported by the media layer for the current call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MediaSessionEvent {
    /// The call was accepted and media is flowing.
    Accept { call_sid: Option<CallSid> },
    /// The remote end is being alerted.
    Ringing,
    /// The call ended normally.
    Disconnect,
    /// The call attempt was cancelled before connecting.
    Cancel,
    /// The media layer failed.
    Error { message: String },
    /// A new inbound call is offered to this device.
    Incoming { call_sid: CallSid, from_number: String },
}

/// Control surface over the provider's client-side media session.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Initialize (or re-initialize) the device. Called lazily from
    /// qualifying user interactions; a failure leaves calling unavailable
    /// but must never crash the client.
    async fn initialize(&self) -> ClientResult<()>;

    /// Whether the device is registered and able to place or take calls.
    fn is_ready(&self) -> bool;

    /// Start an outbound media connection to the given number.
    async fn connect(&self, number: &str) -> ClientResult<()>;

    /// Accept a pending incoming call.
    async fn accept(&self, call_sid: &CallSid) -> ClientResult<()>;

    /// Reject a pending incoming call.
    async fn reject(&self, call_sid: &CallSid) -> ClientResult<()>;

    /// Tear down the local media connection. Infallible by design; the
    /// provider reconciles the backend via webhooks.
    async fn disconnect(&self);

    /// Mute or unmute the local input. Local-only, no round trip.
    async fn set_muted(&self, muted: bool);
}
