//! Telephony provider control-plane seam.
//!
//! The provider owns transport, media, and the conference primitive
//! itself; the engine only drives it through this narrow surface. Leg
//! mutations on the provider are not transactional, so callers treat
//! "already in expected state" responses as advisory and rely on
//! idempotent upserts in the database layer to absorb retries.

use async_trait::async_trait;

use dialwave_relay_core::{CallSid, ConferenceSid};

use crate::error::EngineResult;

/// A finalized recording the provider has made available.
#[derive(Debug, Clone)]
pub struct RecordingInfo {
    pub url: String,
    pub duration_secs: Option<i64>,
}

/// Control plane of the external telephony provider.
#[async_trait]
pub trait ProviderControl: Send + Sync {
    /// Dial one participant into a conference. Returns the new leg's SID.
    async fn add_participant(
        &self,
        conference: &ConferenceSid,
        to: &str,
        from: &str,
    ) -> EngineResult<CallSid>;

    /// Ring several endpoints simultaneously for an inbound call. The
    /// first endpoint to answer is bridged into the conference; the dial
    /// primitive releases the rest automatically.
    async fn ring_endpoints(
        &self,
        conference: &ConferenceSid,
        endpoints: &[String],
        from: &str,
    ) -> EngineResult<()>;

    /// Remove a leg from a conference.
    async fn remove_participant(
        &self,
        conference: &ConferenceSid,
        call: &CallSid,
    ) -> EngineResult<()>;

    /// Update the hold flag on one leg.
    async fn set_participant_hold(
        &self,
        conference: &ConferenceSid,
        call: &CallSid,
        on_hold: bool,
    ) -> EngineResult<()>;

    /// List finalized recordings for a conference. Recordings are not
    /// available synchronously at conference end.
    async fn recordings_for(&self, conference: &ConferenceSid) -> EngineResult<Vec<RecordingInfo>>;
}
