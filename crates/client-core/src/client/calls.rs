//! Call setup and teardown operations.

use crate::call::{CallDirection, CallId, CallState};
use crate::error::{ClientError, ClientResult};
use crate::machine::CallEvent;
use crate::media::MediaSessionEvent;

use super::manager::CallManager;

impl CallManager {
    /// Place an outbound call.
    ///
    /// Valid only from `Idle`; the session enters `Connecting` immediately
    /// and the media layer drives it forward from there. A connect failure
    /// resets the session so the client is never stuck half-dialed.
    pub async fn make_call(&self, number: impl Into<String>) -> ClientResult<CallId> {
        let number = number.into();
        if number.trim().is_empty() {
            return Err(ClientError::validation("destination number is empty"));
        }
        self.ensure_device().await?;
        self.require_state("make_call", &[CallState::Idle]).await?;

        let call_id = CallId::new_v4();
        self.apply(CallEvent::DialStarted {
            call_id,
            number: number.clone(),
            direction: CallDirection::Outbound,
        })
        .await;

        if let Err(e) = self.media.connect(&number).await {
            tracing::warn!(error = %e, "outbound connect failed, resetting session");
            self.apply(CallEvent::Media(MediaSessionEvent::Error {
                message: e.to_string(),
            }))
            .await;
            return Err(e);
        }

        self.stats.lock().await.total_calls += 1;
        tracing::info!(%call_id, %number, "outbound call started");
        Ok(call_id)
    }

    /// Accept the pending incoming call.
    pub async fn accept_call(&self) -> ClientResult<CallId> {
        self.ensure_device().await?;
        self.require_state("accept_call", &[CallState::Idle]).await?;

        let offer = self
            .incoming
            .write()
            .await
            .take()
            .ok_or(ClientError::NoIncomingCall)?;

        let call_id = CallId::new_v4();
        self.apply(CallEvent::DialStarted {
            call_id,
            number: offer.from_number.clone(),
            direction: CallDirection::Inbound,
        })
        .await;
        // The offer already carries the provider leg id.
        self.session.write().await.call_sid = Some(offer.call_sid.clone());

        if let Err(e) = self.media.accept(&offer.call_sid).await {
            tracing::warn!(error = %e, "accept failed, resetting session");
            self.apply(CallEvent::Media(MediaSessionEvent::Error {
                message: e.to_string(),
            }))
            .await;
            return Err(e);
        }

        self.stats.lock().await.total_calls += 1;
        tracing::info!(%call_id, from = %offer.from_number, "incoming call accepted");
        Ok(call_id)
    }

    /// Reject the pending incoming call.
    pub async fn reject_call(&self) -> ClientResult<()> {
        let offer = self
            .incoming
            .write()
            .await
            .take()
            .ok_or(ClientError::NoIncomingCall)?;
        self.media.reject(&offer.call_sid).await?;
        tracing::info!(from = %offer.from_number, "incoming call rejected");
        Ok(())
    }

    /// Hang up the current call.
    ///
    /// Local state always reaches `Idle`, even when the control-plane
    /// request fails. UI consistency wins, and the termination webhook
    /// reconciles the backend later. Idempotent from `Idle`.
    pub async fn hangup(&self) -> ClientResult<()> {
        if self.call_state().await.is_idle() {
            return Ok(());
        }

        if let Err(e) = self.control.hangup().await {
            self.warn(format!("hangup request failed, forcing local idle: {}", e))
                .await;
        }
        self.media.disconnect().await;
        self.apply(CallEvent::HangupRequested).await;
        Ok(())
    }
}
