//! In-call controls: hold, mute, transfer.

use chrono::Utc;

use dialwave_relay_core::AgentId;

use crate::call::{CallState, TransferInProgress, TransferMode};
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::machine::CallEvent;

use super::manager::CallManager;

impl CallManager {
    /// Toggle hold. Server-confirmed, never optimistic: the state only
    /// flips after the control plane accepts the request. On failure the
    /// session is untouched and a warning is surfaced.
    pub async fn set_hold(&self, on_hold: bool) -> ClientResult<()> {
        if on_hold {
            self.require_state("hold", &[CallState::InProgress]).await?;
        } else {
            self.require_state("resume", &[CallState::OnHold]).await?;
        }

        if let Err(e) = self.control.set_hold(on_hold).await {
            self.warn(format!("hold request failed, state unchanged: {}", e)).await;
            return Err(e);
        }

        self.apply(CallEvent::HoldConfirmed { on_hold }).await;
        Ok(())
    }

    /// Toggle the local microphone. No round trip and independent of the
    /// call state machine, but meaningless without a call.
    pub async fn set_muted(&self, muted: bool) -> ClientResult<()> {
        let current = self.session.read().await.state;
        if current.is_idle() {
            return Err(ClientError::InvalidCallState { action: "mute", current });
        }
        self.media.set_muted(muted).await;
        self.session.write().await.muted = muted;
        self.emit(ClientEvent::MuteChanged { muted, timestamp: Utc::now() }).await;
        Ok(())
    }

    /// Whether the microphone is muted.
    pub async fn is_muted(&self) -> bool {
        self.session.read().await.muted
    }

    /// Start a warm or cold transfer to another agent.
    pub async fn begin_transfer(&self, target: AgentId, mode: TransferMode) -> ClientResult<()> {
        self.require_state("transfer", &[CallState::InProgress, CallState::OnHold])
            .await?;
        self.control.begin_transfer(&target, mode).await?;
        self.session.write().await.transfer = Some(TransferInProgress {
            target: target.clone(),
            mode,
            started_at: Utc::now(),
        });
        tracing::info!(target = %target, ?mode, "transfer initiated");
        Ok(())
    }

    /// Complete a previously started warm transfer. The server removes our
    /// leg; the resulting media disconnect resets the session.
    pub async fn complete_transfer(&self) -> ClientResult<()> {
        let pending = self.session.read().await.transfer.clone();
        match pending {
            Some(t) if t.mode == TransferMode::Warm => {
                self.control.complete_transfer().await?;
                tracing::info!(target = %t.target, "warm transfer completed");
                Ok(())
            }
            Some(_) => Err(ClientError::validation(
                "cold transfers complete automatically",
            )),
            None => Err(ClientError::validation("no transfer in progress")),
        }
    }
}
