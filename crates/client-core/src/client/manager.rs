//! The call manager.
//!
//! [`CallManager`] owns the one [`CallSession`] and feeds every event
//! (local actions, media-session events, relayed channel events) through
//! the pure transition function in [`crate::machine`]. Everything
//! observable (state changes, incoming offers, warnings) is published on a
//! broadcast channel and forwarded to an optional registered handler.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};

use dialwave_relay_core::ChannelEvent;

use crate::call::{CallSession, CallState, IncomingCallInfo};
use crate::control::ControlPlane;
use crate::error::{ClientError, ClientResult};
use crate::events::{CallAction, CallStatusInfo, ClientEvent, ClientEventHandler};
use crate::machine::{transition, CallEvent};
use crate::media::{MediaSession, MediaSessionEvent};

use super::config::ClientConfig;

/// Counters exposed for monitoring.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Calls placed or accepted since the manager was created.
    pub total_calls: usize,
    /// Calls that have reached a terminated state.
    pub completed_calls: usize,
}

/// Client-side coordinator for the single live call.
pub struct CallManager {
    pub(crate) config: ClientConfig,
    pub(crate) media: Arc<dyn MediaSession>,
    pub(crate) control: Arc<dyn ControlPlane>,
    pub(crate) session: Arc<RwLock<CallSession>>,
    /// Pending incoming offer, held outside the state machine.
    pub(crate) incoming: Arc<RwLock<Option<IncomingCallInfo>>>,
    pub(crate) handler: Arc<RwLock<Option<Arc<dyn ClientEventHandler>>>>,
    pub(crate) event_tx: broadcast::Sender<ClientEvent>,
    pub(crate) stats: Arc<Mutex<ClientStats>>,
}

impl CallManager {
    pub fn new(
        config: ClientConfig,
        media: Arc<dyn MediaSession>,
        control: Arc<dyn ControlPlane>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            config,
            media,
            control,
            session: Arc::new(RwLock::new(CallSession::default())),
            incoming: Arc::new(RwLock::new(None)),
            handler: Arc::new(RwLock::new(None)),
            event_tx,
            stats: Arc::new(Mutex::new(ClientStats::default())),
        }
    }

    /// Register an application event handler.
    pub async fn set_event_handler(&self, handler: Arc<dyn ClientEventHandler>) {
        *self.handler.write().await = Some(handler);
    }

    /// Subscribe to the event broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the current call session.
    pub async fn session(&self) -> CallSession {
        self.session.read().await.clone()
    }

    /// Current call state.
    pub async fn call_state(&self) -> CallState {
        self.session.read().await.state
    }

    /// The pending incoming offer, if any.
    pub async fn pending_incoming(&self) -> Option<IncomingCallInfo> {
        self.incoming.read().await.clone()
    }

    /// Whether the media device is registered and ready.
    pub fn device_ready(&self) -> bool {
        self.media.is_ready()
    }

    pub async fn stats(&self) -> ClientStats {
        self.stats.lock().await.clone()
    }

    /// Lazily (re-)initialize the media device. A device failure leaves
    /// calling unavailable until the next qualifying interaction retries.
    pub(crate) async fn ensure_device(&self) -> ClientResult<()> {
        if self.media.is_ready() {
            return Ok(());
        }
        tracing::debug!("media device not ready, re-initializing");
        self.media.initialize().await
    }

    /// Fold one event through the state machine and publish the outcome.
    pub(crate) async fn apply(&self, event: CallEvent) -> CallState {
        let (previous, next, changed, call_id) = {
            let mut session = self.session.write().await;
            let previous = session.state;
            let previous_call_id = session.call_id;
            let t = transition(&session, &event);
            if t.changed {
                *session = t.session;
            }
            // On a reset the session's id is gone; report the call that ended.
            let call_id = session.call_id.or(previous_call_id);
            (previous, session.state, t.changed, call_id)
        };

        if changed && next != previous {
            if next.is_idle() {
                self.stats.lock().await.completed_calls += 1;
            }
            let info = CallStatusInfo {
                call_id,
                new_state: next,
                previous_state: previous,
                reason: None,
                timestamp: Utc::now(),
            };
            tracing::debug!(from = %previous, to = %next, "call state changed");
            self.emit(ClientEvent::CallStateChanged { info: info.clone() }).await;
            if let Some(handler) = self.handler.read().await.clone() {
                handler.on_call_state_changed(info).await;
            }
        }
        next
    }

    pub(crate) async fn emit(&self, event: ClientEvent) {
        // Nobody subscribed is fine; the handler path covers callbacks.
        let _ = self.event_tx.send(event);
    }

    pub(crate) async fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.emit(ClientEvent::Warning { message: message.clone(), timestamp: Utc::now() })
            .await;
        if let Some(handler) = self.handler.read().await.clone() {
            handler.on_warning(message).await;
        }
    }

    /// Feed a media-session event from the provider SDK.
    pub async fn process_media_event(&self, event: MediaSessionEvent) -> ClientResult<()> {
        match event {
            MediaSessionEvent::Incoming { call_sid, from_number } => {
                let info = IncomingCallInfo {
                    call_sid,
                    from_number,
                    received_at: Utc::now(),
                };
                *self.incoming.write().await = Some(info.clone());
                self.emit(ClientEvent::IncomingCall { info: info.clone() }).await;

                let action = match self.handler.read().await.clone() {
                    Some(handler) => handler.on_incoming_call(info).await,
                    None => CallAction::Ignore,
                };
                match action {
                    CallAction::Accept => {
                        self.accept_call().await?;
                    }
                    CallAction::Reject => {
                        self.reject_call().await?;
                    }
                    CallAction::Ignore => {}
                }
                Ok(())
            }
            other => {
                self.apply(CallEvent::Media(other)).await;
                Ok(())
            }
        }
    }

    /// Feed a channel event relayed from the call engine.
    pub async fn process_channel_event(&self, event: ChannelEvent) {
        match &event {
            ChannelEvent::CallOutboundStarted { agent_id, .. } => {
                // Only our own dial attributes a conference to this session.
                if *agent_id != self.config.agent_id {
                    return;
                }
            }
            ChannelEvent::AgentStatusChanged { agent_id, status, timestamp } => {
                self.emit(ClientEvent::AgentStatusChanged {
                    agent_id: agent_id.clone(),
                    status: *status,
                    timestamp: *timestamp,
                })
                .await;
            }
            _ => {}
        }
        self.apply(CallEvent::Channel(event)).await;
    }
}

impl std::fmt::Debug for CallManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallManager")
            .field("agent_id", &self.config.agent_id)
            .finish()
    }
}

// Shared check used by the operation modules.
impl CallManager {
    pub(crate) async fn require_state(
        &self,
        action: &'static str,
        allowed: &[CallState],
    ) -> ClientResult<CallState> {
        let current = self.session.read().await.state;
        if allowed.contains(&current) {
            Ok(current)
        } else {
            Err(ClientError::InvalidCallState { action, current })
        }
    }
}
