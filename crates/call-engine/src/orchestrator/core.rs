//! Engine struct, configuration, and authorization.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use dialwave_relay_core::{AgentId, AgentStatus, ChannelEvent, ConferenceSid};

use crate::database::{ActiveCallRow, AgentRow, CallLogRow, CallStore};
use crate::error::{EngineError, EngineResult};
use crate::provider::ProviderControl;
use crate::relay::EventRelay;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Caller id presented on outbound legs.
    pub caller_id: String,
    /// Delay before the single post-call recording check.
    pub recording_check_delay: Duration,
    /// Capacity of the relay broadcast channel.
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            recording_check_delay: Duration::from_secs(2),
            event_channel_capacity: 256,
        }
    }

    pub fn with_recording_check_delay(mut self, delay: Duration) -> Self {
        self.recording_check_delay = delay;
        self
    }
}

/// Server-side call orchestrator.
pub struct OrchestratorEngine {
    pub(crate) config: EngineConfig,
    pub(crate) provider: Arc<dyn ProviderControl>,
    pub(crate) store: CallStore,
    pub(crate) relay: EventRelay,
}

impl OrchestratorEngine {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn ProviderControl>,
        store: CallStore,
    ) -> Arc<Self> {
        let relay = EventRelay::new(config.event_channel_capacity);
        Arc::new(Self { config, provider, store, relay })
    }

    pub fn relay(&self) -> &EventRelay {
        &self.relay
    }

    pub fn store(&self) -> &CallStore {
        &self.store
    }

    // ===== resync reads =====
    //
    // Channel events are unbuffered; reconnecting clients rebuild their
    // view from these.

    pub async fn active_calls(&self) -> EngineResult<Vec<ActiveCallRow>> {
        self.store.list_active_calls().await
    }

    pub async fn agents(&self) -> EngineResult<Vec<AgentRow>> {
        self.store.list_agents().await
    }

    pub async fn call_log(&self, conference: &ConferenceSid) -> EngineResult<Option<CallLogRow>> {
        self.store.get_call_log(conference).await
    }

    // ===== shared internals =====

    /// The per-action ownership check: the requesting agent must hold an
    /// active-call record in the conference being acted on. Mismatch is an
    /// authorization error and mutates nothing.
    pub(crate) async fn authorize(
        &self,
        agent_id: &AgentId,
        conference: &ConferenceSid,
    ) -> EngineResult<ActiveCallRow> {
        let records = self.store.active_calls_for_conference(conference).await?;
        if records.is_empty() {
            return Err(EngineError::not_found(format!(
                "no active call for conference {}",
                conference
            )));
        }
        records
            .into_iter()
            .find(|r| r.agent_id == agent_id.as_str())
            .ok_or_else(|| {
                EngineError::authorization(format!(
                    "agent {} does not own a call in conference {}",
                    agent_id, conference
                ))
            })
    }

    /// Persist a presence flip, then broadcast it.
    pub(crate) async fn flip_presence(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> EngineResult<()> {
        self.store.set_agent_status(agent_id, status).await?;
        self.relay.broadcast(ChannelEvent::AgentStatusChanged {
            agent_id: agent_id.clone(),
            status,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

impl std::fmt::Debug for OrchestratorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorEngine")
            .field("caller_id", &self.config.caller_id)
            .finish()
    }
}
