//! Client configuration.

use dialwave_relay_core::AgentId;

/// Configuration for a [`crate::client::CallManager`].
///
/// ```rust
/// use dialwave_client_core::client::ClientConfig;
/// use dialwave_relay_core::AgentId;
///
/// let config = ClientConfig::new(AgentId::new("agent-001"))
///     .with_event_channel_capacity(256);
/// assert_eq!(config.agent_id.as_str(), "agent-001");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The authenticated agent this client acts for. Channel events
    /// addressed to other agents' calls are filtered out by the manager.
    pub agent_id: AgentId,
    /// Capacity of the broadcast channel events are published on.
    pub event_channel_capacity: usize,
}

impl ClientConfig {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            event_channel_capacity: 128,
        }
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}
