//! Agent presence types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// Presence state of an agent.
///
/// Presence is shared mutable server state with last-writer-wins semantics;
/// the orchestrator flips it on dial, transfer, and termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Ready to take or place calls.
    Available,
    /// Currently attached to a conference.
    OnCall,
    /// Signed in but not dialable (break, wrap-up at the desk, etc.).
    Unavailable,
    /// Not signed in.
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Available => "available",
            AgentStatus::OnCall => "on_call",
            AgentStatus::Unavailable => "unavailable",
            AgentStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(AgentStatus::Available),
            "on_call" => Some(AgentStatus::OnCall),
            "unavailable" => Some(AgentStatus::Unavailable),
            "offline" => Some(AgentStatus::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directory entry for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: AgentId,
    pub display_name: String,
    /// Client endpoint the provider dials to reach this agent.
    pub endpoint: String,
    pub status: AgentStatus,
    pub updated_at: DateTime<Utc>,
}
