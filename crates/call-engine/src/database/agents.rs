//! Agent directory and presence.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use dialwave_relay_core::{AgentId, AgentInfo, AgentStatus};

use crate::error::EngineResult;

use super::CallStore;

/// Directory row for an agent.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgentRow {
    pub agent_id: String,
    pub display_name: String,
    pub endpoint: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl AgentRow {
    pub fn status_parsed(&self) -> Option<AgentStatus> {
        AgentStatus::parse(&self.status)
    }
}

impl CallStore {
    /// Insert or update a directory entry.
    pub async fn upsert_agent(&self, agent: &AgentInfo) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO agents (agent_id, display_name, endpoint, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(agent_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 endpoint = excluded.endpoint,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(agent.agent_id.as_str())
        .bind(&agent.display_name)
        .bind(&agent.endpoint)
        .bind(agent.status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_agent(&self, agent_id: &AgentId) -> EngineResult<Option<AgentRow>> {
        let row = sqlx::query_as::<_, AgentRow>(
            "SELECT agent_id, display_name, endpoint, status, updated_at
             FROM agents WHERE agent_id = ?1",
        )
        .bind(agent_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_agents(&self) -> EngineResult<Vec<AgentRow>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            "SELECT agent_id, display_name, endpoint, status, updated_at
             FROM agents ORDER BY agent_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Agents that can be rung for an inbound call.
    pub async fn available_agents(&self) -> EngineResult<Vec<AgentRow>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            "SELECT agent_id, display_name, endpoint, status, updated_at
             FROM agents WHERE status = 'available' ORDER BY updated_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Flip an agent's presence. Last writer wins.
    pub async fn set_agent_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> EngineResult<()> {
        sqlx::query("UPDATE agents SET status = ?1, updated_at = ?2 WHERE agent_id = ?3")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        tracing::debug!(agent = %agent_id, status = %status, "agent presence updated");
        Ok(())
    }
}
