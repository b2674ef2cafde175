//! The authoritative active-call table.
//!
//! Keyed by agent id: at most one active call per agent, by invariant.
//! Rows are upserted on webhook arrival (last writer wins) and deleted on
//! termination, which is what makes duplicate and out-of-order webhook
//! delivery safe to absorb.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use dialwave_relay_core::{AgentId, CallSid, ConferenceSid};

use crate::error::EngineResult;

use super::CallStore;

/// One agent's active call.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveCallRow {
    pub agent_id: String,
    pub conference_sid: String,
    pub agent_call_sid: Option<String>,
    pub customer_call_sid: Option<String>,
    pub direction: String,
    pub from_number: String,
    pub to_number: String,
    pub on_hold: bool,
    pub pending_transfer_to: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Fields for a fresh upsert.
#[derive(Debug, Clone)]
pub struct NewActiveCall {
    pub agent_id: AgentId,
    pub conference_sid: ConferenceSid,
    pub agent_call_sid: Option<CallSid>,
    pub customer_call_sid: Option<CallSid>,
    pub direction: String,
    pub from_number: String,
    pub to_number: String,
}

impl CallStore {
    pub async fn upsert_active_call(&self, call: &NewActiveCall) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO active_calls
                 (agent_id, conference_sid, agent_call_sid, customer_call_sid,
                  direction, from_number, to_number, on_hold, pending_transfer_to, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, ?8)
             ON CONFLICT(agent_id) DO UPDATE SET
                 conference_sid = excluded.conference_sid,
                 agent_call_sid = COALESCE(excluded.agent_call_sid, active_calls.agent_call_sid),
                 customer_call_sid = COALESCE(excluded.customer_call_sid, active_calls.customer_call_sid),
                 direction = excluded.direction,
                 from_number = excluded.from_number,
                 to_number = excluded.to_number",
        )
        .bind(call.agent_id.as_str())
        .bind(call.conference_sid.as_str())
        .bind(call.agent_call_sid.as_ref().map(|s| s.as_str().to_string()))
        .bind(call.customer_call_sid.as_ref().map(|s| s.as_str().to_string()))
        .bind(&call.direction)
        .bind(&call.from_number)
        .bind(&call.to_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn active_call_for_agent(
        &self,
        agent_id: &AgentId,
    ) -> EngineResult<Option<ActiveCallRow>> {
        let row = sqlx::query_as::<_, ActiveCallRow>(
            "SELECT * FROM active_calls WHERE agent_id = ?1",
        )
        .bind(agent_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn active_calls_for_conference(
        &self,
        conference: &ConferenceSid,
    ) -> EngineResult<Vec<ActiveCallRow>> {
        let rows = sqlx::query_as::<_, ActiveCallRow>(
            "SELECT * FROM active_calls WHERE conference_sid = ?1",
        )
        .bind(conference.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full table snapshot, for client resync reads.
    pub async fn list_active_calls(&self) -> EngineResult<Vec<ActiveCallRow>> {
        let rows =
            sqlx::query_as::<_, ActiveCallRow>("SELECT * FROM active_calls ORDER BY agent_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn set_active_call_hold(
        &self,
        agent_id: &AgentId,
        on_hold: bool,
    ) -> EngineResult<()> {
        sqlx::query("UPDATE active_calls SET on_hold = ?1 WHERE agent_id = ?2")
            .bind(on_hold)
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the external party's leg once the provider reports it.
    pub async fn set_customer_leg(
        &self,
        conference: &ConferenceSid,
        call_sid: &CallSid,
    ) -> EngineResult<()> {
        sqlx::query(
            "UPDATE active_calls SET customer_call_sid = ?1 WHERE conference_sid = ?2",
        )
        .bind(call_sid.as_str())
        .bind(conference.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_pending_transfer(
        &self,
        agent_id: &AgentId,
        target: Option<&AgentId>,
    ) -> EngineResult<()> {
        sqlx::query("UPDATE active_calls SET pending_transfer_to = ?1 WHERE agent_id = ?2")
            .bind(target.map(|t| t.as_str().to_string()))
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_active_call(&self, agent_id: &AgentId) -> EngineResult<()> {
        sqlx::query("DELETE FROM active_calls WHERE agent_id = ?1")
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
