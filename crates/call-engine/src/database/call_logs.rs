//! Call history.
//!
//! One row per conference, inserted at call start and patched as the call
//! progresses: finalized (ended_at, duration) when the conference ends,
//! amended with a recording reference when the provider has one, stamped
//! with transfer lineage on handoff. Finalization and recording attachment
//! are guarded updates so replayed webhooks are no-ops.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use dialwave_relay_core::{AgentId, ConferenceSid};

use crate::error::EngineResult;

use super::CallStore;

/// Historical record of one call.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CallLogRow {
    pub id: i64,
    pub conference_sid: String,
    pub agent_id: Option<String>,
    pub direction: String,
    pub from_number: String,
    pub to_number: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub disposition: Option<String>,
    pub notes: Option<String>,
    pub recording_url: Option<String>,
    pub transferred_from: Option<String>,
    pub transferred_to: Option<String>,
}

/// Fields for the initial insert.
#[derive(Debug, Clone)]
pub struct NewCallLog {
    pub conference_sid: ConferenceSid,
    pub agent_id: Option<AgentId>,
    pub direction: String,
    pub from_number: String,
    pub to_number: String,
    pub status: String,
}

impl CallStore {
    /// Create the log entry for a call. Idempotent: a second insert for
    /// the same conference is ignored.
    pub async fn insert_call_log(&self, log: &NewCallLog) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO call_logs
                 (conference_sid, agent_id, direction, from_number, to_number, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(conference_sid) DO NOTHING",
        )
        .bind(log.conference_sid.as_str())
        .bind(log.agent_id.as_ref().map(|a| a.as_str().to_string()))
        .bind(&log.direction)
        .bind(&log.from_number)
        .bind(&log.to_number)
        .bind(&log.status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_call_log(
        &self,
        conference: &ConferenceSid,
    ) -> EngineResult<Option<CallLogRow>> {
        let row = sqlx::query_as::<_, CallLogRow>(
            "SELECT * FROM call_logs WHERE conference_sid = ?1",
        )
        .bind(conference.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Mark the call as live. No-op once the call has ended, which absorbs
    /// a conference-started webhook replayed (or delivered) after the end.
    pub async fn mark_log_in_progress(&self, conference: &ConferenceSid) -> EngineResult<()> {
        sqlx::query(
            "UPDATE call_logs SET status = 'in_progress'
             WHERE conference_sid = ?1 AND ended_at IS NULL",
        )
        .bind(conference.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Attribute an inbound call to the agent who accepted it.
    pub async fn set_log_agent(
        &self,
        conference: &ConferenceSid,
        agent_id: &AgentId,
    ) -> EngineResult<()> {
        sqlx::query(
            "UPDATE call_logs SET agent_id = ?1
             WHERE conference_sid = ?2 AND agent_id IS NULL",
        )
        .bind(agent_id.as_str())
        .bind(conference.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stamp end time and duration. Returns false when the entry was
    /// already finalized (duplicate end webhook) or does not exist.
    pub async fn finalize_call_log(
        &self,
        conference: &ConferenceSid,
        ended_at: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let Some(log) = self.get_call_log(conference).await? else {
            return Ok(false);
        };
        if log.ended_at.is_some() {
            return Ok(false);
        }
        let duration = (ended_at - log.started_at).num_seconds().max(0);
        let result = sqlx::query(
            "UPDATE call_logs SET ended_at = ?1, duration_secs = ?2, status = 'ended'
             WHERE conference_sid = ?3 AND ended_at IS NULL",
        )
        .bind(ended_at)
        .bind(duration)
        .bind(conference.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a conference end for which no start was ever processed. The
    /// row lands already finalized so a late start cannot resurrect it.
    pub async fn insert_ended_log(
        &self,
        conference: &ConferenceSid,
        ended_at: DateTime<Utc>,
    ) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO call_logs
                 (conference_sid, agent_id, direction, from_number, to_number,
                  status, started_at, ended_at, duration_secs)
             VALUES (?1, NULL, 'unknown', '', '', 'ended', ?2, ?2, 0)
             ON CONFLICT(conference_sid) DO NOTHING",
        )
        .bind(conference.as_str())
        .bind(ended_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Attach a recording once. Returns false when one is already present.
    pub async fn attach_recording(
        &self,
        conference: &ConferenceSid,
        url: &str,
    ) -> EngineResult<bool> {
        let result = sqlx::query(
            "UPDATE call_logs SET recording_url = ?1
             WHERE conference_sid = ?2 AND recording_url IS NULL",
        )
        .bind(url)
        .bind(conference.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stamp transfer lineage on the log entry.
    pub async fn set_transfer_lineage(
        &self,
        conference: &ConferenceSid,
        from: &AgentId,
        to: &AgentId,
    ) -> EngineResult<()> {
        sqlx::query(
            "UPDATE call_logs SET transferred_from = ?1, transferred_to = ?2, agent_id = ?2
             WHERE conference_sid = ?3",
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(conference.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Amend disposition and notes after the fact.
    pub async fn set_disposition(
        &self,
        conference: &ConferenceSid,
        disposition: &str,
        notes: Option<&str>,
    ) -> EngineResult<()> {
        sqlx::query(
            "UPDATE call_logs SET disposition = ?1, notes = ?2 WHERE conference_sid = ?3",
        )
        .bind(disposition)
        .bind(notes)
        .bind(conference.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
