//! Authoritative server-side records.
//!
//! SQLite via sqlx. Three tables carry everything the orchestrator needs:
//! `agents` (directory + presence), `active_calls` (one row per agent on a
//! call, upserted on webhook arrival, deleted on termination), and
//! `call_logs` (append-then-patch history, finalized at conference end and
//! amended when a recording shows up).
//!
//! Webhooks are delivered at-least-once and out of order, so every write
//! here is shaped to be idempotent: upserts for the active-call table,
//! guarded updates (`WHERE ended_at IS NULL`, `WHERE recording_url IS
//! NULL`) for the log.

mod active_calls;
mod agents;
mod call_logs;

pub use active_calls::{ActiveCallRow, NewActiveCall};
pub use agents::AgentRow;
pub use call_logs::{CallLogRow, NewCallLog};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error::EngineResult;

/// Handle to the engine's database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CallStore {
    pub(crate) pool: SqlitePool,
}

impl CallStore {
    /// Open (or create) the database and ensure the schema exists.
    pub async fn connect(database_url: &str) -> EngineResult<Self> {
        // One connection: ':memory:' databases are per-connection, and the
        // engine's write volume does not need a pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> EngineResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agents (
                agent_id     TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                endpoint     TEXT NOT NULL,
                status       TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS active_calls (
                agent_id            TEXT PRIMARY KEY,
                conference_sid      TEXT NOT NULL,
                agent_call_sid      TEXT,
                customer_call_sid   TEXT,
                direction           TEXT NOT NULL,
                from_number         TEXT NOT NULL,
                to_number           TEXT NOT NULL,
                on_hold             INTEGER NOT NULL DEFAULT 0,
                pending_transfer_to TEXT,
                started_at          TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS call_logs (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                conference_sid   TEXT NOT NULL UNIQUE,
                agent_id         TEXT,
                direction        TEXT NOT NULL,
                from_number      TEXT NOT NULL,
                to_number        TEXT NOT NULL,
                status           TEXT NOT NULL,
                started_at       TEXT NOT NULL,
                ended_at         TEXT,
                duration_secs    INTEGER,
                disposition      TEXT,
                notes            TEXT,
                recording_url    TEXT,
                transferred_from TEXT,
                transferred_to   TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
