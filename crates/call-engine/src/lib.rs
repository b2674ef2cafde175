//! Conference orchestration and webhook relay for the dialwave stack.
//!
//! This crate is the server-resident half of the system: it creates and
//! joins conference legs against the telephony provider's control plane,
//! maintains the authoritative active-call and call-log records, executes
//! hold/transfer/hangup on behalf of ownership-checked agents, and relays
//! normalized provider webhooks to clients over a notification-only
//! channel.

pub mod database;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod relay;
pub mod server;

pub use database::{ActiveCallRow, AgentRow, CallLogRow, CallStore, NewActiveCall, NewCallLog};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{EngineConfig, OrchestratorEngine};
pub use provider::{ProviderControl, RecordingInfo};
pub use relay::EventRelay;
pub use server::{router, serve};
