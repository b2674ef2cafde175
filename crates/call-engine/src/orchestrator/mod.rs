//! # Conference Orchestration
//!
//! The orchestrator is the server-resident owner of call truth. It drives
//! the telephony provider's control plane (conference legs, hold flags,
//! recordings), keeps the authoritative active-call table and call log in
//! the database, and relays normalized events to clients, always
//! persisting state before broadcasting.
//!
//! ## Module organization
//!
//! - [`core`]: engine struct, configuration, and the per-action
//!   agent-ownership check
//! - [`calls`]: outbound dialing, inbound ring-all, hold, hangup
//! - [`transfer`]: cold and warm transfer handoffs
//! - [`lifecycle`]: webhook handling, termination, and the bounded
//!   post-call recording check
//!
//! ## Consistency model
//!
//! Webhook delivery is at-least-once and unordered, and leg mutations on
//! the provider are not transactional. Every handler here is safe to run
//! more than once: the active-call table is upserted with last-writer-wins
//! semantics, and log finalization/recording attachment are guarded by
//! already-ended / already-has-recording checks. The only lock is the
//! per-action ownership check: a single agent holds at most one call, and
//! the provider serializes leg membership changes.

pub mod calls;
pub mod core;
pub mod lifecycle;
pub mod transfer;

pub use core::{EngineConfig, OrchestratorEngine};
