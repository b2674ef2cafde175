//! Control-plane seam.
//!
//! Hold, transfer, and hangup are REST calls against the call engine, made
//! on behalf of the authenticated agent baked into the implementation.
//! Every one of these is ownership-checked server-side and idempotent on
//! repeat delivery.

use async_trait::async_trait;

use dialwave_relay_core::AgentId;

use crate::call::TransferMode;
use crate::error::ClientResult;

/// Authenticated request surface from the client to the call engine.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Toggle hold for the agent's active call.
    async fn set_hold(&self, on_hold: bool) -> ClientResult<()>;

    /// Start a warm or cold transfer to another agent.
    async fn begin_transfer(&self, target: &AgentId, mode: TransferMode) -> ClientResult<()>;

    /// Complete a previously started warm transfer.
    async fn complete_transfer(&self) -> ClientResult<()>;

    /// Hang up the agent's active call.
    async fn hangup(&self) -> ClientResult<()>;
}
