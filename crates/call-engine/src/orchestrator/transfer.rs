//! Cold and warm transfer handoffs.
//!
//! Both modes start the same way: the target agent's leg is added to the
//! live conference. A cold transfer then removes the originating leg
//! immediately; a warm transfer keeps both agents bridged until an
//! explicit completion call performs the same removal. Either way the
//! handoff atomically flips the originating agent to available and the
//! target to on-call and stamps lineage on the call log.

use dialwave_relay_core::{AgentId, AgentStatus, CallSid, ConferenceSid, TransferMode};

use crate::database::{ActiveCallRow, NewActiveCall};
use crate::error::{EngineError, EngineResult};

use super::core::OrchestratorEngine;

impl OrchestratorEngine {
    /// Start a transfer to another agent.
    pub async fn begin_transfer(
        &self,
        agent_id: &AgentId,
        conference: &ConferenceSid,
        target: &AgentId,
        mode: TransferMode,
    ) -> EngineResult<()> {
        if agent_id == target {
            return Err(EngineError::validation("cannot transfer a call to yourself"));
        }
        let record = self.authorize(agent_id, conference).await?;

        let target_agent = self
            .store
            .get_agent(target)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("agent {}", target)))?;
        if self.store.active_call_for_agent(target).await?.is_some() {
            return Err(EngineError::validation(format!(
                "agent {} already has an active call",
                target
            )));
        }

        let target_leg = self
            .provider
            .add_participant(conference, &target_agent.endpoint, &self.config.caller_id)
            .await?;
        self.store
            .upsert_active_call(&NewActiveCall {
                agent_id: target.clone(),
                conference_sid: conference.clone(),
                agent_call_sid: Some(target_leg),
                customer_call_sid: record
                    .customer_call_sid
                    .as_deref()
                    .map(CallSid::new),
                direction: record.direction.clone(),
                from_number: record.from_number.clone(),
                to_number: record.to_number.clone(),
            })
            .await?;

        match mode {
            TransferMode::Cold => {
                self.finish_handoff(&record, target).await?;
                tracing::info!(from = %agent_id, to = %target, conference = %conference, "cold transfer completed");
            }
            TransferMode::Warm => {
                self.store
                    .set_pending_transfer(agent_id, Some(target))
                    .await?;
                self.flip_presence(target, AgentStatus::OnCall).await?;
                tracing::info!(from = %agent_id, to = %target, conference = %conference, "warm transfer started");
            }
        }
        Ok(())
    }

    /// Complete a warm transfer: the originating agent drops out and the
    /// handoff bookkeeping runs exactly as it does for a cold transfer.
    pub async fn complete_transfer(
        &self,
        agent_id: &AgentId,
        conference: &ConferenceSid,
    ) -> EngineResult<()> {
        let record = self.authorize(agent_id, conference).await?;
        let target = record
            .pending_transfer_to
            .as_deref()
            .map(AgentId::new)
            .ok_or_else(|| EngineError::validation("no pending warm transfer"))?;

        self.finish_handoff(&record, &target).await?;
        tracing::info!(from = %agent_id, to = %target, conference = %conference, "warm transfer completed");
        Ok(())
    }

    /// Remove the originating leg and flip both agents' presence. The
    /// target was made on-call when its leg was added (warm) or is flipped
    /// here (cold); issuing the same flip twice is harmless.
    async fn finish_handoff(
        &self,
        originating: &ActiveCallRow,
        target: &AgentId,
    ) -> EngineResult<()> {
        let conference = ConferenceSid::new(originating.conference_sid.clone());
        let originating_agent = AgentId::new(originating.agent_id.clone());

        if let Some(leg) = &originating.agent_call_sid {
            let sid = CallSid::new(leg.clone());
            if let Err(e) = self.provider.remove_participant(&conference, &sid).await {
                tracing::debug!(leg = %sid, error = %e, "originating leg removal failed");
            }
        }

        self.store.delete_active_call(&originating_agent).await?;
        self.store
            .set_transfer_lineage(&conference, &originating_agent, target)
            .await?;
        self.flip_presence(&originating_agent, AgentStatus::Available).await?;
        self.flip_presence(target, AgentStatus::OnCall).await?;
        Ok(())
    }
}
