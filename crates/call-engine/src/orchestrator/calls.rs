//! Outbound dialing, inbound ring-all, hold, and hangup.

use chrono::Utc;

use dialwave_relay_core::{AgentId, AgentStatus, ChannelEvent, ConferenceSid};

use crate::database::{NewActiveCall, NewCallLog};
use crate::error::{EngineError, EngineResult};

use super::core::OrchestratorEngine;

impl OrchestratorEngine {
    /// Place an outbound call for an agent: dial the agent's endpoint and
    /// the external party into a fresh conference, record both, and
    /// announce the dial.
    pub async fn dial_outbound(
        &self,
        agent_id: &AgentId,
        to_number: &str,
    ) -> EngineResult<ConferenceSid> {
        if to_number.trim().is_empty() {
            return Err(EngineError::validation("destination number is empty"));
        }
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("agent {}", agent_id)))?;
        if self.store.active_call_for_agent(agent_id).await?.is_some() {
            return Err(EngineError::validation(format!(
                "agent {} already has an active call",
                agent_id
            )));
        }

        let conference = ConferenceSid::generate();
        let agent_leg = self
            .provider
            .add_participant(&conference, &agent.endpoint, &self.config.caller_id)
            .await?;
        let customer_leg = self
            .provider
            .add_participant(&conference, to_number, &self.config.caller_id)
            .await?;

        self.store
            .upsert_active_call(&NewActiveCall {
                agent_id: agent_id.clone(),
                conference_sid: conference.clone(),
                agent_call_sid: Some(agent_leg),
                customer_call_sid: Some(customer_leg),
                direction: "outbound".to_string(),
                from_number: self.config.caller_id.clone(),
                to_number: to_number.to_string(),
            })
            .await?;
        self.store
            .insert_call_log(&NewCallLog {
                conference_sid: conference.clone(),
                agent_id: Some(agent_id.clone()),
                direction: "outbound".to_string(),
                from_number: self.config.caller_id.clone(),
                to_number: to_number.to_string(),
                status: "initiated".to_string(),
            })
            .await?;
        self.flip_presence(agent_id, AgentStatus::OnCall).await?;

        self.relay.broadcast(ChannelEvent::CallOutboundStarted {
            agent_id: agent_id.clone(),
            conference_sid: conference.clone(),
            to_number: to_number.to_string(),
            timestamp: Utc::now(),
        });
        tracing::info!(agent = %agent_id, to = %to_number, conference = %conference, "outbound call placed");
        Ok(conference)
    }

    /// Ring every available agent's endpoint simultaneously for an inbound
    /// call. The accepting endpoint is bridged into the conference and the
    /// dial primitive releases the rest; the active-call record lands when
    /// the provider reports the winning agent leg.
    pub async fn ring_inbound(&self, from_number: &str) -> EngineResult<ConferenceSid> {
        let agents = self.store.available_agents().await?;
        if agents.is_empty() {
            return Err(EngineError::not_found("no available agents to ring"));
        }
        let endpoints: Vec<String> = agents.iter().map(|a| a.endpoint.clone()).collect();

        let conference = ConferenceSid::generate();
        self.provider
            .ring_endpoints(&conference, &endpoints, from_number)
            .await?;

        self.store
            .insert_call_log(&NewCallLog {
                conference_sid: conference.clone(),
                agent_id: None,
                direction: "inbound".to_string(),
                from_number: from_number.to_string(),
                to_number: self.config.caller_id.clone(),
                status: "ringing".to_string(),
            })
            .await?;
        tracing::info!(from = %from_number, conference = %conference, ringing = endpoints.len(), "inbound call ringing");
        Ok(conference)
    }

    /// Hold or resume the customer leg. Ownership-checked; persists before
    /// broadcasting, and only broadcasts on provider success.
    pub async fn set_hold(
        &self,
        agent_id: &AgentId,
        conference: &ConferenceSid,
        on_hold: bool,
    ) -> EngineResult<()> {
        let record = self.authorize(agent_id, conference).await?;
        let customer_leg = record
            .customer_call_sid
            .as_deref()
            .map(dialwave_relay_core::CallSid::new)
            .ok_or_else(|| EngineError::provider("customer leg not yet established"))?;

        self.provider
            .set_participant_hold(conference, &customer_leg, on_hold)
            .await?;
        self.store.set_active_call_hold(agent_id, on_hold).await?;

        self.relay.broadcast(ChannelEvent::HoldChanged {
            conference_sid: conference.clone(),
            on_hold,
            timestamp: Utc::now(),
        });
        tracing::info!(agent = %agent_id, conference = %conference, on_hold, "hold updated");
        Ok(())
    }

    /// Tear down the agent's call. Idempotent: a conference that is
    /// already gone is a success, and the termination webhook remains the
    /// single place where records are finalized.
    pub async fn hangup(&self, agent_id: &AgentId, conference: &ConferenceSid) -> EngineResult<()> {
        let records = self.store.active_calls_for_conference(conference).await?;
        if records.is_empty() {
            tracing::debug!(conference = %conference, "hangup for already-ended conference");
            return Ok(());
        }
        let record = records
            .iter()
            .find(|r| r.agent_id == agent_id.as_str())
            .ok_or_else(|| {
                EngineError::authorization(format!(
                    "agent {} does not own a call in conference {}",
                    agent_id, conference
                ))
            })?;

        for leg in [&record.agent_call_sid, &record.customer_call_sid]
            .into_iter()
            .flatten()
        {
            let sid = dialwave_relay_core::CallSid::new(leg.clone());
            if let Err(e) = self.provider.remove_participant(conference, &sid).await {
                // The leg may already be gone; the end webhook reconciles.
                tracing::debug!(leg = %sid, error = %e, "leg removal failed during hangup");
            }
        }
        tracing::info!(agent = %agent_id, conference = %conference, "hangup requested");
        Ok(())
    }
}
