//! Webhook handling and call termination.
//!
//! Providers deliver webhooks at-least-once with no ordering guarantee:
//! conference-start logically precedes join/leave, which precede
//! conference-end, but the handlers below cannot assume that delivery
//! order. Every branch persists through idempotent writes, so replays and
//! inversions (including an end arriving before its start) land on the
//! same final state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use dialwave_relay_core::webhook::ParticipantRole;
use dialwave_relay_core::{normalize, AgentId, AgentStatus, ConferenceSid, ProviderWebhook};

use crate::database::NewActiveCall;
use crate::error::EngineResult;

use super::core::OrchestratorEngine;

impl OrchestratorEngine {
    /// Process one provider webhook: persist authoritative state first,
    /// then fan out the normalized event (if the webhook maps to one).
    pub async fn handle_webhook(self: &Arc<Self>, webhook: ProviderWebhook) -> EngineResult<()> {
        match &webhook {
            ProviderWebhook::ConferenceStarted { conference_sid, .. } => {
                if let Some(log) = self.store.get_call_log(conference_sid).await? {
                    if log.ended_at.is_some() {
                        // Start delivered after the end was already
                        // processed; the call is over, nothing to revive.
                        tracing::debug!(conference = %conference_sid, "late conference-started ignored");
                        return Ok(());
                    }
                    self.store.mark_log_in_progress(conference_sid).await?;
                } else {
                    // Start can beat our own dial bookkeeping for inbound
                    // calls; record what we know.
                    self.store
                        .insert_call_log(&crate::database::NewCallLog {
                            conference_sid: conference_sid.clone(),
                            agent_id: None,
                            direction: "inbound".to_string(),
                            from_number: String::new(),
                            to_number: String::new(),
                            status: "in_progress".to_string(),
                        })
                        .await?;
                }
            }

            ProviderWebhook::ParticipantJoined { conference_sid, call_sid, role, .. } => {
                if let Some(log) = self.store.get_call_log(conference_sid).await? {
                    if log.ended_at.is_some() {
                        tracing::debug!(conference = %conference_sid, "join for ended conference ignored");
                        return Ok(());
                    }
                    match role {
                        ParticipantRole::Agent { agent_id } => {
                            let agent = AgentId::new(agent_id.clone());
                            self.store
                                .upsert_active_call(&NewActiveCall {
                                    agent_id: agent.clone(),
                                    conference_sid: conference_sid.clone(),
                                    agent_call_sid: Some(call_sid.clone()),
                                    customer_call_sid: None,
                                    direction: log.direction.clone(),
                                    from_number: log.from_number.clone(),
                                    to_number: log.to_number.clone(),
                                })
                                .await?;
                            self.store.set_log_agent(conference_sid, &agent).await?;
                            self.flip_presence(&agent, AgentStatus::OnCall).await?;
                        }
                        ParticipantRole::External => {
                            self.store.set_customer_leg(conference_sid, call_sid).await?;
                        }
                    }
                }
            }

            ProviderWebhook::ParticipantLeft { conference_sid, call_sid, .. } => {
                // Advisory only: membership truth arrives with the end
                // webhook once the last leg is gone.
                tracing::debug!(conference = %conference_sid, leg = %call_sid, "participant left");
            }

            ProviderWebhook::ConferenceEnded { conference_sid, timestamp } => {
                let finalized = self.finalize_conference(conference_sid, *timestamp).await?;
                if !finalized {
                    // Duplicate end; already handled, do not re-broadcast.
                    return Ok(());
                }
            }

            ProviderWebhook::RecordingReady { conference_sid, recording_url, .. } => {
                if self.store.attach_recording(conference_sid, recording_url).await? {
                    tracing::info!(conference = %conference_sid, "recording attached");
                } else {
                    tracing::debug!(conference = %conference_sid, "recording already attached");
                }
            }
        }

        if let Some(event) = normalize(&webhook) {
            self.relay.broadcast(event);
        }
        Ok(())
    }

    /// All legs are gone: finalize the log, drop active records, free the
    /// agents, and schedule the one bounded recording check. Returns false
    /// when this conference was already finalized.
    async fn finalize_conference(
        self: &Arc<Self>,
        conference: &ConferenceSid,
        ended_at: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let finalized = self.store.finalize_call_log(conference, ended_at).await?;
        if !finalized {
            match self.store.get_call_log(conference).await? {
                Some(_) => return Ok(false),
                None => {
                    // End arrived before any start was processed. Record
                    // the call as ended so the late start is a no-op.
                    tracing::warn!(conference = %conference, "conference-end before start; recording tombstone");
                    self.store.insert_ended_log(conference, ended_at).await?;
                }
            }
        }

        let records = self.store.active_calls_for_conference(conference).await?;
        for record in &records {
            let agent = AgentId::new(record.agent_id.clone());
            self.store.delete_active_call(&agent).await?;
            self.flip_presence(&agent, AgentStatus::Available).await?;
        }
        tracing::info!(conference = %conference, participants = records.len(), "conference finalized");

        self.schedule_recording_check(conference.clone());
        Ok(true)
    }

    /// Recordings are not available synchronously: poll the provider once
    /// after a fixed delay and attach the result if the log still has
    /// none. A single bounded check, never a retry loop.
    fn schedule_recording_check(self: &Arc<Self>, conference: ConferenceSid) {
        let provider = self.provider.clone();
        let store = self.store.clone();
        let delay = self.config.recording_check_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match provider.recordings_for(&conference).await {
                Ok(recordings) => {
                    if let Some(recording) = recordings.first() {
                        match store.attach_recording(&conference, &recording.url).await {
                            Ok(true) => {
                                tracing::info!(conference = %conference, "recording attached after poll")
                            }
                            Ok(false) => {
                                tracing::debug!(conference = %conference, "recording already present")
                            }
                            Err(e) => {
                                tracing::warn!(conference = %conference, error = %e, "recording attach failed")
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(conference = %conference, error = %e, "recording poll failed");
                }
            }
        });
    }
}
