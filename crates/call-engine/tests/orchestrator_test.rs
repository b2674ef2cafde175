//! Orchestrator tests over a mock provider and an in-memory database.
//!
//! The webhook tests deliberately replay and reorder events: the
//! provider's delivery is at-least-once and unordered, and every handler
//! must land on the same final state regardless.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use dialwave_call_engine::{
    CallStore, EngineConfig, EngineError, EngineResult, OrchestratorEngine, ProviderControl,
    RecordingInfo,
};
use dialwave_relay_core::webhook::ParticipantRole;
use dialwave_relay_core::{
    AgentId, AgentInfo, AgentStatus, CallSid, ChannelEvent, ConferenceSid, ProviderWebhook,
    TransferMode,
};

// ===== mock provider =====

#[derive(Default)]
struct MockProvider {
    added: Mutex<Vec<(String, String)>>,
    removed: Mutex<Vec<(String, String)>>,
    holds: Mutex<Vec<(String, bool)>>,
    recordings: Mutex<Vec<RecordingInfo>>,
    recording_polls: AtomicUsize,
    leg_counter: AtomicUsize,
}

#[async_trait]
impl ProviderControl for MockProvider {
    async fn add_participant(
        &self,
        conference: &ConferenceSid,
        to: &str,
        _from: &str,
    ) -> EngineResult<CallSid> {
        let n = self.leg_counter.fetch_add(1, Ordering::SeqCst);
        self.added
            .lock()
            .await
            .push((conference.as_str().to_string(), to.to_string()));
        Ok(CallSid::new(format!("CA{}", n)))
    }

    async fn ring_endpoints(
        &self,
        conference: &ConferenceSid,
        endpoints: &[String],
        _from: &str,
    ) -> EngineResult<()> {
        let mut added = self.added.lock().await;
        for endpoint in endpoints {
            added.push((conference.as_str().to_string(), endpoint.clone()));
        }
        Ok(())
    }

    async fn remove_participant(
        &self,
        conference: &ConferenceSid,
        call: &CallSid,
    ) -> EngineResult<()> {
        self.removed
            .lock()
            .await
            .push((conference.as_str().to_string(), call.as_str().to_string()));
        Ok(())
    }

    async fn set_participant_hold(
        &self,
        conference: &ConferenceSid,
        _call: &CallSid,
        on_hold: bool,
    ) -> EngineResult<()> {
        self.holds
            .lock()
            .await
            .push((conference.as_str().to_string(), on_hold));
        Ok(())
    }

    async fn recordings_for(
        &self,
        _conference: &ConferenceSid,
    ) -> EngineResult<Vec<RecordingInfo>> {
        self.recording_polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.recordings.lock().await.clone())
    }
}

// ===== setup =====

async fn setup() -> (Arc<OrchestratorEngine>, Arc<MockProvider>, CallStore) {
    let store = CallStore::connect("sqlite::memory:").await.unwrap();
    for (id, name) in [("agent-001", "Ann"), ("agent-002", "Bea")] {
        store
            .upsert_agent(&AgentInfo {
                agent_id: AgentId::new(id),
                display_name: name.to_string(),
                endpoint: format!("client:{}", id),
                status: AgentStatus::Available,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }
    let provider = Arc::new(MockProvider::default());
    let engine = OrchestratorEngine::new(
        EngineConfig::new("+15550001111").with_recording_check_delay(Duration::from_secs(1)),
        provider.clone(),
        store.clone(),
    );
    (engine, provider, store)
}

fn ann() -> AgentId {
    AgentId::new("agent-001")
}

fn bea() -> AgentId {
    AgentId::new("agent-002")
}

fn ended(conference: &ConferenceSid) -> ProviderWebhook {
    ProviderWebhook::ConferenceEnded {
        conference_sid: conference.clone(),
        timestamp: Utc::now(),
    }
}

async fn agent_status(store: &CallStore, agent: &AgentId) -> AgentStatus {
    store
        .get_agent(agent)
        .await
        .unwrap()
        .unwrap()
        .status_parsed()
        .unwrap()
}

// ===== tests =====

#[tokio::test]
async fn test_outbound_dial_creates_records_and_announces() {
    let (engine, provider, store) = setup().await;
    let mut events = engine.relay().subscribe();

    let conference = engine.dial_outbound(&ann(), "+15557770001").await.unwrap();

    // Two legs: the agent endpoint and the external party.
    let added = provider.added.lock().await.clone();
    assert_eq!(added.len(), 2);
    assert_eq!(added[0].1, "client:agent-001");
    assert_eq!(added[1].1, "+15557770001");

    let record = store.active_call_for_agent(&ann()).await.unwrap().unwrap();
    assert_eq!(record.conference_sid, conference.as_str());
    assert_eq!(record.direction, "outbound");

    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(log.status, "initiated");
    assert_eq!(log.agent_id.as_deref(), Some("agent-001"));

    assert_eq!(agent_status(&store, &ann()).await, AgentStatus::OnCall);

    let mut saw_outbound = false;
    while let Ok(event) = events.try_recv() {
        if let ChannelEvent::CallOutboundStarted { agent_id, to_number, .. } = event {
            assert_eq!(agent_id, ann());
            assert_eq!(to_number, "+15557770001");
            saw_outbound = true;
        }
    }
    assert!(saw_outbound);

    // One active call per agent: a second dial must be refused.
    let err = engine.dial_outbound(&ann(), "+15557770002").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
}

#[tokio::test]
async fn test_control_actions_are_ownership_checked() {
    let (engine, provider, _store) = setup().await;
    let conference = engine.dial_outbound(&ann(), "+15557770001").await.unwrap();

    // Bea does not own this call: nothing may mutate.
    let err = engine.set_hold(&bea(), &conference, true).await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization { .. }));
    assert!(provider.holds.lock().await.is_empty());

    let err = engine
        .begin_transfer(&bea(), &conference, &ann(), TransferMode::Cold)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization { .. }));

    // An unknown conference is a not-found, not an authorization error.
    let err = engine
        .set_hold(&ann(), &ConferenceSid::new("conf_nope"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn test_hold_persists_and_broadcasts() {
    let (engine, provider, store) = setup().await;
    let conference = engine.dial_outbound(&ann(), "+15557770001").await.unwrap();
    let mut events = engine.relay().subscribe();

    engine.set_hold(&ann(), &conference, true).await.unwrap();
    assert_eq!(provider.holds.lock().await.as_slice(), &[(conference.as_str().to_string(), true)]);
    let record = store.active_call_for_agent(&ann()).await.unwrap().unwrap();
    assert!(record.on_hold);

    match events.try_recv().unwrap() {
        ChannelEvent::HoldChanged { on_hold, .. } => assert!(on_hold),
        other => panic!("unexpected event: {:?}", other),
    }

    engine.set_hold(&ann(), &conference, false).await.unwrap();
    let record = store.active_call_for_agent(&ann()).await.unwrap().unwrap();
    assert!(!record.on_hold);
}

#[tokio::test]
async fn test_cold_transfer_flips_exactly_one_agent_on_call() {
    let (engine, provider, store) = setup().await;
    let conference = engine.dial_outbound(&ann(), "+15557770001").await.unwrap();

    engine
        .begin_transfer(&ann(), &conference, &bea(), TransferMode::Cold)
        .await
        .unwrap();

    // Originating agent's leg was removed, target's record owns the call.
    assert_eq!(provider.removed.lock().await.len(), 1);
    assert!(store.active_call_for_agent(&ann()).await.unwrap().is_none());
    let record = store.active_call_for_agent(&bea()).await.unwrap().unwrap();
    assert_eq!(record.conference_sid, conference.as_str());

    assert_eq!(agent_status(&store, &ann()).await, AgentStatus::Available);
    assert_eq!(agent_status(&store, &bea()).await, AgentStatus::OnCall);

    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(log.transferred_from.as_deref(), Some("agent-001"));
    assert_eq!(log.transferred_to.as_deref(), Some("agent-002"));
}

#[tokio::test]
async fn test_warm_transfer_keeps_both_until_completed() {
    let (engine, _provider, store) = setup().await;
    let conference = engine.dial_outbound(&ann(), "+15557770001").await.unwrap();

    engine
        .begin_transfer(&ann(), &conference, &bea(), TransferMode::Warm)
        .await
        .unwrap();

    // Overlap period: both agents hold a record in the conference.
    let records = store.active_calls_for_conference(&conference).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(agent_status(&store, &ann()).await, AgentStatus::OnCall);
    assert_eq!(agent_status(&store, &bea()).await, AgentStatus::OnCall);

    // Completing before starting a warm transfer is a validation error.
    let err = engine.complete_transfer(&bea(), &conference).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    engine.complete_transfer(&ann(), &conference).await.unwrap();
    assert!(store.active_call_for_agent(&ann()).await.unwrap().is_none());
    assert_eq!(agent_status(&store, &ann()).await, AgentStatus::Available);
    assert_eq!(agent_status(&store, &bea()).await, AgentStatus::OnCall);

    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(log.transferred_to.as_deref(), Some("agent-002"));
}

#[tokio::test]
async fn test_termination_finalizes_once() {
    let (engine, _provider, store) = setup().await;
    let conference = engine.dial_outbound(&ann(), "+15557770001").await.unwrap();
    let mut events = engine.relay().subscribe();

    engine.handle_webhook(ended(&conference)).await.unwrap();

    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(log.status, "ended");
    assert!(log.ended_at.is_some());
    assert!(log.duration_secs.is_some());
    assert!(store.active_call_for_agent(&ann()).await.unwrap().is_none());
    assert_eq!(agent_status(&store, &ann()).await, AgentStatus::Available);

    // A replayed end webhook must be absorbed without a second broadcast.
    engine.handle_webhook(ended(&conference)).await.unwrap();

    let mut call_ended_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ChannelEvent::CallEnded { .. }) {
            call_ended_events += 1;
        }
    }
    assert_eq!(call_ended_events, 1);

    // Hangup after the conference is gone is idempotent.
    engine.hangup(&ann(), &conference).await.unwrap();
}

#[tokio::test]
async fn test_end_before_start_race_is_absorbed() {
    let (engine, _provider, store) = setup().await;
    let conference = ConferenceSid::new("conf_raced");

    // The end webhook arrives for a conference we never saw start.
    engine.handle_webhook(ended(&conference)).await.unwrap();
    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(log.status, "ended");

    // The late start must not resurrect the call.
    engine
        .handle_webhook(ProviderWebhook::ConferenceStarted {
            conference_sid: conference.clone(),
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(log.status, "ended");

    // Nor may a late join recreate an active record.
    engine
        .handle_webhook(ProviderWebhook::ParticipantJoined {
            conference_sid: conference.clone(),
            call_sid: CallSid::new("CA99"),
            role: ParticipantRole::Agent { agent_id: "agent-001".to_string() },
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    assert!(store.active_call_for_agent(&ann()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_inbound_join_webhooks_build_the_active_record() {
    let (engine, provider, store) = setup().await;
    let conference = engine.ring_inbound("+15559990000").await.unwrap();

    // Both available agents were rung.
    assert_eq!(provider.added.lock().await.len(), 2);

    // Ann's endpoint wins the ring; the provider reports her leg and then
    // the external party's.
    engine
        .handle_webhook(ProviderWebhook::ParticipantJoined {
            conference_sid: conference.clone(),
            call_sid: CallSid::new("CA10"),
            role: ParticipantRole::Agent { agent_id: "agent-001".to_string() },
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    engine
        .handle_webhook(ProviderWebhook::ParticipantJoined {
            conference_sid: conference.clone(),
            call_sid: CallSid::new("CA11"),
            role: ParticipantRole::External,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();

    let record = store.active_call_for_agent(&ann()).await.unwrap().unwrap();
    assert_eq!(record.agent_call_sid.as_deref(), Some("CA10"));
    assert_eq!(record.customer_call_sid.as_deref(), Some("CA11"));
    assert_eq!(record.direction, "inbound");
    assert_eq!(agent_status(&store, &ann()).await, AgentStatus::OnCall);

    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(log.agent_id.as_deref(), Some("agent-001"));

    // A replayed join upserts in place: still exactly one record.
    engine
        .handle_webhook(ProviderWebhook::ParticipantJoined {
            conference_sid: conference.clone(),
            call_sid: CallSid::new("CA10"),
            role: ParticipantRole::Agent { agent_id: "agent-001".to_string() },
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(
        store.active_calls_for_conference(&conference).await.unwrap().len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_recording_is_a_single_bounded_check() {
    let (engine, provider, store) = setup().await;
    let conference = engine.dial_outbound(&ann(), "+15557770001").await.unwrap();

    // The recording becomes available only after the call ends.
    provider.recordings.lock().await.push(RecordingInfo {
        url: "https://provider.example/rec/1".to_string(),
        duration_secs: Some(42),
    });

    engine.handle_webhook(ended(&conference)).await.unwrap();

    // Not yet: recordings are not available synchronously.
    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert!(log.recording_url.is_none());

    // After the fixed delay the single poll attaches it.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(
        log.recording_url.as_deref(),
        Some("https://provider.example/rec/1")
    );
    assert_eq!(provider.recording_polls.load(Ordering::SeqCst), 1);

    // Much later: still exactly one poll, never a retry loop.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(provider.recording_polls.load(Ordering::SeqCst), 1);

    // A recording-ready webhook for the same conference is a no-op now.
    engine
        .handle_webhook(ProviderWebhook::RecordingReady {
            conference_sid: conference.clone(),
            recording_url: "https://provider.example/rec/other".to_string(),
            duration_secs: None,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    let log = store.get_call_log(&conference).await.unwrap().unwrap();
    assert_eq!(
        log.recording_url.as_deref(),
        Some("https://provider.example/rec/1")
    );
}
