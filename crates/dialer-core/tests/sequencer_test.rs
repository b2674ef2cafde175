//! Scenario tests for the power dialer sequencer.
//!
//! Time is driven with the paused tokio clock so the wrap-up countdown and
//! settle delays run instantly. The call manager runs over in-memory media
//! and control-plane fakes; call ends are injected as media events, the
//! same way the provider SDK would deliver them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

use dialwave_client_core::{
    CallManager, ClientConfig, ClientResult, ControlPlane, MediaSession, MediaSessionEvent,
    TransferMode,
};
use dialwave_dialer_core::{
    DialerConfig, DialerError, DialerEvent, DialerPhase, LeadEntry, LeadQueue, LeadStatus,
    MemorySkipStore, PowerDialer, SkipStore,
};
use dialwave_relay_core::{AgentId, CallSid, LeadId, ListId};

// ===== fakes =====

struct ReadyMedia;

#[async_trait]
impl MediaSession for ReadyMedia {
    async fn initialize(&self) -> ClientResult<()> {
        Ok(())
    }
    fn is_ready(&self) -> bool {
        true
    }
    async fn connect(&self, _number: &str) -> ClientResult<()> {
        Ok(())
    }
    async fn accept(&self, _call_sid: &CallSid) -> ClientResult<()> {
        Ok(())
    }
    async fn reject(&self, _call_sid: &CallSid) -> ClientResult<()> {
        Ok(())
    }
    async fn disconnect(&self) {}
    async fn set_muted(&self, _muted: bool) {}
}

struct NotReadyMedia;

#[async_trait]
impl MediaSession for NotReadyMedia {
    async fn initialize(&self) -> ClientResult<()> {
        Err(dialwave_client_core::ClientError::device("no device"))
    }
    fn is_ready(&self) -> bool {
        false
    }
    async fn connect(&self, _number: &str) -> ClientResult<()> {
        unreachable!("device is never ready")
    }
    async fn accept(&self, _call_sid: &CallSid) -> ClientResult<()> {
        unreachable!()
    }
    async fn reject(&self, _call_sid: &CallSid) -> ClientResult<()> {
        unreachable!()
    }
    async fn disconnect(&self) {}
    async fn set_muted(&self, _muted: bool) {}
}

struct NoopControl;

#[async_trait]
impl ControlPlane for NoopControl {
    async fn set_hold(&self, _on_hold: bool) -> ClientResult<()> {
        Ok(())
    }
    async fn begin_transfer(&self, _target: &AgentId, _mode: TransferMode) -> ClientResult<()> {
        Ok(())
    }
    async fn complete_transfer(&self) -> ClientResult<()> {
        Ok(())
    }
    async fn hangup(&self) -> ClientResult<()> {
        Ok(())
    }
}

/// Ordered in-memory lead list. Status updates are recorded but do not
/// affect dialability: exclusion is the skip set's job, which is exactly
/// what these tests are probing.
struct VecLeadQueue {
    leads: Mutex<Vec<LeadEntry>>,
    updates: Mutex<Vec<(LeadId, LeadStatus)>>,
    fail_fetch: AtomicBool,
}

impl VecLeadQueue {
    fn new(numbers: &[(&str, &str)]) -> Arc<Self> {
        let leads = numbers
            .iter()
            .map(|(id, number)| LeadEntry {
                id: LeadId::new(*id),
                phone_number: number.to_string(),
                status: LeadStatus::Pending,
                follow_up_at: None,
                called: false,
                metadata: Vec::new(),
            })
            .collect();
        Arc::new(Self {
            leads: Mutex::new(leads),
            updates: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
        })
    }

    async fn status_of(&self, id: &str) -> Option<LeadStatus> {
        let target = LeadId::new(id);
        self.updates
            .lock()
            .await
            .iter()
            .rev()
            .find(|(lead_id, _)| *lead_id == target)
            .map(|(_, status)| *status)
    }
}

#[async_trait]
impl LeadQueue for VecLeadQueue {
    async fn fetch_next_dialable(
        &self,
        _list_id: &ListId,
        exclude: &HashSet<LeadId>,
    ) -> Result<Option<LeadEntry>, DialerError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(DialerError::lead_queue("queue backend unavailable"));
        }
        Ok(self
            .leads
            .lock()
            .await
            .iter()
            .find(|lead| !exclude.contains(&lead.id))
            .cloned())
    }

    async fn mark_called(&self, id: &LeadId) -> Result<(), DialerError> {
        let mut leads = self.leads.lock().await;
        if let Some(lead) = leads.iter_mut().find(|l| l.id == *id) {
            lead.called = true;
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: &LeadId,
        status: LeadStatus,
        _follow_up_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), DialerError> {
        self.updates.lock().await.push((id.clone(), status));
        Ok(())
    }
}

// ===== harness =====

struct Harness {
    calls: Arc<CallManager>,
    dialer: Arc<PowerDialer>,
    queue: Arc<VecLeadQueue>,
    skips: Arc<MemorySkipStore>,
}

fn harness(queue: Arc<VecLeadQueue>, skips: Arc<MemorySkipStore>) -> Harness {
    let calls = Arc::new(CallManager::new(
        ClientConfig::new(AgentId::new("agent-001")),
        Arc::new(ReadyMedia),
        Arc::new(NoopControl),
    ));
    let dialer = PowerDialer::new(
        calls.clone(),
        queue.clone(),
        skips.clone(),
        DialerConfig::default().with_settle_delay(Duration::from_millis(100)),
    );
    Harness { calls, dialer, queue, skips }
}

fn list() -> ListId {
    ListId::new("morning-leads")
}

/// Let spawned tasks (watcher, countdown) observe their events.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

async fn end_current_call(h: &Harness) {
    h.calls
        .process_media_event(MediaSessionEvent::Accept { call_sid: None })
        .await
        .unwrap();
    h.calls
        .process_media_event(MediaSessionEvent::Disconnect)
        .await
        .unwrap();
    settle().await;
}

// ===== tests =====

#[tokio::test(start_paused = true)]
async fn test_morning_leads_scenario() {
    // list "Morning Leads" = [A(pending), B(pending)]; dial A → natural
    // disconnect → wrap_up → timeout → A called → dial B.
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let h = harness(queue.clone(), Arc::new(MemorySkipStore::new()));
    let mut events = h.dialer.subscribe();

    h.dialer.start_session(list()).await.unwrap();
    let snap = h.dialer.snapshot().await;
    assert_eq!(snap.phase, DialerPhase::Dialing);
    assert_eq!(snap.current_lead.as_ref().unwrap().id, LeadId::new("A"));

    end_current_call(&h).await;
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::WrapUp);

    // Countdown expiry (15 s default) auto-submits the default disposition.
    tokio::time::sleep(Duration::from_secs(16)).await;
    settle().await;

    assert_eq!(queue.status_of("A").await, Some(LeadStatus::Called));
    let snap = h.dialer.snapshot().await;
    assert_eq!(snap.phase, DialerPhase::Dialing);
    assert_eq!(snap.current_lead.as_ref().unwrap().id, LeadId::new("B"));

    // The auto submission fired exactly once for A.
    let mut auto_submissions = 0;
    while let Ok(event) = events.try_recv() {
        if let DialerEvent::DispositionSubmitted { lead_id, auto: true, .. } = event {
            if lead_id == LeadId::new("A") {
                auto_submissions += 1;
            }
        }
    }
    assert_eq!(auto_submissions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_completes_and_clears_skip_state() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001")]);
    let skips = Arc::new(MemorySkipStore::new());
    let h = harness(queue.clone(), skips.clone());
    let mut events = h.dialer.subscribe();

    h.dialer.start_session(list()).await.unwrap();
    end_current_call(&h).await;
    h.dialer.submit_status(LeadStatus::NoAnswer, None).await.unwrap();

    // One lead, now handled: the session is complete and the persisted
    // skip state is gone.
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::Idle);
    assert!(skips.load(&list()).await.unwrap().is_empty());

    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, DialerEvent::SessionCompleted { .. }) {
            completed = true;
        }
    }
    assert!(completed);
    assert_eq!(queue.status_of("A").await, Some(LeadStatus::NoAnswer));
}

#[tokio::test(start_paused = true)]
async fn test_skip_entry_forces_wrap_up() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let h = harness(queue.clone(), Arc::new(MemorySkipStore::new()));

    h.dialer.start_session(list()).await.unwrap();
    h.calls
        .process_media_event(MediaSessionEvent::Accept { call_sid: None })
        .await
        .unwrap();

    // Agent skips mid-call: the call is hung up and wrap-up opens without
    // waiting for a disconnect event.
    h.dialer.skip_entry().await.unwrap();
    settle().await;
    let snap = h.dialer.snapshot().await;
    assert_eq!(snap.phase, DialerPhase::WrapUp);
    assert!(h.calls.call_state().await.is_idle());

    h.dialer
        .submit_status(LeadStatus::NotInterested, None)
        .await
        .unwrap();
    let snap = h.dialer.snapshot().await;
    assert_eq!(snap.current_lead.as_ref().unwrap().id, LeadId::new("B"));
    assert_eq!(snap.skip_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_follow_up_requires_strictly_future_timestamp() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let h = harness(queue.clone(), Arc::new(MemorySkipStore::new()));

    h.dialer.start_session(list()).await.unwrap();
    end_current_call(&h).await;

    let err = h
        .dialer
        .submit_status(LeadStatus::FollowUp, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DialerError::Validation { .. }));

    let past = Utc::now() - ChronoDuration::hours(1);
    let err = h
        .dialer
        .submit_status(LeadStatus::FollowUp, Some(past))
        .await
        .unwrap_err();
    assert!(matches!(err, DialerError::Validation { .. }));

    // A rejected submission leaves the wrap-up open.
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::WrapUp);

    let future = Utc::now() + ChronoDuration::hours(24);
    h.dialer
        .submit_status(LeadStatus::FollowUp, Some(future))
        .await
        .unwrap();
    assert_eq!(queue.status_of("A").await, Some(LeadStatus::FollowUp));
}

#[tokio::test(start_paused = true)]
async fn test_pause_cancels_countdown_and_resume_does_not_restart_it() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let h = harness(queue.clone(), Arc::new(MemorySkipStore::new()));

    h.dialer.start_session(list()).await.unwrap();
    end_current_call(&h).await;
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::WrapUp);

    h.dialer.pause_session().await.unwrap();
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::Paused);

    // Way past the countdown: nothing must fire while paused.
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(queue.status_of("A").await, None);

    h.dialer.resume_session().await.unwrap();
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::WrapUp);

    // The countdown is not auto-restarted on resume either.
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(queue.status_of("A").await, None);

    // Disposition entry remains available.
    h.dialer.submit_status(LeadStatus::Called, None).await.unwrap();
    assert_eq!(queue.status_of("A").await, Some(LeadStatus::Called));
}

#[tokio::test(start_paused = true)]
async fn test_timer_pause_defers_expiry_without_changing_phase() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let h = harness(queue.clone(), Arc::new(MemorySkipStore::new()));

    h.dialer.start_session(list()).await.unwrap();
    end_current_call(&h).await;

    h.dialer.pause_timer().await.unwrap();
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::WrapUp);

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    // Frozen timer: no auto submission, phase unchanged.
    assert_eq!(queue.status_of("A").await, None);
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::WrapUp);

    h.dialer.resume_timer().await.unwrap();
    tokio::time::sleep(Duration::from_secs(16)).await;
    settle().await;
    assert_eq!(queue.status_of("A").await, Some(LeadStatus::Called));
}

#[tokio::test(start_paused = true)]
async fn test_restart_never_redials_handled_leads() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let skips = Arc::new(MemorySkipStore::new());

    // First client: handle A, then stop mid-session.
    {
        let h = harness(queue.clone(), skips.clone());
        h.dialer.start_session(list()).await.unwrap();
        end_current_call(&h).await;
        h.dialer
            .submit_status(LeadStatus::DoNotContact, None)
            .await
            .unwrap();
        h.dialer.stop_session().await.unwrap();
    }
    // Stop keeps the durable skip state.
    assert_eq!(skips.load(&list()).await.unwrap().len(), 1);

    // "Restarted" client over the same store: resumes at B, not A.
    let h = harness(queue.clone(), skips.clone());
    h.dialer.start_session(list()).await.unwrap();
    let snap = h.dialer.snapshot().await;
    assert_eq!(snap.current_lead.as_ref().unwrap().id, LeadId::new("B"));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_is_session_fatal() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let skips = Arc::new(MemorySkipStore::new());
    let h = harness(queue.clone(), skips.clone());
    let mut events = h.dialer.subscribe();

    h.dialer.start_session(list()).await.unwrap();
    end_current_call(&h).await;

    queue.fail_fetch.store(true, Ordering::SeqCst);
    let err = h
        .dialer
        .submit_status(LeadStatus::Called, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DialerError::LeadQueue { .. }));

    // Aborted to idle rather than looping; the durable skip-list survives
    // for the next attempt.
    assert_eq!(h.dialer.snapshot().await.phase, DialerPhase::Idle);
    assert_eq!(skips.load(&list()).await.unwrap().len(), 1);

    let mut aborted = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, DialerEvent::SessionAborted { .. }) {
            aborted = true;
        }
    }
    assert!(aborted);
}

#[tokio::test(start_paused = true)]
async fn test_session_is_a_singleton_and_needs_a_device() {
    let queue = VecLeadQueue::new(&[("A", "+15551230001")]);

    // Device not ready: the session must not start.
    let calls = Arc::new(CallManager::new(
        ClientConfig::new(AgentId::new("agent-001")),
        Arc::new(NotReadyMedia),
        Arc::new(NoopControl),
    ));
    let dialer = PowerDialer::new(
        calls,
        queue.clone(),
        Arc::new(MemorySkipStore::new()),
        DialerConfig::default(),
    );
    let err = dialer.start_session(list()).await.unwrap_err();
    assert!(matches!(err, DialerError::DeviceNotReady));

    // A running session rejects a second start.
    let queue = VecLeadQueue::new(&[("A", "+15551230001"), ("B", "+15551230002")]);
    let h = harness(queue, Arc::new(MemorySkipStore::new()));
    h.dialer.start_session(list()).await.unwrap();
    let err = h.dialer.start_session(list()).await.unwrap_err();
    assert!(matches!(err, DialerError::SessionAlreadyActive));
}
