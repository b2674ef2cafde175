//! The power dialer sequencer.
//!
//! [`PowerDialer`] loops over a lead list back-to-back: dial, wait for the
//! call to end, open a wrap-up window for the agent's disposition (or time
//! out into a default one), advance. It layers timers, pause/resume, and
//! durable skip tracking over the call manager, and it is deliberately
//! paranoid about double work: a reentrancy guard ensures no two dial
//! cycles ever run concurrently, and the call-ended detector only fires
//! while the phase is exactly `Dialing` with no dial transition in flight.
//!
//! The session is a global singleton per client; "active" is defined as
//! phase ≠ `Idle`, and there is no separate cancellation token.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

use dialwave_client_core::{CallManager, ClientEvent};
use dialwave_relay_core::{LeadId, ListId};

use crate::error::{DialerError, DialerResult};
use crate::lead::{LeadEntry, LeadQueue, LeadStatus};
use crate::session::{DialerPhase, DialerSnapshot, DialerState};
use crate::skip::SkipStore;

/// Tunables for a power-dial run.
#[derive(Debug, Clone)]
pub struct DialerConfig {
    /// Wrap-up countdown, in seconds.
    pub wrap_up_secs: u32,
    /// Settle delay between disconnecting a stale call and placing the
    /// next one.
    pub settle_delay: Duration,
    /// Capacity of the dialer event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            wrap_up_secs: 15,
            settle_delay: Duration::from_millis(1000),
            event_channel_capacity: 64,
        }
    }
}

impl DialerConfig {
    pub fn with_wrap_up_secs(mut self, secs: u32) -> Self {
        self.wrap_up_secs = secs;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Events published by the sequencer.
#[derive(Debug, Clone)]
pub enum DialerEvent {
    PhaseChanged { phase: DialerPhase },
    LeadDialed { lead: LeadEntry },
    WrapUpStarted { lead: Option<LeadEntry> },
    DispositionSubmitted {
        lead_id: LeadId,
        status: LeadStatus,
        /// True when the wrap-up countdown expired and submitted the
        /// default disposition.
        auto: bool,
    },
    SessionCompleted { list_id: ListId },
    SessionStopped { list_id: ListId },
    SessionAborted { list_id: ListId, reason: String },
}

/// Sequential-dialing scheduler over a lead list.
pub struct PowerDialer {
    calls: Arc<CallManager>,
    leads: Arc<dyn LeadQueue>,
    skips: Arc<dyn SkipStore>,
    config: DialerConfig,
    state: Arc<RwLock<DialerState>>,
    /// Reentrancy guard: set while a dial transition is in flight so the
    /// call-ended detector cannot fire a duplicate wrap-up.
    dial_in_flight: AtomicBool,
    countdown_task: Mutex<Option<JoinHandle<()>>>,
    watcher_task: Mutex<Option<JoinHandle<()>>>,
    event_tx: broadcast::Sender<DialerEvent>,
}

impl PowerDialer {
    pub fn new(
        calls: Arc<CallManager>,
        leads: Arc<dyn LeadQueue>,
        skips: Arc<dyn SkipStore>,
        config: DialerConfig,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Arc::new(Self {
            calls,
            leads,
            skips,
            config,
            state: Arc::new(RwLock::new(DialerState::default())),
            dial_in_flight: AtomicBool::new(false),
            countdown_task: Mutex::new(None),
            watcher_task: Mutex::new(None),
            event_tx,
        })
    }

    /// Subscribe to sequencer events.
    pub fn subscribe(&self) -> broadcast::Receiver<DialerEvent> {
        self.event_tx.subscribe()
    }

    /// Read-only view of the session.
    pub async fn snapshot(&self) -> DialerSnapshot {
        self.state.read().await.snapshot()
    }

    /// Whether a run is active (phase ≠ idle).
    pub async fn is_active(&self) -> bool {
        self.state.read().await.phase != DialerPhase::Idle
    }

    // ===== session lifecycle =====

    /// Start a power-dial run over a list.
    ///
    /// Rejects if the call device is not ready or another session is
    /// already active. Any skip-list previously persisted for this list id
    /// is loaded first, so a restarted client never re-dials handled leads.
    pub async fn start_session(self: &Arc<Self>, list_id: ListId) -> DialerResult<()> {
        if !self.calls.device_ready() {
            return Err(DialerError::DeviceNotReady);
        }
        {
            let mut st = self.state.write().await;
            if st.phase != DialerPhase::Idle {
                return Err(DialerError::SessionAlreadyActive);
            }
            *st = DialerState::default();
            st.phase = DialerPhase::Dialing;
            st.list_id = Some(list_id.clone());
        }
        self.emit(DialerEvent::PhaseChanged { phase: DialerPhase::Dialing });

        let persisted = match self.skips.load(&list_id).await {
            Ok(set) => set,
            Err(e) => {
                self.reset_to_idle().await;
                return Err(e);
            }
        };
        tracing::info!(list_id = %list_id, skipped = persisted.len(), "dialer session starting");
        self.state.write().await.skip = persisted;

        self.spawn_watcher().await;
        self.dial_in_flight.store(true, Ordering::SeqCst);
        self.run_dial_cycle().await
    }

    /// Stop the run. Preempts any pending wrap-up countdown and hangs up
    /// the live call. Persisted skip state is kept; only exhausting the
    /// queue clears it.
    pub async fn stop_session(self: &Arc<Self>) -> DialerResult<()> {
        let list_id = {
            let st = self.state.read().await;
            if st.phase == DialerPhase::Idle {
                return Ok(());
            }
            st.list_id.clone()
        };
        self.cancel_countdown().await;
        self.reset_to_idle().await;
        self.calls.hangup().await?;
        if let Some(list_id) = list_id {
            tracing::info!(list_id = %list_id, "dialer session stopped");
            self.emit(DialerEvent::SessionStopped { list_id });
        }
        Ok(())
    }

    /// Freeze the phase machine. A running wrap-up countdown is cancelled
    /// and will not be restarted by resume.
    pub async fn pause_session(&self) -> DialerResult<()> {
        {
            let mut st = self.state.write().await;
            match st.phase {
                DialerPhase::Dialing | DialerPhase::WrapUp => {
                    st.resume_phase = Some(st.phase);
                    st.phase = DialerPhase::Paused;
                }
                phase => return Err(DialerError::InvalidPhase { action: "pause_session", phase }),
            }
        }
        self.cancel_countdown().await;
        self.emit(DialerEvent::PhaseChanged { phase: DialerPhase::Paused });
        Ok(())
    }

    /// Unfreeze the phase machine. Returning to `WrapUp` does not restart
    /// the countdown; disposition entry simply remains available.
    pub async fn resume_session(&self) -> DialerResult<()> {
        let back = {
            let mut st = self.state.write().await;
            if st.phase != DialerPhase::Paused {
                return Err(DialerError::InvalidPhase {
                    action: "resume_session",
                    phase: st.phase,
                });
            }
            let back = st.resume_phase.take().unwrap_or(DialerPhase::Idle);
            st.phase = back;
            back
        };
        self.emit(DialerEvent::PhaseChanged { phase: back });
        Ok(())
    }

    /// Freeze only the wrap-up countdown, leaving the phase untouched.
    /// Used while the agent is filling in a follow-up date so a slow UI
    /// interaction never races the timeout.
    pub async fn pause_timer(&self) -> DialerResult<()> {
        let mut st = self.state.write().await;
        if st.phase != DialerPhase::WrapUp {
            return Err(DialerError::InvalidPhase { action: "pause_timer", phase: st.phase });
        }
        st.timer_paused = true;
        Ok(())
    }

    /// Let a frozen wrap-up countdown tick again.
    pub async fn resume_timer(&self) -> DialerResult<()> {
        let mut st = self.state.write().await;
        if st.phase != DialerPhase::WrapUp {
            return Err(DialerError::InvalidPhase { action: "resume_timer", phase: st.phase });
        }
        st.timer_paused = false;
        Ok(())
    }

    // ===== dispositions =====

    /// Record the agent's disposition for the current lead and advance.
    ///
    /// `FollowUp` requires a strictly-future timestamp. The lead is added
    /// to the skip set unconditionally (timeout-driven submissions go
    /// through this same path) and the set is persisted under the list id
    /// before the next dial.
    pub async fn submit_status(
        self: &Arc<Self>,
        status: LeadStatus,
        follow_up_at: Option<DateTime<Utc>>,
    ) -> DialerResult<()> {
        self.submit_inner(status, follow_up_at, false).await
    }

    /// Hang up the current call and force wrap-up without waiting for the
    /// natural disconnect event.
    pub async fn skip_entry(self: &Arc<Self>) -> DialerResult<()> {
        {
            let st = self.state.read().await;
            if st.phase != DialerPhase::Dialing || self.dial_in_flight.load(Ordering::SeqCst) {
                return Err(DialerError::InvalidPhase { action: "skip_entry", phase: st.phase });
            }
        }
        // Enter wrap-up first: the hangup's idle transition must not be
        // mistaken for a natural call end.
        self.enter_wrap_up().await;
        self.calls.hangup().await?;
        Ok(())
    }

    async fn submit_inner(
        self: &Arc<Self>,
        status: LeadStatus,
        follow_up_at: Option<DateTime<Utc>>,
        auto: bool,
    ) -> DialerResult<()> {
        match status {
            LeadStatus::FollowUp => {
                let at = follow_up_at.ok_or_else(|| {
                    DialerError::validation("follow_up requires a timestamp")
                })?;
                if at <= Utc::now() {
                    return Err(DialerError::validation(
                        "follow_up timestamp must be strictly in the future",
                    ));
                }
            }
            LeadStatus::Pending => {
                return Err(DialerError::validation("pending is not a submittable disposition"));
            }
            _ => {}
        }
        let follow_up_at = if status == LeadStatus::FollowUp { follow_up_at } else { None };

        // Only after validation passed may the countdown be preempted; a
        // rejected submission leaves the wrap-up window ticking. The auto
        // path already dropped its own handle.
        if !auto {
            self.cancel_countdown().await;
        }

        // Claim the wrap-up. Losing this race is only possible for the
        // auto path, which must then do nothing.
        let (list_id, lead) = {
            let mut st = self.state.write().await;
            if st.phase != DialerPhase::WrapUp {
                if auto {
                    return Ok(());
                }
                return Err(DialerError::InvalidPhase { action: "submit_status", phase: st.phase });
            }
            let list_id = st.list_id.clone().ok_or_else(|| DialerError::Internal {
                message: "active session without a list id".to_string(),
            })?;
            let lead = st.current_lead.clone().ok_or_else(|| DialerError::Internal {
                message: "wrap-up without a current lead".to_string(),
            })?;
            self.dial_in_flight.store(true, Ordering::SeqCst);
            st.phase = DialerPhase::Dialing;
            st.skip.insert(lead.id.clone());
            (list_id, lead)
        };
        self.emit(DialerEvent::PhaseChanged { phase: DialerPhase::Dialing });

        // Durably persist the skip set so a restart never re-dials this
        // lead. The in-memory set already holds it if the write fails.
        let snapshot: HashSet<LeadId> = self.state.read().await.skip.clone();
        if let Err(e) = self.skips.save(&list_id, &snapshot).await {
            tracing::warn!(error = %e, list_id = %list_id, "skip persistence failed");
        }

        if let Err(e) = self.leads.update_status(&lead.id, status, follow_up_at).await {
            tracing::warn!(error = %e, lead = %lead.id, "disposition persistence failed");
        }
        tracing::info!(lead = %lead.id, status = %status, auto, "disposition recorded");
        self.emit(DialerEvent::DispositionSubmitted { lead_id: lead.id.clone(), status, auto });

        self.run_dial_cycle().await
    }

    // ===== dial cycle =====

    /// Run one dial transition. The reentrancy guard must already be set;
    /// it is always cleared on the way out, and any failure aborts the
    /// session rather than leaving it wedged mid-list.
    async fn run_dial_cycle(self: &Arc<Self>) -> DialerResult<()> {
        let result = self.advance().await;
        self.dial_in_flight.store(false, Ordering::SeqCst);
        if let Err(e) = &result {
            self.abort(format!("dial cycle failed: {}", e)).await;
        }
        result
    }

    async fn advance(self: &Arc<Self>) -> DialerResult<()> {
        let (list_id, exclude) = {
            let st = self.state.read().await;
            let list_id = st.list_id.clone().ok_or_else(|| DialerError::Internal {
                message: "dial cycle without a list id".to_string(),
            })?;
            (list_id, st.skip.clone())
        };

        let next = self.leads.fetch_next_dialable(&list_id, &exclude).await?;
        let Some(lead) = next else {
            self.complete(&list_id).await;
            return Ok(());
        };

        // Clear any stale call, give the device a moment to settle, then
        // place the next one.
        if !self.calls.call_state().await.is_idle() {
            self.calls.hangup().await?;
        }
        tokio::time::sleep(self.config.settle_delay).await;

        self.calls.make_call(&lead.phone_number).await?;
        self.leads.mark_called(&lead.id).await?;

        {
            let mut st = self.state.write().await;
            st.current_lead = Some(lead.clone());
            st.phase = DialerPhase::Dialing;
        }
        tracing::info!(lead = %lead.id, number = %lead.phone_number, "lead dialed");
        self.emit(DialerEvent::LeadDialed { lead });
        Ok(())
    }

    /// Queue exhausted: the run is complete and the persisted skip state
    /// for this list is cleared.
    async fn complete(self: &Arc<Self>, list_id: &ListId) {
        if let Err(e) = self.skips.clear(list_id).await {
            tracing::warn!(error = %e, list_id = %list_id, "clearing skip state failed");
        }
        self.reset_to_idle().await;
        tracing::info!(list_id = %list_id, "lead list exhausted, session complete");
        self.emit(DialerEvent::SessionCompleted { list_id: list_id.clone() });
    }

    /// Session-fatal failure: abort to idle, clearing local queue state
    /// but keeping the persisted skip-list.
    async fn abort(self: &Arc<Self>, reason: String) {
        let list_id = self.state.read().await.list_id.clone();
        self.cancel_countdown().await;
        self.reset_to_idle().await;
        tracing::error!(reason = %reason, "dialer session aborted");
        if let Some(list_id) = list_id {
            self.emit(DialerEvent::SessionAborted { list_id, reason });
        }
    }

    // ===== call-ended detection and wrap-up =====

    async fn spawn_watcher(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut rx = self.calls.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ClientEvent::CallStateChanged { info }) if info.new_state.is_idle() => {
                        let Some(dialer) = weak.upgrade() else { return };
                        dialer.on_call_idle().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        let mut slot = self.watcher_task.lock().await;
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// The call manager reached idle. Only a natural end (phase exactly
    /// `Dialing`, no dial transition in flight) opens a wrap-up window.
    async fn on_call_idle(self: &Arc<Self>) {
        {
            let st = self.state.read().await;
            if st.phase != DialerPhase::Dialing {
                return;
            }
        }
        if self.dial_in_flight.load(Ordering::SeqCst) {
            return;
        }
        self.enter_wrap_up().await;
    }

    async fn enter_wrap_up(self: &Arc<Self>) {
        let lead = {
            let mut st = self.state.write().await;
            // Only a live dialing phase opens a wrap-up window; a stop or
            // pause that raced us wins.
            if st.phase != DialerPhase::Dialing {
                return;
            }
            st.phase = DialerPhase::WrapUp;
            st.countdown_remaining = self.config.wrap_up_secs;
            st.timer_paused = false;
            st.current_lead.clone()
        };
        tracing::debug!(countdown = self.config.wrap_up_secs, "entering wrap-up");
        self.emit(DialerEvent::PhaseChanged { phase: DialerPhase::WrapUp });
        self.emit(DialerEvent::WrapUpStarted { lead });
        self.spawn_countdown().await;
    }

    /// One-second ticks so the remaining value is observable and the timer
    /// pause can freeze it mid-flight. Expiry submits the default
    /// disposition exactly once.
    async fn spawn_countdown(self: &Arc<Self>) {
        self.cancel_countdown().await;
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let Some(dialer) = weak.upgrade() else { return };
                let expired = {
                    let mut st = dialer.state.write().await;
                    if st.phase != DialerPhase::WrapUp {
                        return;
                    }
                    if st.timer_paused {
                        false
                    } else {
                        st.countdown_remaining = st.countdown_remaining.saturating_sub(1);
                        st.countdown_remaining == 0
                    }
                };
                if expired {
                    // Drop our own handle so the submit path cannot abort
                    // the task that is doing the submitting.
                    let _ = dialer.countdown_task.lock().await.take();
                    if let Err(e) = dialer.submit_inner(LeadStatus::Called, None, true).await {
                        tracing::warn!(error = %e, "auto disposition failed");
                    }
                    return;
                }
            }
        });
        *self.countdown_task.lock().await = Some(handle);
    }

    async fn cancel_countdown(&self) {
        if let Some(handle) = self.countdown_task.lock().await.take() {
            handle.abort();
        }
    }

    async fn reset_to_idle(&self) {
        {
            let mut st = self.state.write().await;
            *st = DialerState::default();
        }
        if let Some(handle) = self.watcher_task.lock().await.take() {
            handle.abort();
        }
        self.cancel_countdown().await;
        self.emit(DialerEvent::PhaseChanged { phase: DialerPhase::Idle });
    }

    fn emit(&self, event: DialerEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl std::fmt::Debug for PowerDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerDialer")
            .field("wrap_up_secs", &self.config.wrap_up_secs)
            .finish()
    }
}
