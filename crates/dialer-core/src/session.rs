//! Dialer session state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use dialwave_relay_core::{LeadId, ListId};

use crate::lead::LeadEntry;

/// Phase of the power-dial run.
///
/// `Idle → Dialing → WrapUp → (Dialing | Paused) → Idle`. The session is
/// a singleton: "active" simply means the phase is not `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialerPhase {
    Idle,
    Dialing,
    WrapUp,
    Paused,
}

impl std::fmt::Display for DialerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DialerPhase::Idle => "idle",
            DialerPhase::Dialing => "dialing",
            DialerPhase::WrapUp => "wrap_up",
            DialerPhase::Paused => "paused",
        };
        write!(f, "{}", s)
    }
}

/// Mutable state of the running session. Exists only while a run is
/// active; every terminal path resets it wholesale.
#[derive(Debug, Clone)]
pub(crate) struct DialerState {
    pub phase: DialerPhase,
    /// Phase to return to when a paused session resumes.
    pub resume_phase: Option<DialerPhase>,
    pub list_id: Option<ListId>,
    pub current_lead: Option<LeadEntry>,
    pub skip: HashSet<LeadId>,
    /// Seconds left on the wrap-up countdown.
    pub countdown_remaining: u32,
    pub timer_paused: bool,
}

impl Default for DialerState {
    fn default() -> Self {
        Self {
            phase: DialerPhase::Idle,
            resume_phase: None,
            list_id: None,
            current_lead: None,
            skip: HashSet::new(),
            countdown_remaining: 0,
            timer_paused: false,
        }
    }
}

/// Read-only view of the session for UIs and tests.
#[derive(Debug, Clone)]
pub struct DialerSnapshot {
    pub phase: DialerPhase,
    pub list_id: Option<ListId>,
    pub current_lead: Option<LeadEntry>,
    pub skip_count: usize,
    pub countdown_remaining: u32,
    pub timer_paused: bool,
}

impl DialerState {
    pub fn snapshot(&self) -> DialerSnapshot {
        DialerSnapshot {
            phase: self.phase,
            list_id: self.list_id.clone(),
            current_lead: self.current_lead.clone(),
            skip_count: self.skip.len(),
            countdown_remaining: self.countdown_remaining,
            timer_paused: self.timer_paused,
        }
    }
}
