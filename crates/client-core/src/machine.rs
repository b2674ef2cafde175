//! The call state machine.
//!
//! Three asynchronous sources feed the client's view of a call: local agent
//! actions, media-session events from the provider SDK, and channel events
//! relayed from the call engine. All three are folded into one tagged
//! union, [`CallEvent`], and applied through a single pure function,
//! [`transition`], so the machine can be tested exhaustively without any
//! transport or mock in place.
//!
//! Rules the function encodes:
//!
//! - Dialing is only legal from `Idle` and moves straight to `Connecting`.
//! - Media progress drives `Connecting → Ringing → InProgress`; stale or
//!   out-of-order progress events are ignored rather than applied.
//! - Any `Disconnect`, `Cancel`, or `Error` resets the whole session to the
//!   idle default in one step; every call-scoped field is cleared.
//! - Hold is applied only via [`CallEvent::HoldConfirmed`]; the manager
//!   issues the server round trip first and feeds the confirmation in, so
//!   the machine never flips hold optimistically.
//! - A `CallEnded` channel event for the session's own conference resets
//!   the machine; events for other conferences are ignored.
//!
//! Incoming-call offers deliberately do not touch the machine: they are
//! held outside it by the manager until accepted or rejected.

use dialwave_relay_core::ChannelEvent;

use crate::call::{CallDirection, CallId, CallSession, CallState};
use crate::media::MediaSessionEvent;

/// Everything that can move the call state machine, regardless of which
/// transport delivered it.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The agent asked to place or accept a call; the session enters
    /// `Connecting` before the media layer is touched.
    DialStarted {
        call_id: CallId,
        number: String,
        direction: CallDirection,
    },
    /// The server confirmed a hold toggle.
    HoldConfirmed { on_hold: bool },
    /// The agent asked to hang up. Applied unconditionally so local state
    /// reaches idle even when the control-plane request failed.
    HangupRequested,
    /// Event from the provider's client media session.
    Media(MediaSessionEvent),
    /// Event relayed from the call engine.
    Channel(ChannelEvent),
}

/// Result of applying one event.
#[derive(Debug, Clone)]
pub struct Transition {
    pub session: CallSession,
    pub changed: bool,
}

impl Transition {
    fn unchanged(session: &CallSession) -> Self {
        Self { session: session.clone(), changed: false }
    }

    fn to(session: CallSession) -> Self {
        Self { session, changed: true }
    }
}

/// Apply one event to the session, producing the next session.
///
/// Pure: no I/O, no clocks, no side effects. Illegal or stale events leave
/// the session unchanged (`changed == false`).
pub fn transition(session: &CallSession, event: &CallEvent) -> Transition {
    match event {
        CallEvent::DialStarted { call_id, number, direction } => {
            if !session.state.is_idle() {
                return Transition::unchanged(session);
            }
            let mut next = CallSession::reset();
            next.call_id = Some(*call_id);
            next.direction = Some(*direction);
            next.remote_number = Some(number.clone());
            next.state = CallState::Connecting;
            Transition::to(next)
        }

        CallEvent::HoldConfirmed { on_hold } => match (session.state, on_hold) {
            (CallState::InProgress, true) => {
                let mut next = session.clone();
                next.state = CallState::OnHold;
                Transition::to(next)
            }
            (CallState::OnHold, false) => {
                let mut next = session.clone();
                next.state = CallState::InProgress;
                Transition::to(next)
            }
            _ => Transition::unchanged(session),
        },

        CallEvent::HangupRequested => {
            if session.state.is_idle() {
                Transition::unchanged(session)
            } else {
                Transition::to(CallSession::reset())
            }
        }

        CallEvent::Media(media) => apply_media(session, media),

        CallEvent::Channel(channel) => apply_channel(session, channel),
    }
}

fn apply_media(session: &CallSession, event: &MediaSessionEvent) -> Transition {
    match event {
        MediaSessionEvent::Ringing => {
            if session.state == CallState::Connecting {
                let mut next = session.clone();
                next.state = CallState::Ringing;
                Transition::to(next)
            } else {
                Transition::unchanged(session)
            }
        }

        MediaSessionEvent::Accept { call_sid } => match session.state {
            CallState::Connecting | CallState::Ringing => {
                let mut next = session.clone();
                next.state = CallState::InProgress;
                if next.call_sid.is_none() {
                    next.call_sid = call_sid.clone();
                }
                Transition::to(next)
            }
            _ => Transition::unchanged(session),
        },

        MediaSessionEvent::Disconnect
        | MediaSessionEvent::Cancel
        | MediaSessionEvent::Error { .. } => {
            if session.state.is_idle() {
                Transition::unchanged(session)
            } else {
                Transition::to(CallSession::reset())
            }
        }

        // Offers are held outside the machine until accepted.
        MediaSessionEvent::Incoming { .. } => Transition::unchanged(session),
    }
}

fn apply_channel(session: &CallSession, event: &ChannelEvent) -> Transition {
    match event {
        ChannelEvent::CallOutboundStarted { conference_sid, .. } => {
            // Learn our conference identity; the manager has already
            // filtered events addressed to other agents.
            if !session.state.is_idle() && session.conference_sid.is_none() {
                let mut next = session.clone();
                next.conference_sid = Some(conference_sid.clone());
                Transition::to(next)
            } else {
                Transition::unchanged(session)
            }
        }

        ChannelEvent::CallEnded { conference_sid, .. } => {
            if session.conference_sid.as_ref() == Some(conference_sid) {
                Transition::to(CallSession::reset())
            } else {
                Transition::unchanged(session)
            }
        }

        ChannelEvent::HoldChanged { conference_sid, on_hold, .. } => {
            if session.conference_sid.as_ref() == Some(conference_sid) {
                transition(session, &CallEvent::HoldConfirmed { on_hold: *on_hold })
            } else {
                Transition::unchanged(session)
            }
        }

        ChannelEvent::ConferenceStarted { .. }
        | ChannelEvent::ParticipantJoined { .. }
        | ChannelEvent::AgentStatusChanged { .. } => Transition::unchanged(session),
    }
}
