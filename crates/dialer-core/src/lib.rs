//! Power dialer sequencing for the dialwave stack.
//!
//! Layers an automated sequential-dialing scheduler over
//! [`dialwave_client_core`]'s call manager: it walks a lead list, watches
//! for each call's natural end, opens a wrap-up window for the agent's
//! disposition (with a countdown that can be paused independently of the
//! session), and durably tracks handled leads per list so nothing is
//! silently lost or double-dialed, even across a client restart.

pub mod error;
pub mod lead;
pub mod sequencer;
pub mod session;
pub mod skip;

pub use error::{DialerError, DialerResult};
pub use lead::{LeadEntry, LeadQueue, LeadStatus};
pub use sequencer::{DialerConfig, DialerEvent, PowerDialer};
pub use session::{DialerPhase, DialerSnapshot};
pub use skip::{JsonFileSkipStore, MemorySkipStore, SkipStore};
