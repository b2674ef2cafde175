//! Client-side call coordination for the dialwave stack.
//!
//! This crate owns the client-resident half of a live call: a pure call
//! state machine fed by a tagged union of media-session events, relayed
//! channel events, and local actions, plus a [`client::CallManager`] that
//! wraps the machine with the media-device and control-plane seams and an
//! event surface for applications.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dialwave_client_core::{client::{CallManager, ClientConfig}};
//! use dialwave_relay_core::AgentId;
//!
//! # async fn example(
//! #     media: Arc<dyn dialwave_client_core::media::MediaSession>,
//! #     control: Arc<dyn dialwave_client_core::control::ControlPlane>,
//! # ) -> dialwave_client_core::error::ClientResult<()> {
//! let manager = CallManager::new(ClientConfig::new(AgentId::new("agent-001")), media, control);
//! let call_id = manager.make_call("+15551230001").await?;
//! println!("dialing as call {}", call_id);
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod client;
pub mod control;
pub mod error;
pub mod events;
pub mod machine;
pub mod media;

pub use call::{
    CallDirection, CallId, CallSession, CallState, IncomingCallInfo, TransferInProgress,
    TransferMode,
};
pub use client::{CallManager, ClientConfig, ClientStats};
pub use control::ControlPlane;
pub use error::{ClientError, ClientResult};
pub use events::{CallAction, CallStatusInfo, ClientEvent, ClientEventHandler};
pub use machine::{transition, CallEvent, Transition};
pub use media::{MediaSession, MediaSessionEvent};
