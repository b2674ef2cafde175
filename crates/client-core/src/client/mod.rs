//! The call manager and its operation modules.
//!
//! Mirrors the layering of the crate's public API: `manager` owns state and
//! event plumbing, `calls` implements call setup/teardown, `controls`
//! implements in-call controls (hold, mute, transfer), and `config` holds
//! the builder-style configuration.

pub mod config;
pub mod manager;

mod calls;
mod controls;

pub use config::ClientConfig;
pub use manager::{CallManager, ClientStats};
