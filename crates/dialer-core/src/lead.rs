//! Lead entries and the lead queue seam.
//!
//! The lead queue itself is an external collaborator (CRUD and spreadsheet
//! ingestion live elsewhere); the sequencer only reads dialable entries
//! and transitions their status.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dialwave_relay_core::{LeadId, ListId};

use crate::error::DialerResult;

/// Status of a lead, doubling as the disposition an agent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Called,
    NoAnswer,
    FollowUp,
    NotInterested,
    DoNotContact,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Called => "called",
            LeadStatus::NoAnswer => "no_answer",
            LeadStatus::FollowUp => "follow_up",
            LeadStatus::NotInterested => "not_interested",
            LeadStatus::DoNotContact => "do_not_contact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LeadStatus::Pending),
            "called" => Some(LeadStatus::Called),
            "no_answer" => Some(LeadStatus::NoAnswer),
            "follow_up" => Some(LeadStatus::FollowUp),
            "not_interested" => Some(LeadStatus::NotInterested),
            "do_not_contact" => Some(LeadStatus::DoNotContact),
            _ => None,
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One dialable entry in a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadEntry {
    pub id: LeadId,
    pub phone_number: String,
    pub status: LeadStatus,
    /// Set when the status is `FollowUp`; always strictly in the future at
    /// the time it was recorded.
    pub follow_up_at: Option<DateTime<Utc>>,
    pub called: bool,
    /// Opaque per-lead metadata, passed through in order and unvalidated.
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
}

/// Read/transition surface over the external lead queue.
#[async_trait]
pub trait LeadQueue: Send + Sync {
    /// Next dialable entry in the list, excluding the given ids. `None`
    /// means the list is exhausted for this session.
    async fn fetch_next_dialable(
        &self,
        list_id: &ListId,
        exclude: &HashSet<LeadId>,
    ) -> DialerResult<Option<LeadEntry>>;

    /// Flag a lead as called the moment the dial is placed.
    async fn mark_called(&self, id: &LeadId) -> DialerResult<()>;

    /// Record the disposition for a lead.
    async fn update_status(
        &self,
        id: &LeadId,
        status: LeadStatus,
        follow_up_at: Option<DateTime<Utc>>,
    ) -> DialerResult<()>;
}
