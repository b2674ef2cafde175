//! Transfer modes, shared between the client request surface and the
//! orchestrator.

use serde::{Deserialize, Serialize};

/// How a transfer hands the call off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Originating agent leaves as soon as the target joins.
    Cold,
    /// Both agents stay bridged until the transfer is explicitly completed.
    Warm,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Cold => "cold",
            TransferMode::Warm => "warm",
        }
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
