//! Messages exchanged on the visualization event channel

use crate::ledger::{LedgerError, Rowid};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound message, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelRequest {
    /// Most recent page.
    Last,
    /// Page around a unit, falling back to the most recent page.
    Unit { unit: String },
    /// Overview of an address.
    Address { address: String },
    /// Older page, strictly before `last`.
    Next {
        last: Rowid,
        #[serde(rename = "notStable", default)]
        not_stable: Vec<String>,
    },
    /// Newer page, strictly after `first`.
    Prev {
        first: Rowid,
        #[serde(rename = "notStable", default)]
        not_stable: Vec<String>,
    },
    /// Units appended after the rowid in `unit`.
    New {
        unit: Rowid,
        #[serde(rename = "notStable", default)]
        not_stable: Vec<String>,
    },
    Info { unit: String },
    HighlightNode {
        unit: String,
        first: Rowid,
        last: Rowid,
    },
    NextPageTransactions {
        address: String,
        #[serde(rename = "lastInputsROWID", default)]
        last_inputs_rowid: Option<Rowid>,
        #[serde(rename = "lastOutputsROWID", default)]
        last_outputs_rowid: Option<Rowid>,
    },
    #[serde(rename = "staticdata")]
    StaticData,
    GetRoundStatus { round_index: u64 },
    GetOnlinePeers,
    GetDurationTime {
        #[serde(rename = "curRound")]
        cur_round: u64,
    },
}

/// Outbound event: a name and an optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
}

impl ChannelEvent {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data: Some(data),
        }
    }

    /// Event without a payload.
    pub fn bare(event: &str) -> Self {
        Self {
            event: event.to_string(),
            data: None,
        }
    }
}

/// Error types for the event channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
