//! Broker message types and canonical status enums

use crate::error::{ProtocolError, Result};
use crate::records::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Canonical Enums
// ============================================================================

/// Lifecycle status of STF and TF files in the catalog.
///
/// The agent only ever writes `Registered`; later stages advance the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Registered,
    Processing,
    Processed,
    Failed,
    Done,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Registered => "registered",
            FileStatus::Processing => "processing",
            FileStatus::Processed => "processed",
            FileStatus::Failed => "failed",
            FileStatus::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Done)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "registered" => Ok(FileStatus::Registered),
            "processing" => Ok(FileStatus::Processing),
            "processed" => Ok(FileStatus::Processed),
            "failed" => Ok(FileStatus::Failed),
            "done" => Ok(FileStatus::Done),
            _ => Err(format!("Invalid file status: '{}'", s)),
        }
    }
}

/// Workflow stage status written by the fast monitoring agent.
///
/// Ordered: a stage only ever moves to a later variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStageStatus {
    FastmonReceived,
    FastmonProcessing,
    FastmonComplete,
}

impl WorkflowStageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStageStatus::FastmonReceived => "fastmon_received",
            WorkflowStageStatus::FastmonProcessing => "fastmon_processing",
            WorkflowStageStatus::FastmonComplete => "fastmon_complete",
        }
    }

    /// True when `next` is strictly later in the lifecycle.
    pub fn can_advance_to(&self, next: WorkflowStageStatus) -> bool {
        next > *self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStageStatus::FastmonComplete)
    }
}

impl fmt::Display for WorkflowStageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent status carried by `fastmon_status` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    Ok,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Ok => "OK",
            AgentStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Liveness state advertised in heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    Idle,
    Busy,
}

// ============================================================================
// Messages
// ============================================================================

/// `stf_ready`: an STF file is registered and ready for sampling.
///
/// Every field is optional on the wire; the agent validates what it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StfReady {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_id: Option<RecordId>,
    #[serde(default)]
    pub run_id: Option<RecordId>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub substate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
}

/// `tf_file_registered`: broadcast once per TF file recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfFileRegistered {
    pub processed_by: String,
    pub tf_file_id: Option<RecordId>,
    pub tf_filename: String,
    pub file_size_bytes: u64,
    pub stf_filename: Option<String>,
    pub run_number: Option<RecordId>,
    pub status: FileStatus,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// `fastmon_status`: agent status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastmonStatus {
    pub processed_by: String,
    pub status: AgentStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RecordId>,
}

/// `agent_heartbeat`: liveness signal with running counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHeartbeat {
    pub agent_name: String,
    pub agent_type: String,
    pub status: HeartbeatStatus,
    pub messages_processed: u64,
    pub tf_files_created: u64,
    pub timestamp: DateTime<Utc>,
}

/// All messages the agent understands, tagged by `msg_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum AgentMessage {
    StfReady(StfReady),
    TfFileRegistered(TfFileRegistered),
    FastmonStatus(FastmonStatus),
    AgentHeartbeat(AgentHeartbeat),
}

impl AgentMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            AgentMessage::StfReady(_) => "stf_ready",
            AgentMessage::TfFileRegistered(_) => "tf_file_registered",
            AgentMessage::FastmonStatus(_) => "fastmon_status",
            AgentMessage::AgentHeartbeat(_) => "agent_heartbeat",
        }
    }
}

/// An inbound payload, classified by `msg_type`.
///
/// Only `stf_ready` bodies are decoded. Everything else on the topic,
/// including other agents' status and heartbeat broadcasts, is kept as its
/// type name and never deserialized.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    StfReady(StfReady),
    Other { msg_type: String },
}

impl InboundMessage {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let msg_type = value
            .get("msg_type")
            .and_then(|v| v.as_str())
            .ok_or(ProtocolError::MissingMessageType)?;

        if msg_type == "stf_ready" {
            Ok(InboundMessage::StfReady(serde_json::from_value(value)?))
        } else {
            Ok(InboundMessage::Other {
                msg_type: msg_type.to_string(),
            })
        }
    }

    pub fn msg_type(&self) -> &str {
        match self {
            InboundMessage::StfReady(_) => "stf_ready",
            InboundMessage::Other { msg_type } => msg_type,
        }
    }
}
