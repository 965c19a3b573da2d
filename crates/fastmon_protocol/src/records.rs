//! Catalog record and request payload types
//!
//! Records are what the catalog returns; `New*` and `*Patch` types are the
//! request bodies the agent sends. Returned records are decoded leniently
//! (`#[serde(default)]`) because the catalog may echo only part of a record.

use crate::types::{FileStatus, WorkflowStageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Catalog identifier: integer primary key or UUID string.
///
/// Serialized back in the same shape it was received so it can be used as
/// a foreign key in later requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId::Text(id)
    }
}

// ============================================================================
// Runs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RecordId,
    #[serde(default)]
    pub run_number: Option<u64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub run_conditions: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRun {
    pub run_number: u64,
    pub start_time: DateTime<Utc>,
    pub run_conditions: Value,
}

// ============================================================================
// STF files
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StfMetadata {
    pub original_path: String,
    pub file_url: String,
    pub creation_time: DateTime<Utc>,
    pub modification_time: DateTime<Utc>,
    pub agent_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewStfFile {
    pub run: RecordId,
    pub stf_filename: String,
    pub file_size_bytes: u64,
    pub checksum: String,
    pub status: FileStatus,
    pub metadata: StfMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StfFileRecord {
    pub file_id: RecordId,
    #[serde(default)]
    pub run: Option<RecordId>,
    #[serde(default)]
    pub stf_filename: Option<String>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub status: Option<FileStatus>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

// ============================================================================
// TF (fast monitoring) files
// ============================================================================

/// Provenance snapshot stored with every simulated TF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfMetadata {
    pub simulation: bool,
    pub created_from: Option<String>,
    pub tf_size_fraction: f64,
    pub agent_name: String,
    pub state: Option<String>,
    pub substate: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTfFile {
    pub stf_file: Option<RecordId>,
    pub tf_filename: String,
    pub file_size_bytes: u64,
    pub status: FileStatus,
    pub metadata: TfMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfFileRecord {
    #[serde(default)]
    pub tf_file_id: Option<RecordId>,
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub stf_file: Option<RecordId>,
    #[serde(default)]
    pub tf_filename: Option<String>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub status: Option<FileStatus>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TfFileRecord {
    /// `tf_file_id` if the catalog returned one, else the generic `id`.
    pub fn identifier(&self) -> Option<&RecordId> {
        self.tf_file_id.as_ref().or(self.id.as_ref())
    }
}

// ============================================================================
// Workflow stages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWorkflowStage {
    pub workflow: RecordId,
    pub agent_name: String,
    pub agent_type: String,
    pub status: WorkflowStageStatus,
    pub input_message: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    pub tf_files_created: usize,
    pub tf_filenames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStagePatch {
    pub status: WorkflowStageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_message: Option<StageOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStageRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub workflow: Option<RecordId>,
    #[serde(default)]
    pub status: Option<WorkflowStageStatus>,
}
