//! Workflow stage tracking
//!
//! When enabled, each `stf_ready` carrying a `workflow_id` gets a stage record
//! in the catalog that moves `fastmon_received -> fastmon_processing ->
//! fastmon_complete`. Tracking failures never affect TF processing.

use crate::catalog::{patch_json, post_json, CatalogApi};
use crate::error::FastmonError;
use chrono::Utc;
use fastmon_protocol::defaults::AGENT_TYPE;
use fastmon_protocol::{
    NewWorkflowStage, RecordId, StageOutput, StfReady, WorkflowStagePatch, WorkflowStageRecord,
    WorkflowStageStatus,
};
use serde_json::Value;
use tracing::{debug, warn};

/// A stage record created for one `stf_ready` event.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedStage {
    pub stage_id: RecordId,
    pub workflow_id: RecordId,
    status: WorkflowStageStatus,
}

impl TrackedStage {
    pub fn status(&self) -> WorkflowStageStatus {
        self.status
    }

    /// Move forward to `next`. Backward or repeated transitions are refused.
    fn advance(&mut self, next: WorkflowStageStatus) -> Result<(), FastmonError> {
        if !self.status.can_advance_to(next) {
            return Err(FastmonError::Tracking(format!(
                "stage {} cannot move from {} to {}",
                self.stage_id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    fn path(&self) -> String {
        format!("/workflow-stages/{}/", self.stage_id)
    }
}

pub struct WorkflowTracker {
    enabled: bool,
    agent_name: String,
}

impl WorkflowTracker {
    pub fn new(enabled: bool, agent_name: impl Into<String>) -> Self {
        Self {
            enabled,
            agent_name: agent_name.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Create the stage and move it to processing.
    ///
    /// Returns `None` without touching the catalog when tracking is off or the
    /// message has no workflow id, and after logging a warning when creation
    /// fails.
    pub async fn begin(&self, api: &dyn CatalogApi, stf: &StfReady) -> Option<TrackedStage> {
        if !self.enabled {
            return None;
        }
        let workflow_id = stf.workflow_id.clone()?;

        let mut stage = match self.create(api, stf, &workflow_id).await {
            Ok(stage) => stage,
            Err(e) => {
                warn!("Could not create workflow stage: {}", e);
                return None;
            }
        };
        debug!("Created workflow stage {} for workflow {}", stage.stage_id, workflow_id);

        let patch = WorkflowStagePatch {
            status: WorkflowStageStatus::FastmonProcessing,
            started_at: Some(Utc::now()),
            completed_at: None,
            output_message: None,
        };
        if let Err(e) = self.transition(api, &mut stage, patch).await {
            warn!("Could not update workflow stage: {}", e);
        }

        Some(stage)
    }

    /// Mark the stage complete with the TF output summary.
    pub async fn complete(&self, api: &dyn CatalogApi, mut stage: TrackedStage, output: StageOutput) {
        let patch = WorkflowStagePatch {
            status: WorkflowStageStatus::FastmonComplete,
            started_at: None,
            completed_at: Some(Utc::now()),
            output_message: Some(output),
        };
        if let Err(e) = self.transition(api, &mut stage, patch).await {
            warn!("Could not update workflow stage: {}", e);
        }
    }

    async fn create(
        &self,
        api: &dyn CatalogApi,
        stf: &StfReady,
        workflow_id: &RecordId,
    ) -> Result<TrackedStage, FastmonError> {
        let mut input_message = serde_json::to_value(stf)
            .map_err(|e| FastmonError::Tracking(format!("cannot encode input message: {}", e)))?;
        if let Value::Object(map) = &mut input_message {
            map.insert("msg_type".to_string(), Value::from("stf_ready"));
        }

        let request = NewWorkflowStage {
            workflow: workflow_id.clone(),
            agent_name: self.agent_name.clone(),
            agent_type: AGENT_TYPE.to_string(),
            status: WorkflowStageStatus::FastmonReceived,
            input_message,
        };
        let record: WorkflowStageRecord = post_json(api, "/workflow-stages/", &request).await?;
        let stage_id = record
            .id
            .ok_or_else(|| FastmonError::Tracking("stage record has no id".to_string()))?;

        Ok(TrackedStage {
            stage_id,
            workflow_id: workflow_id.clone(),
            status: WorkflowStageStatus::FastmonReceived,
        })
    }

    async fn transition(
        &self,
        api: &dyn CatalogApi,
        stage: &mut TrackedStage,
        patch: WorkflowStagePatch,
    ) -> Result<(), FastmonError> {
        let next = patch.status;
        // Refused moves never reach the catalog
        if !stage.status.can_advance_to(next) {
            return stage.advance(next);
        }
        let _: Value = patch_json(api, &stage.path(), &patch).await?;
        stage.advance(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_advances_forward_only() {
        let mut stage = TrackedStage {
            stage_id: RecordId::Int(3),
            workflow_id: RecordId::Int(17),
            status: WorkflowStageStatus::FastmonReceived,
        };
        stage.advance(WorkflowStageStatus::FastmonProcessing).unwrap();
        assert!(stage.advance(WorkflowStageStatus::FastmonReceived).is_err());
        assert!(stage.advance(WorkflowStageStatus::FastmonProcessing).is_err());
        stage.advance(WorkflowStageStatus::FastmonComplete).unwrap();
        assert!(stage.status().is_terminal());
    }

    #[test]
    fn test_stage_path() {
        let stage = TrackedStage {
            stage_id: RecordId::Int(3),
            workflow_id: RecordId::Int(17),
            status: WorkflowStageStatus::FastmonReceived,
        };
        assert_eq!(stage.path(), "/workflow-stages/3/");
    }
}
