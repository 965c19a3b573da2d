//! Outbound notifications: TF registrations, status reports and heartbeats.
//!
//! Publishing never fails the caller. Errors are logged and reported back as
//! `false`.

use crate::broker::Broker;
use crate::error::FastmonError;
use crate::metrics::AgentMetrics;
use chrono::Utc;
use fastmon_protocol::defaults::AGENT_TYPE;
use fastmon_protocol::{
    AgentHeartbeat, AgentMessage, AgentStatus, FastmonStatus, FileStatus, HeartbeatStatus,
    StfReady, TfFileRecord, TfFileRegistered,
};
use tracing::{debug, error, warn};

pub struct NotificationPublisher {
    destination: String,
    agent_name: String,
}

impl NotificationPublisher {
    pub fn new(destination: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            agent_name: agent_name.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// `tf_file_registered` for a persisted TF record and its parent STF message.
    pub fn create_tf_message(&self, tf: &TfFileRecord, stf: &StfReady) -> AgentMessage {
        let tf_filename = tf.tf_filename.clone().unwrap_or_default();
        AgentMessage::TfFileRegistered(TfFileRegistered {
            processed_by: self.agent_name.clone(),
            tf_file_id: tf.identifier().cloned(),
            message: format!("TF file {} registered for fast monitoring", tf_filename),
            tf_filename,
            file_size_bytes: tf.file_size_bytes.unwrap_or(0),
            stf_filename: stf.filename.clone(),
            run_number: stf.run_id.clone(),
            status: tf.status.unwrap_or(FileStatus::Registered),
            timestamp: Utc::now(),
        })
    }

    pub fn create_status_message(&self, status: AgentStatus, message: impl Into<String>) -> AgentMessage {
        AgentMessage::FastmonStatus(FastmonStatus {
            processed_by: self.agent_name.clone(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
            run_id: None,
        })
    }

    pub fn create_heartbeat(&self, status: HeartbeatStatus, metrics: &AgentMetrics) -> AgentMessage {
        AgentMessage::AgentHeartbeat(AgentHeartbeat {
            agent_name: self.agent_name.clone(),
            agent_type: AGENT_TYPE.to_string(),
            status,
            messages_processed: metrics.stf_messages_processed,
            tf_files_created: metrics.tf_files_created,
            timestamp: Utc::now(),
        })
    }

    pub async fn publish_tf_registered(
        &self,
        broker: &mut dyn Broker,
        tf: &TfFileRecord,
        stf: &StfReady,
    ) -> bool {
        let message = self.create_tf_message(tf, stf);
        match broker.send(&self.destination, &message).await {
            Ok(()) => {
                debug!("Sent TF file notification: {}", tf.tf_filename.as_deref().unwrap_or(""));
                true
            }
            Err(e) => {
                error!("{}", FastmonError::Notification(e));
                false
            }
        }
    }

    pub async fn report_status(
        &self,
        broker: &mut dyn Broker,
        status: AgentStatus,
        message: impl Into<String>,
    ) -> bool {
        let message = self.create_status_message(status, message);
        match broker.send(&self.destination, &message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to report status: {}", e);
                false
            }
        }
    }

    pub async fn send_heartbeat(
        &self,
        broker: &mut dyn Broker,
        status: HeartbeatStatus,
        metrics: &AgentMetrics,
    ) -> bool {
        let message = self.create_heartbeat(status, metrics);
        match broker.send(&self.destination, &message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send heartbeat: {}", e);
                false
            }
        }
    }
}
