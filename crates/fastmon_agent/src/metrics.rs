//! Processing counters
//!
//! Owned by the agent and updated from its single thread of control, so plain
//! integers suffice. Other code reads a [`MetricsSnapshot`].

use chrono::{DateTime, Utc};

/// Something that happened in the pipeline and should be counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    StfMessage,
    FilesDiscovered(usize),
    StfRegistered,
    StfRegistrationFailed,
    TfRegistered,
    TfRegistrationFailed,
    NotificationSent,
    NotificationFailed,
    ScanCycle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentMetrics {
    pub stf_messages_processed: u64,
    pub files_discovered: u64,
    pub files_registered: u64,
    pub stf_registration_failures: u64,
    pub tf_files_created: u64,
    pub tf_registration_failures: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub scan_cycles: u64,
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_scan_time: Option<DateTime<Utc>>,
}

/// Immutable copy of the counters for reading
pub type MetricsSnapshot = AgentMetrics;

impl AgentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::StfMessage => {
                self.stf_messages_processed += 1;
                self.last_message_time = Some(Utc::now());
            }
            PipelineEvent::FilesDiscovered(n) => self.files_discovered += n as u64,
            PipelineEvent::StfRegistered => self.files_registered += 1,
            PipelineEvent::StfRegistrationFailed => self.stf_registration_failures += 1,
            PipelineEvent::TfRegistered => self.tf_files_created += 1,
            PipelineEvent::TfRegistrationFailed => self.tf_registration_failures += 1,
            PipelineEvent::NotificationSent => self.notifications_sent += 1,
            PipelineEvent::NotificationFailed => self.notification_failures += 1,
            PipelineEvent::ScanCycle => {
                self.scan_cycles += 1;
                self.last_scan_time = Some(Utc::now());
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.clone()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        format!(
            "STF messages: {} | Files: {} discovered, {} registered, {} failed | \
             TF files: {} created, {} failed | Notifications: {} sent, {} failed",
            self.stf_messages_processed,
            self.files_discovered,
            self.files_registered,
            self.stf_registration_failures,
            self.tf_files_created,
            self.tf_registration_failures,
            self.notifications_sent,
            self.notification_failures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reset() {
        let mut metrics = AgentMetrics::new();
        metrics.record(PipelineEvent::StfMessage);
        metrics.record(PipelineEvent::FilesDiscovered(3));
        metrics.record(PipelineEvent::TfRegistered);
        metrics.record(PipelineEvent::TfRegistered);
        metrics.record(PipelineEvent::TfRegistrationFailed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.stf_messages_processed, 1);
        assert_eq!(snapshot.files_discovered, 3);
        assert_eq!(snapshot.tf_files_created, 2);
        assert_eq!(snapshot.tf_registration_failures, 1);
        assert!(snapshot.last_message_time.is_some());

        metrics.reset();
        assert_eq!(metrics, AgentMetrics::default());
        // snapshot is detached from later updates
        assert_eq!(snapshot.tf_files_created, 2);
    }

    #[test]
    fn test_summary() {
        let mut metrics = AgentMetrics::new();
        metrics.record(PipelineEvent::TfRegistered);
        assert!(metrics.summary().contains("TF files: 1 created"));
    }

    #[test]
    fn test_registration_outcomes_counted_separately() {
        let mut metrics = AgentMetrics::new();
        metrics.record(PipelineEvent::StfRegistered);
        metrics.record(PipelineEvent::StfRegistrationFailed);
        metrics.record(PipelineEvent::StfRegistrationFailed);

        assert_eq!(metrics.files_registered, 1);
        assert_eq!(metrics.stf_registration_failures, 2);
        assert!(metrics.summary().contains("1 registered, 2 failed"));
    }
}
