//! Fast monitoring agent
//!
//! Two ways of driving the same TF pipeline:
//! - **Message-driven**: wait for `stf_ready` on the broker and sample each
//!   announced STF.
//! - **Continuous**: scan the watch directories every `check_interval`
//!   seconds, register a sample of the STF files found, then feed each one
//!   through the message-driven path.
//!
//! Work is strictly sequential. One message or one scan cycle completes
//! before the next begins.

use crate::broker::{Broker, BrokerError};
use crate::cancel::CancellationToken;
use crate::catalog::CatalogApi;
use crate::config::AgentConfig;
use crate::discovery::find_recent_files;
use crate::error::{ConfigError, Result};
use crate::metrics::{AgentMetrics, MetricsSnapshot, PipelineEvent};
use crate::notify::NotificationPublisher;
use crate::sampler::{agent_rng, sample_items};
use crate::stf::register_stf_file;
use crate::tf::{register_tf_file, SimulatedSplitter, TfSettings, TfSplitter};
use crate::workflow::WorkflowTracker;
use fastmon_protocol::{
    AgentStatus, HeartbeatStatus, InboundMessage, StageOutput, StfReady,
    TfFileRecord,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Files registered per continuous-mode cycle, at most.
pub const MAX_FILES_PER_CYCLE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    MessageDriven,
    Continuous,
}

impl RunMode {
    /// Mode from the `FASTMON_MODE` value: empty or `message` means
    /// message-driven, anything else continuous.
    pub fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "message" | "message-driven" | "message_driven" => RunMode::MessageDriven,
            _ => RunMode::Continuous,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::MessageDriven => f.write_str("message-driven"),
            RunMode::Continuous => f.write_str("continuous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Discovering,
    Sampling,
    Registering,
    Notifying,
    Reporting,
}

/// What happened to one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Processed { tf_files: usize },
    Ignored { msg_type: String },
    Rejected { error: String },
}

/// Summary of one continuous-mode cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub discovered: usize,
    pub selected: usize,
    pub registered: usize,
    pub failed: usize,
    pub tf_files: usize,
}

impl CycleReport {
    pub fn status(&self) -> AgentStatus {
        if self.failed == 0 {
            AgentStatus::Ok
        } else {
            AgentStatus::Error
        }
    }
}

pub struct FastMonitorAgent {
    config: AgentConfig,
    catalog: Arc<dyn CatalogApi>,
    broker: Box<dyn Broker>,
    publisher: NotificationPublisher,
    splitter: Box<dyn TfSplitter>,
    tracker: WorkflowTracker,
    rng: ChaCha8Rng,
    metrics: AgentMetrics,
    state: SchedulerState,
    cancel: CancellationToken,
}

impl FastMonitorAgent {
    pub fn new(
        config: AgentConfig,
        catalog: Arc<dyn CatalogApi>,
        broker: Box<dyn Broker>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = agent_rng(config.random_seed);
        let splitter = SimulatedSplitter::new(
            TfSettings::from_config(&config),
            config.agent_name.clone(),
            ChaCha8Rng::seed_from_u64(rng.gen()),
        );

        Ok(Self {
            publisher: NotificationPublisher::new(
                config.broker.destination.clone(),
                config.agent_name.clone(),
            ),
            tracker: WorkflowTracker::new(config.track_workflow, config.agent_name.clone()),
            splitter: Box::new(splitter),
            config,
            catalog,
            broker,
            rng,
            metrics: AgentMetrics::new(),
            state: SchedulerState::Idle,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the TF splitter.
    pub fn with_splitter(mut self, splitter: Box<dyn TfSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub async fn run(&mut self, mode: RunMode) -> Result<()> {
        info!("Starting {} in {} mode", self.config.agent_name, mode);
        let result = match mode {
            RunMode::MessageDriven => self.run_message_driven().await,
            RunMode::Continuous => self.run_continuous().await,
        };
        self.state = SchedulerState::Idle;
        info!("Agent stopped. {}", self.metrics.summary());
        result
    }

    /// Process inbound messages until cancelled or the broker closes.
    pub async fn run_message_driven(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();

        while !cancel.is_cancelled() {
            self.state = SchedulerState::Idle;

            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.broker.recv() => received,
            };

            match received {
                Ok(Some(envelope)) => {
                    self.on_message(&envelope.payload).await;
                }
                Ok(None) => {}
                Err(BrokerError::Closed) => {
                    info!("Broker connection closed");
                    break;
                }
                Err(BrokerError::Protocol(e)) => {
                    error!("Dropping malformed envelope: {}", e);
                    self.publisher
                        .report_status(
                            self.broker.as_mut(),
                            AgentStatus::Error,
                            format!("Message processing error: {}", e),
                        )
                        .await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Handle one inbound payload.
    ///
    /// Only `stf_ready` is acted on and answered with a busy heartbeat.
    /// Any other type on the topic, including agent broadcasts from this or
    /// any other agent, is dropped without a reply.
    pub async fn on_message(&mut self, payload: &[u8]) -> MessageOutcome {
        match InboundMessage::parse(payload) {
            Ok(InboundMessage::StfReady(stf)) => {
                self.publisher
                    .send_heartbeat(self.broker.as_mut(), HeartbeatStatus::Busy, &self.metrics)
                    .await;
                let tf_files = self.process_stf_ready(&stf).await;
                self.state = SchedulerState::Idle;
                MessageOutcome::Processed {
                    tf_files: tf_files.len(),
                }
            }
            Ok(InboundMessage::Other { msg_type }) => {
                if is_agent_broadcast(&msg_type) {
                    debug!("Ignoring {} broadcast", msg_type);
                } else {
                    warn!("Ignoring unknown message type {}", msg_type);
                }
                MessageOutcome::Ignored { msg_type }
            }
            Err(e) => {
                error!("Error processing message: {}", e);
                self.publisher
                    .report_status(
                        self.broker.as_mut(),
                        AgentStatus::Error,
                        format!("Message processing error: {}", e),
                    )
                    .await;
                MessageOutcome::Rejected {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Derive, register and announce the TFs of one STF.
    ///
    /// Returns the TF records the catalog accepted.
    pub async fn process_stf_ready(&mut self, stf: &StfReady) -> Vec<TfFileRecord> {
        info!("Processing stf_ready message");
        self.metrics.record(PipelineEvent::StfMessage);
        debug!("Message data received: {:?}", stf);

        let filename = match stf.filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                error!("No filename provided in message");
                return Vec::new();
            }
        };

        let stage = self.tracker.begin(self.catalog.as_ref(), stf).await;

        self.state = SchedulerState::Registering;
        let descriptors = self.splitter.split(stf);

        let mut registered = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let Some(record) = register_tf_file(self.catalog.as_ref(), descriptor).await else {
                self.metrics.record(PipelineEvent::TfRegistrationFailed);
                continue;
            };
            self.metrics.record(PipelineEvent::TfRegistered);

            self.state = SchedulerState::Notifying;
            let sent = self
                .publisher
                .publish_tf_registered(self.broker.as_mut(), &record, stf)
                .await;
            self.metrics.record(if sent {
                PipelineEvent::NotificationSent
            } else {
                PipelineEvent::NotificationFailed
            });
            registered.push(record);
        }

        info!(
            "Registered {} TF subsamples for STF file {}",
            registered.len(),
            filename
        );

        if let Some(stage) = stage {
            let output = StageOutput {
                tf_files_created: registered.len(),
                tf_filenames: registered
                    .iter()
                    .filter_map(|r| r.tf_filename.clone())
                    .collect(),
            };
            self.tracker.complete(self.catalog.as_ref(), stage, output).await;
        }

        registered
    }

    /// Scan, sample, register and process files until cancelled.
    pub async fn run_continuous(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();
        let interval = Duration::from_secs(self.config.check_interval);
        info!(
            "Watching {} directories every {}s",
            self.config.watch_directories.len(),
            self.config.check_interval
        );

        while !cancel.is_cancelled() {
            let report = self.scan_cycle().await;
            debug!("Cycle finished: {:?}", report);

            self.state = SchedulerState::Idle;
            self.publisher
                .send_heartbeat(self.broker.as_mut(), HeartbeatStatus::Idle, &self.metrics)
                .await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        Ok(())
    }

    /// One continuous-mode cycle, ending with a status report.
    pub async fn scan_cycle(&mut self) -> CycleReport {
        self.metrics.record(PipelineEvent::ScanCycle);
        let mut report = CycleReport::default();

        self.state = SchedulerState::Discovering;
        let mut files = find_recent_files(&self.config);
        report.discovered = files.len();
        self.metrics.record(PipelineEvent::FilesDiscovered(files.len()));

        if files.is_empty() {
            warn!("No recent files found");
        } else {
            debug!("Found {} STF files to process", files.len());
            if self.config.selection_fraction < 1.0 {
                self.state = SchedulerState::Sampling;
                debug!(
                    "Sampling {}% of recent files",
                    self.config.selection_fraction * 100.0
                );
                files = sample_items(&files, self.config.selection_fraction, &mut self.rng);
            }
            if files.len() > MAX_FILES_PER_CYCLE {
                warn!(
                    "Limiting cycle to {} of {} files",
                    MAX_FILES_PER_CYCLE,
                    files.len()
                );
                files.truncate(MAX_FILES_PER_CYCLE);
            }
        }
        report.selected = files.len();

        for path in &files {
            self.state = SchedulerState::Registering;
            debug!("Processing {} for registration and sampling", path.display());

            let registered = match register_stf_file(self.catalog.as_ref(), path, &self.config).await {
                Ok(registered) => registered,
                Err(e) => {
                    error!("{}", e);
                    self.metrics.record(PipelineEvent::StfRegistrationFailed);
                    report.failed += 1;
                    continue;
                }
            };
            self.metrics.record(PipelineEvent::StfRegistered);
            report.registered += 1;

            let stf = registered.to_stf_ready(&self.config.agent_name);
            let tf_files = self.process_stf_ready(&stf).await;
            report.tf_files += tf_files.len();
            info!(
                "Processed STF file {} -> {} TF files",
                registered.request.stf_filename,
                tf_files.len()
            );
        }

        self.state = SchedulerState::Reporting;
        let message = match report.status() {
            AgentStatus::Ok => format!("Emulating {} fast monitoring files", report.tf_files),
            AgentStatus::Error => format!(
                "Fast monitoring emulation error: {} of {} files failed to register",
                report.failed, report.selected
            ),
        };
        self.publisher
            .report_status(self.broker.as_mut(), report.status(), message)
            .await;

        report
    }
}

// Messages agents publish about themselves; never work for this agent
fn is_agent_broadcast(msg_type: &str) -> bool {
    matches!(
        msg_type,
        "tf_file_registered" | "fastmon_status" | "agent_heartbeat"
    )
}
