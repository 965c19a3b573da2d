//! SWF fast monitoring agent
//!
//! Samples Time Frames (TF) out of Super Time Frame (STF) files, records them
//! in the monitoring catalog and announces each one on the broker.

pub mod agent;
pub mod broker;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod runs;
pub mod sampler;
pub mod stf;
pub mod tf;
pub mod workflow;

pub use agent::{CycleReport, FastMonitorAgent, MessageOutcome, RunMode, SchedulerState};
pub use broker::{Broker, BrokerError, ZmqBroker};
pub use cancel::CancellationToken;
pub use catalog::{CatalogApi, CatalogError, HttpCatalog, Method};
pub use config::AgentConfig;
pub use error::{ConfigError, FastmonError, Result};
pub use metrics::{AgentMetrics, MetricsSnapshot};
pub use tf::{SimulatedSplitter, TfDescriptor, TfSplitter};

#[derive(clap::Parser, Debug)]
#[command(name = "fastmon-agent", about = "SWF fast monitoring agent")]
pub struct AgentArgs {
    /// TOML configuration file (built-in development profile if omitted)
    #[arg(short, long, env = "FASTMON_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Run mode: empty or `message` for message-driven, anything else continuous
    #[arg(long, env = "FASTMON_MODE", default_value = "")]
    pub mode: String,

    /// Record workflow stages (`true` to enable)
    #[arg(long, env = "FASTMON_TRACK_WORKFLOW")]
    pub track_workflow: Option<String>,

    /// Broadcast destination for notifications
    #[arg(long, env = "ACTIVEMQ_FASTMON_TOPIC")]
    pub destination: Option<String>,

    /// Catalog API base URL
    #[arg(long, env = "FASTMON_CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// Catalog API token
    #[arg(long, env = "FASTMON_CATALOG_TOKEN", hide_env_values = true)]
    pub catalog_token: Option<String>,

    #[arg(long)]
    pub agent_name: Option<String>,

    /// Debug logging on the console
    #[arg(short, long)]
    pub debug: bool,

    /// Log file directory (default: $FASTMON_HOME/logs)
    #[arg(long, env = "FASTMON_LOG_DIR")]
    pub log_dir: Option<std::path::PathBuf>,
}

impl AgentArgs {
    /// Apply command-line and environment overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut AgentConfig) {
        if let Some(flag) = &self.track_workflow {
            config.track_workflow = flag.trim().eq_ignore_ascii_case("true");
        }
        if let Some(destination) = self.destination.as_ref().filter(|d| !d.is_empty()) {
            config.broker.destination = destination.clone();
        }
        if let Some(url) = &self.catalog_url {
            config.catalog.url = url.clone();
        }
        if let Some(token) = &self.catalog_token {
            config.catalog.token = Some(token.clone());
        }
        if let Some(name) = &self.agent_name {
            config.agent_name = name.clone();
        }
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode::from_env_value(&self.mode)
    }
}
