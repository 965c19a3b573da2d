//! Agent configuration
//!
//! Loaded from a TOML file. Keys missing from the file fall back to the
//! per-field defaults below, except the required keys in [`REQUIRED_KEYS`].

use crate::error::ConfigError;
use fastmon_protocol::defaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Keys that must be present in a configuration file.
pub const REQUIRED_KEYS: &[&str] = &["selection_fraction"];

/// Main configuration for the fast monitoring agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directories scanned in continuous mode
    #[serde(default)]
    pub watch_directories: Vec<PathBuf>,

    /// Glob patterns, relative to each watch directory
    #[serde(default = "default_file_patterns")]
    pub file_patterns: Vec<String>,

    /// Seconds between scan cycles in continuous mode
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Only files created within this many minutes are picked up (0 = no limit)
    #[serde(default)]
    pub lookback_time: u64,

    /// Fraction of discovered files to process, in [0.0, 1.0]
    pub selection_fraction: f64,

    /// Run number used when the file name carries none
    #[serde(default = "default_run_number")]
    pub default_run_number: u64,

    /// Scheme prefix for constructed file URLs
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Compute an MD5 checksum for each registered STF
    #[serde(default)]
    pub calculate_checksum: bool,

    #[serde(default = "default_tf_files_per_stf")]
    pub tf_files_per_stf: u32,

    /// Nominal TF size as a fraction of the parent STF size
    #[serde(default = "default_tf_size_fraction")]
    pub tf_size_fraction: f64,

    #[serde(default = "default_tf_sequence_start")]
    pub tf_sequence_start: u32,

    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Record workflow stages for stf_ready messages that carry a workflow_id
    #[serde(default)]
    pub track_workflow: bool,

    /// Fixes the random source for sampling and TF size jitter
    #[serde(default)]
    pub random_seed: Option<u64>,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub broker: BrokerConfig,
}

/// Catalog (monitor REST API) connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            token: None,
            timeout_secs: default_catalog_timeout(),
        }
    }
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Where outbound messages are published
    #[serde(default = "default_publish_addr")]
    pub publish_addr: String,
    /// Where inbound messages are received from
    #[serde(default = "default_subscribe_addr")]
    pub subscribe_addr: String,
    /// Destination topic for TF notifications, status and heartbeats
    #[serde(default = "default_destination")]
    pub destination: String,
    /// Topic the agent listens on for stf_ready
    #[serde(default = "default_subscription")]
    pub subscription: String,
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            publish_addr: default_publish_addr(),
            subscribe_addr: default_subscribe_addr(),
            destination: default_destination(),
            subscription: default_subscription(),
            recv_timeout_ms: default_recv_timeout_ms(),
        }
    }
}

fn default_file_patterns() -> Vec<String> {
    vec!["*.stf".to_string(), "*.STF".to_string()]
}

fn default_check_interval() -> u64 {
    30
}

fn default_run_number() -> u64 {
    1
}

fn default_base_url() -> String {
    defaults::DEFAULT_BASE_URL.to_string()
}

fn default_tf_files_per_stf() -> u32 {
    defaults::DEFAULT_TF_FILES_PER_STF
}

fn default_tf_size_fraction() -> f64 {
    defaults::DEFAULT_TF_SIZE_FRACTION
}

fn default_tf_sequence_start() -> u32 {
    defaults::DEFAULT_TF_SEQUENCE_START
}

fn default_agent_name() -> String {
    defaults::DEFAULT_AGENT_NAME.to_string()
}

fn default_catalog_url() -> String {
    defaults::DEFAULT_CATALOG_URL.to_string()
}

fn default_catalog_timeout() -> u64 {
    30
}

fn default_publish_addr() -> String {
    defaults::DEFAULT_PUBLISH_ADDR.to_string()
}

fn default_subscribe_addr() -> String {
    defaults::DEFAULT_SUBSCRIBE_ADDR.to_string()
}

fn default_destination() -> String {
    defaults::DEFAULT_DESTINATION.to_string()
}

fn default_subscription() -> String {
    defaults::DEFAULT_SUBSCRIPTION.to_string()
}

fn default_recv_timeout_ms() -> u64 {
    500
}

/// Built-in development profile, used when no config file is given.
impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            watch_directories: vec![PathBuf::from("DAQbuffer")],
            file_patterns: default_file_patterns(),
            check_interval: default_check_interval(),
            lookback_time: 0,
            selection_fraction: 0.1,
            default_run_number: default_run_number(),
            base_url: default_base_url(),
            calculate_checksum: true,
            tf_files_per_stf: 7,
            tf_size_fraction: default_tf_size_fraction(),
            tf_sequence_start: default_tf_sequence_start(),
            agent_name: default_agent_name(),
            track_workflow: false,
            random_seed: None,
            catalog: CatalogConfig::default(),
            broker: BrokerConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        validate_required_keys(&table)?;
        let config: AgentConfig = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Range checks on already-typed values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.selection_fraction) {
            return Err(ConfigError::OutOfRange {
                key: "selection_fraction",
                value: self.selection_fraction.to_string(),
                expected: "between 0.0 and 1.0",
            });
        }

        if !self.tf_size_fraction.is_finite() || self.tf_size_fraction < 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "tf_size_fraction",
                value: self.tf_size_fraction.to_string(),
                expected: "a finite, non-negative number",
            });
        }

        if self.check_interval == 0 {
            return Err(ConfigError::OutOfRange {
                key: "check_interval",
                value: "0".to_string(),
                expected: "at least 1 second",
            });
        }

        if !self.watch_directories.is_empty() && self.file_patterns.is_empty() {
            return Err(ConfigError::Invalid(
                "file_patterns must not be empty when watch_directories are set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Fail with the first required key missing from a raw config table.
pub fn validate_required_keys(table: &toml::Table) -> Result<(), ConfigError> {
    match REQUIRED_KEYS.iter().find(|key| !table.contains_key(**key)) {
        Some(key) => Err(ConfigError::MissingKey(key.to_string())),
        None => Ok(()),
    }
}
