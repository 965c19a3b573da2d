//! Error types for the fast monitoring agent.

use crate::broker::BrokerError;
use crate::catalog::CatalogError;
use fastmon_protocol::error::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Agent result type.
pub type Result<T> = std::result::Result<T, FastmonError>;

/// Configuration errors, raised before the agent starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    #[error("Invalid value for {key}: {value} (expected {expected})")]
    OutOfRange {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while processing files and messages.
#[derive(Error, Debug)]
pub enum FastmonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A watch directory could not be scanned
    #[error("Discovery failed in {}: {message}", directory.display())]
    Discovery { directory: PathBuf, message: String },

    #[error("Checksum failed for {}: {source}", path.display())]
    Checksum {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// STF registration failed for one file
    #[error("Failed to register {}: {source}", path.display())]
    Registration {
        path: PathBuf,
        #[source]
        source: Box<FastmonError>,
    },

    #[error("Failed to resolve run {run_number}: {source}")]
    RunResolution {
        run_number: u64,
        #[source]
        source: CatalogError,
    },

    #[error("TF simulation failed: {0}")]
    Simulation(String),

    #[error("Notification failed: {0}")]
    Notification(#[from] BrokerError),

    #[error("Workflow tracking failed: {0}")]
    Tracking(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl FastmonError {
    pub fn registration(path: impl Into<PathBuf>, source: FastmonError) -> Self {
        Self::Registration {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn simulation(msg: impl Into<String>) -> Self {
        Self::Simulation(msg.into())
    }
}
