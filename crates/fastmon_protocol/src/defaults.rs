//! Canonical default values shared by the agent and its tooling.

pub const DEFAULT_AGENT_NAME: &str = "fastmon-agent";
pub const AGENT_TYPE: &str = "fastmon";
/// Version tag written into STF metadata.
pub const AGENT_VERSION: &str = "1.0.0";

pub const DEFAULT_DESTINATION: &str = "epictopic";
pub const DEFAULT_SUBSCRIPTION: &str = "epictopic";
pub const DEFAULT_PUBLISH_ADDR: &str = "tcp://127.0.0.1:5560";
pub const DEFAULT_SUBSCRIBE_ADDR: &str = "tcp://127.0.0.1:5561";
pub const DEFAULT_CATALOG_URL: &str = "http://127.0.0.1:8002/api";

pub const DEFAULT_BASE_URL: &str = "file://";
pub const DEFAULT_TF_FILES_PER_STF: u32 = 2;
pub const DEFAULT_TF_SIZE_FRACTION: f64 = 0.15;
pub const DEFAULT_TF_SEQUENCE_START: u32 = 1;
