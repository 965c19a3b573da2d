//! STF fixtures and a ready-to-use agent environment.

use crate::{MockCatalog, RecordingBroker};
use fastmon_agent::{AgentConfig, FastMonitorAgent};
use fastmon_protocol::{RecordId, StfReady};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Write an STF file of `size` bytes.
pub fn write_stf(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
    std::fs::write(&path, data).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
    path
}

/// An `stf_ready` as the data agent would publish it.
pub fn stf_ready(filename: &str, size_bytes: u64) -> StfReady {
    StfReady {
        filename: Some(filename.to_string()),
        file_id: Some(RecordId::from(format!("{}-id", filename))),
        run_id: Some(RecordId::Int(42)),
        file_url: Some(format!("file:///data/{}", filename)),
        checksum: Some(String::new()),
        size_bytes: Some(size_bytes),
        start: Some("20250801000001".to_string()),
        end: Some("20250801000101".to_string()),
        state: Some("physics".to_string()),
        substate: Some("running".to_string()),
        workflow_id: None,
        processed_by: None,
    }
}

/// Temporary watch directory plus a deterministic config pointing at it.
pub struct TestEnv {
    pub temp: TempDir,
    pub watch_dir: PathBuf,
    pub config: AgentConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {}", e));
        let watch_dir = temp.path().join("DAQbuffer");
        std::fs::create_dir_all(&watch_dir).unwrap_or_else(|e| panic!("mkdir: {}", e));

        let config = AgentConfig {
            watch_directories: vec![watch_dir.clone()],
            selection_fraction: 1.0,
            calculate_checksum: true,
            tf_files_per_stf: 2,
            check_interval: 1,
            random_seed: Some(7),
            agent_name: "fastmon-test".to_string(),
            ..AgentConfig::default()
        };

        Self {
            temp,
            watch_dir,
            config,
        }
    }

    pub fn write_stf(&self, name: &str, size: usize) -> PathBuf {
        write_stf(&self.watch_dir, name, size)
    }

    pub fn agent(&self, catalog: &MockCatalog, broker: &RecordingBroker) -> FastMonitorAgent {
        self.agent_with(self.config.clone(), catalog, broker)
    }

    pub fn agent_with(
        &self,
        config: AgentConfig,
        catalog: &MockCatalog,
        broker: &RecordingBroker,
    ) -> FastMonitorAgent {
        FastMonitorAgent::new(config, Arc::new(catalog.clone()), Box::new(broker.clone()))
            .unwrap_or_else(|e| panic!("agent config rejected: {}", e))
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
