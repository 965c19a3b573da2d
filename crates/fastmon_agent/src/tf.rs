//! TF subsample derivation and registration
//!
//! A [`TfSplitter`] turns one STF descriptor into the TF descriptors the agent
//! registers. [`SimulatedSplitter`] produces synthetic TFs whose sizes jitter
//! around a fixed fraction of the parent STF.

use crate::catalog::{post_json, CatalogApi};
use crate::config::AgentConfig;
use crate::error::{FastmonError, Result};
use fastmon_protocol::{FileStatus, NewTfFile, RecordId, StfReady, TfFileRecord, TfMetadata};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, error};

/// Standard deviation of the TF size jitter around the nominal fraction
const SIZE_JITTER_STDDEV: f64 = 0.1;

/// One TF about to be registered.
#[derive(Debug, Clone, PartialEq)]
pub struct TfDescriptor {
    pub tf_filename: String,
    pub file_size_bytes: u64,
    pub sequence_number: u32,
    pub stf_file_id: Option<RecordId>,
    pub stf_parent: Option<String>,
    pub metadata: TfMetadata,
}

impl TfDescriptor {
    pub fn to_request(&self) -> NewTfFile {
        NewTfFile {
            stf_file: self.stf_file_id.clone(),
            tf_filename: self.tf_filename.clone(),
            file_size_bytes: self.file_size_bytes,
            status: FileStatus::Registered,
            metadata: self.metadata.clone(),
        }
    }
}

/// Given an STF descriptor, produce the TF descriptors to register.
pub trait TfSplitter: Send {
    fn split(&mut self, stf: &StfReady) -> Vec<TfDescriptor>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TfSettings {
    pub files_per_stf: u32,
    pub size_fraction: f64,
    pub sequence_start: u32,
}

impl TfSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            files_per_stf: config.tf_files_per_stf,
            size_fraction: config.tf_size_fraction,
            sequence_start: config.tf_sequence_start,
        }
    }
}

/// Synthetic splitter: `files_per_stf` TFs, each about `size_fraction` of the STF.
pub struct SimulatedSplitter {
    settings: TfSettings,
    agent_name: String,
    rng: ChaCha8Rng,
}

impl SimulatedSplitter {
    pub fn new(settings: TfSettings, agent_name: impl Into<String>, rng: ChaCha8Rng) -> Self {
        Self {
            settings,
            agent_name: agent_name.into(),
            rng,
        }
    }

    pub fn try_split(&mut self, stf: &StfReady) -> Result<Vec<TfDescriptor>> {
        let settings = self.settings;
        if !settings.size_fraction.is_finite() || settings.size_fraction < 0.0 {
            return Err(FastmonError::simulation(format!(
                "invalid tf_size_fraction {}",
                settings.size_fraction
            )));
        }

        let jitter = Normal::new(1.0, SIZE_JITTER_STDDEV)
            .map_err(|e| FastmonError::simulation(format!("invalid size distribution: {}", e)))?;

        let stf_size = stf.size_bytes.unwrap_or(0) as f64;
        let base_name = stf
            .filename
            .as_deref()
            .map(strip_extension)
            .unwrap_or("unknown");

        let metadata = TfMetadata {
            simulation: true,
            created_from: stf.filename.clone(),
            tf_size_fraction: settings.size_fraction,
            agent_name: self.agent_name.clone(),
            state: stf.state.clone(),
            substate: stf.substate.clone(),
            start: stf.start.clone(),
            end: stf.end.clone(),
        };

        let mut descriptors = Vec::with_capacity(settings.files_per_stf as usize);
        for i in 0..settings.files_per_stf {
            let sequence_number = settings.sequence_start.checked_add(i).ok_or_else(|| {
                FastmonError::simulation(format!(
                    "TF sequence overflows at start {} + {}",
                    settings.sequence_start, i
                ))
            })?;

            let size = stf_size * settings.size_fraction * jitter.sample(&mut self.rng);
            if size < 0.0 {
                debug!("Clamping negative TF size {} to 0", size);
            }

            descriptors.push(TfDescriptor {
                tf_filename: format!("{}_tf_{:03}.tf", base_name, sequence_number),
                // `as` saturates and truncates toward zero
                file_size_bytes: size.max(0.0) as u64,
                sequence_number,
                stf_file_id: stf.file_id.clone(),
                stf_parent: stf.filename.clone(),
                metadata: metadata.clone(),
            });
        }

        Ok(descriptors)
    }
}

impl TfSplitter for SimulatedSplitter {
    fn split(&mut self, stf: &StfReady) -> Vec<TfDescriptor> {
        match self.try_split(stf) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                error!("{}", e);
                Vec::new()
            }
        }
    }
}

/// File name with its last extension removed.
fn strip_extension(name: &str) -> &str {
    name.rsplit_once('.').map(|(base, _)| base).unwrap_or(name)
}

/// Record one TF in the catalog. Logs a single error and returns `None` on failure.
///
/// Fields the catalog leaves out of its response are filled in from the request.
pub async fn register_tf_file(
    api: &dyn CatalogApi,
    descriptor: &TfDescriptor,
) -> Option<TfFileRecord> {
    let request = descriptor.to_request();
    match post_json::<_, TfFileRecord>(api, "/fastmon-files/", &request).await {
        Ok(mut record) => {
            record.tf_filename.get_or_insert(request.tf_filename);
            record.file_size_bytes.get_or_insert(request.file_size_bytes);
            record.status.get_or_insert(request.status);
            if record.stf_file.is_none() {
                record.stf_file = request.stf_file;
            }
            debug!("Registered TF file {}", descriptor.tf_filename);
            Some(record)
        }
        Err(e) => {
            error!("Failed to register TF file {}: {}", descriptor.tf_filename, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn splitter(files: u32, fraction: f64, start: u32) -> SimulatedSplitter {
        SimulatedSplitter::new(
            TfSettings {
                files_per_stf: files,
                size_fraction: fraction,
                sequence_start: start,
            },
            "fastmon-test",
            ChaCha8Rng::seed_from_u64(7),
        )
    }

    fn stf(filename: Option<&str>, size: u64) -> StfReady {
        StfReady {
            filename: filename.map(String::from),
            file_id: Some(RecordId::from("stf-uuid")),
            size_bytes: Some(size),
            state: Some("physics".to_string()),
            substate: Some("running".to_string()),
            ..StfReady::default()
        }
    }

    #[test]
    fn test_split_sequence_and_parent() {
        let mut s = splitter(3, 0.2, 1);
        let tfs = s.split(&stf(Some("run_42_data.stf"), 1_000_000));

        assert_eq!(tfs.len(), 3);
        let sequences: Vec<u32> = tfs.iter().map(|t| t.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(tfs[0].tf_filename, "run_42_data_tf_001.tf");
        assert_eq!(tfs[2].tf_filename, "run_42_data_tf_003.tf");

        for tf in &tfs {
            assert_eq!(tf.stf_file_id, Some(RecordId::from("stf-uuid")));
            assert_eq!(tf.stf_parent.as_deref(), Some("run_42_data.stf"));
            assert!(tf.metadata.simulation);
            assert_eq!(tf.metadata.state.as_deref(), Some("physics"));
            // 6 sigma around the 200 000 nominal size
            assert!(
                (80_000..=320_000).contains(&tf.file_size_bytes),
                "size {} out of band",
                tf.file_size_bytes
            );
        }
    }

    #[test]
    fn test_split_sizes_average_near_nominal() {
        let mut s = splitter(500, 0.2, 1);
        let tfs = s.split(&stf(Some("a.stf"), 1_000_000));
        let mean = tfs.iter().map(|t| t.file_size_bytes as f64).sum::<f64>() / tfs.len() as f64;
        assert!((190_000.0..=210_000.0).contains(&mean), "mean {}", mean);
    }

    #[test]
    fn test_split_without_filename() {
        let mut s = splitter(1, 0.15, 1);
        let tfs = s.split(&stf(None, 100));
        assert_eq!(tfs[0].tf_filename, "unknown_tf_001.tf");
    }

    #[test]
    fn test_split_strips_only_last_extension() {
        let mut s = splitter(1, 0.15, 12);
        let tfs = s.split(&stf(Some("swf.20250801.000001.stf"), 100));
        assert_eq!(tfs[0].tf_filename, "swf.20250801.000001_tf_012.tf");
    }

    #[test]
    fn test_split_zero_size_stf() {
        let mut s = splitter(2, 0.15, 1);
        let tfs = s.split(&stf(Some("a.stf"), 0));
        assert!(tfs.iter().all(|t| t.file_size_bytes == 0));
    }

    #[test]
    fn test_sequence_overflow_yields_empty() {
        let mut s = splitter(3, 0.15, u32::MAX - 1);
        assert!(s.try_split(&stf(Some("a.stf"), 100)).is_err());
        assert!(s.split(&stf(Some("a.stf"), 100)).is_empty());
    }

    #[test]
    fn test_invalid_fraction_yields_empty() {
        let mut s = splitter(2, f64::NAN, 1);
        assert!(s.split(&stf(Some("a.stf"), 100)).is_empty());
    }

    #[test]
    fn test_same_seed_same_sizes() {
        let input = stf(Some("a.stf"), 1_000_000);
        let a = splitter(4, 0.15, 1).split(&input);
        let b = splitter(4, 0.15, 1).split(&input);
        assert_eq!(a, b);
    }

    #[test]
    fn test_request_shape() {
        let mut s = splitter(1, 0.15, 1);
        let tf = s.split(&stf(Some("a.stf"), 1000)).remove(0);
        let body = serde_json::to_value(tf.to_request()).unwrap();
        assert_eq!(body["stf_file"], "stf-uuid");
        assert_eq!(body["tf_filename"], "a_tf_001.tf");
        assert_eq!(body["status"], "registered");
        assert_eq!(body["metadata"]["created_from"], "a.stf");
        assert_eq!(body["metadata"]["agent_name"], "fastmon-test");
    }
}
