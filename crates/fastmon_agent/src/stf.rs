//! STF file registration
//!
//! Registers a discovered STF file in the catalog under the run inferred from
//! its name. Used by continuous mode; in message-driven mode the data agent
//! has already registered the file.

use crate::catalog::{post_json, CatalogApi};
use crate::config::AgentConfig;
use crate::error::{FastmonError, Result};
use crate::runs::get_or_create_run;
use chrono::{DateTime, Utc};
use fastmon_protocol::defaults::AGENT_VERSION;
use fastmon_protocol::{FileStatus, NewStfFile, RunRecord, StfFileRecord, StfMetadata, StfReady};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CHECKSUM_CHUNK_SIZE: usize = 4096;

/// Run number patterns, tried in order; first match wins.
static RUN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)run_(\d+)", r"(?i)run(\d+)", r"(?i)r(\d+)"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// Infer the run number from a file name, e.g. `run_12345_stf_001.stf` -> 12345.
pub fn extract_run_number(path: &Path, default: u64) -> u64 {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return default,
    };

    RUN_PATTERNS
        .iter()
        .filter_map(|re| re.captures(name))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .next()
        .unwrap_or(default)
}

/// MD5 of a file's contents, streamed in 4 KiB chunks. Lowercase hex.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let checksum_err = |source| FastmonError::Checksum {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(checksum_err)?;
    let mut context = md5::Context::new();
    let mut buf = [0u8; CHECKSUM_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(checksum_err)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Join `base_url` and an absolute path without doubling or dropping slashes.
///
/// `file://` + `/data/x.stf` gives `file:///data/x.stf`.
pub fn file_url(base_url: &str, absolute: &Path) -> String {
    let path = absolute.to_string_lossy();
    if base_url.ends_with("://") {
        return format!("{}{}", base_url, path);
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Canonical absolute path, or the path joined onto the working directory
/// when it cannot be canonicalized.
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) if path.is_absolute() => Ok(path.to_path_buf()),
        Err(_) => Ok(std::env::current_dir()?.join(path)),
    }
}

/// Result of a successful STF registration.
#[derive(Debug, Clone)]
pub struct RegisteredStf {
    pub record: StfFileRecord,
    pub request: NewStfFile,
    pub run: RunRecord,
}

impl RegisteredStf {
    /// Synthesize the `stf_ready` payload the data agent would have sent.
    pub fn to_stf_ready(&self, agent_name: &str) -> StfReady {
        let request = &self.request;
        StfReady {
            filename: Some(
                self.record
                    .stf_filename
                    .clone()
                    .unwrap_or_else(|| request.stf_filename.clone()),
            ),
            file_id: Some(self.record.file_id.clone()),
            run_id: Some(self.record.run.clone().unwrap_or_else(|| request.run.clone())),
            file_url: Some(request.metadata.file_url.clone()),
            checksum: Some(request.checksum.clone()),
            size_bytes: Some(self.record.file_size_bytes.unwrap_or(request.file_size_bytes)),
            start: Some(request.metadata.creation_time.to_rfc3339()),
            end: Some(request.metadata.modification_time.to_rfc3339()),
            state: Some("physics".to_string()),
            substate: Some("running".to_string()),
            workflow_id: None,
            processed_by: Some(agent_name.to_string()),
        }
    }
}

/// Register one STF file with the catalog.
pub async fn register_stf_file(
    api: &dyn CatalogApi,
    path: &Path,
    config: &AgentConfig,
) -> Result<RegisteredStf> {
    register_inner(api, path, config)
        .await
        .map_err(|e| FastmonError::registration(path, e))
}

async fn register_inner(
    api: &dyn CatalogApi,
    path: &Path,
    config: &AgentConfig,
) -> Result<RegisteredStf> {
    let absolute = absolute_path(path)?;
    let url = file_url(&config.base_url, &absolute);

    let meta = std::fs::metadata(&absolute)?;
    let modified = meta.modified()?;
    let created = meta.created().unwrap_or(modified);

    let stf_filename = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let run_number = extract_run_number(&absolute, config.default_run_number);
    let run = get_or_create_run(api, run_number)
        .await
        .map_err(|source| FastmonError::RunResolution { run_number, source })?;

    let checksum = if config.calculate_checksum {
        match calculate_checksum(&absolute) {
            Ok(sum) => sum,
            Err(e) => {
                warn!("{}", e);
                String::new()
            }
        }
    } else {
        String::new()
    };

    let request = NewStfFile {
        run: run.run_id.clone(),
        stf_filename,
        file_size_bytes: meta.len(),
        checksum,
        status: FileStatus::Registered,
        metadata: StfMetadata {
            original_path: absolute.to_string_lossy().into_owned(),
            file_url: url,
            creation_time: DateTime::<Utc>::from(created),
            modification_time: DateTime::<Utc>::from(modified),
            agent_version: AGENT_VERSION.to_string(),
        },
    };

    debug!("Registering STF {} under run {}", request.stf_filename, run.run_id);
    let record: StfFileRecord = post_json(api, "/stf-files/", &request).await?;
    info!(
        "Registered STF file {} (id {}, run {})",
        request.stf_filename, record.file_id, run_number
    );

    Ok(RegisteredStf {
        record,
        request,
        run,
    })
}
