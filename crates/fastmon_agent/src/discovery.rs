//! File discovery in the watch directories

use crate::config::AgentConfig;
use crate::error::FastmonError;
use glob::Pattern;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};

/// Find recently created files matching the configured patterns.
pub fn find_recent_files(config: &AgentConfig) -> Vec<PathBuf> {
    find_recent_files_at(
        &config.watch_directories,
        &config.file_patterns,
        config.lookback_time,
        SystemTime::now(),
    )
}

/// Scan `directories` for files matching `patterns`.
///
/// With `lookback_minutes > 0`, files created before `now - lookback` are
/// skipped. Directories that are missing or fail to scan are logged and
/// skipped. Each path is returned once, in first-seen order.
pub fn find_recent_files_at(
    directories: &[PathBuf],
    patterns: &[String],
    lookback_minutes: u64,
    now: SystemTime,
) -> Vec<PathBuf> {
    let cutoff = if lookback_minutes > 0 {
        now.checked_sub(Duration::from_secs(lookback_minutes * 60))
    } else {
        None
    };

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for dir in directories {
        if !dir.is_dir() {
            error!("Watch directory does not exist: {}", dir.display());
            continue;
        }

        match scan_directory(dir, patterns, cutoff) {
            Ok(found) => {
                for path in found {
                    if seen.insert(path.clone()) {
                        files.push(path);
                    }
                }
            }
            Err(e) => error!("{}", e),
        }
    }

    debug!("Discovered {} files", files.len());
    files
}

fn scan_directory(
    dir: &Path,
    patterns: &[String],
    cutoff: Option<SystemTime>,
) -> Result<Vec<PathBuf>, FastmonError> {
    let discovery_err = |message: String| FastmonError::Discovery {
        directory: dir.to_path_buf(),
        message,
    };

    let dir_str = dir
        .to_str()
        .ok_or_else(|| discovery_err("directory path is not valid UTF-8".to_string()))?;
    std::fs::read_dir(dir).map_err(|e| discovery_err(e.to_string()))?;

    let prefix = Pattern::escape(dir_str.trim_end_matches('/'));
    let mut found = Vec::new();

    for pattern in patterns {
        let full = format!("{}/{}", prefix, pattern);
        let entries = glob::glob(&full)
            .map_err(|e| discovery_err(format!("invalid pattern '{}': {}", pattern, e)))?;

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            if let Some(cutoff) = cutoff {
                match creation_time(&path) {
                    Some(created) if created >= cutoff => {}
                    Some(_) => continue,
                    None => {
                        warn!("No timestamp for {}, skipping", path.display());
                        continue;
                    }
                }
            }
            found.push(path);
        }
    }

    Ok(found)
}

/// Birth time where the platform reports it, modification time otherwise.
fn creation_time(path: &Path) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    meta.created().or_else(|_| meta.modified()).ok()
}
