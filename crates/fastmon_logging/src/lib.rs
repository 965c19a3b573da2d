//! Logging setup for the fast monitoring agent.
//!
//! Everything goes to stderr and to `<log dir>/<app>.log`. The file rolls
//! over at 10 MiB and four older generations are kept as `<app>.log.1` (newest)
//! through `<app>.log.4`.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "fastmon_agent=info,fastmon_protocol=info";
const DEBUG_LOG_FILTER: &str = "fastmon_agent=debug,fastmon_protocol=debug";
const LOG_GENERATIONS: usize = 5;
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug output on the console, regardless of `RUST_LOG`.
    pub debug: bool,
    /// Where the log file goes; `<home>/logs` when unset.
    pub log_dir: Option<PathBuf>,
}

/// Install the global subscriber: rolling file plus stderr.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let dir = config.log_dir.unwrap_or_else(|| fastmon_home().join("logs"));
    let log = RollingLog::open(&dir, config.app_name)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.debug {
        EnvFilter::new(DEBUG_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Agent home directory: `$FASTMON_HOME` or `~/.swf_fastmon`.
pub fn fastmon_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("FASTMON_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".swf_fastmon")
}

/// Append-only log file that rolls over by size.
struct RollingLog {
    dir: PathBuf,
    name: String,
    file: File,
    written: u64,
    max_bytes: u64,
}

impl RollingLog {
    fn open(dir: &Path, app_name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let name: String = app_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let (file, written) = open_append(&dir.join(format!("{}.log", name)))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            name,
            file,
            written,
            max_bytes: MAX_LOG_BYTES,
        })
    }

    fn generation(&self, n: usize) -> PathBuf {
        match n {
            0 => self.dir.join(format!("{}.log", self.name)),
            n => self.dir.join(format!("{}.log.{}", self.name, n)),
        }
    }

    // .log.3 -> .log.4, ..., .log -> .log.1; the last generation falls off
    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let last = self.generation(LOG_GENERATIONS - 1);
        if last.exists() {
            fs::remove_file(last)?;
        }
        for n in (0..LOG_GENERATIONS - 1).rev() {
            let from = self.generation(n);
            if from.exists() {
                fs::rename(from, self.generation(n + 1))?;
            }
        }
        let (file, written) = open_append(&self.generation(0))?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

impl Write for RollingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.roll()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_app_name_is_made_file_safe() {
        let temp = TempDir::new().unwrap();
        let log = RollingLog::open(temp.path(), "fast mon/agent").unwrap();
        assert_eq!(log.generation(0), temp.path().join("fast_mon_agent.log"));
        assert_eq!(log.generation(2), temp.path().join("fast_mon_agent.log.2"));
    }

    #[test]
    fn test_rolls_over_and_drops_oldest_generation() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let mut log = RollingLog::open(dir, "agent").unwrap();
        log.max_bytes = 16;

        for i in 0..7 {
            log.write_all(format!("line {:02}\n", i).as_bytes()).unwrap();
            log.write_all(b"0123456789").unwrap();
        }
        log.flush().unwrap();

        assert!(dir.join("agent.log").exists());
        for n in 1..LOG_GENERATIONS {
            assert!(dir.join(format!("agent.log.{}", n)).exists(), "generation {}", n);
        }
        assert!(!dir.join(format!("agent.log.{}", LOG_GENERATIONS)).exists());
        assert!(fs::read_to_string(dir.join("agent.log")).unwrap().len() <= 16);
    }

    #[test]
    fn test_reopen_appends_to_existing_file() {
        let temp = TempDir::new().unwrap();
        {
            let mut log = RollingLog::open(temp.path(), "agent").unwrap();
            log.write_all(b"first\n").unwrap();
        }
        let mut log = RollingLog::open(temp.path(), "agent").unwrap();
        assert_eq!(log.written, 6);
        log.write_all(b"second\n").unwrap();

        let content = fs::read_to_string(temp.path().join("agent.log")).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
