//! Log configuration
//!
//! Only the settings live here; installing the subscriber is up to the
//! binary, so the library never touches global state.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level name (`trace`, `debug`, `info`, `warn`, `error`, `off`)
    pub level: String,
    /// Log to stderr
    pub console_output: bool,
    /// Log to a file in `log_dir`
    pub file_output: bool,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// File name prefix; the run timestamp is appended
    pub file_prefix: String,
    /// Number of log files kept by [`LogConfig::cleanup_old_logs`]
    pub max_files: usize,
    /// Local start time of this run, taken on first use
    #[serde(skip)]
    started: OnceLock<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            file_prefix: "stagefx".to_string(),
            max_files: 10,
            started: OnceLock::new(),
        }
    }
}

impl LogConfig {
    /// Parsed level, `INFO` when the name is not recognized
    pub fn parse_level(&self) -> LevelFilter {
        self.level.trim().parse().unwrap_or(LevelFilter::INFO)
    }

    /// Create `log_dir` if file output is on
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Path of this run's log file.
    ///
    /// The timestamp is fixed by the first call, so every later call on the
    /// same config returns the same path.
    pub fn current_log_path(&self) -> PathBuf {
        let started = self
            .started
            .get_or_init(|| Local::now().format(LOG_TIMESTAMP_FORMAT).to_string());
        self.log_dir
            .join(format!("{}_{}.log", self.file_prefix, started))
    }

    /// Delete the oldest log files beyond `max_files`. Returns how many were removed.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_dir.is_dir() {
            return Ok(0);
        }
        let prefix = format!("{}_", self.file_prefix);
        let mut logs: Vec<(std::time::SystemTime, PathBuf)> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(&prefix) && name.ends_with(".log")
            })
            .filter_map(|entry| {
                let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((modified, entry.path()))
            })
            .collect();

        if logs.len() <= self.max_files {
            return Ok(0);
        }
        logs.sort();
        let excess = logs.len() - self.max_files;
        let mut removed = 0;
        for (_, path) in logs.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_falls_back_to_info() {
        let mut config = LogConfig::default();
        config.level = "DEBUG".to_string();
        assert_eq!(config.parse_level(), LevelFilter::DEBUG);
        config.level = "chatty".to_string();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_log_path_uses_prefix_and_local_time() {
        let config = LogConfig::default();
        let path = config.current_log_path();
        assert_eq!(path.parent(), Some(PathBuf::from("logs").as_path()));

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let stamp = name
            .strip_prefix("stagefx_")
            .and_then(|rest| rest.strip_suffix(".log"))
            .unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, LOG_TIMESTAMP_FORMAT).is_ok());

        // Stable for the whole run
        assert_eq!(config.current_log_path(), path);
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_dir: dir.path().to_path_buf(),
            max_files: 2,
            ..LogConfig::default()
        };
        for stamp in 0..4 {
            fs::write(dir.path().join(format!("stagefx_{stamp}.log")), "x").unwrap();
        }
        fs::write(dir.path().join("other.txt"), "x").unwrap();

        assert_eq!(config.cleanup_old_logs().unwrap(), 2);
        let left = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(left, 3);
    }

    #[test]
    fn test_missing_directory_is_not_an_error() {
        let config = LogConfig {
            log_dir: PathBuf::from("/nonexistent/stagefx-logs"),
            ..LogConfig::default()
        };
        assert_eq!(config.cleanup_old_logs().unwrap(), 0);
    }
}
