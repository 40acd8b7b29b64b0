use anyhow::{Context, Result};
use stagefx_core::LogConfig;
use std::fs::File;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Keeps the file writer thread alive; drop it last to flush the show log
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level. Console output goes to stderr
/// so stdout stays free for frame dumps. Fails if a subscriber is already
/// installed.
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy();

    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter.clone())
    });

    let (file_layer, guard) = match open_show_log(config)? {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global subscriber is already installed")?;

    tracing::info!("Logging initialized at level: {}", config.level);
    if guard.is_some() {
        tracing::info!("Show log: {:?}", config.current_log_path());
    }
    Ok(guard)
}

/// Rotate old show logs and open this run's file, when file output is on
fn open_show_log(config: &LogConfig) -> Result<Option<(NonBlocking, LogGuard)>> {
    if !config.file_output {
        return Ok(None);
    }
    config
        .ensure_log_directory()
        .context("Failed to create log directory")?;
    // Rotation problems never stop a show
    if let Err(e) = config.cleanup_old_logs() {
        eprintln!("Warning: Failed to clean up old show logs: {}", e);
    }

    let log_path = config.current_log_path();
    let file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok(Some((writer, LogGuard { _guard: guard })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_console_only_opens_no_file() {
        let dir = tempdir().unwrap();
        let mut config = LogConfig::default();
        config.log_dir = dir.path().join("logs");
        assert!(open_show_log(&config).unwrap().is_none());
        assert!(!config.log_dir.exists());
    }

    #[test]
    fn test_file_output_rotates_and_creates_run_log() {
        let dir = tempdir().unwrap();
        let mut config = LogConfig::default();
        config.file_output = true;
        config.log_dir = dir.path().join("logs");
        config.max_files = 1;
        fs::create_dir_all(&config.log_dir).unwrap();
        for old in ["stagefx_a.log", "stagefx_b.log"] {
            fs::write(config.log_dir.join(old), "old").unwrap();
        }

        let opened = open_show_log(&config).unwrap();
        assert!(opened.is_some());
        assert!(config.current_log_path().exists());
        // One old log kept plus this run's
        assert_eq!(fs::read_dir(&config.log_dir).unwrap().count(), 2);
    }
}
