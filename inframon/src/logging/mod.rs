//! Logging setup and log file housekeeping.
//!
//! - Console output, or JSON lines into a daily rolling file
//! - Error events mirrored to stderr
//! - Local timezone timestamps
//! - Periodic pruning of rotated files by count and total size

use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime, writer::MakeWriterExt},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{FileLogSettings, LogSettings};
use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "inframon=info";

/// How often rotated log files are pruned.
pub const LOG_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Keeps the file writer alive and owns the housekeeping settings.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
    file: Option<FileLogSettings>,
}

impl LoggingGuard {
    pub fn file_settings(&self) -> Option<&FileLogSettings> {
        self.file.as_ref()
    }

    /// Start pruning rotated files. Does nothing when logging to the console.
    pub fn start_housekeeping(&self, token: CancellationToken) -> Option<JoinHandle<()>> {
        let settings = self.file.clone()?;

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Log housekeeping task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(LOG_HOUSEKEEPING_INTERVAL) => {
                        if let Err(e) = prune_logs(&settings).await {
                            warn!(error = %e, "Failed to prune log files");
                        }
                    }
                }
            }
        }))
    }
}

/// Install the global subscriber. Keep the returned guard for the process lifetime.
pub fn init_logging(settings: &LogSettings) -> Result<LoggingGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match settings {
        LogSettings::Stdout => {
            let writer = std::io::stderr
                .with_max_level(Level::ERROR)
                .or_else(std::io::stdout);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_timer(LocalTimer)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|e| {
                    Error::Other(format!("Failed to set global default subscriber: {e}"))
                })?;

            Ok(LoggingGuard {
                _guard: None,
                file: None,
            })
        }
        LogSettings::File(file) => {
            std::fs::create_dir_all(&file.directory).map_err(|e| {
                Error::config(format!(
                    "unable to create log directory {}: {e}",
                    file.directory.display()
                ))
            })?;

            let file_appender = tracing_appender::rolling::daily(&file.directory, &file.file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_timer(LocalTimer)
                        .with_writer(non_blocking),
                )
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_timer(LocalTimer)
                        .with_writer(std::io::stderr.with_max_level(Level::ERROR)),
                )
                .try_init()
                .map_err(|e| {
                    Error::Other(format!("Failed to set global default subscriber: {e}"))
                })?;

            Ok(LoggingGuard {
                _guard: Some(guard),
                file: Some(file.clone()),
            })
        }
    }
}

struct LogFile {
    path: std::path::PathBuf,
    name: String,
    modified: SystemTime,
    len: u64,
}

/// Delete the oldest rotated files until at most `max_files` remain and their
/// total size fits the budget. The newest file is always kept.
pub async fn prune_logs(settings: &FileLogSettings) -> std::io::Result<usize> {
    let mut files = list_log_files(&settings.directory, &settings.file_name).await?;
    // Newest first: date suffixes sort lexicographically, mtime breaks ties.
    files.sort_by(|a, b| b.name.cmp(&a.name).then(b.modified.cmp(&a.modified)));

    let budget = settings.total_budget();
    let mut kept_size = 0u64;
    let mut deleted = 0;

    for (index, file) in files.iter().enumerate() {
        let keep = index == 0
            || (index < settings.max_files && kept_size.saturating_add(file.len) <= budget);
        if keep {
            kept_size = kept_size.saturating_add(file.len);
            continue;
        }

        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => {
                deleted += 1;
                debug!(path = %file.path.display(), "Deleted old log file");
            }
            Err(e) => warn!(
                path = %file.path.display(),
                error = %e,
                "Failed to delete old log file"
            ),
        }
    }

    if deleted > 0 {
        info!(count = deleted, "Cleaned up old log files");
    }
    Ok(deleted)
}

async fn list_log_files(dir: &Path, file_name: &str) -> std::io::Result<Vec<LogFile>> {
    let prefix = format!("{file_name}.");
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let name = match entry.file_name().to_str() {
            Some(name) if name == file_name || name.starts_with(&prefix) => name.to_string(),
            _ => continue,
        };

        files.push(LogFile {
            path: entry.path(),
            name,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            len: metadata.len(),
        });
    }

    Ok(files)
}
