//! Configuration loading.
//!
//! The YAML document is parsed, validated and converted into immutable
//! [`Target`] values plus the settings the other components need.

mod types;
mod validation;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tracing::info;

pub use types::{
    Config, DEFAULT_DISCORD_MAX_RETRIES, DEFAULT_DISCORD_RATE_LIMIT_RESET_SECS, GlobalConfig,
    TargetConfig,
};
pub use validation::{parse_size, validate};

use crate::domain::{ProbeOptions, Target};

/// Log file name used by `--log-dir` when the document names none.
pub const DEFAULT_LOG_FILE_NAME: &str = "inframon.log";
pub const DEFAULT_LOG_FILE_SIZE: &str = "10MB";
pub const DEFAULT_LOG_FILES_KEPT: i64 = 5;
use crate::schedule::CronSchedule;
use crate::{Error, Result};

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "unable to read configuration file {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(
            path = %path.display(),
            icmp_targets = config.icmp.len(),
            http_targets = config.http.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw)?;
        validate(&config)?;
        Ok(config)
    }

    /// Redirect logging into `dir`, switching off console output.
    ///
    /// File settings the document left unset fall back to the `DEFAULT_LOG_*` values.
    pub fn override_log_dir(&mut self, dir: impl Into<String>) {
        let global = &mut self.configuration;
        global.log_file_directory = dir.into();
        global.stdout = false;

        if global.log_file_name.trim().is_empty() {
            global.log_file_name = DEFAULT_LOG_FILE_NAME.to_string();
        }
        if global.log_file_size.trim().is_empty() {
            global.log_file_size = DEFAULT_LOG_FILE_SIZE.to_string();
        }
        if global.max_log_file_keep <= 0 {
            global.max_log_file_keep = DEFAULT_LOG_FILES_KEPT;
        }
    }

    pub fn has_icmp_targets(&self) -> bool {
        !self.icmp.is_empty()
    }

    /// Every configured target, ICMP first, in document order.
    pub fn targets(&self) -> Vec<Arc<Target>> {
        let privileged = self.configuration.privileged;
        let icmp = self
            .icmp
            .iter()
            .map(|entry| entry.to_target(ProbeOptions::Icmp { privileged }));
        let http = self.http.iter().map(|entry| {
            entry.to_target(ProbeOptions::Http {
                skip_verify: entry.skip_verify,
            })
        });
        icmp.chain(http).map(Arc::new).collect()
    }

    pub fn logging(&self) -> Result<LogSettings> {
        let global = &self.configuration;
        if global.stdout {
            return Ok(LogSettings::Stdout);
        }
        Ok(LogSettings::File(FileLogSettings {
            directory: PathBuf::from(&global.log_file_directory),
            file_name: global.log_file_name.clone(),
            max_file_size: parse_size(&global.log_file_size)?,
            max_files: global.max_log_file_keep.max(1) as usize,
        }))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.configuration.health_check_timeout.max(1) as u64)
    }

    /// The summary schedule, or `None` when scheduled reports are disabled.
    pub fn summary_schedule(&self) -> Result<Option<SummarySchedule>> {
        let global = &self.configuration;
        if !global.summary_enabled() {
            return Ok(None);
        }
        let cron = CronSchedule::parse(&global.health_cron)?;
        let timezone = global
            .health_cron_timezone
            .as_deref()
            .map(|zone| {
                Tz::from_str(zone)
                    .map_err(|_| Error::validation(format!("unknown timezone [{zone}]")))
            })
            .transpose()?;
        Ok(Some(SummarySchedule { cron, timezone }))
    }

    pub fn discord(&self) -> DiscordSettings {
        let global = &self.configuration;
        DiscordSettings {
            enabled: !global.discord_webhook_disable,
            summary_enabled: !global.health_cron_webhook_disable,
            webhook_url: global.discord_webhook_url.clone(),
            max_retries: global.discord_max_retries,
            rate_limit_reset: Duration::from_secs(global.discord_rate_limit_reset_secs),
        }
    }

    pub fn smtp(&self) -> SmtpSettings {
        let global = &self.configuration;
        SmtpSettings {
            enabled: !global.smtp_disable,
            summary_enabled: !global.health_cron_smtp_disable,
            host: global.smtp_host.clone(),
            port: global.smtp_port.trim().parse().unwrap_or(587),
            username: global.smtp_username.clone(),
            password: global.smtp_password.clone(),
            from: global.smtp_from.clone(),
            to: global.smtp_to.clone(),
        }
    }
}

impl TargetConfig {
    fn to_target(&self, options: ProbeOptions) -> Target {
        Target {
            address: self.address.clone(),
            service: self.service.clone(),
            network_zone: self.network_zone.clone(),
            instance_type: self.instance_type.clone(),
            interval: Duration::from_secs(self.timeout.max(1) as u64),
            probe_timeout: Duration::from_secs(self.failure_timeout.max(1) as u64),
            retry_buffer: self.retry_buffer.clamp(0, i64::from(u32::MAX)) as u32,
            options,
        }
    }
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSettings {
    Stdout,
    File(FileLogSettings),
}

/// Rolling file output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogSettings {
    pub directory: PathBuf,
    pub file_name: String,
    /// Per-file size budget in bytes.
    pub max_file_size: u64,
    /// Number of rotated files kept on disk.
    pub max_files: usize,
}

impl FileLogSettings {
    /// Upper bound for the total size of all kept log files.
    pub fn total_budget(&self) -> u64 {
        self.max_file_size.saturating_mul(self.max_files as u64)
    }
}

/// Parsed summary schedule.
#[derive(Debug, Clone)]
pub struct SummarySchedule {
    pub cron: CronSchedule,
    /// Evaluation timezone; local time when `None`.
    pub timezone: Option<Tz>,
}

/// Discord webhook channel settings.
#[derive(Debug, Clone)]
pub struct DiscordSettings {
    pub enabled: bool,
    pub summary_enabled: bool,
    pub webhook_url: String,
    pub max_retries: u32,
    pub rate_limit_reset: Duration,
}

/// SMTP channel settings.
#[derive(Clone)]
pub struct SmtpSettings {
    pub enabled: bool,
    pub summary_enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("enabled", &self.enabled)
            .field("summary_enabled", &self.summary_enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}
