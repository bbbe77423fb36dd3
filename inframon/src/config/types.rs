//! Configuration document types.
//!
//! Mirrors the YAML layout: two target lists (`icmp`, `http`) and one global
//! `configuration` block. Numeric fields are signed so that negative values
//! reach validation instead of failing deserialization with an opaque message.

use serde::{Deserialize, Deserializer, Serialize};

/// Default webhook retries on HTTP 429.
pub const DEFAULT_DISCORD_MAX_RETRIES: u32 = 3;

/// Default pause between two rate-limited webhook attempts, in seconds.
pub const DEFAULT_DISCORD_RATE_LIMIT_RESET_SECS: u64 = 2;

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub icmp: Vec<TargetConfig>,
    #[serde(default)]
    pub http: Vec<TargetConfig>,
    pub configuration: GlobalConfig,
}

/// One entry of the `icmp` or `http` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub network_zone: String,
    #[serde(default)]
    pub instance_type: String,
    /// Monitoring interval in seconds.
    #[serde(default)]
    pub timeout: i64,
    /// Per-probe timeout in seconds.
    #[serde(default)]
    pub failure_timeout: i64,
    #[serde(default)]
    pub retry_buffer: i64,
    /// HTTP only: skip TLS certificate verification.
    #[serde(default)]
    pub skip_verify: bool,
}

/// The global `configuration` block.
///
/// Keys left out of the document take their value from [`GlobalConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalConfig {
    pub log_file_directory: String,
    pub log_file_name: String,
    #[serde(rename = "stdOut")]
    pub stdout: bool,
    /// Size budget per log file, e.g. `10MB` or `512KB`.
    pub log_file_size: String,
    pub max_log_file_keep: i64,

    /// Seconds between two health reporter sweeps.
    pub health_check_timeout: i64,
    pub health_cron: String,
    /// IANA timezone the cron expression is evaluated in. Local time when absent.
    pub health_cron_timezone: Option<String>,
    pub health_cron_disable: bool,
    pub health_cron_webhook_disable: bool,
    pub health_cron_smtp_disable: bool,

    pub discord_webhook_disable: bool,
    pub discord_webhook_url: String,
    pub discord_max_retries: u32,
    pub discord_rate_limit_reset_secs: u64,

    pub smtp_disable: bool,
    pub smtp_host: String,
    #[serde(deserialize_with = "string_or_number")]
    pub smtp_port: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from: String,
    pub smtp_to: String,

    /// Use raw ICMP sockets (requires root).
    pub privileged: bool,
    /// Send a "Runtime Start" notification once all loops are running.
    pub startup_notification: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_file_directory: String::new(),
            log_file_name: String::new(),
            stdout: true,
            log_file_size: String::new(),
            max_log_file_keep: 0,
            health_check_timeout: 60,
            health_cron: String::new(),
            health_cron_timezone: None,
            health_cron_disable: false,
            health_cron_webhook_disable: false,
            health_cron_smtp_disable: false,
            discord_webhook_disable: true,
            discord_webhook_url: String::new(),
            discord_max_retries: DEFAULT_DISCORD_MAX_RETRIES,
            discord_rate_limit_reset_secs: DEFAULT_DISCORD_RATE_LIMIT_RESET_SECS,
            smtp_disable: true,
            smtp_host: String::new(),
            smtp_port: String::new(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_from: String::new(),
            smtp_to: String::new(),
            privileged: false,
            startup_notification: false,
        }
    }
}

impl GlobalConfig {
    /// Scheduled summaries run only when enabled and given a cron expression.
    pub fn summary_enabled(&self) -> bool {
        !self.health_cron_disable && !self.health_cron.trim().is_empty()
    }
}

/// SMTP ports are commonly written unquoted in YAML.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
icmp:
  - address: 10.0.0.5
    service: core-router
    networkZone: lan
    instanceType: physical
    timeout: 5
    failureTimeout: 2
    retryBuffer: 2
http:
  - address: https://grafana.internal
    service: grafana
    networkZone: lan
    instanceType: container
    timeout: 30
    failureTimeout: 10
    retryBuffer: 3
    skipVerify: true
configuration:
  stdOut: true
  healthCheckTimeout: 60
  healthCron: "0 9 * * *"
  discordWebhookDisable: false
  discordWebhookUrl: https://discord.com/api/webhooks/1/abc
  smtpDisable: true
  smtpPort: 587
"#;

    #[test]
    fn test_parse_document() {
        let config: Config = serde_yaml::from_str(DOCUMENT).unwrap();
        assert_eq!(config.icmp.len(), 1);
        assert_eq!(config.http.len(), 1);

        let icmp = &config.icmp[0];
        assert_eq!(icmp.address, "10.0.0.5");
        assert_eq!(icmp.network_zone, "lan");
        assert_eq!(icmp.retry_buffer, 2);

        let http = &config.http[0];
        assert!(http.skip_verify);
        assert_eq!(http.failure_timeout, 10);

        let global = &config.configuration;
        assert!(global.stdout);
        assert_eq!(global.health_cron, "0 9 * * *");
        assert_eq!(global.smtp_port, "587");
        assert_eq!(global.discord_max_retries, DEFAULT_DISCORD_MAX_RETRIES);
        assert_eq!(
            global.discord_rate_limit_reset_secs,
            DEFAULT_DISCORD_RATE_LIMIT_RESET_SECS
        );
        assert!(!global.startup_notification);
    }

    #[test]
    fn test_missing_keys_take_struct_defaults() {
        let config: Config = serde_yaml::from_str("configuration: {}").unwrap();
        let parsed = &config.configuration;
        let defaults = GlobalConfig::default();

        assert!(parsed.stdout);
        assert_eq!(parsed.stdout, defaults.stdout);
        assert_eq!(parsed.health_check_timeout, 60);
        assert!(!parsed.health_cron_disable);
        assert!(parsed.health_cron.is_empty());
        assert_eq!(parsed.discord_webhook_disable, defaults.discord_webhook_disable);
        assert_eq!(parsed.smtp_disable, defaults.smtp_disable);
        assert_eq!(parsed.discord_max_retries, defaults.discord_max_retries);
        assert_eq!(
            parsed.discord_rate_limit_reset_secs,
            defaults.discord_rate_limit_reset_secs
        );
    }

    #[test]
    fn test_negative_retry_buffer_survives_parsing() {
        let yaml = r#"
icmp:
  - address: 10.0.0.1
    retryBuffer: -1
configuration:
  stdOut: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.icmp[0].retry_buffer, -1);
    }
}
