//! Configuration validation.
//!
//! Every rule is fatal at startup. The first violation is returned, naming the
//! offending list, index and field.

use std::collections::HashSet;
use std::str::FromStr;

use chrono_tz::Tz;
use lettre::message::Mailbox;

use super::types::{Config, GlobalConfig, TargetConfig};
use crate::schedule::CronSchedule;
use crate::{Error, Result};

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

/// Parse a size such as `10MB` or `512KB` into bytes.
///
/// Only the `KB` and `MB` suffixes are accepted; fractional values are allowed.
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (number, multiplier) = if let Some(n) = upper.strip_suffix("MB") {
        (n, MB)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, KB)
    } else {
        return Err(Error::validation(format!(
            "invalid size format :: size[{trimmed}] expected KB or MB suffix"
        )));
    };

    let value: f64 = number.trim().parse().map_err(|_| {
        Error::validation(format!("invalid size format :: size[{trimmed}]"))
    })?;

    if !value.is_finite() || value <= 0.0 {
        return Err(Error::validation(format!(
            "size must be positive :: size[{trimmed}]"
        )));
    }

    Ok((value * multiplier as f64) as u64)
}

/// Validate the whole document.
pub fn validate(config: &Config) -> Result<()> {
    validate_targets("icmp", &config.icmp, false)?;
    validate_targets("http", &config.http, true)?;
    validate_global(&config.configuration)
}

fn validate_targets(list: &str, entries: &[TargetConfig], http: bool) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let field_error = |field: &str, reason: &str| {
            Error::validation(format!("{list}[{index}].{field} {reason}"))
        };

        for (field, value) in [
            ("address", &entry.address),
            ("service", &entry.service),
            ("networkZone", &entry.network_zone),
            ("instanceType", &entry.instance_type),
        ] {
            if value.trim().is_empty() {
                return Err(field_error(field, "cannot be empty"));
            }
        }

        if entry.timeout <= 0 {
            return Err(field_error("timeout", "must be greater than zero"));
        }
        if entry.failure_timeout <= 0 {
            return Err(field_error("failureTimeout", "must be greater than zero"));
        }
        if entry.retry_buffer < 0 {
            return Err(field_error("retryBuffer", "cannot be negative"));
        }
        if entry.retry_buffer > i64::from(u32::MAX) {
            return Err(field_error("retryBuffer", "is too large"));
        }

        if http
            && !(entry.address.starts_with("http://") || entry.address.starts_with("https://"))
        {
            return Err(field_error(
                "address",
                "must start with http:// or https://",
            ));
        }

        if !seen.insert(entry.address.as_str()) {
            return Err(Error::validation(format!(
                "duplicate address in {list} list :: address[{}]",
                entry.address
            )));
        }
    }

    Ok(())
}

fn validate_global(global: &GlobalConfig) -> Result<()> {
    let field_error =
        |field: &str, reason: &str| Error::validation(format!("configuration.{field} {reason}"));

    if global.health_check_timeout <= 0 {
        return Err(field_error("healthCheckTimeout", "must be greater than zero"));
    }

    if !global.stdout {
        if global.log_file_directory.trim().is_empty() {
            return Err(field_error("logFileDirectory", "cannot be empty"));
        }
        if global.log_file_name.trim().is_empty() {
            return Err(field_error("logFileName", "cannot be empty"));
        }
        if global.log_file_size.trim().is_empty() {
            return Err(field_error("logFileSize", "cannot be empty"));
        }
        parse_size(&global.log_file_size)?;
        if global.max_log_file_keep <= 0 {
            return Err(field_error("maxLogFileKeep", "must be greater than zero"));
        }
    }

    if global.summary_enabled() {
        CronSchedule::parse(&global.health_cron)?;
    }

    if let Some(zone) = &global.health_cron_timezone {
        Tz::from_str(zone).map_err(|_| {
            field_error("healthCronTimezone", &format!("unknown timezone [{zone}]"))
        })?;
    }

    if !global.discord_webhook_disable && global.discord_webhook_url.trim().is_empty() {
        return Err(field_error(
            "discordWebhookUrl",
            "cannot be empty when discord notifications are enabled",
        ));
    }

    if !global.smtp_disable {
        for (field, value) in [
            ("smtpHost", &global.smtp_host),
            ("smtpPort", &global.smtp_port),
            ("smtpUsername", &global.smtp_username),
            ("smtpPassword", &global.smtp_password),
            ("smtpFrom", &global.smtp_from),
            ("smtpTo", &global.smtp_to),
        ] {
            if value.trim().is_empty() {
                return Err(field_error(
                    field,
                    "cannot be empty when smtp notifications are enabled",
                ));
            }
        }

        if global.smtp_port.trim().parse::<u16>().is_err() {
            return Err(field_error("smtpPort", "must be a valid port number"));
        }

        for (field, value) in [("smtpFrom", &global.smtp_from), ("smtpTo", &global.smtp_to)] {
            if Mailbox::from_str(value.trim()).is_err() {
                return Err(field_error(field, "is not a valid email address"));
            }
        }
    }

    Ok(())
}
