//! Application-wide error types.

use std::fmt;

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A transport that is switched off in configuration. Expected, not an operational failure.
    #[error("{0} notifications disabled")]
    ChannelDisabled(String),

    #[error("{channel} notification failed: {message}")]
    Notification { channel: String, message: String },

    #[error("notification delivery failed: {}", DisplayFailures(.0))]
    Delivery(Vec<DeliveryFailure>),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn disabled(channel: impl Into<String>) -> Self {
        Self::ChannelDisabled(channel.into())
    }

    pub fn notification(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Notification {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Whether this is the "transport disabled" sentinel.
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::ChannelDisabled(_))
    }
}

/// One failed channel inside an aggregate delivery error.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub channel: &'static str,
    pub error: Error,
}

struct DisplayFailures<'a>(&'a [DeliveryFailure]);

impl fmt::Display for DisplayFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "[{}] {}", failure.channel, failure.error)?;
        }
        Ok(())
    }
}

/// Classification of a failed probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    Timeout,
    ConnectionRefused,
    Dns,
    Dial,
    Read,
    UnexpectedStatus(u16),
    MalformedAddress,
    Client,
}

/// Error returned by a probe adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Timeout, message)
    }

    pub fn malformed(address: &str) -> Self {
        Self::new(
            ProbeErrorKind::MalformedAddress,
            format!("invalid address :: address[{address}]"),
        )
    }

    /// Transient failures worth another attempt within the same interval.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind,
            ProbeErrorKind::MalformedAddress | ProbeErrorKind::Client
        )
    }

    /// Status code carried by the failure, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            ProbeErrorKind::UnexpectedStatus(code) => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_sentinel() {
        let err = Error::disabled("discord");
        assert!(err.is_disabled());
        assert_eq!(err.to_string(), "discord notifications disabled");
        assert!(!Error::notification("smtp", "boom").is_disabled());
    }

    #[test]
    fn test_delivery_error_lists_every_channel() {
        let err = Error::Delivery(vec![
            DeliveryFailure {
                channel: "discord",
                error: Error::notification("discord", "unexpected status 500"),
            },
            DeliveryFailure {
                channel: "smtp",
                error: Error::notification("smtp", "connection refused"),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("[discord]"));
        assert!(text.contains("[smtp]"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_probe_error_classification() {
        assert!(ProbeError::timeout("deadline exceeded").is_retryable());
        assert!(ProbeError::new(ProbeErrorKind::ConnectionRefused, "refused").is_retryable());
        assert!(ProbeError::new(ProbeErrorKind::UnexpectedStatus(500), "500").is_retryable());
        assert!(!ProbeError::malformed("ftp://host").is_retryable());
        assert!(!ProbeError::new(ProbeErrorKind::Client, "tls").is_retryable());
    }

    #[test]
    fn test_probe_error_status_code() {
        let err = ProbeError::new(ProbeErrorKind::UnexpectedStatus(503), "503");
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(ProbeError::timeout("t").status_code(), None);
    }
}
