//! Monitored target definitions.
//!
//! A [`Target`] is built once from validated configuration and then shared
//! read-only (behind an `Arc`) by the monitor loop, the reporter and the
//! summary dispatcher.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Probe protocol of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Http,
}

impl Protocol {
    /// Lowercase name, used for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Icmp => "icmp",
            Self::Http => "http",
        }
    }

    /// Uppercase label, used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Icmp => "ICMP",
            Self::Http => "HTTP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a target in the health store.
///
/// Addresses are only unique within one protocol list, so the protocol is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub protocol: Protocol,
    pub address: String,
}

impl TargetKey {
    pub fn new(protocol: Protocol, address: impl Into<String>) -> Self {
        Self {
            protocol,
            address: address.into(),
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.address)
    }
}

/// Protocol-specific probe options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOptions {
    /// ICMP echo; `privileged` selects raw sockets over unprivileged datagram sockets.
    Icmp { privileged: bool },
    /// HTTP(S) GET; `skip_verify` disables TLS certificate verification.
    Http { skip_verify: bool },
}

/// One monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    pub service: String,
    pub network_zone: String,
    pub instance_type: String,
    /// Pause between two monitoring cycles.
    pub interval: Duration,
    /// Upper bound for a single probe attempt.
    pub probe_timeout: Duration,
    /// Failed verdicts tolerated before the target is declared down.
    pub retry_buffer: u32,
    pub options: ProbeOptions,
}

impl Target {
    pub fn protocol(&self) -> Protocol {
        match self.options {
            ProbeOptions::Icmp { .. } => Protocol::Icmp,
            ProbeOptions::Http { .. } => Protocol::Http,
        }
    }

    pub fn key(&self) -> TargetKey {
        TargetKey::new(self.protocol(), self.address.clone())
    }

    /// `PROTOCOL: address (service)`, as listed in summary reports.
    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} ({})",
            self.protocol().label(),
            self.address,
            self.service
        )
    }
}
