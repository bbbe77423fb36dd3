//! Probe adapters.
//!
//! A probe performs exactly one check against a [`Target`] and owns no state
//! between calls. Retrying and debouncing live in the monitor.

mod http;
mod icmp;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use http::HttpProbe;
pub use icmp::IcmpProbe;

use crate::Result;
use crate::domain::{ProbeOptions, Target};
use crate::error::ProbeError;

/// What a successful probe measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// ICMP round-trip time.
    Latency(Duration),
    /// HTTP status code.
    StatusCode(u16),
}

impl Measurement {
    pub fn latency_ms(&self) -> Option<u128> {
        match self {
            Self::Latency(rtt) => Some(rtt.as_millis()),
            Self::StatusCode(_) => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::StatusCode(code) => Some(*code),
            Self::Latency(_) => None,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latency(rtt) => write!(f, "{}ms", rtt.as_millis()),
            Self::StatusCode(code) => write!(f, "status {code}"),
        }
    }
}

/// One protocol-specific check.
#[async_trait]
pub trait ProbeAdapter: Send + Sync {
    /// Attempt a single check, bounded by `target.probe_timeout`.
    async fn probe(&self, target: &Target) -> std::result::Result<Measurement, ProbeError>;
}

/// Build the adapter matching the target's protocol.
pub fn probe_for(target: &Target) -> Result<Arc<dyn ProbeAdapter>> {
    Ok(match target.options {
        ProbeOptions::Icmp { privileged } => Arc::new(IcmpProbe::new(privileged)),
        ProbeOptions::Http { skip_verify } => {
            Arc::new(HttpProbe::new(target.probe_timeout, skip_verify)?)
        }
    })
}
