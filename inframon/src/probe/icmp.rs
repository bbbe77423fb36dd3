//! ICMP echo probe backed by `surge-ping`.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tracing::trace;

use super::{Measurement, ProbeAdapter};
use crate::domain::Target;
use crate::error::{ProbeError, ProbeErrorKind};

const PAYLOAD: [u8; 56] = [0; 56];

/// Sends one echo request per call.
///
/// `privileged` selects raw sockets; otherwise unprivileged datagram ICMP
/// sockets are used (Linux `net.ipv4.ping_group_range`).
#[derive(Debug, Clone, Copy)]
pub struct IcmpProbe {
    privileged: bool,
}

impl IcmpProbe {
    pub fn new(privileged: bool) -> Self {
        Self { privileged }
    }

    fn client_for(&self, ip: IpAddr) -> Result<Client, ProbeError> {
        let kind = match ip {
            IpAddr::V4(_) => ICMP::V4,
            IpAddr::V6(_) => ICMP::V6,
        };
        let sock_type = if self.privileged {
            socket2::Type::RAW
        } else {
            socket2::Type::DGRAM
        };
        let config = Config::builder().kind(kind).sock_type_hint(sock_type).build();
        Client::new(&config).map_err(|e| {
            ProbeError::new(
                ProbeErrorKind::Client,
                format!("unable to open ICMP socket :: {e}"),
            )
        })
    }
}

#[async_trait]
impl ProbeAdapter for IcmpProbe {
    async fn probe(&self, target: &Target) -> Result<Measurement, ProbeError> {
        let ip = resolve(&target.address, target.probe_timeout).await?;
        let client = self.client_for(ip)?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(target.probe_timeout);

        let (_, rtt) = pinger
            .ping(PingSequence(0), &PAYLOAD)
            .await
            .map_err(|e| classify(&target.address, e))?;

        trace!(address = %target.address, %ip, rtt_us = rtt.as_micros(), "echo reply");

        if rtt.is_zero() {
            return Err(ProbeError::new(
                ProbeErrorKind::Read,
                format!("zero round-trip time :: address[{}]", target.address),
            ));
        }
        Ok(Measurement::Latency(rtt))
    }
}

/// Resolve a literal IP or hostname to the first address returned.
async fn resolve(address: &str, timeout: Duration) -> Result<IpAddr, ProbeError> {
    let host = address.trim();
    if host.is_empty() || host.contains('/') {
        return Err(ProbeError::malformed(address));
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let lookup = tokio::net::lookup_host((host, 0));
    let mut addrs = tokio::time::timeout(timeout, lookup)
        .await
        .map_err(|_| ProbeError::timeout(format!("dns lookup timed out :: address[{address}]")))?
        .map_err(|e| {
            ProbeError::new(
                ProbeErrorKind::Dns,
                format!("dns lookup failed :: address[{address}] :: {e}"),
            )
        })?;

    addrs.next().map(|addr| addr.ip()).ok_or_else(|| {
        ProbeError::new(
            ProbeErrorKind::Dns,
            format!("no addresses resolved :: address[{address}]"),
        )
    })
}

fn classify(address: &str, err: SurgeError) -> ProbeError {
    match err {
        SurgeError::Timeout { .. } => {
            ProbeError::timeout(format!("echo request timed out :: address[{address}]"))
        }
        SurgeError::IOError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            ProbeError::new(
                ProbeErrorKind::Client,
                format!("permission denied sending echo :: address[{address}] :: {e}"),
            )
        }
        SurgeError::IOError(e) => ProbeError::new(
            ProbeErrorKind::Dial,
            format!("echo request failed :: address[{address}] :: {e}"),
        ),
        other => ProbeError::new(
            ProbeErrorKind::Read,
            format!("invalid echo reply :: address[{address}] :: {other}"),
        ),
    }
}
