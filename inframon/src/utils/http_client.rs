use std::{sync::OnceLock, time::Duration};

use tracing::debug;

use crate::{Error, Result};

const USER_AGENT: &str = concat!("inframon/", env!("CARGO_PKG_VERSION"));

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate may have installed a provider already.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client used by a single HTTP probe.
///
/// `timeout` bounds the whole request, `skip_verify` accepts any certificate.
pub fn build_probe_client(timeout: Duration, skip_verify: bool) -> Result<reqwest::Client> {
    install_rustls_provider();

    reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
        .danger_accept_invalid_certs(skip_verify)
        .pool_max_idle_per_host(1)
        .build()
        .map_err(|e| Error::Other(format!("failed to build probe HTTP client: {e}")))
}

/// Client shared by webhook notification deliveries.
pub fn build_notification_client(timeout: Duration) -> Result<reqwest::Client> {
    install_rustls_provider();

    reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Other(format!("failed to build notification HTTP client: {e}")))
}
