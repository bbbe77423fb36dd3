//! HTTP(S) GET probe.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{Measurement, ProbeAdapter};
use crate::Result;
use crate::domain::Target;
use crate::error::{ProbeError, ProbeErrorKind};
use crate::utils::http_client::build_probe_client;

/// Status codes counted as a successful check.
pub const SUCCESS_CODES: [StatusCode; 3] =
    [StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT];

/// Issues one GET per call through a client built for a single target.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration, skip_verify: bool) -> Result<Self> {
        Ok(Self {
            client: build_probe_client(timeout, skip_verify)?,
        })
    }
}

#[async_trait]
impl ProbeAdapter for HttpProbe {
    async fn probe(&self, target: &Target) -> std::result::Result<Measurement, ProbeError> {
        let address = target.address.as_str();
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(ProbeError::malformed(address));
        }

        let response = self
            .client
            .get(address)
            .send()
            .await
            .map_err(|e| classify(address, &e))?;

        let status = response.status();
        if SUCCESS_CODES.contains(&status) {
            Ok(Measurement::StatusCode(status.as_u16()))
        } else {
            Err(ProbeError::new(
                ProbeErrorKind::UnexpectedStatus(status.as_u16()),
                format!("unexpected status code :: address[{address}] :: status[{status}]"),
            ))
        }
    }
}

fn classify(address: &str, err: &reqwest::Error) -> ProbeError {
    let kind = if err.is_builder() {
        ProbeErrorKind::MalformedAddress
    } else if err.is_timeout() {
        ProbeErrorKind::Timeout
    } else if err.is_connect() {
        connect_kind(err)
    } else if err.is_body() || err.is_decode() {
        ProbeErrorKind::Read
    } else if err.is_request() {
        ProbeErrorKind::Dial
    } else {
        ProbeErrorKind::Read
    };
    ProbeError::new(kind, format!("request failed :: address[{address}] :: {err}"))
}

/// Narrow a connect failure by walking the source chain.
fn connect_kind(err: &reqwest::Error) -> ProbeErrorKind {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return ProbeErrorKind::ConnectionRefused;
            }
        }
        if cause.to_string().contains("dns error") {
            return ProbeErrorKind::Dns;
        }
        source = cause.source();
    }
    ProbeErrorKind::Dial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProbeOptions;
    use axum::{Router, http::StatusCode as AxumStatus, routing::get};

    fn target(address: String) -> Target {
        Target {
            address,
            service: "web".to_string(),
            network_zone: "lan".to_string(),
            instance_type: "container".to_string(),
            interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            retry_buffer: 0,
            options: ProbeOptions::Http { skip_verify: false },
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn probe() -> HttpProbe {
        HttpProbe::new(Duration::from_secs(2), false).unwrap()
    }

    #[tokio::test]
    async fn test_success_codes() {
        let base = serve(
            Router::new()
                .route("/ok", get(|| async { AxumStatus::OK }))
                .route("/created", get(|| async { AxumStatus::CREATED }))
                .route("/empty", get(|| async { AxumStatus::NO_CONTENT })),
        )
        .await;

        for (path, code) in [("/ok", 200), ("/created", 201), ("/empty", 204)] {
            let measured = probe().probe(&target(format!("{base}{path}"))).await.unwrap();
            assert_eq!(measured, Measurement::StatusCode(code));
        }
    }

    #[tokio::test]
    async fn test_other_statuses_fail_retryably() {
        let base = serve(
            Router::new()
                .route("/error", get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }))
                .route("/accepted", get(|| async { AxumStatus::ACCEPTED })),
        )
        .await;

        let err = probe()
            .probe(&target(format!("{base}/error")))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(err.is_retryable());

        let err = probe()
            .probe(&target(format!("{base}/accepted")))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(202));
    }

    #[tokio::test]
    async fn test_missing_scheme_is_fatal() {
        let err = probe()
            .probe(&target("status.example.com".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::MalformedAddress);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = probe()
            .probe(&target(format!("http://{addr}/")))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err.kind,
            ProbeErrorKind::ConnectionRefused | ProbeErrorKind::Dial
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                AxumStatus::OK
            }),
        ))
        .await;

        let probe = HttpProbe::new(Duration::from_millis(200), false).unwrap();
        let err = probe
            .probe(&target(format!("{base}/slow")))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::Timeout);
    }
}
