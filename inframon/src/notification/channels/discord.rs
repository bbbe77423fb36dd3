//! Discord webhook notification channel.
//!
//! A 429 response is retried after a fixed pause, up to the configured number
//! of retries. Any other non-2xx status or a transport error is terminal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::config::DiscordSettings;
use crate::notification::events::{NotificationEvent, SummaryReport, format_date, format_time};
use crate::utils::http_client::build_notification_client;
use crate::{Error, Result};

const CHANNEL: &str = "discord";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

impl EmbedField {
    fn inline(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline: true,
        }
    }
}

/// Discord notification channel.
pub struct DiscordChannel {
    settings: DiscordSettings,
    client: Client,
}

impl DiscordChannel {
    pub fn new(settings: DiscordSettings) -> Result<Self> {
        Ok(Self {
            settings,
            client: build_notification_client(REQUEST_TIMEOUT)?,
        })
    }

    fn build_payload(event: &NotificationEvent) -> WebhookPayload {
        let timestamp = event.timestamp();
        let mut fields = Vec::with_capacity(6);

        match event.target() {
            Some(target) => {
                fields.push(EmbedField::inline("Address", &target.address));
                fields.push(EmbedField::inline("Service", &target.service));
                fields.push(EmbedField::inline("Date", format_date(&timestamp)));
                fields.push(EmbedField::inline("Time", format_time(&timestamp)));
                fields.push(EmbedField::inline("NetworkZone", &target.network_zone));
                fields.push(EmbedField::inline("InstanceType", &target.instance_type));
            }
            None => {
                fields.push(EmbedField::inline("Date", format_date(&timestamp)));
                fields.push(EmbedField::inline("Time", format_time(&timestamp)));
            }
        }

        WebhookPayload {
            embeds: vec![Embed {
                title: event.title().to_string(),
                description: event.description(),
                color: event.color(),
                fields,
            }],
        }
    }

    fn build_summary_payload(report: &SummaryReport) -> WebhookPayload {
        let status = if report.all_pass() {
            EmbedField {
                name: "Status".to_string(),
                value: report.status_label().to_string(),
                inline: false,
            }
        } else {
            EmbedField {
                name: report.status_label().to_string(),
                value: report.failing_lines().join("\n"),
                inline: false,
            }
        };

        WebhookPayload {
            embeds: vec![Embed {
                title: SummaryReport::TITLE.to_string(),
                description: format!(
                    "{} of {} targets failing",
                    report.failing.len(),
                    report.total
                ),
                color: report.color(),
                fields: vec![
                    status,
                    EmbedField::inline("Date", format_date(&report.timestamp)),
                    EmbedField::inline("Time", format_time(&report.timestamp)),
                ],
            }],
        }
    }

    /// POST the payload, retrying only on 429.
    async fn send_with_retry(&self, payload: &WebhookPayload) -> Result<()> {
        let mut retries = 0;

        loop {
            let response = self
                .client
                .post(&self.settings.webhook_url)
                .json(payload)
                .send()
                .await
                .map_err(|e| Error::notification(CHANNEL, format!("request failed: {e}")))?;

            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries >= self.settings.max_retries {
                    warn!(
                        max_retries = self.settings.max_retries,
                        "Discord rate limit: max retries exceeded"
                    );
                    return Err(Error::notification(
                        CHANNEL,
                        format!(
                            "rate limit exceeded after {} retries",
                            self.settings.max_retries
                        ),
                    ));
                }
                retries += 1;
                debug!(
                    retry = retries,
                    max_retries = self.settings.max_retries,
                    wait_ms = self.settings.rate_limit_reset.as_millis() as u64,
                    "Discord rate limited (429), waiting before retry"
                );
                tokio::time::sleep(self.settings.rate_limit_reset).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "Discord webhook failed");
            return Err(Error::notification(
                CHANNEL,
                format!("unexpected status {status}: {body}"),
            ));
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        CHANNEL
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled && !self.settings.webhook_url.is_empty()
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        if !self.is_enabled() {
            return Err(Error::disabled(CHANNEL));
        }

        self.send_with_retry(&Self::build_payload(event)).await?;
        debug!(title = event.title(), "Discord notification sent");
        Ok(())
    }

    async fn send_summary(&self, report: &SummaryReport) -> Result<()> {
        if !self.is_enabled() || !self.settings.summary_enabled {
            return Err(Error::disabled(CHANNEL));
        }

        self.send_with_retry(&Self::build_summary_payload(report))
            .await?;
        debug!(failing = report.failing.len(), "Discord summary sent");
        Ok(())
    }
}
