//! Notification dispatch across every configured channel.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::channels::{DiscordChannel, EmailChannel, NotificationChannel};
use super::events::{NotificationEvent, SummaryReport};
use crate::config::Config;
use crate::error::DeliveryFailure;
use crate::{Error, Result};

/// Sends events and summaries to each channel in order.
///
/// Channels are independent: a failing channel never prevents delivery through
/// the next one. Disabled channels are expected and not reported as failures.
pub struct NotificationService {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Build the Discord and SMTP channels from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let discord = DiscordChannel::new(config.discord())?;
        let email = EmailChannel::new(config.smtp())?;
        Ok(Self::new(vec![Arc::new(discord), Arc::new(email)]))
    }

    /// Whether at least one channel would attempt delivery.
    pub fn has_enabled_channels(&self) -> bool {
        self.channels.iter().any(|c| c.is_enabled())
    }

    /// Deliver one event.
    ///
    /// Returns [`Error::Delivery`] listing every channel that failed.
    pub async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        self.dispatch(event.title(), |channel| channel.send(event)).await
    }

    /// Deliver a scheduled summary.
    pub async fn notify_summary(&self, report: &SummaryReport) -> Result<()> {
        self.dispatch(SummaryReport::TITLE, |channel| channel.send_summary(report)).await
    }

    async fn dispatch<'a, F>(&'a self, what: &str, send: F) -> Result<()>
    where
        F: Fn(&'a dyn NotificationChannel) -> BoxFuture<'a, Result<()>>,
    {
        let mut failures = Vec::new();

        for channel in &self.channels {
            let channel_type = channel.channel_type();
            match send(channel.as_ref()).await {
                Ok(()) => debug!(channel = channel_type, what, "notification delivered"),
                Err(e) if e.is_disabled() => {
                    debug!(channel = channel_type, what, "channel disabled, skipping");
                }
                Err(e) => {
                    warn!(channel = channel_type, what, error = %e, "notification delivery failed");
                    failures.push(DeliveryFailure {
                        channel: channel_type,
                        error: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Delivery(failures))
        }
    }
}
