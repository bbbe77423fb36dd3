//! Notification channels.
//!
//! - Discord webhooks
//! - Email (SMTP)

mod discord;
mod email;

pub use discord::DiscordChannel;
pub use email::{EmailChannel, MailTransport, SmtpMailer};

use async_trait::async_trait;

use super::events::{NotificationEvent, SummaryReport};
use crate::Result;

/// Trait for notification channels.
///
/// A disabled channel returns [`crate::Error::ChannelDisabled`] without any I/O.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Check if the channel is enabled.
    fn is_enabled(&self) -> bool;

    /// Send a single event through this channel.
    async fn send(&self, event: &NotificationEvent) -> Result<()>;

    /// Send a scheduled summary through this channel.
    async fn send_summary(&self, report: &SummaryReport) -> Result<()>;
}
