//! Notification system module.
//!
//! State transitions, scheduled summaries and system events are delivered
//! through Discord webhooks and SMTP. Each channel can be switched off
//! independently; a switched-off channel answers with a "disabled" error
//! instead of doing any I/O.

pub mod channels;
pub mod events;
pub mod service;

pub use channels::{DiscordChannel, EmailChannel, MailTransport, NotificationChannel, SmtpMailer};
pub use events::{ConnectionStatus, NotificationEvent, SummaryReport, TransitionEvent};
pub use service::NotificationService;
