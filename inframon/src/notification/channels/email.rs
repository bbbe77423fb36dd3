//! Email notification channel using SMTP.
//!
//! One delivery attempt per event, no retry. The transport sits behind
//! [`MailTransport`] so the channel can be exercised without a mail server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::NotificationChannel;
use crate::config::SmtpSettings;
use crate::notification::events::{NotificationEvent, SummaryReport, format_date, format_time};
use crate::{Error, Result};

const CHANNEL: &str = "smtp";
const SUBJECT_PREFIX: &str = "Inframon";
const SMTPS_PORT: u16 = 465;
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a fully built message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<()>;
}

/// SMTP transport on the tokio executor.
///
/// Port 465 uses implicit TLS, every other port upgrades with STARTTLS when the
/// server offers it.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        crate::utils::http_client::install_rustls_provider();

        let tls_parameters = TlsParameters::new(settings.host.clone())
            .map_err(|e| Error::config(format!("invalid SMTP TLS parameters: {e}")))?;
        let tls = if settings.port == SMTPS_PORT {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .tls(tls)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(SEND_TIMEOUT))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| Error::notification(CHANNEL, e.to_string()))
    }
}

/// Email notification channel.
pub struct EmailChannel {
    settings: SmtpSettings,
    transport: Option<Arc<dyn MailTransport>>,
}

impl EmailChannel {
    /// Build the channel; the SMTP transport is only created when enabled.
    pub fn new(settings: SmtpSettings) -> Result<Self> {
        let transport: Option<Arc<dyn MailTransport>> = if settings.enabled {
            Some(Arc::new(SmtpMailer::new(&settings)?))
        } else {
            None
        };
        Ok(Self {
            settings,
            transport,
        })
    }

    pub fn with_transport(settings: SmtpSettings, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            settings,
            transport: Some(transport),
        }
    }

    fn build_subject(event: &NotificationEvent) -> String {
        match event.target() {
            Some(target) => format!(
                "{SUBJECT_PREFIX}: {} :: {} :: {}",
                event.title(),
                event.description(),
                target.service
            ),
            None => format!("{SUBJECT_PREFIX}: {} :: {}", event.title(), event.description()),
        }
    }

    fn event_rows(event: &NotificationEvent) -> Vec<(&'static str, String)> {
        let timestamp = event.timestamp();
        let mut rows = vec![
            ("Status", event.title().to_string()),
            ("Notification", event.description()),
            ("Date", format_date(&timestamp)),
            ("Time", format_time(&timestamp)),
        ];
        if let Some(target) = event.target() {
            rows.push(("Address", target.address.clone()));
            rows.push(("Service", target.service.clone()));
            rows.push(("NetworkZone", target.network_zone.clone()));
            rows.push(("InstanceType", target.instance_type.clone()));
        }
        rows
    }

    fn build_body_text(rows: &[(&str, String)]) -> String {
        rows.iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn build_body_html(color: u32, rows: &[(&str, String)], extra: &str) -> String {
        let items: String = rows
            .iter()
            .map(|(name, value)| {
                format!(
                    "        <li><strong>{name}:</strong> {}</li>\n",
                    escape_html(value)
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Inframon Notification</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; background-color: #f4f4f4; }}
        .container {{ background-color: #ffffff; padding: 20px; border-radius: 5px; }}
        .header {{ border-left: 6px solid #{color:06X}; padding-left: 10px; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 4px 0; }}
        .footer {{ color: #666; font-size: 12px; margin-top: 20px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h2>Inframon Notification</h2>
        </div>
        <ul>
{items}        </ul>
{extra}        <div class="footer">
            <p>This is an automated message from inframon.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }

    fn build_message(&self, subject: String, text: String, html: String) -> Result<Message> {
        let from: Mailbox = self
            .settings
            .from
            .trim()
            .parse()
            .map_err(|e| Error::notification(CHANNEL, format!("invalid sender address: {e}")))?;
        let to: Mailbox = self
            .settings
            .to
            .trim()
            .parse()
            .map_err(|e| Error::notification(CHANNEL, format!("invalid recipient address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))
            .map_err(|e| Error::notification(CHANNEL, format!("failed to build message: {e}")))
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        match &self.transport {
            Some(transport) => transport.deliver(message).await,
            None => Err(Error::disabled(CHANNEL)),
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn channel_type(&self) -> &'static str {
        CHANNEL
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled && self.transport.is_some()
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        if !self.is_enabled() {
            return Err(Error::disabled(CHANNEL));
        }

        let rows = Self::event_rows(event);
        let message = self.build_message(
            Self::build_subject(event),
            Self::build_body_text(&rows),
            Self::build_body_html(event.color(), &rows, ""),
        )?;
        self.deliver(message).await?;

        debug!(title = event.title(), "email notification sent");
        Ok(())
    }

    async fn send_summary(&self, report: &SummaryReport) -> Result<()> {
        if !self.is_enabled() || !self.settings.summary_enabled {
            return Err(Error::disabled(CHANNEL));
        }

        let rows = vec![
            ("Status", report.status_label().to_string()),
            (
                "Description",
                format!("{} of {} targets failing", report.failing.len(), report.total),
            ),
            ("Date", format_date(&report.timestamp)),
            ("Time", format_time(&report.timestamp)),
        ];
        let lines = report.failing_lines();

        let mut text = Self::build_body_text(&rows);
        let mut extra = String::new();
        if !lines.is_empty() {
            text.push_str("\n\nFailing Services:\n");
            text.push_str(&lines.join("\n"));

            extra.push_str("        <h3>Failing Services</h3>\n        <ul>\n");
            for line in &lines {
                extra.push_str(&format!("        <li>{}</li>\n", escape_html(line)));
            }
            extra.push_str("        </ul>\n");
        }

        let message = self.build_message(
            format!("{SUBJECT_PREFIX}: {}", SummaryReport::TITLE),
            text,
            Self::build_body_html(report.color(), &rows, &extra),
        )?;
        self.deliver(message).await?;

        debug!(failing = report.failing.len(), "email summary sent");
        Ok(())
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::events::ConnectionStatus;
    use crate::notification::events::fixtures::{fixed_time, icmp_target};

    fn settings() -> SmtpSettings {
        SmtpSettings {
            enabled: true,
            summary_enabled: true,
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "alerts".to_string(),
            password: "secret".to_string(),
            from: "alerts@example.com".to_string(),
            to: "Ops <ops@example.com>".to_string(),
        }
    }

    fn up_event() -> NotificationEvent {
        NotificationEvent::transition(
            icmp_target("10.0.0.5", "router"),
            ConnectionStatus::Established,
        )
    }

    fn subject_of(message: &Message) -> String {
        message
            .headers()
            .get_raw("Subject")
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_subject_format() {
        assert_eq!(
            EmailChannel::build_subject(&up_event()),
            "Inframon: Connection Established :: ICMP :: OK :: router"
        );
        assert_eq!(
            EmailChannel::build_subject(&NotificationEvent::runtime_start()),
            "Inframon: Runtime Start :: inframon monitoring started"
        );
    }

    #[test]
    fn test_bodies_carry_target_fields() {
        let rows = EmailChannel::event_rows(&up_event());
        let text = EmailChannel::build_body_text(&rows);
        for needle in [
            "Status: Connection Established",
            "Notification: ICMP :: OK",
            "Address: 10.0.0.5",
            "Service: router",
            "NetworkZone: lan",
            "InstanceType: physical",
        ] {
            assert!(text.contains(needle), "missing `{needle}` in\n{text}");
        }

        let html = EmailChannel::build_body_html(0x00FF00, &rows, "");
        assert!(html.contains("<li><strong>Address:</strong> 10.0.0.5</li>"));
        assert!(html.contains("#00FF00"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }

    #[tokio::test]
    async fn test_send_delivers_once() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_deliver()
            .withf(|message| {
                message.headers().get_raw("Subject")
                    == Some("Inframon: Connection Established :: ICMP :: OK :: router")
            })
            .times(1)
            .returning(|_| Ok(()));

        let channel = EmailChannel::with_transport(settings(), Arc::new(transport));
        channel.send(&up_event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_is_not_retried() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_deliver()
            .times(1)
            .returning(|_| Err(Error::notification("smtp", "connection refused")));

        let channel = EmailChannel::with_transport(settings(), Arc::new(transport));
        let err = channel.send(&up_event()).await.unwrap_err();
        assert!(!err.is_disabled());
    }

    #[tokio::test]
    async fn test_disabled_transport_is_never_called() {
        let mut transport = MockMailTransport::new();
        transport.expect_deliver().times(0);

        let mut disabled = settings();
        disabled.enabled = false;
        let channel = EmailChannel::with_transport(disabled, Arc::new(transport));

        assert!(channel.send(&up_event()).await.unwrap_err().is_disabled());
        let report = SummaryReport::new(vec![], 1, fixed_time());
        assert!(channel.send_summary(&report).await.unwrap_err().is_disabled());
    }

    #[tokio::test]
    async fn test_new_without_smtp_is_disabled() {
        let mut disabled = settings();
        disabled.enabled = false;
        let channel = EmailChannel::new(disabled).unwrap();
        assert!(!channel.is_enabled());
        assert!(channel.send(&up_event()).await.unwrap_err().is_disabled());
    }

    #[tokio::test]
    async fn test_summary_mail() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_deliver()
            .withf(|message| {
                let body = String::from_utf8_lossy(&message.formatted()).to_string();
                subject_of(message) == "Inframon: Scheduled Report"
                    && body.contains("Failing Services")
                    && body.contains("ICMP: 10.0.0.5 (router)")
            })
            .times(1)
            .returning(|_| Ok(()));

        let channel = EmailChannel::with_transport(settings(), Arc::new(transport));
        let report = SummaryReport::new(vec![icmp_target("10.0.0.5", "router")], 2, fixed_time());
        channel.send_summary(&report).await.unwrap();
    }

    #[tokio::test]
    async fn test_summary_toggle() {
        let mut transport = MockMailTransport::new();
        transport.expect_deliver().times(1).returning(|_| Ok(()));

        let mut toggled = settings();
        toggled.summary_enabled = false;
        let channel = EmailChannel::with_transport(toggled, Arc::new(transport));

        let report = SummaryReport::new(vec![], 1, fixed_time());
        assert!(channel.send_summary(&report).await.unwrap_err().is_disabled());
        channel.send(&up_event()).await.unwrap();
    }
}
