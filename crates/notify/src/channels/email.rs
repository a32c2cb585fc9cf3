//! SMTP email notification channel.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::error::ChannelError;
use crate::events::NotifyEvent;
use crate::NotifyChannel;

/// Recipient of lead notifications.
const ENV_NOTIFY_EMAIL: &str = "NOTIFY_EMAIL";
const ENV_SMTP_HOST: &str = "SMTP_HOST";
const ENV_SMTP_PORT: &str = "SMTP_PORT";
const ENV_SMTP_USERNAME: &str = "SMTP_USERNAME";
const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
/// Implicit TLS submission port.
const DEFAULT_SMTP_PORT: u16 = 465;

/// SMTP settings for the email channel.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    /// Address that receives notifications
    pub to: Option<String>,
    /// SMTP relay host
    pub host: String,
    /// SMTP relay port
    pub port: u16,
    /// Login, also used as the sender address
    pub username: Option<String>,
    /// Login password (app password for Gmail)
    pub password: Option<String>,
}

impl EmailConfig {
    /// Read SMTP settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            to: non_empty(ENV_NOTIFY_EMAIL),
            host: non_empty(ENV_SMTP_HOST).unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: non_empty(ENV_SMTP_PORT)
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            username: non_empty(ENV_SMTP_USERNAME),
            password: non_empty(ENV_SMTP_PASSWORD),
        }
    }

    /// All of recipient, username and password must be present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.to.is_some() && self.username.is_some() && self.password.is_some()
    }
}

/// Email notification channel.
pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    /// Create a new email channel from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let config = EmailConfig::from_env();
        if config.is_complete() {
            debug!("Email notifications enabled");
        } else {
            debug!("Email notifications disabled (NOTIFY_EMAIL/SMTP credentials not set)");
        }
        Self { config }
    }

    /// Create an email channel with explicit settings.
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Render the plain-text body for an event.
    #[allow(clippy::format_push_string)]
    fn format_body(event: &NotifyEvent) -> String {
        let mut body = format!("{}\n\n", event.title());
        for (name, value) in event.fields() {
            body.push_str(name);
            body.push_str(": ");
            body.push_str(&value);
            body.push('\n');
        }
        body.push_str(&format!(
            "\nTime: {}\n",
            event.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        body
    }

    fn build_message(&self, event: &NotifyEvent) -> Result<Message, ChannelError> {
        let (Some(to), Some(from)) = (&self.config.to, &self.config.username) else {
            return Err(ChannelError::NotConfigured(ENV_NOTIFY_EMAIL.to_string()));
        };

        let from: Mailbox = from
            .parse()
            .map_err(|e| ChannelError::Email(format!("invalid sender address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| ChannelError::Email(format!("invalid recipient address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(event.title())
            .header(ContentType::TEXT_PLAIN)
            .body(Self::format_body(event))
            .map_err(|e| ChannelError::Email(e.to_string()))
    }
}

#[async_trait]
impl NotifyChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn enabled(&self) -> bool {
        self.config.is_complete()
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        else {
            return Err(ChannelError::NotConfigured(ENV_SMTP_USERNAME.to_string()));
        };

        let message = self.build_message(event)?;

        debug!(channel = "email", event_type = ?event.title(), "Sending notification");

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| ChannelError::Email(e.to_string()))?
                .port(self.config.port)
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build();

        mailer
            .send(message)
            .await
            .map_err(|e| ChannelError::Email(e.to_string()))?;

        debug!(channel = "email", "Notification sent successfully");
        Ok(())
    }
}
