//! Lead alerts posted as a Discord embed through an incoming webhook.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::channels::NotifyChannel;
use crate::error::ChannelError;
use crate::events::NotifyEvent;

const ENV_WEBHOOK: &str = "DISCORD_WEBHOOK_URL";

/// Embed accent color for lead notifications (violet).
const LEAD_COLOR: u32 = 0x008b_5cf6;

const FOOTER: &str = "Lead Capture";

/// Upper bound on one webhook call, so a stuck endpoint cannot pin a
/// delivery task.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-form fields get a full-width row in the embed.
const WIDE_FIELDS: &[&str] = &["Message"];

pub struct DiscordChannel {
    webhook: Option<String>,
    http: reqwest::Client,
}

impl DiscordChannel {
    /// Read the webhook from `DISCORD_WEBHOOK_URL`; blank counts as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let webhook = std::env::var(ENV_WEBHOOK)
            .ok()
            .filter(|url| !url.trim().is_empty());
        debug!(enabled = webhook.is_some(), "Discord lead channel");

        Self {
            webhook,
            http: http_client(WEBHOOK_TIMEOUT),
        }
    }

    #[must_use]
    pub fn new(webhook: impl Into<String>) -> Self {
        Self {
            webhook: Some(webhook.into()),
            http: http_client(WEBHOOK_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    fn embed(event: &NotifyEvent) -> WebhookBody {
        let fields = event
            .fields()
            .into_iter()
            .map(|(label, value)| EmbedField {
                inline: !WIDE_FIELDS.contains(&label),
                name: label.to_string(),
                value,
            })
            .collect();

        WebhookBody {
            embeds: vec![Embed {
                title: event.title(),
                color: LEAD_COLOR,
                fields,
                timestamp: event.timestamp().to_rfc3339(),
                footer: EmbedFooter {
                    text: FOOTER.to_string(),
                },
            }],
        }
    }
}

#[async_trait]
impl NotifyChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn enabled(&self) -> bool {
        self.webhook.is_some()
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let Some(webhook) = &self.webhook else {
            return Err(ChannelError::NotConfigured(ENV_WEBHOOK.to_string()));
        };

        let response = self
            .http
            .post(webhook)
            .json(&Self::embed(event))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(%status, %body, "Discord refused the lead embed");
        Err(ChannelError::Rejected {
            channel: "discord",
            status: status.as_u16(),
            body,
        })
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build Discord HTTP client, using defaults");
            reqwest::Client::new()
        })
}

#[derive(Debug, Serialize)]
struct WebhookBody {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    color: u32,
    fields: Vec<EmbedField>,
    timestamp: String,
    footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}
