//! Team notifications for captured leads.
//!
//! A [`Notifier`] fans a [`NotifyEvent`] out to every configured channel
//! (Discord webhook, SMTP email). Delivery runs on detached tasks so the
//! request that captured the lead never waits on, or fails because of, a
//! channel.
//!
//! ```no_run
//! use notify::{Notifier, NotifyEvent};
//!
//! # async fn run() {
//! let notifier = Notifier::from_env();
//! notifier.notify(NotifyEvent::LeadCaptured {
//!     name: "Giulia".to_string(),
//!     business: "Beibei Amigos".to_string(),
//!     email: "giulia@example.com".to_string(),
//!     phone: String::new(),
//!     website: String::new(),
//!     message: "Can we book a tour?".to_string(),
//!     timestamp: chrono::Utc::now(),
//! });
//! # }
//! ```
//!
//! Environment:
//!
//! - `DISCORD_WEBHOOK_URL` enables the Discord channel
//! - `NOTIFY_EMAIL`, `SMTP_USERNAME` and `SMTP_PASSWORD` enable email
//!   (`SMTP_HOST`/`SMTP_PORT` default to Gmail's implicit-TLS relay)
//! - `NOTIFY_DISABLED=true` turns everything off

pub mod channels;
pub mod error;
pub mod events;

pub use channels::discord::DiscordChannel;
pub use channels::email::{EmailChannel, EmailConfig};
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::NotifyEvent;

use std::sync::Arc;

use tracing::{debug, info, warn};

const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Outcome of one channel's delivery attempt.
pub type Delivery = (&'static str, Result<(), ChannelError>);

/// Dispatches events to the enabled channels.
///
/// A notifier with no channels is valid and silently drops events.
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.channels.iter().map(|c| c.name()).collect();
        f.debug_struct("Notifier").field("channels", &names).finish()
    }
}

impl Notifier {
    /// Build from environment variables, keeping only enabled channels.
    #[must_use]
    pub fn from_env() -> Self {
        let off = std::env::var(ENV_NOTIFY_DISABLED)
            .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        if off {
            info!("Lead notifications turned off by {ENV_NOTIFY_DISABLED}");
            return Self::disabled();
        }

        let candidates: [Arc<dyn NotifyChannel>; 2] = [
            Arc::new(DiscordChannel::from_env()),
            Arc::new(EmailChannel::from_env()),
        ];
        let notifier = Self::with_channels(candidates.into_iter().filter(|c| c.enabled()).collect());

        if notifier.has_channels() {
            info!(channels = ?notifier, "Lead notifications enabled");
        } else {
            warn!("No notification channel configured, leads will only be stored");
        }
        notifier
    }

    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self { channels }
    }

    /// A notifier that drops every event.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.channels.is_empty()
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver on detached tasks and return immediately.
    ///
    /// Failures are logged. Must be called inside a Tokio runtime.
    pub fn notify(&self, event: NotifyEvent) {
        if self.channels.is_empty() {
            debug!("No notification channels, dropping event");
            return;
        }

        let event = Arc::new(event);
        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let event = Arc::clone(&event);
            tokio::spawn(async move {
                deliver(channel.as_ref(), &event).await;
            });
        }
    }

    /// Deliver to every channel in turn and report each outcome.
    pub async fn notify_and_wait(&self, event: NotifyEvent) -> Vec<Delivery> {
        let mut outcomes = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            outcomes.push(deliver(channel.as_ref(), &event).await);
        }
        outcomes
    }
}

async fn deliver(channel: &dyn NotifyChannel, event: &NotifyEvent) -> Delivery {
    let name = channel.name();
    let result = channel.send(event).await;
    match &result {
        Ok(()) => debug!(channel = name, "Lead notification delivered"),
        Err(e) => warn!(channel = name, error = %e, "Lead notification failed"),
    }
    (name, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lead() -> NotifyEvent {
        NotifyEvent::LeadCaptured {
            name: "Sofia".to_string(),
            business: "Amici".to_string(),
            email: "sofia@example.com".to_string(),
            phone: String::new(),
            website: String::new(),
            message: String::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_disabled_notifier_sends_nothing() {
        let notifier = Notifier::disabled();
        assert!(!notifier.has_channels());
        assert!(notifier.notify_and_wait(lead()).await.is_empty());
        notifier.notify(lead());
    }

    #[tokio::test]
    async fn test_rejected_delivery_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let notifier = Notifier::with_channels(vec![Arc::new(DiscordChannel::new(server.uri()))]);
        assert_eq!(notifier.channel_count(), 1);

        let outcomes = notifier.notify_and_wait(lead()).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, "discord");
        assert!(matches!(
            outcomes[0].1,
            Err(ChannelError::Rejected { status: 500, .. })
        ));
    }
}
