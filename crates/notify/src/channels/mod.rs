//! Delivery channels for lead notifications.

pub mod discord;
pub mod email;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::NotifyEvent;

/// A destination the team watches for new leads.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Short identifier used in logs and delivery outcomes
    fn name(&self) -> &'static str;

    /// Whether the channel has the settings it needs to send
    fn enabled(&self) -> bool;

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError>;
}
