//! Channel delivery errors.

use thiserror::Error;

/// Why a channel could not deliver an event.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The receiving service answered with a non-success status
    #[error("{channel} rejected the notification ({status}): {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },

    /// A required setting is missing; carries the variable name
    #[error("channel not configured: {0} is not set")]
    NotConfigured(String),

    /// Email could not be built or handed to the relay
    #[error("email delivery failed: {0}")]
    Email(String),
}
