//! Notification event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder shown for required fields the visitor left empty.
const MISSING: &str = "N/A";

/// Placeholder shown for optional fields the visitor left empty.
const NOT_PROVIDED: &str = "Not provided";

/// Something the team should hear about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// A visitor submitted the demo request form
    LeadCaptured {
        name: String,
        business: String,
        email: String,
        #[serde(default)]
        phone: String,
        #[serde(default)]
        website: String,
        #[serde(default)]
        message: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl NotifyEvent {
    /// Headline shown above the fields.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::LeadCaptured { name, .. } => {
                format!("New Demo Request: {}", or_placeholder(name, "Unknown"))
            }
        }
    }

    /// Labelled fields rendered by every channel, in display order.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::LeadCaptured {
                name,
                business,
                email,
                phone,
                website,
                message,
                ..
            } => vec![
                ("Name", or_placeholder(name, MISSING)),
                ("Business", or_placeholder(business, MISSING)),
                ("Email", or_placeholder(email, MISSING)),
                ("Phone", or_placeholder(phone, NOT_PROVIDED)),
                ("Website", or_placeholder(website, NOT_PROVIDED)),
                ("Message", or_placeholder(message, NOT_PROVIDED)),
            ],
        }
    }

    /// When the event happened.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::LeadCaptured { timestamp, .. } => *timestamp,
        }
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(phone: &str) -> NotifyEvent {
        NotifyEvent::LeadCaptured {
            name: "Giulia".to_string(),
            business: "Beibei Amigos".to_string(),
            email: "giulia@example.com".to_string(),
            phone: phone.to_string(),
            website: String::new(),
            message: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_title_uses_name() {
        assert_eq!(lead("").title(), "New Demo Request: Giulia");
    }

    #[test]
    fn test_empty_optional_fields_use_placeholder() {
        let fields = lead("").fields();
        assert_eq!(fields[3], ("Phone", "Not provided".to_string()));
        assert_eq!(fields[4], ("Website", "Not provided".to_string()));

        let fields = lead("555-0100").fields();
        assert_eq!(fields[3], ("Phone", "555-0100".to_string()));
    }

    #[test]
    fn test_deserialize_tagged_event() {
        let event: NotifyEvent = serde_json::from_str(
            r#"{"type":"lead_captured","name":"A","business":"B","email":"c@d.e"}"#,
        )
        .unwrap();
        let fields = event.fields();
        assert_eq!(fields[0].1, "A");
        assert_eq!(fields[5].1, "Not provided");
    }
}
