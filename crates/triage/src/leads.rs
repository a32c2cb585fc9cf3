//! Demo request capture.

use std::sync::Arc;

use chrono::Utc;
use notify::{Notifier, NotifyEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::local::JsonLog;

const DEFAULT_LEAD_SOURCE: &str = "website";

/// Demo request form fields. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A stored demo request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub source: String,
}

/// Local log of demo requests plus team notification.
#[derive(Clone)]
pub struct LeadBook {
    log: JsonLog<Lead>,
    notifier: Arc<Notifier>,
}

impl LeadBook {
    pub fn new(log: JsonLog<Lead>, notifier: Arc<Notifier>) -> Self {
        Self { log, notifier }
    }

    /// Store a lead, then notify the team without waiting for delivery.
    pub async fn record(&self, input: LeadInput) -> Result<Lead> {
        let now = Utc::now();
        let lead = Lead {
            name: input.name.unwrap_or_default(),
            school: input.school.unwrap_or_default(),
            email: input.email.unwrap_or_default(),
            phone: input.phone.unwrap_or_default(),
            website: input.website.unwrap_or_default(),
            message: input.message.unwrap_or_default(),
            timestamp: now.to_rfc3339(),
            source: input
                .source
                .unwrap_or_else(|| DEFAULT_LEAD_SOURCE.to_string()),
        };

        self.log.append(lead.clone()).await?;
        info!(school = %lead.school, source = %lead.source, "Lead captured");

        self.notifier.notify(NotifyEvent::LeadCaptured {
            name: lead.name.clone(),
            business: lead.school.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            website: lead.website.clone(),
            message: lead.message.clone(),
            timestamp: now,
        });

        Ok(lead)
    }

    /// Stored leads, oldest first.
    pub async fn list(&self) -> Result<Vec<Lead>> {
        self.log.load().await
    }
}
