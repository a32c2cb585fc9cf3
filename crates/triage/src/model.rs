//! Core data types: raw and enriched alerts, canonical reports, approvals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Alert severity level.
///
/// Parsing is case-insensitive; anything other than the three known levels is
/// kept verbatim so it can still be displayed and ranked last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    Red,
    #[default]
    Yellow,
    Green,
    Other(String),
}

impl Level {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "red" => Self::Red,
            "yellow" => Self::Yellow,
            "green" => Self::Green,
            _ => Self::Other(raw.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Other(raw) => raw,
        }
    }

    /// Sort precedence: red first, unknown levels after green.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Yellow => 1,
            Self::Green => 2,
            Self::Other(_) => 3,
        }
    }
}

impl From<String> for Level {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_string()
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding as emitted by an upstream monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAlert {
    pub finding: String,
    pub school: String,
    pub level: Level,
    /// Weekly dollar impact, never negative
    pub impact_dollars: f64,
    /// Agent responsible for acting; `None` means the producing agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_required: Option<String>,
}

impl Default for RawAlert {
    fn default() -> Self {
        Self {
            finding: String::new(),
            school: "unknown".to_string(),
            level: Level::default(),
            impact_dollars: 0.0,
            assigned_to: None,
            action_required: None,
        }
    }
}

/// The normalized per-agent, per-cycle report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalReport {
    #[serde(rename = "agent")]
    pub agent_id: String,
    pub date: String,
    pub severity: String,
    pub alerts: Vec<RawAlert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_slug: Option<String>,
    /// Domain payloads (`spend`, `keywords`, `metrics`, ...), kept verbatim
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl CanonicalReport {
    /// A domain payload section, if present.
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    #[must_use]
    pub fn spend(&self) -> Option<&Value> {
        self.section("spend")
    }

    #[must_use]
    pub fn keywords(&self) -> Option<&Value> {
        self.section("keywords")
    }

    #[must_use]
    pub fn metrics(&self) -> Option<&Value> {
        self.section("metrics")
    }

    #[must_use]
    pub fn campaign_breakdown(&self) -> Option<&Value> {
        self.section("campaign_breakdown")
    }
}

/// Which tier served a piece of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Local,
    Sample,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Sample => "sample",
        })
    }
}

/// A canonical report tagged with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedReport {
    #[serde(flatten)]
    pub report: CanonicalReport,
    pub source: Source,
}

/// Whether an impact figure was measured or projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactType {
    Confirmed,
    #[default]
    Estimated,
}

/// One recommended remediation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSuggestion {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub estimated_impact: String,
    #[serde(default)]
    pub assigned_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
}

impl FixSuggestion {
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        action_type: &str,
        estimated_impact: impl Into<String>,
        assigned_agent: &str,
    ) -> Self {
        Self {
            description: description.into(),
            action_type: action_type.to_string(),
            estimated_impact: estimated_impact.into(),
            assigned_agent: assigned_agent.to_string(),
            campaign: None,
        }
    }

    #[must_use]
    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }
}

/// A raw alert augmented with diagnosis, evidence and fixes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichedAlert {
    pub alert_id: String,
    pub agent: String,
    pub level: Level,
    pub school: String,
    pub title: String,
    pub impact_monthly: f64,
    pub impact_type: ImpactType,
    pub why: String,
    pub evidence: Vec<String>,
    pub fixes: Vec<FixSuggestion>,
    pub assigned_to: String,
}

/// Caller-supplied fields for a new approval. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalInput {
    #[serde(default)]
    pub alert_id: Option<String>,
    #[serde(default)]
    pub fix_action: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_impact: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Status written on every ledger entry.
pub const APPROVED: &str = "approved";

/// An immutable ledger entry recording a human approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    #[serde(default)]
    pub alert_id: String,
    #[serde(default)]
    pub fix_action: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub campaign: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_impact: String,
    #[serde(default)]
    pub approved_by: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_parse_is_case_insensitive() {
        assert_eq!(Level::parse("RED"), Level::Red);
        assert_eq!(Level::parse(" Green "), Level::Green);
        assert_eq!(Level::parse("purple"), Level::Other("purple".to_string()));
    }

    #[test]
    fn test_level_serde_roundtrip_keeps_unknown_values() {
        let level: Level = serde_json::from_value(json!("critical")).unwrap();
        assert_eq!(level.precedence(), 3);
        assert_eq!(serde_json::to_value(&level).unwrap(), json!("critical"));
        assert_eq!(serde_json::to_value(Level::Red).unwrap(), json!("red"));
    }

    #[test]
    fn test_fix_serialization_omits_missing_campaign() {
        let fix = FixSuggestion::new("Pause it", "pause_campaign", "Save", "annunci");
        let value = serde_json::to_value(&fix).unwrap();
        assert!(value.get("campaign").is_none());

        let value = serde_json::to_value(fix.with_campaign("Brand")).unwrap();
        assert_eq!(value["campaign"], "Brand");
    }

    #[test]
    fn test_resolved_report_flattens_payload() {
        let mut report = CanonicalReport {
            agent_id: "annunci".to_string(),
            date: "2026-02-02".to_string(),
            severity: "red".to_string(),
            ..Default::default()
        };
        report.payload.insert("spend".to_string(), json!({"beibei": {}}));

        let value = serde_json::to_value(ResolvedReport {
            report,
            source: Source::Local,
        })
        .unwrap();
        assert_eq!(value["agent"], "annunci");
        assert_eq!(value["source"], "local");
        assert!(value["spend"].is_object());
    }
}
