//! Static agent catalog.
//!
//! Each upstream monitor is an agent with a fixed id, a domain that decides
//! which enrichment rules apply, and the file patterns its reports land under.
//! Listed agents also carry a public profile and the name of the scheduler
//! job that runs them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

const BUNDLED_PROFILES: &str = include_str!("../data/agent_profiles.json");

const MAX_AGENT_ID_LEN: usize = 64;

/// Whether `id` is a well-formed agent id: 1 to 64 characters from
/// `[a-z0-9_-]`.
///
/// Ids become path components when report files are located, so nothing
/// else is ever looked up.
#[must_use]
pub fn is_valid_agent_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_AGENT_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Monitoring domain of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Paid search spend and conversions
    AdSpend,
    /// Site analytics and conversion tracking
    Analytics,
    /// Organic search rankings
    SearchIntel,
    /// Local search visibility and page indexing
    LocalSearch,
    /// Reviews and business profile
    Reputation,
    /// Everything without dedicated rules
    General,
}

impl Domain {
    /// Whether impact figures from this domain come straight from an
    /// authoritative metrics feed rather than a projection.
    #[must_use]
    pub const fn reports_measured_impact(self) -> bool {
        matches!(self, Self::AdSpend | Self::Analytics)
    }
}

/// Where an agent's report files live, relative to the reports directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReportPattern {
    /// Flat files named `{prefix}*.json`
    Prefix(String),
    /// Any `*.json` inside a subdirectory
    Directory(String),
}

impl ReportPattern {
    /// Patterns used for agents without a dedicated layout:
    /// `{id}*.json` and `{id}/*.json`.
    #[must_use]
    pub fn defaults_for(agent_id: &str) -> Vec<Self> {
        vec![
            Self::Prefix(agent_id.to_string()),
            Self::Directory(agent_id.to_string()),
        ]
    }
}

/// A tool an agent works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTool {
    pub name: String,
    pub icon: String,
}

/// Where and how often an agent publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOutput {
    pub channel: String,
    pub frequency: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Public persona of a listed agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Accent color, `#rrggbb`
    pub color: String,
    pub title: String,
    pub title_en: String,
    pub gender: String,
    pub tagline: String,
    pub personality: String,
    pub specialty: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ProfileTool>,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub output: Vec<ProfileOutput>,
}

/// Profile as served to clients: identity plus persona.
#[derive(Debug, Serialize)]
pub struct ProfileCard<'a> {
    pub id: &'a str,
    pub emoji: &'a str,
    pub name: &'a str,
    #[serde(flatten)]
    pub profile: &'a AgentProfile,
}

/// Read-only description of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub emoji: String,
    pub name: String,
    pub role: String,
    pub schedule: String,
    pub domain: Domain,
    /// Name of the scheduler job that runs this agent, empty when unscheduled
    #[serde(skip)]
    pub cron_name: String,
    #[serde(skip)]
    pub patterns: Vec<ReportPattern>,
    #[serde(skip)]
    pub profile: Option<Arc<AgentProfile>>,
}

impl AgentDescriptor {
    /// Minimal descriptor with default file patterns.
    #[must_use]
    pub fn new(id: &str, domain: Domain) -> Self {
        Self {
            id: id.to_string(),
            emoji: String::new(),
            name: id.to_string(),
            role: String::new(),
            schedule: String::new(),
            domain,
            cron_name: String::new(),
            patterns: ReportPattern::defaults_for(id),
            profile: None,
        }
    }

    /// Descriptor for an id missing from the catalog.
    #[must_use]
    pub fn unlisted(id: &str) -> Self {
        Self::new(id, Domain::General)
    }

    #[must_use]
    pub fn with_patterns(mut self, patterns: Vec<ReportPattern>) -> Self {
        self.patterns = patterns;
        self
    }

    #[must_use]
    pub fn with_cron_name(mut self, cron_name: &str) -> Self {
        self.cron_name = cron_name.to_string();
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<AgentProfile>) -> Self {
        self.profile = profile.map(Arc::new);
        self
    }

    /// The agent's public profile card, if it has a profile.
    #[must_use]
    pub fn profile_card(&self) -> Option<ProfileCard<'_>> {
        self.profile.as_deref().map(|profile| ProfileCard {
            id: &self.id,
            emoji: &self.emoji,
            name: &self.name,
            profile,
        })
    }

    fn listed(
        id: &str,
        emoji: &str,
        name: &str,
        role: &str,
        schedule: &str,
        domain: Domain,
    ) -> Self {
        Self {
            emoji: emoji.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            schedule: schedule.to_string(),
            ..Self::new(id, domain)
        }
    }
}

/// Ordered set of known agents.
#[derive(Debug, Clone)]
pub struct AgentCatalog {
    agents: Vec<AgentDescriptor>,
}

impl AgentCatalog {
    /// Catalog from an explicit list; order is preserved.
    #[must_use]
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self { agents }
    }

    /// The production roster.
    #[must_use]
    pub fn builtin() -> Self {
        use Domain::{AdSpend, Analytics, General, LocalSearch, Reputation, SearchIntel};

        let prefix = |p: &str| vec![ReportPattern::Prefix(p.to_string())];

        let agents = vec![
            AgentDescriptor::listed("marco", "☕", "Marco", "Director — Morning Briefing", "Daily 8:30 AM", General)
                .with_cron_name("Marco Morning Briefing"),
            AgentDescriptor::listed("annunci", "📣", "Annunci", "Google Ads Monitor", "Daily 8:00 AM", AdSpend)
                .with_cron_name("Annunci Daily Ads Report")
                .with_patterns(prefix("annunci-")),
            AgentDescriptor::listed("bussola", "📊", "Bussola", "GA4 Analytics", "Daily 7:30 AM", Analytics)
                .with_cron_name("Bussola Daily Analytics Report")
                .with_patterns(prefix("bussola")),
            AgentDescriptor::listed("spia", "🔍", "Spia", "SEO Intelligence", "Daily 7:00 AM", SearchIntel)
                .with_cron_name("Spia Daily SEO Report")
                .with_patterns(vec![ReportPattern::Directory("spia".to_string())]),
            AgentDescriptor::listed("stella", "⭐", "Stella", "GMB & Reviews", "Daily 7:00 AM", Reputation)
                .with_cron_name("Stella Daily GMB Report"),
            AgentDescriptor::listed("zona", "📍", "Zona", "Local SEO", "Daily 7:15 AM", LocalSearch)
                .with_cron_name("Zona Daily Local SEO Check")
                .with_patterns(prefix("zona-")),
            AgentDescriptor::listed("architetto", "🏗️", "Architetto", "Web Architect & Builder", "Hourly", General)
                .with_cron_name("Architetto URL Health Monitor"),
            AgentDescriptor::listed("penna", "✍️", "Penna", "Blog Writer", "Tue/Wed 2:00 PM", General)
                .with_cron_name("Beibei Amigos Weekly Blog"),
            AgentDescriptor::listed("piazza", "📱", "Piazza", "Social Media Manager", "Not scheduled", General),
            AgentDescriptor::listed("faccia", "👤", "Faccia", "Facebook Ads (BLOCKED)", "Not scheduled", General),
            AgentDescriptor::listed("lettera", "💌", "Lettera", "Email & CRM", "Not scheduled", General),
            AgentDescriptor::listed("benvenuta", "👋", "Benvenuta", "AI Parent Assistant", "Always on", General),
        ];

        let mut profiles = bundled_profiles();
        Self::new(
            agents
                .into_iter()
                .map(|agent| {
                    let profile = profiles.remove(&agent.id);
                    agent.with_profile(profile)
                })
                .collect(),
        )
    }

    /// Look up an agent by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Look up an agent, synthesizing a default descriptor for unknown ids.
    ///
    /// Malformed ids resolve to nothing.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<AgentDescriptor> {
        if !is_valid_agent_id(id) {
            return None;
        }
        Some(
            self.get(id)
                .cloned()
                .unwrap_or_else(|| AgentDescriptor::unlisted(id)),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for AgentCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn bundled_profiles() -> HashMap<String, AgentProfile> {
    serde_json::from_str(BUNDLED_PROFILES).unwrap_or_else(|e| {
        warn!(error = %e, "Bundled agent profiles are malformed, serving none");
        HashMap::new()
    })
}
