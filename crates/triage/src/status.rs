//! Per-agent status summaries and alert counts.

use serde::Serialize;
use serde_json::{json, Value};

use crate::agents::{AgentDescriptor, Domain};
use crate::cron::{CronJob, RunSummary};
use crate::model::{CanonicalReport, Level, ResolvedReport, Source};
use crate::report::number;
use crate::resolver::{AlertFeed, FeedAlert};

const NO_DATA: &str = "no data";

/// One headline figure on an agent card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickStat {
    pub label: &'static str,
    pub value: Value,
}

impl QuickStat {
    fn new(label: &'static str, value: impl Into<Value>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

/// Summary card for one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub id: String,
    pub emoji: String,
    pub name: String,
    pub role: String,
    pub schedule: String,
    pub severity: String,
    pub quick_stats: Vec<QuickStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Scheduler state of the agent's job
    #[serde(flatten)]
    pub run: RunSummary,
}

impl AgentStatus {
    /// Summarize an agent from its latest report and scheduler job, if any.
    ///
    /// `primary_school` picks the school shown on local search cards.
    #[must_use]
    pub fn new(
        agent: &AgentDescriptor,
        report: Option<&ResolvedReport>,
        job: Option<&CronJob>,
        primary_school: &str,
    ) -> Self {
        let (severity, quick_stats, source) = match report {
            Some(resolved) => (
                resolved.report.severity.clone(),
                quick_stats(agent.domain, &resolved.report, primary_school),
                Some(resolved.source),
            ),
            None => (NO_DATA.to_string(), Vec::new(), None),
        };

        Self {
            id: agent.id.clone(),
            emoji: agent.emoji.clone(),
            name: agent.name.clone(),
            role: agent.role.clone(),
            schedule: agent.schedule.clone(),
            severity,
            quick_stats,
            source,
            run: RunSummary::for_job(job),
        }
    }
}

/// Headline figures for a report, chosen by the agent's domain.
#[must_use]
pub fn quick_stats(domain: Domain, report: &CanonicalReport, primary_school: &str) -> Vec<QuickStat> {
    let alerts = QuickStat::new("Alerts", report.alerts.len());

    match domain {
        Domain::AdSpend => {
            let schools = report
                .spend()
                .and_then(Value::as_object)
                .into_iter()
                .flat_map(|spend| spend.values())
                .filter_map(Value::as_object);
            let (spend, conversions) = schools.fold((0.0, 0.0), |(spend, conv), school| {
                (
                    spend + number(school, "weekly_spend").unwrap_or(0.0),
                    conv + number(school, "conversions").unwrap_or(0.0),
                )
            });
            vec![
                QuickStat::new("Spend (7d)", format!("${spend:.0}")),
                QuickStat::new("Conversions", whole_or_fraction(conversions)),
                alerts,
            ]
        }
        Domain::SearchIntel => {
            let tracked: usize = report
                .keywords()
                .and_then(Value::as_object)
                .map(|kw| kw.values().filter_map(Value::as_array).map(Vec::len).sum())
                .unwrap_or(0);
            vec![QuickStat::new("Keywords Tracked", tracked), alerts]
        }
        Domain::LocalSearch => {
            let school = report.metrics().and_then(|m| m.get(primary_school));
            let figure = |key: &str| {
                school
                    .and_then(|s| s.get(key))
                    .cloned()
                    .unwrap_or_else(|| json!("?"))
            };
            vec![
                QuickStat::new("Pages Live", figure("pages_live")),
                QuickStat::new("Indexed", figure("pages_indexed")),
                alerts,
            ]
        }
        Domain::Analytics => vec![alerts],
        Domain::Reputation | Domain::General => {
            vec![QuickStat::new("Severity", report.severity.clone())]
        }
    }
}

fn whole_or_fraction(value: f64) -> Value {
    if value.fract().abs() < f64::EPSILON && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Active alerts with per-level counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCounts {
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
    pub alerts: Vec<FeedAlert>,
    pub source: Source,
}

impl From<AlertFeed> for AlertCounts {
    fn from(feed: AlertFeed) -> Self {
        let count = |level: &Level| feed.alerts.iter().filter(|a| &a.alert.level == level).count();

        Self {
            red: count(&Level::Red),
            yellow: count(&Level::Yellow),
            green: count(&Level::Green),
            alerts: feed.alerts,
            source: feed.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentCatalog;
    use crate::cron::CronState;
    use crate::model::RawAlert;
    use crate::sample::SampleData;

    fn sample(agent: &str) -> CanonicalReport {
        SampleData::bundled().report(agent).unwrap()
    }

    fn stat<'a>(stats: &'a [QuickStat], label: &str) -> &'a Value {
        &stats.iter().find(|s| s.label == label).unwrap().value
    }

    #[test]
    fn test_ad_spend_stats_sum_across_schools() {
        let stats = quick_stats(Domain::AdSpend, &sample("annunci"), "beibei");
        assert_eq!(stat(&stats, "Spend (7d)"), &json!("$910"));
        assert_eq!(stat(&stats, "Conversions"), &json!(10));
        assert_eq!(stat(&stats, "Alerts"), &json!(3));
    }

    #[test]
    fn test_search_intel_counts_all_keywords() {
        let stats = quick_stats(Domain::SearchIntel, &sample("spia"), "beibei");
        assert_eq!(stat(&stats, "Keywords Tracked"), &json!(5));
    }

    #[test]
    fn test_local_search_uses_primary_school() {
        let stats = quick_stats(Domain::LocalSearch, &sample("zona"), "beibei");
        assert_eq!(stat(&stats, "Pages Live"), &json!(24));
        assert_eq!(stat(&stats, "Indexed"), &json!(6));

        let stats = quick_stats(Domain::LocalSearch, &sample("zona"), "elsewhere");
        assert_eq!(stat(&stats, "Pages Live"), &json!("?"));
    }

    #[test]
    fn test_other_domains_show_severity() {
        let stats = quick_stats(Domain::Reputation, &sample("stella"), "beibei");
        assert_eq!(stats, vec![QuickStat::new("Severity", "green")]);
    }

    #[test]
    fn test_agent_without_report() {
        let agent = AgentCatalog::builtin().resolve("lettera").unwrap();
        let status = AgentStatus::new(&agent, None, None, "beibei");
        assert_eq!(status.severity, "no data");
        assert!(status.quick_stats.is_empty());
        assert_eq!(status.emoji, "💌");
        assert!(!status.run.enabled);
        assert_eq!(status.run.next_run, "Never");
    }

    #[test]
    fn test_card_carries_job_state() {
        let agent = AgentCatalog::builtin().get("zona").cloned().unwrap();
        let job = CronJob {
            name: agent.cron_name.clone(),
            enabled: true,
            state: CronState {
                last_run_at_ms: Some(1_770_131_700_000),
                last_status: Some("error".to_string()),
                last_duration_ms: Some(77_300.0),
                consecutive_errors: 2,
                ..CronState::default()
            },
            ..CronJob::default()
        };

        let json = serde_json::to_value(AgentStatus::new(&agent, None, Some(&job), "beibei")).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["lastRun"], "2026-02-03 15:15 UTC");
        assert_eq!(json["lastStatus"], "error");
        assert_eq!(json["lastDuration"], "77.3s");
        assert_eq!(json["nextRun"], "Never");
        assert_eq!(json["consecutiveErrors"], 2);
        assert_eq!(json["quick_stats"], json!([]));
    }

    #[test]
    fn test_alert_counts_ignore_unknown_levels() {
        let alert = |level: &str| FeedAlert {
            agent: "zona".to_string(),
            alert: RawAlert {
                level: Level::parse(level),
                ..RawAlert::default()
            },
        };
        let counts = AlertCounts::from(AlertFeed {
            alerts: vec![alert("RED"), alert("red"), alert("Green"), alert("purple")],
            source: Source::Local,
        });
        assert_eq!((counts.red, counts.yellow, counts.green), (2, 0, 1));
        assert_eq!(counts.alerts.len(), 4);
    }
}
