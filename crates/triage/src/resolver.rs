//! Source resolver: remote store, then local report files, then sample data.
//!
//! Remote failures of any kind mean "unavailable" and fall through to the next
//! tier. Nothing in here returns an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::agents::{is_valid_agent_id, AgentCatalog, AgentDescriptor};
use crate::config::{ReadPolicy, Tables};
use crate::local::ReportFiles;
use crate::model::{EnrichedAlert, RawAlert, ResolvedReport, Source};
use crate::report::{alert_from_value, enriched_from_row, report_from_row};
use crate::sample::SampleData;
use crate::store::{RemoteStore, RowQuery};

const BULK_REPORT_LIMIT: usize = 50;
const ALERT_FEED_LIMIT: usize = 200;
const ACTIVE: &str = "active";

/// A raw alert tagged with the agent that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedAlert {
    pub agent: String,
    #[serde(flatten)]
    pub alert: RawAlert,
}

/// Active alerts and the tier that served them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertFeed {
    pub alerts: Vec<FeedAlert>,
    pub source: Source,
}

/// Reads reports and alerts through the tier chain.
#[derive(Clone)]
pub struct SourceResolver {
    catalog: AgentCatalog,
    files: ReportFiles,
    sample: Arc<SampleData>,
    remote: Option<Arc<dyn RemoteStore>>,
    tables: Tables,
    policy: ReadPolicy,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("agents", &self.catalog.len())
            .field("files", &self.files)
            .field("remote", &self.remote.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SourceResolver {
    pub fn new(catalog: AgentCatalog, files: ReportFiles, sample: Arc<SampleData>) -> Self {
        Self {
            catalog,
            files,
            sample,
            remote: None,
            tables: Tables::default(),
            policy: ReadPolicy::default(),
        }
    }

    /// Attach a remote store and its table names.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>, tables: Tables) -> Self {
        self.remote = Some(remote);
        self.tables = tables;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    #[must_use]
    pub fn sample(&self) -> &SampleData {
        &self.sample
    }

    /// Whether reads will try the remote store at all.
    #[must_use]
    pub fn reads_remote(&self) -> bool {
        self.remote.is_some() && self.policy == ReadPolicy::PreferRemote
    }

    /// Read rows from a remote table, honoring the read policy.
    ///
    /// `None` means the remote tier is skipped or unavailable.
    pub async fn read_rows(&self, table: &str, query: &RowQuery) -> Option<Vec<Value>> {
        if self.policy == ReadPolicy::LocalOnly {
            return None;
        }
        let remote = self.remote.as_ref()?;

        match remote.select(table, query).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(table, error = %e, "Remote store unavailable, falling back");
                None
            }
        }
    }

    /// Latest report for one agent from the first tier that has one.
    ///
    /// Malformed ids have no report in any tier.
    pub async fn latest_report(&self, agent_id: &str) -> Option<ResolvedReport> {
        if !is_valid_agent_id(agent_id) {
            warn!(agent = agent_id, "Refusing malformed agent id");
            return None;
        }

        let query = RowQuery::new()
            .eq("agent", agent_id)
            .newest_first("date")
            .limit(1);

        if let Some(rows) = self.read_rows(&self.tables.reports, &query).await {
            if let Some(report) = rows.iter().find_map(report_from_row) {
                return Some(ResolvedReport {
                    report,
                    source: Source::Remote,
                });
            }
            debug!(agent = agent_id, "No remote report, trying local files");
        }

        let agent = self.catalog.resolve(agent_id)?;
        self.local_report(&agent).await
    }

    /// Latest report from local files or sample data, skipping the remote tier.
    pub async fn local_report(&self, agent: &AgentDescriptor) -> Option<ResolvedReport> {
        if let Some(report) = self.files.read_report(agent).await {
            return Some(ResolvedReport {
                report,
                source: Source::Local,
            });
        }

        debug!(agent = %agent.id, "No local report, trying sample data");
        self.sample.report(&agent.id).map(|report| ResolvedReport {
            report,
            source: Source::Sample,
        })
    }

    /// Latest report for every agent.
    ///
    /// One remote query serves all agents when it returns anything; otherwise
    /// each catalog agent is resolved from local files or sample data, in
    /// catalog order.
    pub async fn latest_reports(&self) -> Vec<ResolvedReport> {
        let reports = self.remote_latest().await;
        if !reports.is_empty() {
            return reports;
        }

        let mut reports = Vec::new();
        for agent in self.catalog.iter() {
            if let Some(report) = self.local_report(agent).await {
                reports.push(report);
            }
        }
        reports
    }

    /// Latest report per agent id from a single remote query, with every
    /// catalog agent the remote store did not cover filled in from local
    /// files or sample data.
    pub async fn reports_by_agent(&self) -> HashMap<String, ResolvedReport> {
        let mut by_agent: HashMap<String, ResolvedReport> = self
            .remote_latest()
            .await
            .into_iter()
            .map(|resolved| (resolved.report.agent_id.clone(), resolved))
            .collect();

        for agent in self.catalog.iter() {
            if by_agent.contains_key(&agent.id) {
                continue;
            }
            if let Some(report) = self.local_report(agent).await {
                by_agent.insert(agent.id.clone(), report);
            }
        }
        by_agent
    }

    /// Newest remote report per agent, first row wins. Empty when the remote
    /// tier is skipped, unavailable or has no reports.
    async fn remote_latest(&self) -> Vec<ResolvedReport> {
        let query = RowQuery::new()
            .newest_first("date")
            .limit(BULK_REPORT_LIMIT);

        let Some(rows) = self.read_rows(&self.tables.reports, &query).await else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let reports: Vec<ResolvedReport> = rows
            .iter()
            .filter_map(report_from_row)
            .filter(|report| seen.insert(report.agent_id.clone()))
            .map(|report| ResolvedReport {
                report,
                source: Source::Remote,
            })
            .collect();
        if reports.is_empty() {
            debug!("Remote store has no reports, trying local files");
        }
        reports
    }

    /// Currently active raw alerts.
    ///
    /// A reachable remote store is authoritative even when it has no active
    /// alerts.
    pub async fn active_alerts(&self) -> AlertFeed {
        if let Some(rows) = self.read_rows(&self.tables.alerts, &active_alerts_query()).await {
            let alerts = rows
                .iter()
                .map(|row| FeedAlert {
                    agent: row
                        .get("agent")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    alert: alert_from_value(row),
                })
                .collect();
            return AlertFeed {
                alerts,
                source: Source::Remote,
            };
        }

        let mut alerts = Vec::new();
        let mut source = Source::Sample;
        for agent in self.catalog.iter() {
            let Some(resolved) = self.local_report(agent).await else {
                continue;
            };
            if resolved.source == Source::Local {
                source = Source::Local;
            }
            alerts.extend(resolved.report.alerts.into_iter().map(|alert| FeedAlert {
                agent: agent.id.clone(),
                alert,
            }));
        }
        AlertFeed { alerts, source }
    }

    /// Pre-enriched active alerts from the remote store, unranked.
    pub async fn remote_detailed_alerts(&self) -> Option<Vec<EnrichedAlert>> {
        let rows = self
            .read_rows(&self.tables.alerts, &active_alerts_query())
            .await?;
        Some(rows.iter().map(enriched_from_row).collect())
    }
}

fn active_alerts_query() -> RowQuery {
    RowQuery::new()
        .eq("status", ACTIVE)
        .newest_first("created_at")
        .limit(ALERT_FEED_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store returning canned rows per table.
    #[derive(Default)]
    struct CannedStore {
        rows: Vec<(String, Vec<Value>)>,
        queries: Mutex<Vec<(String, RowQuery)>>,
    }

    impl CannedStore {
        fn with(mut self, table: &str, rows: Vec<Value>) -> Self {
            self.rows.push((table.to_string(), rows));
            self
        }
    }

    #[async_trait]
    impl RemoteStore for CannedStore {
        async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, StoreError> {
            self.queries
                .lock()
                .unwrap()
                .push((table.to_string(), query.clone()));
            Ok(self
                .rows
                .iter()
                .find(|(t, _)| t == table)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default())
        }

        async fn upsert(&self, _table: &str, _rows: &[Value]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct DownStore;

    #[async_trait]
    impl RemoteStore for DownStore {
        async fn select(&self, _table: &str, _query: &RowQuery) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        }

        async fn upsert(&self, _table: &str, _rows: &[Value]) -> Result<(), StoreError> {
            Err(StoreError::NotConfigured)
        }
    }

    fn resolver(reports_dir: &std::path::Path) -> SourceResolver {
        SourceResolver::new(
            AgentCatalog::builtin(),
            ReportFiles::new(reports_dir),
            Arc::new(SampleData::bundled()),
        )
    }

    #[tokio::test]
    async fn test_remote_row_wins_when_reachable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("zona-1.json"), r#"{"date": "local"}"#).unwrap();

        let store = CannedStore::default().with(
            "reports",
            vec![json!({"agent": "zona", "date": "2026-02-04", "alerts": "[]"})],
        );
        let resolver = resolver(dir.path()).with_remote(Arc::new(store), Tables::default());

        let resolved = resolver.latest_report("zona").await.unwrap();
        assert_eq!(resolved.source, Source::Remote);
        assert_eq!(resolved.report.date, "2026-02-04");
    }

    #[tokio::test]
    async fn test_unavailable_remote_falls_back_to_local() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("zona-1.json"), r#"{"date": "local"}"#).unwrap();

        let resolver = resolver(dir.path()).with_remote(Arc::new(DownStore), Tables::default());
        let resolved = resolver.latest_report("zona").await.unwrap();
        assert_eq!(resolved.source, Source::Local);
        assert_eq!(resolved.report.date, "local");
    }

    #[tokio::test]
    async fn test_empty_remote_and_no_files_uses_sample() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(dir.path())
            .with_remote(Arc::new(CannedStore::default()), Tables::default());

        let resolved = resolver.latest_report("annunci").await.unwrap();
        assert_eq!(resolved.source, Source::Sample);
        assert!(resolver.latest_report("lettera").await.is_none());
    }

    #[tokio::test]
    async fn test_local_only_policy_never_queries_remote() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            CannedStore::default().with("reports", vec![json!({"agent": "annunci"})]),
        );
        let resolver = resolver(dir.path())
            .with_remote(store.clone(), Tables::default())
            .with_policy(ReadPolicy::LocalOnly);

        assert!(!resolver.reads_remote());
        let resolved = resolver.latest_report("annunci").await.unwrap();
        assert_eq!(resolved.source, Source::Sample);
        assert!(store.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_remote_keeps_first_row_per_agent() {
        let dir = TempDir::new().unwrap();
        let store = CannedStore::default().with(
            "reports",
            vec![
                json!({"agent": "annunci", "date": "2026-02-04"}),
                json!({"agent": "bussola", "date": "2026-02-04"}),
                json!({"agent": "annunci", "date": "2026-02-03"}),
                json!({"date": "2026-02-03"}),
            ],
        );
        let resolver = resolver(dir.path()).with_remote(Arc::new(store), Tables::default());

        let reports = resolver.latest_reports().await;
        let agents: Vec<_> = reports.iter().map(|r| r.report.agent_id.as_str()).collect();
        assert_eq!(agents, vec!["annunci", "bussola"]);
        assert_eq!(reports[0].report.date, "2026-02-04");
    }

    #[tokio::test]
    async fn test_reports_by_agent_issues_one_remote_query() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CannedStore::default().with(
            "reports",
            vec![json!({"agent": "annunci", "date": "2026-02-04"})],
        ));
        let resolver = resolver(dir.path()).with_remote(store.clone(), Tables::default());

        let reports = resolver.reports_by_agent().await;
        assert_eq!(reports["annunci"].source, Source::Remote);
        assert_eq!(reports["bussola"].source, Source::Sample);
        assert!(!reports.contains_key("lettera"));
        assert_eq!(store.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_agent_id_has_no_report() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("private")).unwrap();
        std::fs::write(dir.path().join("private/creds.json"), r#"{"summary": "secret"}"#).unwrap();
        let store = Arc::new(CannedStore::default());
        let resolver = resolver(&dir.path().join("reports"))
            .with_remote(store.clone(), Tables::default());

        assert!(resolver.latest_report("../private").await.is_none());
        assert!(store.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_fallback_follows_catalog_order() {
        let dir = TempDir::new().unwrap();
        let reports = resolver(dir.path()).latest_reports().await;
        let agents: Vec<_> = reports.iter().map(|r| r.report.agent_id.as_str()).collect();
        assert_eq!(agents, vec!["annunci", "bussola", "spia", "stella", "zona"]);
    }

    #[tokio::test]
    async fn test_empty_remote_alert_feed_is_authoritative() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CannedStore::default());
        let resolver = resolver(dir.path()).with_remote(store.clone(), Tables::with_prefix("acme_"));

        let feed = resolver.active_alerts().await;
        assert_eq!(feed.source, Source::Remote);
        assert!(feed.alerts.is_empty());

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries[0].0, "acme_alerts");
        assert!(queries[0]
            .1
            .to_params()
            .contains(&("status".to_string(), "eq.active".to_string())));
    }

    #[tokio::test]
    async fn test_fallback_alert_feed_tags_agents() {
        let dir = TempDir::new().unwrap();
        let feed = resolver(dir.path()).active_alerts().await;
        assert_eq!(feed.source, Source::Sample);
        assert!(feed
            .alerts
            .iter()
            .any(|a| a.agent == "zona" && a.alert.finding.contains("deindexed")));
    }
}
