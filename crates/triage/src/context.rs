//! Shared triage context.
//!
//! Built once at startup and shared by the CLI and HTTP handlers.

use std::sync::Arc;

use notify::Notifier;
use tracing::{debug, info};

use crate::agents::{is_valid_agent_id, AgentCatalog};
use crate::config::TriageConfig;
use crate::cron::{self, CronJob, JobStatus};
use crate::enrich::enrich_report;
use crate::error::{Result, TriageError};
use crate::leads::{Lead, LeadBook, LeadInput};
use crate::ledger::{ApprovalLedger, ApprovalList};
use crate::local::{JsonLog, ReportFiles};
use crate::metrics::{school_metrics, SchoolMetrics};
use crate::model::{Approval, ApprovalInput, EnrichedAlert, ResolvedReport};
use crate::ranking::ranked;
use crate::resolver::SourceResolver;
use crate::sample::SampleData;
use crate::status::{AgentStatus, AlertCounts};
use crate::store::{RemoteStore, RestStore};

/// Everything a query or approval needs, wired from configuration.
#[derive(Clone)]
pub struct Triage {
    config: Arc<TriageConfig>,
    resolver: SourceResolver,
    ledger: ApprovalLedger,
    leads: LeadBook,
}

impl Triage {
    /// Wire components from configuration, loading sample data from disk and
    /// connecting to the remote store when one is configured.
    pub async fn from_config(config: TriageConfig, notifier: Arc<Notifier>) -> Result<Self> {
        let sample = SampleData::load(&config.sample_dir).await;
        let remote = match &config.remote {
            Some(remote) => {
                info!(url = %remote.base_url, "Remote store configured");
                Some(Arc::new(RestStore::new(remote)?) as Arc<dyn RemoteStore>)
            }
            None => {
                info!("No remote store configured, using local data only");
                None
            }
        };
        Ok(Self::new(config, sample, remote, notifier))
    }

    /// Wire components from already-built parts.
    pub fn new(
        config: TriageConfig,
        sample: SampleData,
        remote: Option<Arc<dyn RemoteStore>>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let sample = Arc::new(sample);
        let tables = config
            .remote
            .as_ref()
            .map(|r| r.tables.clone())
            .unwrap_or_default();

        let mut resolver = SourceResolver::new(
            AgentCatalog::builtin(),
            ReportFiles::new(&config.reports_dir),
            Arc::clone(&sample),
        )
        .with_policy(config.read_policy);
        let mut ledger = ApprovalLedger::new(JsonLog::new(config.approvals_file()), Arc::clone(&sample))
            .with_policy(config.read_policy);

        if let Some(remote) = remote {
            ledger = ledger.with_mirror(Arc::clone(&remote), &tables.actions);
            resolver = resolver.with_remote(remote, tables);
        }

        let leads = LeadBook::new(JsonLog::new(&config.leads_file), notifier);

        Self {
            config: Arc::new(config),
            resolver,
            ledger,
            leads,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    #[must_use]
    pub fn catalog(&self) -> &AgentCatalog {
        self.resolver.catalog()
    }

    /// Status card for every catalog agent.
    ///
    /// Reports come from one bulk read rather than a remote query per agent.
    pub async fn agent_statuses(&self) -> Vec<AgentStatus> {
        let primary_school = self
            .config
            .schools
            .first()
            .map_or("", String::as_str);

        let reports = self.resolver.reports_by_agent().await;
        let jobs = self.cron_jobs().await;
        let job_named = cron::by_name(&jobs);

        self.catalog()
            .iter()
            .map(|agent| {
                let job = job_named
                    .get(agent.cron_name.as_str())
                    .copied()
                    .filter(|_| !agent.cron_name.is_empty());
                AgentStatus::new(agent, reports.get(&agent.id), job, primary_school)
            })
            .collect()
    }

    /// Latest report for one agent.
    pub async fn agent_report(&self, agent_id: &str) -> Result<ResolvedReport> {
        if !is_valid_agent_id(agent_id) {
            return Err(TriageError::InvalidAgent {
                agent: agent_id.to_string(),
            });
        }

        self.resolver
            .latest_report(agent_id)
            .await
            .ok_or_else(|| TriageError::NoData {
                agent: agent_id.to_string(),
            })
    }

    pub async fn latest_reports(&self) -> Vec<ResolvedReport> {
        self.resolver.latest_reports().await
    }

    pub async fn alert_counts(&self) -> AlertCounts {
        AlertCounts::from(self.resolver.active_alerts().await)
    }

    /// Enriched active alerts in presentation order.
    pub async fn detailed_alerts(&self) -> Vec<EnrichedAlert> {
        if let Some(alerts) = self.resolver.remote_detailed_alerts().await {
            debug!(count = alerts.len(), "Serving pre-enriched remote alerts");
            return ranked(alerts);
        }

        let mut alerts = Vec::new();
        for agent in self.catalog().iter() {
            if let Some(resolved) = self.resolver.local_report(agent).await {
                alerts.extend(enrich_report(agent, &resolved.report));
            }
        }
        ranked(alerts)
    }

    /// Scheduler jobs from the jobs file, or the sample jobs when it is
    /// missing or unreadable.
    pub async fn cron_jobs(&self) -> Vec<CronJob> {
        match cron::read_jobs(&self.config.cron_file).await {
            Some(jobs) => jobs,
            None => {
                debug!("Serving sample scheduler jobs");
                self.resolver.sample().cron_jobs().to_vec()
            }
        }
    }

    pub async fn cron_statuses(&self) -> Vec<JobStatus> {
        self.cron_jobs().await.iter().map(JobStatus::from).collect()
    }

    pub async fn record_approval(&self, input: ApprovalInput) -> Result<Approval> {
        self.ledger.record(input).await
    }

    pub async fn approvals(&self) -> ApprovalList {
        self.ledger.list_approvals().await
    }

    pub async fn metrics(&self) -> SchoolMetrics {
        school_metrics(&self.resolver, &self.config.schools).await
    }

    pub async fn record_lead(&self, input: LeadInput) -> Result<Lead> {
        self.leads.record(input).await
    }

    pub async fn leads(&self) -> Result<Vec<Lead>> {
        self.leads.list().await
    }
}
