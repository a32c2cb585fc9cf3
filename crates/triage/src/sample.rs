//! Bundled sample data, the last tier of the fallback chain.
//!
//! Loaded once at startup and shared read-only for the life of the process.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::cron::{parse_jobs, CronJob};
use crate::model::{Approval, CanonicalReport};
use crate::report::report_from_document;

const BUNDLED_REPORTS: &str = include_str!("../data/sample_reports.json");
const BUNDLED_CRON: &str = include_str!("../data/sample_cron.json");

const REPORTS_FILE: &str = "sample_reports.json";
const APPROVALS_FILE: &str = "approvals.json";
const CRON_FILE: &str = "sample_cron.json";

/// Static per-agent sample documents, sample approvals and sample scheduler
/// jobs.
#[derive(Debug, Clone, Default)]
pub struct SampleData {
    reports: HashMap<String, Value>,
    approvals: Vec<Approval>,
    cron: Vec<CronJob>,
}

impl SampleData {
    /// Load from `sample_dir`, falling back to the copy compiled into the
    /// binary when `sample_reports.json` is missing or unreadable.
    pub async fn load(sample_dir: &Path) -> Self {
        let reports_path = sample_dir.join(REPORTS_FILE);
        let reports = match read_json(&reports_path).await {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(_) => {
                warn!(path = %reports_path.display(), "Sample reports are not a JSON object, using bundled copy");
                bundled_reports()
            }
            None => bundled_reports(),
        };

        let approvals_path = sample_dir.join(APPROVALS_FILE);
        let approvals = match read_json(&approvals_path).await {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(path = %approvals_path.display(), error = %e, "Ignoring malformed sample approvals");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let cron_path = sample_dir.join(CRON_FILE);
        let cron = match fs::read_to_string(&cron_path).await {
            Ok(content) => parse_jobs(&content).unwrap_or_else(|e| {
                warn!(path = %cron_path.display(), error = %e, "Malformed sample jobs, using bundled copy");
                bundled_cron()
            }),
            Err(_) => bundled_cron(),
        };

        debug!(
            reports = reports.len(),
            approvals = approvals.len(),
            jobs = cron.len(),
            "Loaded sample data"
        );
        Self {
            reports,
            approvals,
            cron,
        }
    }

    /// Only the sample reports and jobs compiled into the binary.
    #[must_use]
    pub fn bundled() -> Self {
        Self {
            reports: bundled_reports(),
            approvals: Vec::new(),
            cron: bundled_cron(),
        }
    }

    /// Sample data with nothing in it.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Canonical sample report for an agent.
    #[must_use]
    pub fn report(&self, agent_id: &str) -> Option<CanonicalReport> {
        self.reports
            .get(agent_id)
            .and_then(|doc| report_from_document(agent_id, doc))
    }

    #[must_use]
    pub fn approvals(&self) -> &[Approval] {
        &self.approvals
    }

    /// Scheduler jobs shown when the real jobs file is unavailable.
    #[must_use]
    pub fn cron_jobs(&self) -> &[CronJob] {
        &self.cron
    }
}

fn bundled_reports() -> HashMap<String, Value> {
    match serde_json::from_str::<Value>(BUNDLED_REPORTS) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

fn bundled_cron() -> Vec<CronJob> {
    parse_jobs(BUNDLED_CRON).unwrap_or_else(|e| {
        warn!(error = %e, "Bundled sample jobs are malformed");
        Vec::new()
    })
}

async fn read_json(path: &Path) -> Option<Value> {
    let content = fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed sample file");
            None
        }
    }
}
