//! Runtime configuration, read once at startup.
//!
//! Every setting comes from the environment with a sensible default; the CLI
//! overrides individual fields after loading.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;

const ENV_REPORTS_DIR: &str = "TRIAGE_REPORTS_DIR";
const ENV_SAMPLE_DIR: &str = "TRIAGE_SAMPLE_DIR";
const ENV_DATA_DIR: &str = "TRIAGE_DATA_DIR";
const ENV_LEADS_FILE: &str = "TRIAGE_LEADS_FILE";
const ENV_CRON_FILE: &str = "TRIAGE_CRON_FILE";
const ENV_READ_POLICY: &str = "TRIAGE_READ_POLICY";
const ENV_SCHOOLS: &str = "TRIAGE_SCHOOLS";
const ENV_REMOTE_URL: &str = "REMOTE_STORE_URL";
const ENV_REMOTE_KEY: &str = "REMOTE_STORE_KEY";
const ENV_REMOTE_TIMEOUT: &str = "REMOTE_STORE_TIMEOUT_SECS";
const ENV_TABLE_PREFIX: &str = "REMOTE_STORE_TABLE_PREFIX";

/// Default timeout for remote store calls.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Schools reported on when `TRIAGE_SCHOOLS` is unset.
const DEFAULT_SCHOOLS: &[&str] = &["beibei", "amici"];

/// Which backend read paths consult.
///
/// Writes are always local-first; this only decides whether reads try the
/// remote mirror before local data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadPolicy {
    /// Read the remote store when reachable, otherwise local data
    #[default]
    PreferRemote,
    /// Never read the remote store
    LocalOnly,
}

impl FromStr for ReadPolicy {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefer-remote" | "remote" => Ok(Self::PreferRemote),
            "local-only" | "local" => Ok(Self::LocalOnly),
            other => Err(TriageError::Config(format!(
                "unknown read policy '{other}' (expected prefer-remote or local-only)"
            ))),
        }
    }
}

/// Logical tables in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub reports: String,
    pub alerts: String,
    pub actions: String,
    pub metrics: String,
}

impl Tables {
    /// Table names with a shared prefix (e.g. `acme_reports`).
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            reports: format!("{prefix}reports"),
            alerts: format!("{prefix}alerts"),
            actions: format!("{prefix}actions"),
            metrics: format!("{prefix}metrics"),
        }
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::with_prefix("")
    }
}

/// Connection settings for the remote store.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, without the `/rest/v1` suffix
    pub base_url: String,
    /// Service key sent as `apikey` and bearer token
    pub service_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Table names
    pub tables: Tables,
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Directory the upstream monitors write report files into
    pub reports_dir: PathBuf,
    /// Directory holding `sample_reports.json` and `sample_cron.json`
    pub sample_dir: PathBuf,
    /// Directory holding the approval log
    pub data_dir: PathBuf,
    /// Lead capture log
    pub leads_file: PathBuf,
    /// Jobs file maintained by the scheduler that runs the agents
    pub cron_file: PathBuf,
    /// Remote store, when both URL and key are configured
    pub remote: Option<RemoteConfig>,
    /// Read-path backend preference
    pub read_policy: ReadPolicy,
    /// Schools covered by the metrics overview
    pub schools: Vec<String>,
}

impl TriageConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, TriageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TriageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = var("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
        let reports_dir = var(ENV_REPORTS_DIR).map_or_else(|| home.join("reports"), PathBuf::from);
        let sample_dir = var(ENV_SAMPLE_DIR).map_or_else(|| PathBuf::from("data"), PathBuf::from);
        let data_dir = var(ENV_DATA_DIR).map_or_else(|| home.join(".triage"), PathBuf::from);
        let leads_file = var(ENV_LEADS_FILE).map_or_else(|| data_dir.join("leads.json"), PathBuf::from);
        let cron_file = var(ENV_CRON_FILE)
            .map_or_else(|| home.join(".openclaw").join("cron").join("jobs.json"), PathBuf::from);

        let read_policy = match var(ENV_READ_POLICY) {
            Some(raw) => raw.parse()?,
            None => ReadPolicy::default(),
        };

        let timeout_secs = match var(ENV_REMOTE_TIMEOUT) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                TriageError::Config(format!("{ENV_REMOTE_TIMEOUT} must be a number, got '{raw}'"))
            })?,
            None => DEFAULT_REMOTE_TIMEOUT_SECS,
        };

        let remote = match (var(ENV_REMOTE_URL), var(ENV_REMOTE_KEY)) {
            (Some(url), Some(key)) => Some(RemoteConfig {
                base_url: url.trim_end_matches('/').to_string(),
                service_key: key,
                timeout_secs,
                tables: Tables::with_prefix(&var(ENV_TABLE_PREFIX).unwrap_or_default()),
            }),
            _ => None,
        };

        let schools = var(ENV_SCHOOLS).map_or_else(
            || DEFAULT_SCHOOLS.iter().map(ToString::to_string).collect(),
            |raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            },
        );

        Ok(Self {
            reports_dir,
            sample_dir,
            data_dir,
            leads_file,
            cron_file,
            remote,
            read_policy,
            schools,
        })
    }

    /// Path of the local approval log.
    #[must_use]
    pub fn approvals_file(&self) -> PathBuf {
        self.data_dir.join("approvals.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<TriageConfig, TriageError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        TriageConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("HOME", "/home/ops")]).unwrap();
        assert_eq!(config.reports_dir, PathBuf::from("/home/ops/reports"));
        assert_eq!(
            config.approvals_file(),
            PathBuf::from("/home/ops/.triage/approvals.json")
        );
        assert_eq!(
            config.cron_file,
            PathBuf::from("/home/ops/.openclaw/cron/jobs.json")
        );
        assert!(config.remote.is_none());
        assert_eq!(config.read_policy, ReadPolicy::PreferRemote);
        assert_eq!(config.schools, vec!["beibei", "amici"]);
    }

    #[test]
    fn test_remote_requires_url_and_key() {
        let config = load(&[(ENV_REMOTE_URL, "https://store.example/")]).unwrap();
        assert!(config.remote.is_none());

        let config = load(&[
            (ENV_REMOTE_URL, "https://store.example/"),
            (ENV_REMOTE_KEY, "secret"),
            (ENV_TABLE_PREFIX, "acme_"),
        ])
        .unwrap();
        let remote = config.remote.unwrap();
        assert_eq!(remote.base_url, "https://store.example");
        assert_eq!(remote.timeout_secs, DEFAULT_REMOTE_TIMEOUT_SECS);
        assert_eq!(remote.tables.actions, "acme_actions");
    }

    #[test]
    fn test_read_policy_parsing() {
        let config = load(&[(ENV_READ_POLICY, "local-only")]).unwrap();
        assert_eq!(config.read_policy, ReadPolicy::LocalOnly);

        assert!(load(&[(ENV_READ_POLICY, "sometimes")]).is_err());
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let err = load(&[(ENV_REMOTE_TIMEOUT, "soon")]).unwrap_err();
        assert!(err.to_string().contains(ENV_REMOTE_TIMEOUT));
    }

    #[test]
    fn test_cron_file_override() {
        let config = load(&[(ENV_CRON_FILE, "/srv/scheduler/jobs.json")]).unwrap();
        assert_eq!(config.cron_file, PathBuf::from("/srv/scheduler/jobs.json"));
    }

    #[test]
    fn test_school_list() {
        let config = load(&[(ENV_SCHOOLS, "north, south,,")]).unwrap();
        assert_eq!(config.schools, vec!["north", "south"]);
    }
}
