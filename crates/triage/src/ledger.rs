//! Approval ledger.
//!
//! Approvals are appended to a local JSON log, which is authoritative, and
//! then mirrored to the remote `actions` table on a best-effort basis.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::ReadPolicy;
use crate::error;
use crate::local::JsonLog;
use crate::model::{Approval, ApprovalInput, Source, APPROVED};
use crate::report::{decode_json_field, display_value};
use crate::sample::SampleData;
use crate::store::{RemoteStore, RowQuery};

const DEFAULT_APPROVER: &str = "client";
const ACTION_LIST_LIMIT: usize = 200;

/// Approvals and the tier that served them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalList {
    pub approvals: Vec<Approval>,
    pub source: Source,
}

/// Append-only record of human approvals.
#[derive(Clone)]
pub struct ApprovalLedger {
    log: JsonLog<Approval>,
    sample: Arc<SampleData>,
    mirror: Option<(Arc<dyn RemoteStore>, String)>,
    policy: ReadPolicy,
}

impl std::fmt::Debug for ApprovalLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalLedger")
            .field("log", &self.log.path())
            .field("mirror", &self.mirror.as_ref().map(|(_, table)| table))
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ApprovalLedger {
    pub fn new(log: JsonLog<Approval>, sample: Arc<SampleData>) -> Self {
        Self {
            log,
            sample,
            mirror: None,
            policy: ReadPolicy::default(),
        }
    }

    /// Mirror approvals into `actions_table` of a remote store.
    #[must_use]
    pub fn with_mirror(mut self, remote: Arc<dyn RemoteStore>, actions_table: &str) -> Self {
        self.mirror = Some((remote, actions_table.to_string()));
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record an approval.
    ///
    /// Fails only when the local log cannot be written.
    pub async fn record(&self, input: ApprovalInput) -> error::Result<Approval> {
        let approval = approval_from_input(input);

        self.log.append(approval.clone()).await?;
        info!(
            alert_id = %approval.alert_id,
            fix_action = %approval.fix_action,
            school = %approval.school,
            approved_by = %approval.approved_by,
            "Approval recorded"
        );

        if let Some((remote, table)) = &self.mirror {
            match remote.upsert(table, &[action_row(&approval)]).await {
                Ok(()) => debug!(alert_id = %approval.alert_id, table, "Approval mirrored"),
                Err(e) => warn!(
                    alert_id = %approval.alert_id,
                    table,
                    error = %e,
                    "Failed to mirror approval, local log is authoritative"
                ),
            }
        }

        Ok(approval)
    }

    /// Every approval, newest source first: the remote mirror when readable,
    /// then the local log, then sample approvals.
    pub async fn list_approvals(&self) -> ApprovalList {
        if let Some(approvals) = self.remote_approvals().await {
            return ApprovalList {
                approvals,
                source: Source::Remote,
            };
        }

        match self.log.read().await {
            Ok(Some(approvals)) => ApprovalList {
                approvals,
                source: Source::Local,
            },
            Ok(None) => self.sample_approvals(),
            Err(e) => {
                warn!(error = %e, "Approval log unreadable, serving sample approvals");
                self.sample_approvals()
            }
        }
    }

    async fn remote_approvals(&self) -> Option<Vec<Approval>> {
        if self.policy == ReadPolicy::LocalOnly {
            return None;
        }
        let (remote, table) = self.mirror.as_ref()?;
        let query = RowQuery::new()
            .newest_first("created_at")
            .limit(ACTION_LIST_LIMIT);

        match remote.select(table, &query).await {
            Ok(rows) => Some(rows.iter().filter_map(approval_from_action).collect()),
            Err(e) => {
                warn!(table, error = %e, "Remote approvals unavailable, reading local log");
                None
            }
        }
    }

    fn sample_approvals(&self) -> ApprovalList {
        ApprovalList {
            approvals: self.sample.approvals().to_vec(),
            source: Source::Sample,
        }
    }
}

/// Fill defaults and stamp a caller-supplied approval.
#[must_use]
pub fn approval_from_input(input: ApprovalInput) -> Approval {
    Approval {
        alert_id: input.alert_id.unwrap_or_default(),
        fix_action: input.fix_action.unwrap_or_default(),
        school: input.school.unwrap_or_default(),
        campaign: input.campaign.unwrap_or_default(),
        description: input.description.unwrap_or_default(),
        estimated_impact: input.estimated_impact.unwrap_or_default(),
        approved_by: input
            .approved_by
            .unwrap_or_else(|| DEFAULT_APPROVER.to_string()),
        timestamp: input
            .timestamp
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
        status: APPROVED.to_string(),
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Remote `actions` row for an approval.
#[must_use]
pub fn action_row(approval: &Approval) -> Value {
    let result = json!({
        "campaign": approval.campaign,
        "timestamp": approval.timestamp,
    });

    json!({
        "alert_id": approval.alert_id,
        "client_slug": or_default(&approval.school, "unknown"),
        "school": or_default(&approval.school, "unknown"),
        "agent": or_default(&approval.fix_action, "manual"),
        "action_type": or_default(&approval.fix_action, "manual_review"),
        "description": approval.description,
        "estimated_impact": approval.estimated_impact,
        "status": APPROVED,
        "approved_by": or_default(&approval.approved_by, DEFAULT_APPROVER),
        "result": result.to_string(),
    })
}

/// Map a remote `actions` row back to an approval.
fn approval_from_action(row: &Value) -> Option<Approval> {
    let obj = row.as_object()?;
    let field = |key: &str| obj.get(key).map(display_value).unwrap_or_default();

    let result = obj.get("result").map(decode_json_field);
    let result = result.as_ref().and_then(Value::as_object);
    let from_result = |key: &str| {
        result
            .and_then(|r: &Map<String, Value>| r.get(key))
            .map(display_value)
            .filter(|v| !v.is_empty())
    };

    Some(Approval {
        alert_id: field("alert_id"),
        fix_action: field("action_type"),
        school: field("school"),
        campaign: from_result("campaign").unwrap_or_default(),
        description: field("description"),
        estimated_impact: field("estimated_impact"),
        approved_by: field("approved_by"),
        timestamp: from_result("timestamp").unwrap_or_else(|| field("created_at")),
        status: field("status"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Remote store that records upserts and serves them back.
    #[derive(Default)]
    struct RecordingStore {
        rows: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl RemoteStore for RecordingStore {
        async fn select(&self, _table: &str, _query: &RowQuery) -> Result<Vec<Value>, StoreError> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn upsert(&self, _table: &str, rows: &[Value]) -> Result<(), StoreError> {
            self.rows.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RemoteStore for FailingStore {
        async fn select(&self, _table: &str, _query: &RowQuery) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::NotConfigured)
        }

        async fn upsert(&self, _table: &str, _rows: &[Value]) -> Result<(), StoreError> {
            Err(StoreError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    fn ledger(dir: &TempDir) -> ApprovalLedger {
        ApprovalLedger::new(
            JsonLog::new(dir.path().join("approvals.json")),
            Arc::new(SampleData::empty()),
        )
    }

    #[test]
    fn test_input_defaults() {
        let approval = approval_from_input(ApprovalInput::default());
        assert_eq!(approval.alert_id, "");
        assert_eq!(approval.approved_by, "client");
        assert_eq!(approval.status, "approved");
        assert!(chrono::DateTime::parse_from_rfc3339(&approval.timestamp).is_ok());

        let approval = approval_from_input(ApprovalInput {
            timestamp: Some("2026-02-02T10:00:00+00:00".to_string()),
            ..ApprovalInput::default()
        });
        assert_eq!(approval.timestamp, "2026-02-02T10:00:00+00:00");
    }

    #[test]
    fn test_action_row_shape() {
        let approval = approval_from_input(ApprovalInput {
            alert_id: Some("beibei-annunci-42".to_string()),
            fix_action: Some("pause_campaign".to_string()),
            school: Some("beibei".to_string()),
            campaign: Some("Beibei PMax".to_string()),
            ..ApprovalInput::default()
        });
        let row = action_row(&approval);
        assert_eq!(row["client_slug"], "beibei");
        assert_eq!(row["agent"], "pause_campaign");
        assert_eq!(row["action_type"], "pause_campaign");
        let result: Value = serde_json::from_str(row["result"].as_str().unwrap()).unwrap();
        assert_eq!(result["campaign"], "Beibei PMax");

        let row = action_row(&approval_from_input(ApprovalInput::default()));
        assert_eq!(row["school"], "unknown");
        assert_eq!(row["agent"], "manual");
        assert_eq!(row["action_type"], "manual_review");
    }

    #[tokio::test]
    async fn test_failed_mirror_keeps_local_record() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir).with_mirror(Arc::new(FailingStore), "actions");

        let approval = ledger
            .record(ApprovalInput {
                alert_id: Some("amici-zona-7".to_string()),
                ..ApprovalInput::default()
            })
            .await
            .unwrap();

        let listed = ledger.list_approvals().await;
        assert_eq!(listed.source, Source::Local);
        assert_eq!(listed.approvals, vec![approval]);
    }

    #[tokio::test]
    async fn test_mirrored_approvals_list_from_remote() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordingStore::default());
        let ledger = ledger(&dir).with_mirror(store.clone(), "actions");

        let approval = ledger
            .record(ApprovalInput {
                alert_id: Some("beibei-annunci-42".to_string()),
                fix_action: Some("pause_campaign".to_string()),
                school: Some("beibei".to_string()),
                campaign: Some("Beibei PMax".to_string()),
                ..ApprovalInput::default()
            })
            .await
            .unwrap();
        assert_eq!(store.rows.lock().unwrap().len(), 1);

        let listed = ledger.list_approvals().await;
        assert_eq!(listed.source, Source::Remote);
        assert_eq!(listed.approvals[0].campaign, "Beibei PMax");
        assert_eq!(listed.approvals[0].timestamp, approval.timestamp);
        assert_eq!(listed.approvals[0].fix_action, "pause_campaign");

        let local_only = ledger.clone().with_policy(ReadPolicy::LocalOnly);
        assert_eq!(local_only.list_approvals().await.source, Source::Local);
    }

    #[tokio::test]
    async fn test_missing_log_serves_sample_approvals() {
        let dir = TempDir::new().unwrap();
        let listed = ledger(&dir).list_approvals().await;
        assert_eq!(listed.source, Source::Sample);
        assert!(listed.approvals.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_log_fails_record() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("approvals.json"), "not json").unwrap();

        let result = ledger(&dir).record(ApprovalInput::default()).await;
        assert!(result.is_err());
    }
}
