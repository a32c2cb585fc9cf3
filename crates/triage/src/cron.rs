//! Scheduler job status.
//!
//! The scheduler that runs the agents keeps its jobs in a JSON file of the
//! form `{"jobs": [...]}`. This module reads that file and renders each job's
//! schedule and run state for display. When the file is missing or
//! unreadable, the sample jobs stand in.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

const NEVER: &str = "Never";
const NOT_AVAILABLE: &str = "N/A";
const UNKNOWN_STATUS: &str = "unknown";

/// When a job fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronSchedule {
    /// `cron` for recurring jobs, `at` for one-shot jobs
    pub kind: String,
    /// Five-field cron expression
    pub expr: String,
    /// Fire time of a one-shot job
    pub at: Option<Value>,
}

/// Bookkeeping the scheduler keeps per job. Timestamps are epoch millis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CronState {
    pub last_run_at_ms: Option<i64>,
    pub last_status: Option<String>,
    pub last_duration_ms: Option<f64>,
    pub next_run_at_ms: Option<i64>,
    pub consecutive_errors: u32,
}

/// One scheduler job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub state: CronState,
}

#[derive(Debug, Deserialize)]
struct JobsFile {
    #[serde(default)]
    jobs: Vec<CronJob>,
}

/// Parse a jobs document. A document without a `jobs` key has no jobs.
pub fn parse_jobs(content: &str) -> Result<Vec<CronJob>, serde_json::Error> {
    serde_json::from_str::<JobsFile>(content).map(|file| file.jobs)
}

/// Read the scheduler's jobs file.
///
/// `None` when the file is missing or malformed, so the caller can fall back
/// to sample jobs.
pub async fn read_jobs(path: &Path) -> Option<Vec<CronJob>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No scheduler jobs file");
            return None;
        }
    };

    match parse_jobs(&content) {
        Ok(jobs) => Some(jobs),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed scheduler jobs file");
            None
        }
    }
}

/// Index jobs by name, the key agents use to find theirs.
#[must_use]
pub fn by_name(jobs: &[CronJob]) -> HashMap<&str, &CronJob> {
    jobs.iter().map(|job| (job.name.as_str(), job)).collect()
}

/// Run state shown on agent cards and in the job list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub enabled: bool,
    pub last_run: String,
    pub last_status: String,
    pub last_duration: String,
    pub next_run: String,
    pub consecutive_errors: u32,
}

impl RunSummary {
    /// Summary for an agent's job; an agent without one is disabled and has
    /// never run.
    #[must_use]
    pub fn for_job(job: Option<&CronJob>) -> Self {
        let unscheduled = CronJob::default();
        let job = job.unwrap_or(&unscheduled);
        let state = &job.state;

        Self {
            enabled: job.enabled,
            last_run: format_timestamp(state.last_run_at_ms),
            last_status: state
                .last_status
                .clone()
                .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
            last_duration: format_duration(state.last_duration_ms),
            next_run: format_timestamp(state.next_run_at_ms),
            consecutive_errors: state.consecutive_errors,
        }
    }
}

/// One row of the job list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub id: String,
    pub name: String,
    /// Human-readable schedule
    pub schedule: String,
    #[serde(flatten)]
    pub run: RunSummary,
}

impl From<&CronJob> for JobStatus {
    fn from(job: &CronJob) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            schedule: schedule_label(&job.schedule),
            run: RunSummary::for_job(Some(job)),
        }
    }
}

/// Render a schedule the way people say it: `Daily 8:30 AM`,
/// `Tue/Wed 2:00 PM`, `Every hour`, `One-time: ...`.
///
/// Expressions outside those shapes are returned verbatim.
#[must_use]
pub fn schedule_label(schedule: &CronSchedule) -> String {
    if schedule.kind == "at" {
        let at = match &schedule.at {
            Some(Value::String(at)) => at.clone(),
            Some(Value::Null) | None => NOT_AVAILABLE.to_string(),
            Some(other) => other.to_string(),
        };
        return format!("One-time: {at}");
    }

    let expr = schedule.expr.as_str();
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let &[minute, hour, day_of_month, _, day_of_week, ..] = fields.as_slice() else {
        return expr.to_string();
    };

    if hour == "*" {
        return if minute == "0" {
            "Every hour".to_string()
        } else {
            format!("Every hour at :{minute:0>2}")
        };
    }

    let Ok(hour) = hour.parse::<u32>() else {
        return expr.to_string();
    };
    let time = match hour {
        0 => format!("12:{minute:0>2} AM"),
        1..=11 => format!("{hour}:{minute:0>2} AM"),
        12 => format!("12:{minute:0>2} PM"),
        _ => format!("{}:{minute:0>2} PM", hour - 12),
    };

    if day_of_week == "*" && day_of_month == "*" {
        format!("Daily {time}")
    } else if day_of_week != "*" {
        let days: Vec<&str> = day_of_week.split(',').map(day_name).collect();
        format!("{} {time}", days.join("/"))
    } else {
        expr.to_string()
    }
}

fn day_name(day: &str) -> &str {
    match day {
        "0" | "7" => "Sun",
        "1" => "Mon",
        "2" => "Tue",
        "3" => "Wed",
        "4" => "Thu",
        "5" => "Fri",
        "6" => "Sat",
        other => other,
    }
}

/// `2026-02-03 15:30 UTC`, or `Never` for a missing or zero timestamp.
#[must_use]
pub fn format_timestamp(ms: Option<i64>) -> String {
    ms.filter(|ms| *ms != 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || NEVER.to_string(),
            |at| at.format("%Y-%m-%d %H:%M UTC").to_string(),
        )
}

/// Seconds with one decimal, or `N/A` when there is no positive duration.
#[must_use]
pub fn format_duration(ms: Option<f64>) -> String {
    match ms {
        Some(ms) if ms > 0.0 => format!("{:.1}s", ms / 1000.0),
        _ => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn cron(expr: &str) -> CronSchedule {
        CronSchedule {
            kind: "cron".to_string(),
            expr: expr.to_string(),
            at: None,
        }
    }

    #[test]
    fn test_schedule_labels() {
        assert_eq!(schedule_label(&cron("30 8 * * *")), "Daily 8:30 AM");
        assert_eq!(schedule_label(&cron("0 14 * * 2,3")), "Tue/Wed 2:00 PM");
        assert_eq!(schedule_label(&cron("0 12 * * 1")), "Mon 12:00 PM");
        assert_eq!(schedule_label(&cron("5 0 * * *")), "Daily 12:05 AM");
        assert_eq!(schedule_label(&cron("0 * * * *")), "Every hour");
        assert_eq!(schedule_label(&cron("7 * * * *")), "Every hour at :07");
        assert_eq!(schedule_label(&cron("0 9 1 * *")), "0 9 1 * *");
        assert_eq!(schedule_label(&cron("*/5 */2 * * *")), "*/5 */2 * * *");
        assert_eq!(schedule_label(&cron("@daily")), "@daily");
    }

    #[test]
    fn test_one_shot_label() {
        let schedule = CronSchedule {
            kind: "at".to_string(),
            at: Some(json!("2026-03-01T16:00:00Z")),
            ..CronSchedule::default()
        };
        assert_eq!(schedule_label(&schedule), "One-time: 2026-03-01T16:00:00Z");

        let schedule = CronSchedule {
            kind: "at".to_string(),
            ..CronSchedule::default()
        };
        assert_eq!(schedule_label(&schedule), "One-time: N/A");
    }

    #[test]
    fn test_timestamp_and_duration_formatting() {
        assert_eq!(format_timestamp(Some(1_770_130_800_000)), "2026-02-03 15:00 UTC");
        assert_eq!(format_timestamp(Some(0)), "Never");
        assert_eq!(format_timestamp(None), "Never");

        assert_eq!(format_duration(Some(93_100.0)), "93.1s");
        assert_eq!(format_duration(Some(0.0)), "N/A");
        assert_eq!(format_duration(None), "N/A");
    }

    #[test]
    fn test_job_status_keys() {
        let jobs = parse_jobs(
            r#"{"jobs": [{
                "id": "j1", "name": "Zona Daily Local SEO Check", "enabled": true,
                "schedule": {"kind": "cron", "expr": "15 7 * * *"},
                "state": {"lastRunAtMs": 1770130800000, "lastStatus": "ok",
                          "lastDurationMs": 1500, "consecutiveErrors": 3}
            }]}"#,
        )
        .unwrap();

        let json = serde_json::to_value(JobStatus::from(&jobs[0])).unwrap();
        assert_eq!(
            json,
            json!({
                "id": "j1",
                "name": "Zona Daily Local SEO Check",
                "schedule": "Daily 7:15 AM",
                "enabled": true,
                "lastRun": "2026-02-03 15:00 UTC",
                "lastStatus": "ok",
                "lastDuration": "1.5s",
                "nextRun": "Never",
                "consecutiveErrors": 3
            })
        );
    }

    #[test]
    fn test_agent_without_job() {
        let summary = RunSummary::for_job(None);
        assert!(!summary.enabled);
        assert_eq!(summary.last_run, "Never");
        assert_eq!(summary.last_status, "unknown");
        assert_eq!(summary.last_duration, "N/A");
    }

    #[test]
    fn test_document_without_jobs_key_is_empty() {
        assert!(parse_jobs(r#"{"version": 1}"#).unwrap().is_empty());
        assert!(parse_jobs("42").is_err());
    }

    #[tokio::test]
    async fn test_read_jobs_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        assert!(read_jobs(&dir.path().join("jobs.json")).await.is_none());

        std::fs::write(dir.path().join("jobs.json"), "{oops").unwrap();
        assert!(read_jobs(&dir.path().join("jobs.json")).await.is_none());

        std::fs::write(
            dir.path().join("jobs.json"),
            r#"{"jobs": [{"id": "a", "name": "Marco Morning Briefing"}]}"#,
        )
        .unwrap();
        let jobs = read_jobs(&dir.path().join("jobs.json")).await.unwrap();
        assert_eq!(by_name(&jobs)["Marco Morning Briefing"].id, "a");
        assert!(!jobs[0].enabled);
    }
}
