//! Per-school metrics overview.
//!
//! Site analytics come from the remote `metrics` table when it has rows; ad
//! figures are always merged in from the latest ad spend report. Without
//! remote analytics, organic clicks are summed from the search intel report.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::agents::{AgentCatalog, Domain};
use crate::model::{CanonicalReport, ResolvedReport, Source};
use crate::report::{decode_json_field, number};
use crate::resolver::SourceResolver;
use crate::store::RowQuery;

const METRIC_ROW_LIMIT: usize = 10;

/// Counters that default to zero when a remote row omits them.
const COUNTERS: &[&str] = &[
    "sessions",
    "active_users",
    "new_users",
    "conversions",
    "page_views",
];

/// Figures passed through as-is, null when absent.
const RATIOS: &[&str] = &[
    "bounce_rate",
    "avg_session_duration",
    "conversion_rate",
    "sessions_wow_change",
    "date",
];

/// Nested breakdowns that may be stored as JSON strings.
const BREAKDOWNS: &[&str] = &["top_sources", "device_breakdown"];

/// Metrics keyed by school, in the order the schools were given.
pub type SchoolMetrics = Vec<(String, Map<String, Value>)>;

/// Build the metrics overview for `schools`.
pub async fn school_metrics(resolver: &SourceResolver, schools: &[String]) -> SchoolMetrics {
    let mut overview: SchoolMetrics = schools
        .iter()
        .map(|school| (school.clone(), Map::new()))
        .collect();

    let query = RowQuery::new()
        .newest_first("date")
        .limit(METRIC_ROW_LIMIT);
    let rows = resolver
        .read_rows(&resolver.tables().metrics, &query)
        .await
        .filter(|rows| !rows.is_empty());

    let served_remote = rows.is_some();
    if let Some(rows) = rows {
        for (school, figures) in &mut overview {
            let latest = rows
                .iter()
                .find(|row| row.get("client_slug").and_then(Value::as_str) == Some(school.as_str()));
            if let Some(row) = latest {
                merge_remote_row(figures, row);
            }
        }
    } else {
        debug!("No remote metrics, building overview from reports");
    }

    let reports = resolver.reports_by_agent().await;

    if let Some(ads) = report_for(resolver.catalog(), &reports, Domain::AdSpend) {
        for (school, figures) in &mut overview {
            merge_ad_figures(figures, ads, school);
        }
    }

    if !served_remote {
        if let Some(search) = report_for(resolver.catalog(), &reports, Domain::SearchIntel) {
            for (school, figures) in &mut overview {
                figures.insert(
                    "organic_clicks".to_string(),
                    json!(organic_clicks(search, school)),
                );
            }
        }
    }

    overview
}

/// Render an overview as a JSON object keyed by school.
#[must_use]
pub fn to_json(overview: &SchoolMetrics) -> Value {
    Value::Object(
        overview
            .iter()
            .map(|(school, figures)| (school.clone(), Value::Object(figures.clone())))
            .collect(),
    )
}

/// Report of the first agent covering `domain`.
fn report_for<'a>(
    catalog: &AgentCatalog,
    reports: &'a HashMap<String, ResolvedReport>,
    domain: Domain,
) -> Option<&'a CanonicalReport> {
    let agent = catalog.iter().find(|a| a.domain == domain)?;
    reports.get(&agent.id).map(|resolved| &resolved.report)
}

fn merge_remote_row(figures: &mut Map<String, Value>, row: &Value) {
    let field = |key: &str| row.get(key).cloned().unwrap_or(Value::Null);

    for key in COUNTERS {
        let value = match field(key) {
            Value::Null => json!(0),
            other => other,
        };
        figures.insert((*key).to_string(), value);
    }
    for key in RATIOS {
        figures.insert((*key).to_string(), field(key));
    }
    for key in BREAKDOWNS {
        figures.insert((*key).to_string(), decode_json_field(&field(key)));
    }
    figures.insert("source".to_string(), json!(Source::Remote));
}

fn merge_ad_figures(figures: &mut Map<String, Value>, ads: &CanonicalReport, school: &str) {
    let spend = ads
        .spend()
        .and_then(|s| s.get(school))
        .and_then(Value::as_object);
    let figure = |key: &str| json!(spend.and_then(|s| number(s, key)).unwrap_or(0.0));

    figures.insert("ad_spend_7d".to_string(), figure("weekly_spend"));
    figures.insert("clicks".to_string(), figure("clicks"));
    figures.insert("cpa".to_string(), figure("cpa"));
    figures.insert("ctr".to_string(), figure("ctr"));
    if !figures.contains_key("conversions") {
        figures.insert("conversions".to_string(), figure("conversions"));
    }
}

fn organic_clicks(search: &CanonicalReport, school: &str) -> f64 {
    search
        .keywords()
        .and_then(|kw| kw.get(school))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .filter_map(|kw| number(kw, "clicks"))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentCatalog;
    use crate::config::Tables;
    use crate::local::ReportFiles;
    use crate::sample::SampleData;
    use crate::store::{RemoteStore, StoreError};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct MetricsStore(Vec<Value>, Mutex<Vec<String>>);

    impl MetricsStore {
        fn new(rows: Vec<Value>) -> Self {
            Self(rows, Mutex::default())
        }
    }

    #[async_trait]
    impl RemoteStore for MetricsStore {
        async fn select(&self, table: &str, _query: &RowQuery) -> Result<Vec<Value>, StoreError> {
            self.1.lock().unwrap().push(table.to_string());
            Ok(if table == "metrics" { self.0.clone() } else { Vec::new() })
        }

        async fn upsert(&self, _table: &str, _rows: &[Value]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn resolver() -> SourceResolver {
        SourceResolver::new(
            AgentCatalog::builtin(),
            ReportFiles::new("/nonexistent/reports"),
            Arc::new(SampleData::bundled()),
        )
    }

    fn schools() -> Vec<String> {
        vec!["beibei".to_string(), "amici".to_string()]
    }

    #[tokio::test]
    async fn test_fallback_uses_ad_and_search_reports() {
        let overview = school_metrics(&resolver(), &schools()).await;
        assert_eq!(overview[0].0, "beibei");

        let beibei = &overview[0].1;
        assert_eq!(beibei["ad_spend_7d"], json!(612.4));
        assert_eq!(beibei["conversions"], json!(3.0));
        assert_eq!(beibei["organic_clicks"], json!(46.0));
        assert!(beibei.get("source").is_none());
    }

    #[tokio::test]
    async fn test_remote_rows_take_latest_per_school() {
        let store = Arc::new(MetricsStore::new(vec![
            json!({"client_slug": "amici", "sessions": 900, "date": "2026-02-03",
                   "top_sources": "[{\"source\": \"google\"}]"}),
            json!({"client_slug": "amici", "sessions": 700, "date": "2026-02-02"}),
            json!({"client_slug": "elsewhere", "sessions": 5}),
        ]));
        let resolver = resolver().with_remote(store.clone(), Tables::default());

        let overview = school_metrics(&resolver, &schools()).await;
        let json = to_json(&overview);

        assert_eq!(json["amici"]["sessions"], 900);
        assert_eq!(json["amici"]["conversions"], 0);
        assert_eq!(json["amici"]["top_sources"][0]["source"], "google");
        assert_eq!(json["amici"]["source"], "remote");
        assert_eq!(json["amici"]["ad_spend_7d"], json!(298.0));
        assert!(json["amici"].get("organic_clicks").is_none());
        assert!(json["beibei"].get("sessions").is_none());
        assert!(json.get("elsewhere").is_none());

        assert_eq!(*store.1.lock().unwrap(), ["metrics", "reports"]);
    }
}
