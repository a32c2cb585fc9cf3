//! Canonical report adapter.
//!
//! Upstream monitors each write their own document shape, and the remote
//! store returns flattened rows whose nested fields may arrive as JSON
//! strings. Everything here is lenient: a missing or mistyped field becomes a
//! neutral default and only a non-object document is rejected.

use serde_json::{Map, Value};

use crate::model::{CanonicalReport, EnrichedAlert, FixSuggestion, ImpactType, Level, RawAlert};

/// Domain payload sections carried through to the canonical report.
pub const PAYLOAD_KEYS: &[&str] = &[
    "spend",
    "keywords",
    "metrics",
    "wins",
    "recommendations",
    "campaign_breakdown",
];

const UNKNOWN: &str = "unknown";

/// Normalize a report document read from disk or the sample bundle.
///
/// Returns `None` when the document is not a JSON object.
#[must_use]
pub fn report_from_document(agent_id: &str, doc: &Value) -> Option<CanonicalReport> {
    let obj = doc.as_object()?;

    Some(CanonicalReport {
        agent_id: agent_id.to_string(),
        date: text(obj, "date").unwrap_or_else(|| UNKNOWN.to_string()),
        severity: text(obj, "severity").unwrap_or_else(|| UNKNOWN.to_string()),
        alerts: alerts_from_value(obj.get("alerts")),
        summary: text(obj, "summary"),
        client_slug: text(obj, "client_slug"),
        payload: payload_from(obj),
    })
}

/// Normalize a row from the remote reports table.
///
/// Returns `None` when the row is not an object or names no agent.
#[must_use]
pub fn report_from_row(row: &Value) -> Option<CanonicalReport> {
    let obj = row.as_object()?;
    let agent_id = text(obj, "agent").filter(|a| !a.is_empty())?;
    let alerts = obj.get("alerts").map(decode_json_field);

    Some(CanonicalReport {
        agent_id,
        date: text(obj, "date").unwrap_or_else(|| UNKNOWN.to_string()),
        severity: text(obj, "severity").unwrap_or_else(|| UNKNOWN.to_string()),
        alerts: alerts_from_value(alerts.as_ref()),
        summary: Some(text(obj, "summary").unwrap_or_default()),
        client_slug: text(obj, "client_slug"),
        payload: payload_from(obj),
    })
}

/// Normalize one raw alert. Never fails.
#[must_use]
pub fn alert_from_value(value: &Value) -> RawAlert {
    let Some(obj) = value.as_object() else {
        return RawAlert::default();
    };

    RawAlert {
        finding: text(obj, "finding").unwrap_or_default(),
        school: text(obj, "school").unwrap_or_else(|| UNKNOWN.to_string()),
        level: text(obj, "level").map_or_else(Level::default, |l| Level::parse(&l)),
        impact_dollars: non_negative(number(obj, "impact_dollars")),
        assigned_to: text(obj, "assigned_to").filter(|a| !a.is_empty()),
        action_required: text(obj, "action_required"),
    }
}

/// Normalize a pre-enriched row from the remote alerts table.
#[must_use]
pub fn enriched_from_row(row: &Value) -> EnrichedAlert {
    let Some(obj) = row.as_object() else {
        return EnrichedAlert::default();
    };

    let evidence = obj
        .get("evidence")
        .map(decode_json_field)
        .and_then(|v| match v {
            Value::Array(items) => Some(items.iter().map(display_value).collect()),
            Value::Null => None,
            other => Some(vec![display_value(&other)]),
        })
        .unwrap_or_default();

    let fixes = obj
        .get("fixes")
        .map(decode_json_field)
        .and_then(|v| match v {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value::<FixSuggestion>(item).ok())
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();

    let agent = text(obj, "agent").unwrap_or_default();

    EnrichedAlert {
        alert_id: text(obj, "alert_id").unwrap_or_default(),
        level: text(obj, "level").map_or_else(Level::default, |l| Level::parse(&l)),
        school: text(obj, "school").unwrap_or_else(|| UNKNOWN.to_string()),
        title: text(obj, "title")
            .or_else(|| text(obj, "finding"))
            .unwrap_or_default(),
        impact_monthly: non_negative(number(obj, "impact_monthly")),
        impact_type: match text(obj, "impact_type").as_deref() {
            Some("confirmed") => ImpactType::Confirmed,
            _ => ImpactType::Estimated,
        },
        why: text(obj, "why").unwrap_or_default(),
        evidence,
        fixes,
        assigned_to: text(obj, "assigned_to").unwrap_or_else(|| agent.clone()),
        agent,
    }
}

/// Decode a field the remote store may hand back either as JSON or as a
/// string containing JSON. Strings that are not JSON are returned unchanged.
#[must_use]
pub fn decode_json_field(value: &Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

/// Render a scalar for display: strings verbatim, other values as JSON.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Read a numeric field, accepting numeric strings.
#[must_use]
pub fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

fn alerts_from_value(value: Option<&Value>) -> Vec<RawAlert> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| item.is_object())
            .map(alert_from_value)
            .collect(),
        _ => Vec::new(),
    }
}

fn payload_from(obj: &Map<String, Value>) -> Map<String, Value> {
    PAYLOAD_KEYS
        .iter()
        .filter_map(|key| {
            obj.get(*key)
                .map(decode_json_field)
                .filter(|v| !v.is_null())
                .map(|v| ((*key).to_string(), v))
        })
        .collect()
}
