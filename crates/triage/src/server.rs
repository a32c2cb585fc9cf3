//! HTTP query surface.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::context::Triage;
use crate::error::TriageError;
use crate::leads::LeadInput;
use crate::metrics;
use crate::model::{Approval, ApprovalInput, ResolvedReport};

const LEAD_THANKS: &str = "Thank you! We'll contact you within 1 business day.";

/// Largest request body accepted on any route.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the API router.
pub fn build_router(state: Arc<Triage>) -> Router {
    let lead_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/agents", get(agents_handler))
        .route("/api/agent/{id}", get(agent_profile_handler))
        .route("/api/agents/{id}/report", get(agent_report_handler))
        .route("/api/cron", get(cron_handler))
        .route("/api/reports/latest", get(latest_reports_handler))
        .route("/api/alerts", get(alerts_handler))
        .route("/api/alerts/detailed", get(detailed_alerts_handler))
        .route("/api/fix", post(fix_handler))
        .route("/api/approvals", get(approvals_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/demo-request", post(demo_request_handler).layer(lead_cors))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until the process is stopped.
pub async fn run_server(state: Arc<Triage>, addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Triage API listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Error body returned by every failing handler.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    demo: bool,
}

/// Handler error carrying its HTTP status.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    demo: bool,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            demo: false,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Write refused because the caller is browsing the public demo.
    fn demo_mode() -> Self {
        Self {
            demo: true,
            ..Self::new(StatusCode::FORBIDDEN, "Demo mode: actions disabled")
        }
    }
}

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        let status = match &err {
            TriageError::InvalidAgent { .. } => StatusCode::BAD_REQUEST,
            TriageError::NoData { .. } => StatusCode::NOT_FOUND,
            _ => {
                error!(error = %err, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            demo: self.demo,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn agents_handler(State(state): State<Arc<Triage>>) -> impl IntoResponse {
    Json(state.agent_statuses().await)
}

async fn agent_profile_handler(
    State(state): State<Arc<Triage>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state
        .catalog()
        .get(&id)
        .and_then(|agent| agent.profile_card())
        .map(|card| Json(card).into_response())
        .ok_or_else(|| ApiError::not_found("Agent not found"))
}

async fn cron_handler(State(state): State<Arc<Triage>>) -> impl IntoResponse {
    Json(state.cron_statuses().await)
}

async fn agent_report_handler(
    State(state): State<Arc<Triage>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.agent_report(&id).await?))
}

async fn latest_reports_handler(State(state): State<Arc<Triage>>) -> impl IntoResponse {
    let by_agent: BTreeMap<String, ResolvedReport> = state
        .latest_reports()
        .await
        .into_iter()
        .map(|report| (report.report.agent_id.clone(), report))
        .collect();
    Json(by_agent)
}

async fn alerts_handler(State(state): State<Arc<Triage>>) -> impl IntoResponse {
    Json(state.alert_counts().await)
}

async fn detailed_alerts_handler(State(state): State<Arc<Triage>>) -> impl IntoResponse {
    Json(state.detailed_alerts().await)
}

/// Response to an approval submission.
#[derive(Debug, Serialize)]
struct FixResponse {
    success: bool,
    approval: Approval,
}

/// Whether a request comes from the public demo dashboard, either directly
/// (`?demo=true`) or from a page opened that way.
fn is_demo_request(params: &HashMap<String, String>, headers: &HeaderMap) -> bool {
    params.get("demo").is_some_and(|v| v == "true")
        || headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|referer| referer.contains("demo=true"))
}

async fn fix_handler(
    State(state): State<Arc<Triage>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if is_demo_request(&params, &headers) {
        warn!("Refusing approval from a demo session");
        return Err(ApiError::demo_mode());
    }

    let payload: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?
    };

    let is_empty = match &payload {
        Value::Null => true,
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    };
    if is_empty {
        return Err(ApiError::bad_request("No JSON body"));
    }

    let input: ApprovalInput = serde_json::from_value(payload)
        .map_err(|e| ApiError::bad_request(format!("Invalid approval: {e}")))?;
    let approval = state.record_approval(input).await?;

    Ok(Json(FixResponse {
        success: true,
        approval,
    }))
}

async fn approvals_handler(State(state): State<Arc<Triage>>) -> impl IntoResponse {
    Json(state.approvals().await)
}

async fn metrics_handler(State(state): State<Arc<Triage>>) -> impl IntoResponse {
    Json(metrics::to_json(&state.metrics().await))
}

async fn demo_request_handler(
    State(state): State<Arc<Triage>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input: LeadInput = if body.is_empty() {
        LeadInput::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request: {e}")))?
    };

    state.record_lead(input).await?;

    Ok(Json(json!({ "ok": true, "message": LEAD_THANKS })))
}
