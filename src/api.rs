//! HTTP API
//!
//! Exposes the compliance audit system over HTTP. Callers are trusted: the
//! boundary in front of this service is responsible for authorization.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::audit::entry::{AuditEntry, EventDetails, NewEvent};
use crate::audit::verify::IntegrityReport;
use crate::error::ComplianceError;
use crate::monitor::{ComplianceAlert, RealTimeMetrics};
use crate::report::ComplianceReport;
use crate::system::ComplianceAuditSystem;

type AppState = Arc<ComplianceAuditSystem>;

pub fn router(system: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(record_event))
        .route("/reports", get(generate_report))
        .route("/integrity", get(verify_integrity))
        .route("/alerts", get(list_alerts))
        .route("/alerts/:alert_id/resolve", post(resolve_alert))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(system)
}

impl IntoResponse for ComplianceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ComplianceError::AlertNotFound(_) => StatusCode::NOT_FOUND,
            ComplianceError::AlertAlreadyResolved(_) => StatusCode::CONFLICT,
            e if e.is_caller_error() => StatusCode::BAD_REQUEST,
            e => {
                error!("Request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "status": "error",
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

async fn health_check(State(system): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "compliance-audit",
        "timestamp": Utc::now(),
        "system_version": system.config().system_version,
        "entries": system.ledger().len(),
        "signing_mode": format!("{:?}", system.ledger().signer().mode()),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub event_type: String,
    #[serde(default)]
    pub actor_id: String,
    pub target_id: String,
    pub action: String,
    #[serde(default)]
    pub details: EventDetails,
    pub result: Option<String>,
    pub processing_time_ms: Option<u64>,
}

impl EventRequest {
    fn into_event(self) -> Result<NewEvent, ComplianceError> {
        if self.event_type.trim().is_empty() {
            return Err(ComplianceError::ValidationError(
                "event_type must not be empty".to_string(),
            ));
        }
        if self.action.trim().is_empty() {
            return Err(ComplianceError::ValidationError(
                "action must not be empty".to_string(),
            ));
        }

        let mut event = NewEvent::new(
            self.event_type,
            self.actor_id,
            self.target_id,
            self.action,
            self.details,
        );
        if let Some(result) = self.result {
            event = event.with_result(result);
        }
        if let Some(ms) = self.processing_time_ms {
            let ms = i64::try_from(ms).map_err(|_| {
                ComplianceError::ValidationError(format!("processing_time_ms out of range: {}", ms))
            })?;
            event = event.with_processing_time(chrono::Duration::milliseconds(ms));
        }
        Ok(event)
    }
}

async fn record_event(
    State(system): State<AppState>,
    Json(request): Json<EventRequest>,
) -> Result<(StatusCode, Json<AuditEntry>), ComplianceError> {
    let entry = system.record(request.into_event()?)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

fn default_report_type() -> String {
    "comprehensive".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "type", default = "default_report_type")]
    pub report_type: String,
}

async fn generate_report(
    State(system): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ComplianceReport>, ComplianceError> {
    let report = system.generate_report(query.start, query.end, &query.report_type)?;
    Ok(Json(report))
}

async fn verify_integrity(State(system): State<AppState>) -> Json<IntegrityReport> {
    Json(system.verify_integrity())
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub active: bool,
}

async fn list_alerts(
    State(system): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Json<Vec<ComplianceAlert>> {
    if query.active {
        Json(system.active_alerts())
    } else {
        Json(system.alerts())
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub resolution: String,
}

async fn resolve_alert(
    State(system): State<AppState>,
    Path(alert_id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ComplianceAlert>, ComplianceError> {
    let alert = system.resolve_alert(&alert_id, &request.resolution)?;
    Ok(Json(alert))
}

async fn metrics(State(system): State<AppState>) -> Json<RealTimeMetrics> {
    Json(system.metrics())
}
