//! services/agent/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::AgentError;
use crate::scheduler::{AgentPhase, ReconcileReport};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::NaiveDateTime;
use reminder_core::domain::Reminder;
use reminder_core::ports::PortError;
use reminder_core::settings::ReminderSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        put_settings_handler,
        list_reminders_handler,
        set_enabled_handler,
        delete_reminder_handler,
        status_handler,
    ),
    components(
        schemas(ReminderView, ReconcileResponse, SkippedView, EnabledRequest, StatusResponse)
    ),
    tags(
        (name = "Reminder Scheduler API", description = "Configure recurring reminders and inspect the delivery agent.")
    )
)]
pub struct ApiDoc;

/// Renders the API description, as served at `/api-docs/openapi.json`.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A reminder as exposed over the API.
#[derive(Serialize, ToSchema)]
pub struct ReminderView {
    id: String,
    owner_id: String,
    category: String,
    #[schema(value_type = Object)]
    rule: serde_json::Value,
    #[schema(value_type = Object)]
    payload: serde_json::Value,
    enabled: bool,
    next_trigger: NaiveDateTime,
    last_triggered: Option<NaiveDateTime>,
    trigger_count: u32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<Reminder> for ReminderView {
    fn from(r: Reminder) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            category: r.category.key(),
            rule: serde_json::to_value(&r.rule).unwrap_or_default(),
            payload: serde_json::to_value(&r.payload).unwrap_or_default(),
            enabled: r.enabled,
            next_trigger: r.next_trigger,
            last_triggered: r.last_triggered,
            trigger_count: r.trigger_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SkippedView {
    category: String,
    reason: String,
}

/// The response payload sent after a settings change has been applied.
#[derive(Serialize, ToSchema)]
pub struct ReconcileResponse {
    owner_id: String,
    installed: Vec<ReminderView>,
    skipped: Vec<SkippedView>,
    used_fallback: bool,
}

impl From<ReconcileReport> for ReconcileResponse {
    fn from(report: ReconcileReport) -> Self {
        Self {
            owner_id: report.owner_id,
            installed: report.installed.into_iter().map(ReminderView::from).collect(),
            skipped: report
                .skipped
                .into_iter()
                .map(|s| SkippedView {
                    category: s.category.key(),
                    reason: s.reason,
                })
                .collect(),
            used_fallback: report.used_fallback,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct EnabledRequest {
    pub enabled: bool,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(value_type = String)]
    phase: AgentPhase,
    last_scan_at: Option<NaiveDateTime>,
    scans: u64,
    fired: u64,
    delivery_failures: u64,
    storage_errors: u64,
    scan_interval_secs: u64,
}

type ApiError = (StatusCode, String);

/// Maps a service error onto an HTTP status, logging anything unexpected.
fn to_http(e: AgentError, context: &str) -> ApiError {
    let status = match &e {
        AgentError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
        AgentError::Port(PortError::StorageUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        AgentError::ReconciliationConflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("{}: {:?}", context, e);
    }
    (status, format!("{}: {}", context, e))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Replace an owner's reminders with the ones described by `settings`.
#[utoipa::path(
    put,
    path = "/owners/{owner_id}/settings",
    request_body(content_type = "application/json", description = "Reminder settings, one object per category."),
    responses(
        (status = 200, description = "Reminders installed", body = ReconcileResponse),
        (status = 409, description = "The new set could not be installed"),
        (status = 503, description = "Reminder store unavailable")
    ),
    params(
        ("owner_id" = String, Path, description = "The owner whose reminders are replaced.")
    )
)]
pub async fn put_settings_handler(
    State(app_state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
    Json(settings): Json<ReminderSettings>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .reconciler
        .reconcile(&owner_id, &settings)
        .await
        .map_err(|e| to_http(e, "Failed to apply reminder settings"))?;
    Ok(Json(ReconcileResponse::from(report)))
}

/// List an owner's reminders. An unreachable store reads as an empty list.
#[utoipa::path(
    get,
    path = "/owners/{owner_id}/reminders",
    responses(
        (status = 200, description = "The owner's reminders", body = [ReminderView])
    ),
    params(
        ("owner_id" = String, Path, description = "The owner to list.")
    )
)]
pub async fn list_reminders_handler(
    State(app_state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let reminders = match app_state.reconciler.reminders_for(&owner_id).await {
        Ok(reminders) => reminders,
        Err(AgentError::Port(PortError::StorageUnavailable(reason))) => {
            warn!(owner_id = %owner_id, %reason, "Store unavailable; listing no reminders");
            Vec::new()
        }
        Err(e) => return Err(to_http(e, "Failed to list reminders")),
    };
    let views: Vec<ReminderView> = reminders.into_iter().map(ReminderView::from).collect();
    Ok(Json(views))
}

/// Enable or disable a single reminder.
#[utoipa::path(
    put,
    path = "/reminders/{id}/enabled",
    request_body = EnabledRequest,
    responses(
        (status = 200, description = "Reminder updated", body = ReminderView),
        (status = 404, description = "No such reminder")
    ),
    params(
        ("id" = String, Path, description = "The reminder id.")
    )
)]
pub async fn set_enabled_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EnabledRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reminder = app_state
        .reconciler
        .set_reminder_enabled(&id, req.enabled)
        .await
        .map_err(|e| to_http(e, "Failed to update reminder"))?;
    Ok(Json(ReminderView::from(reminder)))
}

/// Delete a single reminder.
#[utoipa::path(
    delete,
    path = "/reminders/{id}",
    responses(
        (status = 204, description = "Reminder deleted"),
        (status = 404, description = "No such reminder")
    ),
    params(
        ("id" = String, Path, description = "The reminder id.")
    )
)]
pub async fn delete_reminder_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .reconciler
        .delete_reminder(&id)
        .await
        .map_err(|e| to_http(e, "Failed to delete reminder"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Report what the trigger loop is doing.
#[utoipa::path(
    get,
    path = "/agent/status",
    responses(
        (status = 200, description = "Trigger loop status", body = StatusResponse)
    )
)]
pub async fn status_handler(State(app_state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = app_state.status.read().await.clone();
    Json(StatusResponse {
        phase: status.phase,
        last_scan_at: status.last_scan_at,
        scans: status.scans,
        fired: status.fired,
        delivery_failures: status.delivery_failures,
        storage_errors: status.storage_errors,
        scan_interval_secs: app_state.config.scan_interval.as_secs(),
    })
}
