//! API route handlers for the gateway.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clientchain_core::error::ClientChainError;
use clientchain_core::types::SubjectProfile;
use clientchain_engine::{Action, Trigger, WorkflowStatus, templates};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::server::AppState;

/// Error wrapper mapping the core taxonomy onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(ClientChainError);

impl From<ClientChainError> for ApiError {
    fn from(e: ClientChainError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ClientChainError::Validation(_) => StatusCode::BAD_REQUEST,
            ClientChainError::NotFound(_) => StatusCode::NOT_FOUND,
            ClientChainError::Channel(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"ok": false, "error": self.0.to_string()}))).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| ApiError(ClientChainError::Execution(format!("encode response: {e}"))))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "clientchain-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

// ─── Workflows ──────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateWorkflowBody {
    pub name: String,
    pub triggers: Vec<Trigger>,
    pub actions: Vec<Action>,
}

pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateWorkflowBody>,
) -> ApiResult {
    let def = state
        .automation
        .create_workflow(&body.name, body.triggers, body.actions)?;
    to_json(&def)
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(WorkflowStatus::parse(s).ok_or_else(|| {
            ClientChainError::Validation(format!("unknown status filter: {s}"))
        })?),
    };
    let defs = state.automation.list_workflows(status)?;
    to_json(&defs)
}

pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    to_json(&state.automation.get_workflow(&id)?)
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub async fn set_workflow_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> ApiResult {
    let status = WorkflowStatus::parse(&body.status).ok_or_else(|| {
        ClientChainError::Validation(format!("unknown status: {}", body.status))
    })?;
    state.automation.set_workflow_status(&id, status)?;
    Ok(Json(json!({"ok": true, "id": id, "status": status.as_str()})))
}

pub async fn workflow_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    // 404 on unknown workflow, not an empty list.
    state.automation.get_workflow(&id)?;
    to_json(&state.automation.executions_for_workflow(&id)?)
}

pub async fn list_templates(State(_state): State<Arc<AppState>>) -> ApiResult {
    to_json(&templates::template_catalog())
}

#[derive(Deserialize)]
pub struct ApplyTemplateBody {
    pub key: String,
}

pub async fn apply_template(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApplyTemplateBody>,
) -> ApiResult {
    let def = templates::apply_template(&state.automation, &body.key)?;
    to_json(&def)
}

// ─── Runs, events, sweep ──────────────────────────────────────

#[derive(Deserialize)]
pub struct RunBody {
    pub subject_id: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RunBody>,
) -> ApiResult {
    let execution_id = state
        .dispatcher
        .run_workflow(&id, &body.subject_id, body.context)
        .await?;
    Ok(Json(json!({"ok": true, "execution_id": execution_id})))
}

#[derive(Deserialize)]
pub struct EventBody {
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EventBody>,
) -> ApiResult {
    let ids = state
        .dispatcher
        .dispatch(&body.event_type, body.payload)
        .await?;
    Ok(Json(json!({"ok": true, "executions": ids})))
}

pub async fn sweep_now(State(state): State<Arc<AppState>>) -> ApiResult {
    let processed = state.runner.sweep_due(state.clock.as_ref()).await?;
    Ok(Json(json!({"ok": true, "processed": processed})))
}

pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    to_json(&state.automation.get_execution(&id)?)
}

// ─── Subjects & credits ──────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateSubjectBody {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub timezone: Option<String>,
}

pub async fn create_subject(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSubjectBody>,
) -> ApiResult {
    if body.name.trim().is_empty() {
        return Err(ApiError(ClientChainError::Validation(
            "subject name is empty".into(),
        )));
    }
    let mut subject = SubjectProfile::new(&body.name);
    subject.phone = body.phone;
    subject.email = body.email;
    subject.timezone = body.timezone;
    state.ledger.save_subject(&subject)?;
    to_json(&subject)
}

pub async fn get_subject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    to_json(&state.ledger.get_subject(&id)?)
}

pub async fn patch_subject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(fields): Json<serde_json::Value>,
) -> ApiResult {
    to_json(&state.ledger.merge_fields(&id, &fields)?)
}

pub async fn subject_credits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let balance = state.ledger.balance(&id)?;
    let entries = state.ledger.entries_for(&id)?;
    Ok(Json(json!({
        "subject_id": id,
        "balance": balance,
        "entries": serde_json::to_value(&entries)
            .map_err(|e| ClientChainError::Execution(format!("encode entries: {e}")))?,
    })))
}

#[derive(Deserialize)]
pub struct RedeemBody {
    pub amount: i64,
    pub description: Option<String>,
}

pub async fn redeem_credits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RedeemBody>,
) -> ApiResult {
    let entry = state
        .ledger
        .redeem(&id, body.amount, body.description.as_deref())?;
    to_json(&entry)
}

pub async fn list_open_tasks(State(state): State<Arc<AppState>>) -> ApiResult {
    let tasks: Vec<serde_json::Value> = state
        .automation
        .open_tasks()?
        .into_iter()
        .map(|(id, subject_id, title)| json!({"id": id, "subject_id": subject_id, "title": title}))
        .collect();
    to_json(&tasks)
}
