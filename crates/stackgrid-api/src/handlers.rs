//! REST API handlers.
//!
//! Each handler calls one orchestrator verb and maps its result onto the
//! response envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use stackgrid_cluster::{DeleteOutcome, EnsureOutcome};
use stackgrid_core::{LogicalStackId, Role};
use stackgrid_orchestrator::{HostInputs, MutationOutcome, OrchestratorError};
use tracing::warn;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Conflicts surface as 409, other platform failures as 502.
fn orchestrator_error(e: OrchestratorError) -> Response {
    let status = match &e {
        e if e.is_conflict() => StatusCode::CONFLICT,
        OrchestratorError::Cluster(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::MissingImage(_) | OrchestratorError::AutoscalingDisabled => {
            StatusCode::BAD_REQUEST
        }
        OrchestratorError::Template(_)
        | OrchestratorError::State(_)
        | OrchestratorError::NoExternalRoute => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = status.as_u16(), error = %e, "request failed");
    error_response(&e.to_string(), status)
}

/// Soft-failed mutations become 404s.
fn mutation_response(outcome: MutationOutcome) -> Response {
    match outcome {
        MutationOutcome::Applied { .. } => ApiResponse::ok(outcome).into_response(),
        MutationOutcome::DeploymentMissing => {
            error_response("deployment not found", StatusCode::NOT_FOUND)
        }
        MutationOutcome::ContainerMissing => {
            error_response("container not found", StatusCode::NOT_FOUND)
        }
    }
}

fn parse_role(raw: &str) -> Result<Role, Response> {
    raw.parse::<Role>()
        .map_err(|e| error_response(&e.to_string(), StatusCode::BAD_REQUEST))
}

// ── Bodies ─────────────────────────────────────────────────────

/// Body for single-process stack creation.
#[derive(Debug, Deserialize)]
pub struct CreateStackRequest {
    pub tenant_id: String,
    pub version: String,
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateHostRequest {
    pub tenant_id: String,
    pub version: String,
    #[serde(flatten)]
    pub inputs: HostInputs,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image: String,
}

#[derive(Debug, Serialize)]
struct CreatedStack {
    url: String,
}

#[derive(Debug, Serialize)]
struct DestroyedStack {
    deleted: usize,
    absent: usize,
}

impl DestroyedStack {
    fn from_outcomes(outcomes: &[DeleteOutcome]) -> Self {
        let deleted = outcomes
            .iter()
            .filter(|o| **o == DeleteOutcome::Deleted)
            .count();
        Self {
            deleted,
            absent: outcomes.len() - deleted,
        }
    }
}

#[derive(Debug, Serialize)]
struct HostMutation {
    silo: MutationOutcome,
    client: MutationOutcome,
}

fn created(result: Result<String, OrchestratorError>) -> Response {
    match result {
        Ok(url) => (StatusCode::CREATED, ApiResponse::ok(CreatedStack { url })).into_response(),
        Err(e) => orchestrator_error(e),
    }
}

fn destroyed(result: Result<Vec<DeleteOutcome>, OrchestratorError>) -> Response {
    match result {
        Ok(outcomes) => ApiResponse::ok(DestroyedStack::from_outcomes(&outcomes)).into_response(),
        Err(e) => orchestrator_error(e),
    }
}

// ── Webhooks ───────────────────────────────────────────────────

/// POST /api/v1/webhooks
pub async fn create_webhook(
    State(state): State<ApiState>,
    Json(req): Json<CreateStackRequest>,
) -> impl IntoResponse {
    created(
        state
            .orchestrator
            .create_webhook_stack(&req.tenant_id, &req.version, &req.image)
            .await,
    )
}

/// DELETE /api/v1/webhooks/{tenant}/{version}
pub async fn destroy_webhook(
    State(state): State<ApiState>,
    Path((tenant, version)): Path<(String, String)>,
) -> impl IntoResponse {
    destroyed(state.orchestrator.destroy_webhook_stack(&tenant, &version).await)
}

// ── Daipps ─────────────────────────────────────────────────────

/// POST /api/v1/daipps
pub async fn create_daipp(
    State(state): State<ApiState>,
    Json(req): Json<CreateStackRequest>,
) -> impl IntoResponse {
    created(
        state
            .orchestrator
            .create_daipp_stack(&req.tenant_id, &req.version, &req.image)
            .await,
    )
}

/// DELETE /api/v1/daipps/{tenant}/{version}
pub async fn destroy_daipp(
    State(state): State<ApiState>,
    Path((tenant, version)): Path<(String, String)>,
) -> impl IntoResponse {
    destroyed(state.orchestrator.destroy_daipp_stack(&tenant, &version).await)
}

// ── Hosts ──────────────────────────────────────────────────────

/// POST /api/v1/hosts
pub async fn create_host(
    State(state): State<ApiState>,
    Json(req): Json<CreateHostRequest>,
) -> impl IntoResponse {
    created(
        state
            .orchestrator
            .create_host_stack(&req.tenant_id, &req.version, &req.inputs)
            .await,
    )
}

/// DELETE /api/v1/hosts/{tenant}/{version}
pub async fn destroy_host(
    State(state): State<ApiState>,
    Path((tenant, version)): Path<(String, String)>,
) -> impl IntoResponse {
    destroyed(state.orchestrator.destroy_host_stack(&tenant, &version).await)
}

/// POST /api/v1/hosts/{tenant}/{version}/upgrade
pub async fn upgrade_host(
    State(state): State<ApiState>,
    Path((tenant, version)): Path<(String, String)>,
    Json(inputs): Json<HostInputs>,
) -> impl IntoResponse {
    match state
        .orchestrator
        .upgrade_application(&tenant, &version, &inputs)
        .await
    {
        Ok((silo, client)) => ApiResponse::ok(HostMutation { silo, client }).into_response(),
        Err(e) => orchestrator_error(e),
    }
}

/// PUT /api/v1/hosts/{tenant}/{version}/config/{role}
pub async fn update_config(
    State(state): State<ApiState>,
    Path((tenant, version, role)): Path<(String, String, String)>,
    Json(inputs): Json<HostInputs>,
) -> impl IntoResponse {
    let role = match parse_role(&role) {
        Ok(role) => role,
        Err(resp) => return resp,
    };
    match state
        .orchestrator
        .update_business_configuration(&tenant, &version, role, &inputs)
        .await
    {
        Ok(EnsureOutcome::Created) => ApiResponse::ok("created").into_response(),
        Ok(EnsureOutcome::Updated) => ApiResponse::ok("updated").into_response(),
        Err(e) => orchestrator_error(e),
    }
}

// ── Deployment mutations ───────────────────────────────────────

/// PUT /api/v1/stacks/{tenant}/{version}/{role}/image
pub async fn update_image(
    State(state): State<ApiState>,
    Path((tenant, version, role)): Path<(String, String, String)>,
    Json(req): Json<ImageRequest>,
) -> impl IntoResponse {
    let role = match parse_role(&role) {
        Ok(role) => role,
        Err(resp) => return resp,
    };
    let id = LogicalStackId::new(&tenant, &version, role);
    match state.orchestrator.update_deployment_image(&id, &req.image).await {
        Ok(outcome) => mutation_response(outcome),
        Err(e) => orchestrator_error(e),
    }
}

/// POST /api/v1/stacks/{tenant}/{version}/{role}/restart
pub async fn restart(
    State(state): State<ApiState>,
    Path((tenant, version, role)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let role = match parse_role(&role) {
        Ok(role) => role,
        Err(resp) => return resp,
    };
    let id = LogicalStackId::new(&tenant, &version, role);
    match state.orchestrator.restart(&id).await {
        Ok(outcome) => mutation_response(outcome),
        Err(e) => orchestrator_error(e),
    }
}

// ── Intents ────────────────────────────────────────────────────

/// GET /api/v1/intents
pub async fn list_pending_intents(State(state): State<ApiState>) -> impl IntoResponse {
    let Some(store) = state.orchestrator.intents() else {
        return ApiResponse::ok(Vec::<()>::new()).into_response();
    };
    match store.pending() {
        Ok(intents) => ApiResponse::ok(intents).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}
