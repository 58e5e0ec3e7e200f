use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{CyclePeriod, EvaluationId, Principal, Role, UserId};
use super::notify::PushChannel;
use super::repository::{EvaluationRepository, RepositoryError};
use super::scheduler::{CycleError, CycleScheduler};
use super::service::{AppraisalService, SaveEntryRequest, WorkflowError};

/// Shared state for the appraisal endpoints.
pub struct AppraisalState<R, P> {
    pub service: Arc<AppraisalService<R, P>>,
    pub scheduler: Arc<CycleScheduler<R, P>>,
}

impl<R, P> Clone for AppraisalState<R, P> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

/// Router builder exposing the workflow endpoints.
///
/// The acting identity arrives through trusted gateway headers (`x-actor-id`,
/// `x-actor-role`) injected by the portal's session layer; requests without
/// them are rejected before the capability gate is consulted.
pub fn appraisal_router<R, P>(state: AppraisalState<R, P>) -> Router
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    Router::new()
        .route(
            "/api/v1/appraisals/cycles/:period/run",
            post(run_cycle_handler::<R, P>),
        )
        .route(
            "/api/v1/appraisals/cycles/:period/report",
            get(cycle_report_handler::<R, P>),
        )
        .route(
            "/api/v1/appraisals/:id/entries",
            post(save_entry_handler::<R, P>),
        )
        .route("/api/v1/appraisals/:id/submit", post(submit_handler::<R, P>))
        .route(
            "/api/v1/appraisals/:id/approve",
            post(approve_handler::<R, P>),
        )
        .route("/api/v1/appraisals/:id/reject", post(reject_handler::<R, P>))
        .route("/api/v1/appraisals/:id", get(status_handler::<R, P>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    reason: String,
}

async fn run_cycle_handler<R, P>(
    State(state): State<AppraisalState<R, P>>,
    Path(period): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    let principal = match principal_from_headers(&headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let period = match parse_period(&period) {
        Ok(period) => period,
        Err(response) => return response,
    };

    match state.scheduler.generate(&principal, period) {
        Ok(summary) => (StatusCode::ACCEPTED, Json(summary)).into_response(),
        Err(err) => cycle_error_response(err),
    }
}

async fn cycle_report_handler<R, P>(
    State(state): State<AppraisalState<R, P>>,
    Path(period): Path<String>,
) -> Response
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    let period = match parse_period(&period) {
        Ok(period) => period,
        Err(response) => return response,
    };

    match state.service.cycle_report(period) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

async fn save_entry_handler<R, P>(
    State(state): State<AppraisalState<R, P>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SaveEntryRequest>,
) -> Response
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    let principal = match principal_from_headers(&headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state
        .service
        .save_entry(&principal, &EvaluationId(id), request)
    {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation.status_view())).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

async fn submit_handler<R, P>(
    State(state): State<AppraisalState<R, P>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    let principal = match principal_from_headers(&headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state.service.submit(&principal, &EvaluationId(id)) {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation.status_view())).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

async fn approve_handler<R, P>(
    State(state): State<AppraisalState<R, P>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    let principal = match principal_from_headers(&headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state.service.approve(&principal, &EvaluationId(id)) {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation.status_view())).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

async fn reject_handler<R, P>(
    State(state): State<AppraisalState<R, P>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RejectRequest>,
) -> Response
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    let principal = match principal_from_headers(&headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state
        .service
        .reject(&principal, &EvaluationId(id), &request.reason)
    {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation.status_view())).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

async fn status_handler<R, P>(
    State(state): State<AppraisalState<R, P>>,
    Path(id): Path<String>,
) -> Response
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    match state.service.get(&EvaluationId(id)) {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation.status_view())).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, Response> {
    let actor = headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty());
    let role = headers
        .get("x-actor-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse);

    match (actor, role) {
        (Some(actor), Some(role)) => Ok(Principal {
            id: UserId(actor.trim().to_string()),
            role,
        }),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing or invalid actor identity headers" })),
        )
            .into_response()),
    }
}

fn parse_period(raw: &str) -> Result<CyclePeriod, Response> {
    raw.parse().map_err(|err: super::domain::PeriodParseError| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response()
    })
}

fn workflow_error_response(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::IncompleteEvaluation { .. }
        | WorkflowError::RatingOutOfRange { .. }
        | WorkflowError::RejectionReasonRequired(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::StaleState { .. }
        | WorkflowError::EvaluationClosed(_)
        | WorkflowError::EntriesLocked { .. } => StatusCode::CONFLICT,
        WorkflowError::NotAssigned { .. } | WorkflowError::Unauthorized(_) => {
            StatusCode::FORBIDDEN
        }
        WorkflowError::Repository(err) => repository_status(err),
    };

    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn cycle_error_response(err: CycleError) -> Response {
    let status = match &err {
        CycleError::NoEligibleEmployees(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CycleError::Unauthorized(_) => StatusCode::FORBIDDEN,
        CycleError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::Conflict | RepositoryError::Stale => StatusCode::CONFLICT,
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
