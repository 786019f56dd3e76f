use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::accounts::UserAccount;
use super::archival::ArchiveViewer;
use super::domain::{RequestDraft, RequestId, RequestStatus, StaffId};
use super::lifecycle::LifecycleError;
use super::repository::{MaintenanceRepository, NotificationPublisher, RepositoryError};
use super::service::{MaintenanceServiceError, RequestLifecycleService};
use super::staff::{AssignmentError, StaffMember};

type SharedService<R, N> = Arc<RequestLifecycleService<R, N>>;

/// Router builder exposing the lifecycle service over HTTP.
pub fn maintenance_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/maintenance/requests", post(submit_handler::<R, N>))
        .route(
            "/api/v1/maintenance/requests/:request_id",
            get(status_handler::<R, N>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/assign",
            post(assign_handler::<R, N>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/reassign",
            post(reassign_handler::<R, N>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/transition",
            post(transition_handler::<R, N>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/reopen",
            post(reopen_handler::<R, N>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/archive",
            post(archive_handler::<R, N>),
        )
        .route(
            "/api/v1/maintenance/staff/available",
            get(available_staff_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub tenant: UserAccount,
    pub request: RequestDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignPayload {
    pub staff_id: StaffId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionPayload {
    pub status: RequestStatus,
    #[serde(default)]
    pub note: Option<String>,
    /// Assignee for ASSIGNED or REOPENED targets.
    #[serde(default)]
    pub staff_id: Option<StaffId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReopenPayload {
    #[serde(default)]
    pub staff_id: Option<StaffId>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivePayload {
    pub viewer: ArchiveViewer,
}

/// Assignment candidate as presented to managers.
#[derive(Debug, Clone, Serialize)]
pub struct StaffCandidateView {
    pub staff_id: StaffId,
    pub display_name: String,
    pub current_workload: u32,
    pub max_capacity: u32,
}

impl From<StaffMember> for StaffCandidateView {
    fn from(member: StaffMember) -> Self {
        Self {
            staff_id: member.id,
            display_name: member.display_name,
            current_workload: member.current_workload,
            max_capacity: member.max_capacity,
        }
    }
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(payload): Json<SubmitPayload>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.submit(&payload.tenant, payload.request) {
        Ok(request) => (StatusCode::CREATED, Json(request.summary_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.get(&RequestId(request_id)) {
        Ok(request) => (StatusCode::OK, Json(request.summary_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn assign_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(request_id): Path<String>,
    Json(payload): Json<AssignPayload>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.assign(&RequestId(request_id), &payload.staff_id) {
        Ok(request) => (StatusCode::OK, Json(request.summary_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reassign_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(request_id): Path<String>,
    Json(payload): Json<AssignPayload>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.reassign(&RequestId(request_id), &payload.staff_id) {
        Ok((request, reassignment)) => {
            let body = json!({
                "request": request.summary_view(),
                "previous_staff": reassignment.previous,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn transition_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(request_id): Path<String>,
    Json(payload): Json<TransitionPayload>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let id = RequestId(request_id);
    match service.transition(
        &id,
        payload.status,
        payload.note.as_deref(),
        payload.staff_id.as_ref(),
    ) {
        Ok(request) => (StatusCode::OK, Json(request.summary_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reopen_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(request_id): Path<String>,
    Json(payload): Json<ReopenPayload>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let id = RequestId(request_id);
    match service.reopen(&id, payload.staff_id.as_ref(), payload.reason.as_deref()) {
        Ok(request) => (StatusCode::OK, Json(request.summary_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn archive_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(request_id): Path<String>,
    Json(payload): Json<ArchivePayload>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.archive(&RequestId(request_id), payload.viewer) {
        Ok(request) => {
            let body = json!({
                "request_id": request.id,
                "archive": request.archive,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn available_staff_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let candidates: Vec<StaffCandidateView> = service
        .list_available()
        .into_iter()
        .map(StaffCandidateView::from)
        .collect();
    (StatusCode::OK, Json(candidates)).into_response()
}

fn error_response(err: MaintenanceServiceError) -> Response {
    let payload = json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    (err.status_code(), Json(payload)).into_response()
}

impl MaintenanceServiceError {
    /// Stable machine-readable tag for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            MaintenanceServiceError::Lifecycle(err) => lifecycle_kind(err),
            MaintenanceServiceError::Assignment(err) => match err {
                AssignmentError::CapacityExceeded { .. } => "capacity_exceeded",
                AssignmentError::StaffUnavailable { .. } => "staff_unavailable",
                AssignmentError::UnknownStaff(_) => "unknown_staff",
                AssignmentError::DuplicateStaff(_) => "duplicate_staff",
                AssignmentError::InvalidCapacity { .. } => "invalid_capacity",
                AssignmentError::CapacityBelowWorkload { .. } => "capacity_below_workload",
                AssignmentError::AlreadyAssigned { .. } => "already_assigned",
                AssignmentError::InconsistentWorkload { .. } => "inconsistent_workload",
                AssignmentError::NoAssigneeForReopen(_) => "no_assignee_for_reopen",
                AssignmentError::Directory(_) => "directory_unavailable",
                AssignmentError::Lifecycle(err) => lifecycle_kind(err),
            },
            MaintenanceServiceError::Repository(RepositoryError::NotFound) => "not_found",
            MaintenanceServiceError::Repository(RepositoryError::Conflict) => "conflict",
            MaintenanceServiceError::Repository(RepositoryError::Unavailable(_)) => {
                "repository_unavailable"
            }
            MaintenanceServiceError::NotATenant { .. } | MaintenanceServiceError::NotStaff { .. } => {
                "forbidden_role"
            }
            MaintenanceServiceError::Inactive { .. } => "inactive",
            MaintenanceServiceError::EmptyDescription => "empty_description",
            MaintenanceServiceError::EmptyNote => "empty_note",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MaintenanceServiceError::Lifecycle(err) => lifecycle_status(err),
            MaintenanceServiceError::Assignment(err) => match err {
                AssignmentError::UnknownStaff(_) => StatusCode::NOT_FOUND,
                AssignmentError::InvalidCapacity { .. }
                | AssignmentError::InconsistentWorkload { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AssignmentError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AssignmentError::CapacityExceeded { .. }
                | AssignmentError::StaffUnavailable { .. }
                | AssignmentError::DuplicateStaff(_)
                | AssignmentError::CapacityBelowWorkload { .. }
                | AssignmentError::AlreadyAssigned { .. }
                | AssignmentError::NoAssigneeForReopen(_) => StatusCode::CONFLICT,
                AssignmentError::Lifecycle(err) => lifecycle_status(err),
            },
            MaintenanceServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            MaintenanceServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            MaintenanceServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            MaintenanceServiceError::NotATenant { .. } | MaintenanceServiceError::NotStaff { .. } => {
                StatusCode::FORBIDDEN
            }
            MaintenanceServiceError::Inactive { .. } => StatusCode::CONFLICT,
            MaintenanceServiceError::EmptyDescription | MaintenanceServiceError::EmptyNote => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }
}

fn lifecycle_kind(err: &LifecycleError) -> &'static str {
    match err {
        LifecycleError::InvalidTransition { .. } => "invalid_transition",
        LifecycleError::MissingResolution => "missing_resolution",
        LifecycleError::Unassigned { .. } => "unassigned",
    }
}

fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::MissingResolution => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::InvalidTransition { .. } | LifecycleError::Unassigned { .. } => {
            StatusCode::CONFLICT
        }
    }
}
