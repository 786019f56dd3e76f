use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::MaintenanceConfig;
use crate::workflows::maintenance::domain::{IssueCategory, RequestId, RequestStatus};
use crate::workflows::maintenance::lifecycle::LifecycleError;
use crate::workflows::maintenance::repository::{DirectoryError, RepositoryError};
use crate::workflows::maintenance::router::{
    self, maintenance_router, AssignPayload, ReopenPayload, SubmitPayload, TransitionPayload,
};
use crate::workflows::maintenance::service::{MaintenanceServiceError, RequestLifecycleService};
use crate::workflows::maintenance::staff::AssignmentError;

fn submit_payload(category: IssueCategory) -> SubmitPayload {
    SubmitPayload {
        tenant: tenant_account(),
        request: draft(category),
    }
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("build request")
}

#[tokio::test]
async fn submit_route_creates_requests() {
    let (service, _, _) = build_service();
    let app = maintenance_router(Arc::new(service));
    let body = serde_json::to_value(submit_payload(IssueCategory::Emergency)).expect("payload");

    let response = app
        .oneshot(post_json("/api/v1/maintenance/requests", &body))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["request_id"], "mr-000001");
    assert_eq!(payload["priority"], "emergency");
    assert_eq!(payload["status"], "submitted");
    assert!(payload.get("assigned_staff").is_none());
}

#[tokio::test]
async fn submit_handler_rejects_non_tenants() {
    let (service, _, _) = build_service();
    let payload = SubmitPayload {
        tenant: staff_account("tech-a", None),
        request: draft(IssueCategory::Hvac),
    };

    let response = router::submit_handler::<MemoryRepository, MemoryNotifications>(
        State(Arc::new(service)),
        Json(payload),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "forbidden_role");
}

#[tokio::test]
async fn status_handler_returns_not_found_for_unknown_ids() {
    let (service, _, _) = build_service();

    let response = router::status_handler::<MemoryRepository, MemoryNotifications>(
        State(Arc::new(service)),
        Path("mr-404404".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json_body(response).await["kind"], "not_found");
}

#[tokio::test]
async fn assign_handler_maps_capacity_to_conflict() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let first = service
        .submit(&tenant_account(), draft(IssueCategory::Plumbing))
        .expect("submit");
    let second = service
        .submit(&tenant_account(), draft(IssueCategory::Plumbing))
        .expect("submit");

    let ok = router::assign_handler::<MemoryRepository, MemoryNotifications>(
        State(service.clone()),
        Path(first.id.0.clone()),
        Json(AssignPayload {
            staff_id: staff_id("tech-b"),
        }),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(read_json_body(ok).await["assigned_staff"], "tech-b");

    let full = router::assign_handler::<MemoryRepository, MemoryNotifications>(
        State(service.clone()),
        Path(second.id.0.clone()),
        Json(AssignPayload {
            staff_id: staff_id("tech-b"),
        }),
    )
    .await;
    assert_eq!(full.status(), StatusCode::CONFLICT);
    let body = read_json_body(full).await;
    assert_eq!(body["kind"], "capacity_exceeded");
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("tech-b"));
}

#[tokio::test]
async fn transition_route_enforces_resolution_and_graph() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let request = service
        .submit(&tenant_account(), draft(IssueCategory::Plumbing))
        .expect("submit");
    let uri = format!("/api/v1/maintenance/requests/{}/transition", request.id);

    let skip = maintenance_router(service.clone())
        .oneshot(post_json(&uri, &json!({ "status": "completed", "note": "done" })))
        .await
        .expect("route executes");
    assert_eq!(skip.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(skip).await["kind"], "invalid_transition");

    service
        .assign(&request.id, &staff_id("tech-a"))
        .expect("assign");
    service.start_work(&request.id).expect("start");

    let missing = maintenance_router(service.clone())
        .oneshot(post_json(&uri, &json!({ "status": "completed" })))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json_body(missing).await["kind"], "missing_resolution");

    let payload = TransitionPayload {
        status: RequestStatus::Completed,
        note: Some("Fixed leak".to_string()),
        staff_id: None,
    };
    let done = router::transition_handler::<MemoryRepository, MemoryNotifications>(
        State(service.clone()),
        Path(request.id.0.clone()),
        Json(payload),
    )
    .await;
    assert_eq!(done.status(), StatusCode::OK);
    let body = read_json_body(done).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["resolution"], "Fixed leak");
}

#[tokio::test]
async fn reassign_and_archive_routes_return_their_views() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let request = service
        .submit(&tenant_account(), draft(IssueCategory::Appliance))
        .expect("submit");
    service
        .assign(&request.id, &staff_id("tech-a"))
        .expect("assign");

    let reassigned = maintenance_router(service.clone())
        .oneshot(post_json(
            &format!("/api/v1/maintenance/requests/{}/reassign", request.id),
            &json!({ "staff_id": "tech-b" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(reassigned.status(), StatusCode::OK);
    let body = read_json_body(reassigned).await;
    assert_eq!(body["previous_staff"], "tech-a");
    assert_eq!(body["request"]["assigned_staff"], "tech-b");

    let archived = maintenance_router(service.clone())
        .oneshot(post_json(
            &format!("/api/v1/maintenance/requests/{}/archive", request.id),
            &json!({ "viewer": "staff" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(archived.status(), StatusCode::OK);
    let body = read_json_body(archived).await;
    assert_eq!(body["archive"]["staff_archived"], true);
    assert_eq!(body["archive"]["tenant_archived"], false);
}

#[tokio::test]
async fn available_staff_route_lists_least_loaded_first() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let request = service
        .submit(&tenant_account(), draft(IssueCategory::Hvac))
        .expect("submit");
    service
        .assign(&request.id, &staff_id("tech-a"))
        .expect("assign");

    let response = maintenance_router(service)
        .oneshot(
            Request::get("/api/v1/maintenance/staff/available")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let staff = body.as_array().expect("array of candidates");
    assert_eq!(staff.len(), 2);
    assert_eq!(staff[0]["staff_id"], "tech-b");
    assert_eq!(staff[1]["staff_id"], "tech-a");
    assert_eq!(staff[1]["current_workload"], 1);
}

#[tokio::test]
async fn repository_failures_map_to_internal_error() {
    let repository = Arc::new(ReadOnlyRepository {
        inner: MemoryRepository::default(),
    });
    let service = Arc::new(RequestLifecycleService::new(
        repository,
        Arc::new(MemoryNotifications::default()),
        pool_with(&[("tech-a", 2)]),
        MaintenanceConfig::default(),
    ));
    let request = service
        .submit(&tenant_account(), draft(IssueCategory::Plumbing))
        .expect("submit");

    let response = router::assign_handler::<ReadOnlyRepository, MemoryNotifications>(
        State(service),
        Path(request.id.0.clone()),
        Json(AssignPayload {
            staff_id: staff_id("tech-a"),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json_body(response).await["kind"], "repository_unavailable");
}

#[tokio::test]
async fn reopen_routes_accept_a_named_staff_member() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let first = service
        .submit(&tenant_account(), draft(IssueCategory::PestControl))
        .expect("submit");
    let second = service
        .submit(&tenant_account(), draft(IssueCategory::PestControl))
        .expect("submit");
    service.cancel(&first.id, Some("Duplicate")).expect("cancel");
    service.cancel(&second.id, Some("Duplicate")).expect("cancel");

    let unnamed = maintenance_router(service.clone())
        .oneshot(post_json(
            &format!("/api/v1/maintenance/requests/{}/reopen", first.id),
            &json!({ "reason": "Still seeing ants" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(unnamed.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(unnamed).await["kind"], "no_assignee_for_reopen");

    let reopened = maintenance_router(service.clone())
        .oneshot(post_json(
            &format!("/api/v1/maintenance/requests/{}/reopen", first.id),
            &json!({ "staff_id": "tech-a", "reason": "Still seeing ants" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(reopened.status(), StatusCode::OK);
    let body = read_json_body(reopened).await;
    assert_eq!(body["status"], "reopened");
    assert_eq!(body["assigned_staff"], "tech-a");

    let generic = maintenance_router(service.clone())
        .oneshot(post_json(
            &format!("/api/v1/maintenance/requests/{}/transition", second.id),
            &json!({ "status": "reopened", "staff_id": "tech-b" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(generic.status(), StatusCode::OK);
    assert_eq!(read_json_body(generic).await["assigned_staff"], "tech-b");

    let direct = router::reopen_handler::<MemoryRepository, MemoryNotifications>(
        State(service.clone()),
        Path(first.id.0.clone()),
        Json(ReopenPayload::default()),
    )
    .await;
    assert_eq!(direct.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(direct).await["kind"], "invalid_transition");
}

#[test]
fn errors_map_to_status_codes_by_variant() {
    let request_id = RequestId("mr-000042".to_string());
    let cases = [
        (
            MaintenanceServiceError::from(LifecycleError::MissingResolution),
            StatusCode::UNPROCESSABLE_ENTITY,
            "missing_resolution",
        ),
        (
            MaintenanceServiceError::from(AssignmentError::Lifecycle(
                LifecycleError::Unassigned {
                    to: RequestStatus::Reopened,
                },
            )),
            StatusCode::CONFLICT,
            "unassigned",
        ),
        (
            MaintenanceServiceError::from(AssignmentError::UnknownStaff(staff_id("ghost"))),
            StatusCode::NOT_FOUND,
            "unknown_staff",
        ),
        (
            MaintenanceServiceError::from(AssignmentError::InconsistentWorkload {
                staff_id: staff_id("tech-a"),
                workload: 2,
                assigned: 0,
            }),
            StatusCode::UNPROCESSABLE_ENTITY,
            "inconsistent_workload",
        ),
        (
            MaintenanceServiceError::from(AssignmentError::NoAssigneeForReopen(request_id)),
            StatusCode::CONFLICT,
            "no_assignee_for_reopen",
        ),
        (
            MaintenanceServiceError::from(AssignmentError::Directory(
                DirectoryError::Unavailable("ldap timeout".to_string()),
            )),
            StatusCode::INTERNAL_SERVER_ERROR,
            "directory_unavailable",
        ),
        (
            MaintenanceServiceError::from(RepositoryError::NotFound),
            StatusCode::NOT_FOUND,
            "not_found",
        ),
        (
            MaintenanceServiceError::EmptyNote,
            StatusCode::UNPROCESSABLE_ENTITY,
            "empty_note",
        ),
    ];

    for (err, status, kind) in cases {
        assert_eq!(err.status_code(), status, "{err}");
        assert_eq!(err.kind(), kind, "{err}");
    }
}
