use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::MaintenanceConfig;
use crate::workflows::maintenance::accounts::{UserAccount, UserRole};
use crate::workflows::maintenance::archival::ArchiveFlags;
use crate::workflows::maintenance::domain::{
    IssueCategory, MaintenanceRequest, Priority, RequestCosts, RequestDraft, RequestId,
    RequestStatus, StaffId, TenantId,
};
use crate::workflows::maintenance::repository::{
    DirectoryError, MaintenanceRepository, NotificationError, NotificationPublisher,
    RepositoryError, StaffDirectory, StatusNotification,
};
use crate::workflows::maintenance::service::RequestLifecycleService;
use crate::workflows::maintenance::staff::{StaffAssignmentPool, StaffMember};

pub(super) fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 6, 9, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn staff_id(raw: &str) -> StaffId {
    StaffId(raw.to_string())
}

pub(super) fn request_in(status: RequestStatus, assignee: Option<&str>) -> MaintenanceRequest {
    MaintenanceRequest {
        id: RequestId("mr-000042".to_string()),
        tenant_id: TenantId("tenant-7".to_string()),
        tenant_contact: "tenant7@example.com".to_string(),
        unit: "B-104".to_string(),
        description: "Kitchen sink leaking under the cabinet".to_string(),
        category: IssueCategory::Plumbing,
        priority: Priority::High,
        status,
        submitted_at: at(0),
        updated_at: at(0),
        scheduled_for: None,
        completed_at: None,
        assigned_staff: assignee.map(staff_id),
        costs: RequestCosts::default(),
        resolution: None,
        notes: Vec::new(),
        archive: ArchiveFlags::default(),
    }
}

pub(super) fn request_with_id(id: &str) -> MaintenanceRequest {
    let mut request = request_in(RequestStatus::Submitted, None);
    request.id = RequestId(id.to_string());
    request
}

pub(super) fn pool_with(members: &[(&str, u32)]) -> StaffAssignmentPool {
    let pool = StaffAssignmentPool::new();
    for (id, capacity) in members {
        pool.enroll(StaffMember::new(staff_id(id), id.to_uppercase(), *capacity))
            .expect("enroll staff");
    }
    pool
}

pub(super) fn workload(pool: &StaffAssignmentPool, id: &str) -> u32 {
    pool.member(&staff_id(id))
        .expect("staff enrolled")
        .current_workload
}

pub(super) fn staff_load<R, N>(service: &RequestLifecycleService<R, N>, id: &str) -> u32
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    service
        .staff_member(&staff_id(id))
        .expect("staff enrolled")
        .current_workload
}

pub(super) fn tenant_account() -> UserAccount {
    UserAccount {
        id: "tenant-7".to_string(),
        display_name: "Jordan Reyes".to_string(),
        contact: "tenant7@example.com".to_string(),
        role: UserRole::Tenant {
            unit: "B-104".to_string(),
        },
    }
}

pub(super) fn staff_account(id: &str, max_capacity: Option<u32>) -> UserAccount {
    UserAccount {
        id: id.to_string(),
        display_name: format!("Tech {id}"),
        contact: format!("{id}@example.com"),
        role: UserRole::Staff {
            trade: "General maintenance".to_string(),
            max_capacity,
        },
    }
}

pub(super) fn draft(category: IssueCategory) -> RequestDraft {
    RequestDraft {
        unit: "B-104".to_string(),
        description: "Water pooling under the kitchen sink".to_string(),
        category,
    }
}

pub(super) type TestService = RequestLifecycleService<MemoryRepository, MemoryNotifications>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<MemoryNotifications>) {
    let repository = Arc::new(MemoryRepository::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let pool = pool_with(&[("tech-a", 2), ("tech-b", 1)]);
    let service = RequestLifecycleService::new(
        repository.clone(),
        notifications.clone(),
        pool,
        MaintenanceConfig::default(),
    );
    (service, repository, notifications)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<BTreeMap<RequestId, MaintenanceRequest>>>,
}

impl MemoryRepository {
    fn filtered(
        &self,
        predicate: impl Fn(&MaintenanceRequest) -> bool,
    ) -> Vec<MaintenanceRequest> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .values()
            .filter(|request| predicate(request))
            .cloned()
            .collect()
    }
}

impl MaintenanceRepository for MemoryRepository {
    fn insert(&self, request: MaintenanceRequest) -> Result<MaintenanceRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: MaintenanceRequest) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<MaintenanceRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_tenant(&self, tenant: &TenantId) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        Ok(self.filtered(|request| &request.tenant_id == tenant))
    }

    fn for_staff(&self, staff: &StaffId) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        Ok(self.filtered(|request| request.is_assigned_to(staff)))
    }

    fn with_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        Ok(self.filtered(|request| request.status == status))
    }
}

/// Reads from an inner repository but refuses every write after the first insert.
pub(super) struct ReadOnlyRepository {
    pub(super) inner: MemoryRepository,
}

impl MaintenanceRepository for ReadOnlyRepository {
    fn insert(&self, request: MaintenanceRequest) -> Result<MaintenanceRequest, RepositoryError> {
        self.inner.insert(request)
    }

    fn update(&self, _request: MaintenanceRequest) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<MaintenanceRequest>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn for_tenant(&self, tenant: &TenantId) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        self.inner.for_tenant(tenant)
    }

    fn for_staff(&self, staff: &StaffId) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        self.inner.for_staff(staff)
    }

    fn with_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        self.inner.with_status(status)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    events: Arc<Mutex<Vec<StatusNotification>>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<StatusNotification> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }

    pub(super) fn statuses(&self) -> Vec<RequestStatus> {
        self.events().into_iter().map(|event| event.status).collect()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notification: StatusNotification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct OfflineNotifications;

impl NotificationPublisher for OfflineNotifications {
    fn publish(&self, _notification: StatusNotification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct FixedDirectory(pub(super) Vec<StaffMember>);

impl StaffDirectory for FixedDirectory {
    fn roster(&self) -> Result<Vec<StaffMember>, DirectoryError> {
        Ok(self.0.clone())
    }
}

pub(super) struct OfflineDirectory;

impl StaffDirectory for OfflineDirectory {
    fn roster(&self) -> Result<Vec<StaffMember>, DirectoryError> {
        Err(DirectoryError::Unavailable("ldap timeout".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
