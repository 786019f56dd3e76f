use serde::{Deserialize, Serialize};

use super::domain::{MaintenanceRequest, RequestId, RequestStatus, StaffId, TenantId};
use super::staff::StaffMember;

/// Storage abstraction so the service module can be exercised in isolation.
pub trait MaintenanceRepository: Send + Sync {
    fn insert(&self, request: MaintenanceRequest) -> Result<MaintenanceRequest, RepositoryError>;
    fn update(&self, request: MaintenanceRequest) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<MaintenanceRequest>, RepositoryError>;
    fn for_tenant(&self, tenant: &TenantId) -> Result<Vec<MaintenanceRequest>, RepositoryError>;
    fn for_staff(&self, staff: &StaffId) -> Result<Vec<MaintenanceRequest>, RepositoryError>;
    fn with_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<MaintenanceRequest>, RepositoryError>;
}

/// Error enumeration for repository failures. Callers decide whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for tenant-facing status updates (e-mail, SMS, portal inbox).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: StatusNotification) -> Result<(), NotificationError>;
}

/// Payload sent after a successful status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotification {
    pub recipient: String,
    pub request_id: RequestId,
    pub status: RequestStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Source of the staff roster the assignment pool is seeded from.
pub trait StaffDirectory: Send + Sync {
    fn roster(&self) -> Result<Vec<StaffMember>, DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("staff directory unavailable: {0}")]
    Unavailable(String),
}
