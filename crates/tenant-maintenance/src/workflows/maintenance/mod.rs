//! Maintenance request lifecycle and capacity-constrained staff assignment.
//!
//! Requests are filed by tenants, classified once into a priority, assigned to
//! staff through [`StaffAssignmentPool`], and walked through the status graph by
//! [`RequestLifecycle`]. [`RequestLifecycleService`] ties these to the
//! persistence and notification collaborators.

pub mod accounts;
pub mod archival;
pub mod domain;
pub mod lifecycle;
pub mod priority;
pub mod repository;
pub mod router;
pub mod service;
pub mod staff;

#[cfg(test)]
mod tests;

pub use accounts::{UserAccount, UserRole};
pub use archival::{ArchivalPolicy, ArchiveFlags, ArchiveViewer};
pub use domain::{
    IssueCategory, MaintenanceRequest, Priority, RequestCosts, RequestDraft, RequestId,
    RequestNote, RequestStatus, RequestSummaryView, StaffId, TenantId,
};
pub use lifecycle::{LifecycleError, RequestLifecycle, StatusTransition};
pub use priority::PriorityClassifier;
pub use repository::{
    DirectoryError, MaintenanceRepository, NotificationError, NotificationPublisher,
    RepositoryError, StaffDirectory, StatusNotification,
};
pub use router::maintenance_router;
pub use service::{MaintenanceServiceError, RequestLifecycleService};
pub use staff::{AssignmentError, Reassignment, StaffAssignmentPool, StaffMember};
