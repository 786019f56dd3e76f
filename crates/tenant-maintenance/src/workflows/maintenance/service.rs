use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::accounts::{UserAccount, UserRole};
use super::archival::{ArchivalPolicy, ArchiveFlags, ArchiveViewer};
use super::domain::{
    MaintenanceRequest, Priority, RequestCosts, RequestDraft, RequestId, RequestStatus, StaffId,
    TenantId,
};
use super::lifecycle::{LifecycleError, RequestLifecycle, StatusTransition};
use super::priority::PriorityClassifier;
use super::repository::{
    MaintenanceRepository, NotificationPublisher, RepositoryError, StatusNotification,
};
use super::staff::{AssignmentError, Reassignment, StaffAssignmentPool, StaffMember};
use crate::config::MaintenanceConfig;

/// Service composing the classifier, lifecycle, assignment pool, and collaborators.
///
/// Request mutations run under a single writer lock held from fetch to update, so
/// an assignment can never interleave with another change to the same staff
/// member or request. The service owns its pool; roster changes go through the
/// staff operations below, which take the same lock.
pub struct RequestLifecycleService<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    pool: StaffAssignmentPool,
    config: MaintenanceConfig,
    sequence: AtomicU64,
    writer: Mutex<()>,
}

impl<R, N> RequestLifecycleService<R, N>
where
    R: MaintenanceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifications: Arc<N>,
        pool: StaffAssignmentPool,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            repository,
            notifications,
            pool,
            config,
            sequence: AtomicU64::new(1),
            writer: Mutex::new(()),
        }
    }

    pub fn staff_member(&self, staff_id: &StaffId) -> Option<StaffMember> {
        self.pool.member(staff_id)
    }

    /// Every enrolled staff member in enrolment order, available or not.
    pub fn staff_roster(&self) -> Vec<StaffMember> {
        self.pool.members()
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("mr-{id:06}"))
    }

    /// File a new request on behalf of a tenant. Priority is derived from the category.
    pub fn submit(
        &self,
        tenant: &UserAccount,
        draft: RequestDraft,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        let tenant_id = tenant
            .tenant_id()
            .ok_or_else(|| MaintenanceServiceError::NotATenant {
                account: tenant.id.clone(),
                role: tenant.role.label(),
            })?;

        let description = draft.description.trim();
        if description.is_empty() {
            return Err(MaintenanceServiceError::EmptyDescription);
        }

        let unit = match draft.unit.trim() {
            "" => tenant.leased_unit().unwrap_or_default().to_string(),
            unit => unit.to_string(),
        };

        let now = Utc::now();
        let request = MaintenanceRequest {
            id: self.next_request_id(),
            tenant_id,
            tenant_contact: tenant.contact.clone(),
            unit,
            description: description.to_string(),
            category: draft.category,
            priority: PriorityClassifier::classify(draft.category),
            status: RequestStatus::Submitted,
            submitted_at: now,
            updated_at: now,
            scheduled_for: None,
            completed_at: None,
            assigned_staff: None,
            costs: RequestCosts::default(),
            resolution: None,
            notes: Vec::new(),
            archive: ArchiveFlags::default(),
        };

        let stored = self.repository.insert(request)?;
        info!(
            request_id = %stored.id,
            category = stored.category.label(),
            priority = stored.priority.label(),
            "maintenance request submitted"
        );
        Ok(stored)
    }

    pub fn acknowledge(
        &self,
        id: &RequestId,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.apply_status(id, RequestStatus::Acknowledged, None)
    }

    pub fn start_work(&self, id: &RequestId) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.apply_status(id, RequestStatus::InProgress, None)
    }

    pub fn hold(
        &self,
        id: &RequestId,
        note: Option<&str>,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.apply_status(id, RequestStatus::OnHold, note)
    }

    /// Resume an on-hold request. Unlike `start_work`, only accepts ON_HOLD requests.
    pub fn resume(&self, id: &RequestId) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.transition_with(id, |_, request, now| {
            if request.status != RequestStatus::OnHold {
                return Err(LifecycleError::InvalidTransition {
                    from: request.status,
                    to: RequestStatus::InProgress,
                }
                .into());
            }
            Ok(RequestLifecycle::apply(
                request,
                RequestStatus::InProgress,
                now,
                None,
            )?)
        })
    }

    pub fn assign(
        &self,
        id: &RequestId,
        staff_id: &StaffId,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.transition_with(id, |pool, request, now| {
            Ok(pool.assign(request, staff_id, now)?)
        })
    }

    pub fn reassign(
        &self,
        id: &RequestId,
        staff_id: &StaffId,
    ) -> Result<(MaintenanceRequest, Reassignment), MaintenanceServiceError> {
        let (request, reassignment) = self.write(id, |request, now| {
            Ok(self.pool.reassign(request, staff_id, now)?)
        })?;

        info!(
            request_id = %request.id,
            previous = ?reassignment.previous,
            next = %reassignment.next,
            "maintenance request reassigned"
        );
        Ok((request, reassignment))
    }

    pub fn complete(
        &self,
        id: &RequestId,
        resolution: &str,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.transition_with(id, |pool, request, now| {
            Ok(pool.complete(request, resolution, now)?)
        })
    }

    pub fn cancel(
        &self,
        id: &RequestId,
        reason: Option<&str>,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.transition_with(id, |pool, request, now| {
            Ok(pool.cancel(request, reason, now)?)
        })
    }

    /// Reopen a completed or cancelled request, optionally handing it to a new assignee.
    pub fn reopen(
        &self,
        id: &RequestId,
        staff_id: Option<&StaffId>,
        reason: Option<&str>,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.transition_with(id, |pool, request, now| {
            Ok(pool.reopen(request, staff_id, reason, now)?)
        })
    }

    /// Generic status entry point used by adapters that only know the target state.
    ///
    /// `staff_id` names the assignee for ASSIGNED and REOPENED; when omitted those
    /// fall back to the current or previous assignee. Other targets ignore it.
    pub fn transition(
        &self,
        id: &RequestId,
        to: RequestStatus,
        note: Option<&str>,
        staff_id: Option<&StaffId>,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        match to {
            RequestStatus::Completed => self.complete(id, note.unwrap_or_default()),
            RequestStatus::Cancelled => self.cancel(id, note),
            RequestStatus::Reopened => self.reopen(id, staff_id, note),
            RequestStatus::Assigned => self.transition_with(id, |pool, request, now| {
                match staff_id.cloned().or_else(|| request.assigned_staff.clone()) {
                    Some(staff_id) => Ok(pool.assign(request, &staff_id, now)?),
                    None => {
                        RequestLifecycle::check(request, RequestStatus::Assigned, None)?;
                        Err(LifecycleError::Unassigned {
                            to: RequestStatus::Assigned,
                        }
                        .into())
                    }
                }
            }),
            other => self.apply_status(id, other, note),
        }
    }

    /// Hide a request from one viewer's active list. Status is left untouched.
    pub fn archive(
        &self,
        id: &RequestId,
        viewer: ArchiveViewer,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        let (request, changed) =
            self.write(id, |request, _| Ok(ArchivalPolicy::archive(request, viewer)))?;
        if changed {
            info!(request_id = %request.id, ?viewer, "maintenance request archived");
        }
        Ok(request)
    }

    /// Manual priority edit. The classifier is not consulted again.
    pub fn override_priority(
        &self,
        id: &RequestId,
        priority: Priority,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        let (request, previous) = self.write(id, |request, now| {
            let previous = request.priority;
            if previous != priority {
                request.priority = priority;
                request.updated_at = now;
                request.push_note(
                    now,
                    format!(
                        "priority changed from {} to {}",
                        previous.label(),
                        priority.label()
                    ),
                );
            }
            Ok(previous)
        })?;

        info!(
            request_id = %request.id,
            from = previous.label(),
            to = priority.label(),
            "maintenance priority overridden"
        );
        Ok(request)
    }

    pub fn schedule(
        &self,
        id: &RequestId,
        when: DateTime<Utc>,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        let (request, _) = self.write(id, |request, now| {
            if request.status.is_terminal() {
                return Err(MaintenanceServiceError::Inactive {
                    request_id: request.id.clone(),
                    status: request.status,
                });
            }
            request.scheduled_for = Some(when);
            request.updated_at = now;
            Ok(())
        })?;
        Ok(request)
    }

    pub fn record_costs(
        &self,
        id: &RequestId,
        costs: RequestCosts,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        let (request, _) = self.write(id, |request, now| {
            request.costs = costs;
            request.updated_at = now;
            Ok(())
        })?;
        Ok(request)
    }

    pub fn add_note(
        &self,
        id: &RequestId,
        text: &str,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MaintenanceServiceError::EmptyNote);
        }

        let (request, _) = self.write(id, |request, now| {
            request.push_note(now, text);
            request.updated_at = now;
            Ok(())
        })?;
        Ok(request)
    }

    pub fn get(&self, id: &RequestId) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        let request = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(request)
    }

    pub fn for_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<MaintenanceRequest>, MaintenanceServiceError> {
        Ok(self.repository.for_tenant(tenant)?)
    }

    pub fn for_staff(
        &self,
        staff_id: &StaffId,
    ) -> Result<Vec<MaintenanceRequest>, MaintenanceServiceError> {
        Ok(self.repository.for_staff(staff_id)?)
    }

    pub fn with_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<MaintenanceRequest>, MaintenanceServiceError> {
        Ok(self.repository.with_status(status)?)
    }

    /// Tenant's requests minus the ones they archived.
    pub fn active_for_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<MaintenanceRequest>, MaintenanceServiceError> {
        let mut requests = self.repository.for_tenant(tenant)?;
        requests.retain(|request| ArchivalPolicy::visible_to(request, ArchiveViewer::Tenant));
        Ok(requests)
    }

    /// Staff member's requests minus the ones they archived.
    pub fn active_for_staff(
        &self,
        staff_id: &StaffId,
    ) -> Result<Vec<MaintenanceRequest>, MaintenanceServiceError> {
        let mut requests = self.repository.for_staff(staff_id)?;
        requests.retain(|request| ArchivalPolicy::visible_to(request, ArchiveViewer::Staff));
        Ok(requests)
    }

    /// Enroll a staff account into the assignment pool.
    pub fn enroll_staff(
        &self,
        account: &UserAccount,
    ) -> Result<StaffMember, MaintenanceServiceError> {
        let max_capacity = match &account.role {
            UserRole::Staff { max_capacity, .. } => {
                max_capacity.unwrap_or(self.config.default_staff_capacity)
            }
            other => {
                return Err(MaintenanceServiceError::NotStaff {
                    account: account.id.clone(),
                    role: other.label(),
                })
            }
        };

        let member = StaffMember::new(
            StaffId(account.id.clone()),
            account.display_name.clone(),
            max_capacity,
        );

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.pool.enroll(member.clone())?;
        info!(staff_id = %member.id, capacity = max_capacity, "staff member enrolled");
        Ok(member)
    }

    pub fn list_available(&self) -> Vec<StaffMember> {
        self.pool.list_available()
    }

    pub fn set_availability(
        &self,
        staff_id: &StaffId,
        available: bool,
    ) -> Result<StaffMember, MaintenanceServiceError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let member = self.pool.set_availability(staff_id, available)?;
        info!(staff_id = %member.id, available, "staff availability changed");
        Ok(member)
    }

    pub fn set_capacity(
        &self,
        staff_id: &StaffId,
        capacity: u32,
    ) -> Result<StaffMember, MaintenanceServiceError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let member = self.pool.set_capacity(staff_id, capacity)?;
        info!(staff_id = %member.id, capacity, "staff capacity changed");
        Ok(member)
    }

    fn apply_status(
        &self,
        id: &RequestId,
        to: RequestStatus,
        note: Option<&str>,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError> {
        self.transition_with(id, |_, request, now| {
            Ok(RequestLifecycle::apply(request, to, now, note)?)
        })
    }

    fn transition_with<F>(
        &self,
        id: &RequestId,
        op: F,
    ) -> Result<MaintenanceRequest, MaintenanceServiceError>
    where
        F: FnOnce(
            &StaffAssignmentPool,
            &mut MaintenanceRequest,
            DateTime<Utc>,
        ) -> Result<StatusTransition, MaintenanceServiceError>,
    {
        let pool = &self.pool;
        let (request, transition) = self.write(id, |request, now| op(pool, request, now))?;

        info!(
            request_id = %transition.request_id,
            from = %transition.from,
            to = %transition.to,
            assigned_staff = ?request.assigned_staff,
            "maintenance request transitioned"
        );
        self.notify(&request);
        Ok(request)
    }

    /// Fetch, mutate, and persist one request under the writer lock. Pool counters
    /// are rolled back when the update cannot be stored.
    fn write<T, F>(
        &self,
        id: &RequestId,
        op: F,
    ) -> Result<(MaintenanceRequest, T), MaintenanceServiceError>
    where
        F: FnOnce(&mut MaintenanceRequest, DateTime<Utc>) -> Result<T, MaintenanceServiceError>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut request = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        let roster = self.pool.members();

        let outcome = op(&mut request, Utc::now())?;

        if let Err(err) = self.repository.update(request.clone()) {
            self.pool.restore(roster);
            return Err(err.into());
        }

        Ok((request, outcome))
    }

    // Delivery is fire-and-forget; failures are logged and never undo the transition.
    fn notify(&self, request: &MaintenanceRequest) {
        let notification = StatusNotification {
            recipient: request.tenant_contact.clone(),
            request_id: request.id.clone(),
            status: request.status,
        };

        if let Err(err) = self.notifications.publish(notification) {
            warn!(request_id = %request.id, error = %err, "status notification not delivered");
        }
    }
}

/// Error raised by the lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceServiceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("account {account} ({role}) cannot file maintenance requests")]
    NotATenant { account: String, role: &'static str },
    #[error("account {account} ({role}) is not a staff account")]
    NotStaff { account: String, role: &'static str },
    #[error("request {request_id} is {status} and no longer accepts scheduling")]
    Inactive {
        request_id: RequestId,
        status: RequestStatus,
    },
    #[error("request description must not be empty")]
    EmptyDescription,
    #[error("note text must not be empty")]
    EmptyNote,
}

impl MaintenanceServiceError {
    /// The lifecycle rejection behind this error, whether raised directly or by the pool.
    pub fn lifecycle(&self) -> Option<&LifecycleError> {
        match self {
            MaintenanceServiceError::Lifecycle(err)
            | MaintenanceServiceError::Assignment(AssignmentError::Lifecycle(err)) => Some(err),
            _ => None,
        }
    }
}
