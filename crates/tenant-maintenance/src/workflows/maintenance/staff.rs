use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{MaintenanceRequest, RequestId, RequestStatus, StaffId};
use super::lifecycle::{LifecycleError, RequestLifecycle, StatusTransition};
use super::repository::{DirectoryError, StaffDirectory};

/// Maintenance staff member with a bounded number of active assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub display_name: String,
    pub available: bool,
    pub current_workload: u32,
    pub max_capacity: u32,
    /// Requests currently counted against this member's workload.
    pub assigned_requests: BTreeSet<RequestId>,
}

impl StaffMember {
    pub fn new(id: StaffId, display_name: impl Into<String>, max_capacity: u32) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            available: true,
            current_workload: 0,
            max_capacity,
            assigned_requests: BTreeSet::new(),
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.current_workload < self.max_capacity
    }

    pub fn can_accept(&self) -> bool {
        self.available && self.has_capacity()
    }

    fn check_accepts(&self) -> Result<(), AssignmentError> {
        if !self.available {
            return Err(AssignmentError::StaffUnavailable {
                staff_id: self.id.clone(),
            });
        }
        self.check_capacity()
    }

    // Availability gates new work only; returning work still needs a free slot.
    fn check_capacity(&self) -> Result<(), AssignmentError> {
        if !self.has_capacity() {
            return Err(AssignmentError::CapacityExceeded {
                staff_id: self.id.clone(),
                workload: self.current_workload,
                capacity: self.max_capacity,
            });
        }
        Ok(())
    }

    fn take(&mut self, request_id: &RequestId) {
        self.current_workload += 1;
        self.assigned_requests.insert(request_id.clone());
    }

    // Floors at zero so an out-of-order release cannot underflow.
    fn release(&mut self, request_id: &RequestId) {
        self.current_workload = self.current_workload.saturating_sub(1);
        self.assigned_requests.remove(request_id);
    }
}

/// Outcome of moving an active request between staff members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reassignment {
    pub request_id: RequestId,
    pub previous: Option<StaffId>,
    pub next: StaffId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    #[error("staff member {staff_id} is at capacity ({workload}/{capacity})")]
    CapacityExceeded {
        staff_id: StaffId,
        workload: u32,
        capacity: u32,
    },
    #[error("staff member {staff_id} is not available for new assignments")]
    StaffUnavailable { staff_id: StaffId },
    #[error("unknown staff member {0}")]
    UnknownStaff(StaffId),
    #[error("staff member {0} is already enrolled")]
    DuplicateStaff(StaffId),
    #[error("staff member {staff_id} needs a positive capacity covering workload {workload} (found {capacity})")]
    InvalidCapacity {
        staff_id: StaffId,
        capacity: u32,
        workload: u32,
    },
    #[error("cannot lower capacity of {staff_id} to {capacity} below current workload {workload}")]
    CapacityBelowWorkload {
        staff_id: StaffId,
        capacity: u32,
        workload: u32,
    },
    #[error("request {request_id} is already assigned to {staff_id}")]
    AlreadyAssigned {
        request_id: RequestId,
        staff_id: StaffId,
    },
    #[error("staff member {staff_id} reports workload {workload} but holds {assigned} requests")]
    InconsistentWorkload {
        staff_id: StaffId,
        workload: u32,
        assigned: usize,
    },
    #[error("request {0} has no previous assignee; name a staff member to reopen it")]
    NoAssigneeForReopen(RequestId),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Roster of staff and their workload counters.
///
/// Every operation holds the roster lock from the capacity check through the
/// counter update, and stages request changes on a copy that is written back only
/// once the lifecycle accepted them. A failed call leaves staff and request as
/// they were.
#[derive(Debug, Default)]
pub struct StaffAssignmentPool {
    roster: Mutex<Vec<StaffMember>>,
}

impl StaffAssignmentPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_directory<D>(directory: &D) -> Result<Self, AssignmentError>
    where
        D: StaffDirectory + ?Sized,
    {
        let pool = Self::new();
        for member in directory.roster()? {
            pool.enroll(member)?;
        }
        Ok(pool)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StaffMember>> {
        self.roster.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn position(roster: &[StaffMember], staff_id: &StaffId) -> Result<usize, AssignmentError> {
        roster
            .iter()
            .position(|member| &member.id == staff_id)
            .ok_or_else(|| AssignmentError::UnknownStaff(staff_id.clone()))
    }

    fn release_from(roster: &mut [StaffMember], staff_id: Option<&StaffId>, request: &RequestId) {
        if let Some(member) =
            staff_id.and_then(|id| roster.iter_mut().find(|member| &member.id == id))
        {
            member.release(request);
        }
    }

    /// Add a staff member. Enrolment order breaks ties in [`Self::list_available`].
    pub fn enroll(&self, member: StaffMember) -> Result<(), AssignmentError> {
        if member.max_capacity == 0 || member.current_workload > member.max_capacity {
            return Err(AssignmentError::InvalidCapacity {
                staff_id: member.id,
                capacity: member.max_capacity,
                workload: member.current_workload,
            });
        }
        if member.current_workload as usize != member.assigned_requests.len() {
            return Err(AssignmentError::InconsistentWorkload {
                assigned: member.assigned_requests.len(),
                workload: member.current_workload,
                staff_id: member.id,
            });
        }

        let mut roster = self.lock();
        if roster.iter().any(|existing| existing.id == member.id) {
            return Err(AssignmentError::DuplicateStaff(member.id));
        }
        roster.push(member);
        Ok(())
    }

    pub fn member(&self, staff_id: &StaffId) -> Option<StaffMember> {
        self.lock()
            .iter()
            .find(|member| &member.id == staff_id)
            .cloned()
    }

    pub fn members(&self) -> Vec<StaffMember> {
        self.lock().clone()
    }

    /// Put back a roster captured with [`Self::members`], undoing counter changes
    /// whose request update could not be persisted.
    pub(crate) fn restore(&self, snapshot: Vec<StaffMember>) {
        *self.lock() = snapshot;
    }

    /// Assign an unassigned (or reopened) request and move it to ASSIGNED.
    pub fn assign(
        &self,
        request: &mut MaintenanceRequest,
        staff_id: &StaffId,
        at: DateTime<Utc>,
    ) -> Result<StatusTransition, AssignmentError> {
        let from = request.status;
        if !from.can_transition_to(RequestStatus::Assigned) {
            return Err(LifecycleError::InvalidTransition {
                from,
                to: RequestStatus::Assigned,
            }
            .into());
        }

        let mut roster = self.lock();
        let next = Self::position(&roster, staff_id)?;

        // A reopened request already counts against its assignee.
        let previous = request.assigned_staff.clone();
        let keeps_assignee = previous.as_ref() == Some(staff_id);
        if !keeps_assignee {
            roster[next].check_accepts()?;
        }

        let mut staged = request.clone();
        staged.assigned_staff = Some(staff_id.clone());
        let transition = RequestLifecycle::apply(&mut staged, RequestStatus::Assigned, at, None)?;

        if !keeps_assignee {
            Self::release_from(&mut roster, previous.as_ref(), &request.id);
            roster[next].take(&request.id);
        }

        *request = staged;
        Ok(transition)
    }

    /// Hand an active request to a different staff member without changing its status.
    pub fn reassign(
        &self,
        request: &mut MaintenanceRequest,
        staff_id: &StaffId,
        at: DateTime<Utc>,
    ) -> Result<Reassignment, AssignmentError> {
        if !matches!(
            request.status,
            RequestStatus::Assigned | RequestStatus::InProgress
        ) {
            return Err(LifecycleError::InvalidTransition {
                from: request.status,
                to: RequestStatus::Assigned,
            }
            .into());
        }

        if request.is_assigned_to(staff_id) {
            return Err(AssignmentError::AlreadyAssigned {
                request_id: request.id.clone(),
                staff_id: staff_id.clone(),
            });
        }

        let mut roster = self.lock();
        let next = Self::position(&roster, staff_id)?;
        roster[next].check_accepts()?;

        let previous = request.assigned_staff.clone();
        Self::release_from(&mut roster, previous.as_ref(), &request.id);
        roster[next].take(&request.id);

        request.assigned_staff = Some(staff_id.clone());
        request.updated_at = at;
        let note = match &previous {
            Some(previous) => format!("reassigned from {previous} to {staff_id}"),
            None => format!("reassigned to {staff_id}"),
        };
        request.push_note(at, note);

        Ok(Reassignment {
            request_id: request.id.clone(),
            previous,
            next: staff_id.clone(),
            at,
        })
    }

    /// Complete the request and release the assignee's slot.
    pub fn complete(
        &self,
        request: &mut MaintenanceRequest,
        resolution: &str,
        at: DateTime<Utc>,
    ) -> Result<StatusTransition, AssignmentError> {
        self.finish(request, RequestStatus::Completed, Some(resolution), at)
    }

    /// Cancel the request, releasing the assignee's slot if it had one.
    pub fn cancel(
        &self,
        request: &mut MaintenanceRequest,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<StatusTransition, AssignmentError> {
        self.finish(request, RequestStatus::Cancelled, reason, at)
    }

    fn finish(
        &self,
        request: &mut MaintenanceRequest,
        to: RequestStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<StatusTransition, AssignmentError> {
        let mut roster = self.lock();

        let mut staged = request.clone();
        let transition = RequestLifecycle::apply(&mut staged, to, at, note)?;
        Self::release_from(&mut roster, staged.assigned_staff.as_ref(), &request.id);

        *request = staged;
        Ok(transition)
    }

    /// Reopen a completed or cancelled request, attaching it to `staff_id` or, when
    /// omitted, to its previous assignee.
    ///
    /// Handing the request back to its previous assignee only needs a free slot;
    /// an unavailable member keeps the work they already had. A newly named member
    /// goes through the full assignment checks.
    pub fn reopen(
        &self,
        request: &mut MaintenanceRequest,
        staff_id: Option<&StaffId>,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<StatusTransition, AssignmentError> {
        let from = request.status;
        if !from.can_transition_to(RequestStatus::Reopened) {
            return Err(LifecycleError::InvalidTransition {
                from,
                to: RequestStatus::Reopened,
            }
            .into());
        }

        let target = staff_id
            .or(request.assigned_staff.as_ref())
            .cloned()
            .ok_or_else(|| AssignmentError::NoAssigneeForReopen(request.id.clone()))?;
        let returning = request.assigned_staff.as_ref() == Some(&target);

        let mut roster = self.lock();
        let next = Self::position(&roster, &target)?;
        if returning {
            roster[next].check_capacity()?;
        } else {
            roster[next].check_accepts()?;
        }

        let mut staged = request.clone();
        staged.assigned_staff = Some(target);
        let transition = RequestLifecycle::apply(&mut staged, RequestStatus::Reopened, at, reason)?;
        roster[next].take(&request.id);

        *request = staged;
        Ok(transition)
    }

    /// Available staff with spare capacity, least loaded first, ties in enrolment order.
    pub fn list_available(&self) -> Vec<StaffMember> {
        let mut candidates: Vec<StaffMember> = self
            .lock()
            .iter()
            .filter(|member| member.can_accept())
            .cloned()
            .collect();
        candidates.sort_by_key(|member| member.current_workload);
        candidates
    }

    /// Toggle availability. Existing assignments are kept either way.
    pub fn set_availability(
        &self,
        staff_id: &StaffId,
        available: bool,
    ) -> Result<StaffMember, AssignmentError> {
        let mut roster = self.lock();
        let index = Self::position(&roster, staff_id)?;
        roster[index].available = available;
        Ok(roster[index].clone())
    }

    /// Administrative capacity change. Never drops below the current workload.
    pub fn set_capacity(
        &self,
        staff_id: &StaffId,
        capacity: u32,
    ) -> Result<StaffMember, AssignmentError> {
        let mut roster = self.lock();
        let index = Self::position(&roster, staff_id)?;
        let member = &mut roster[index];

        if capacity == 0 {
            return Err(AssignmentError::InvalidCapacity {
                staff_id: staff_id.clone(),
                capacity,
                workload: member.current_workload,
            });
        }
        if capacity < member.current_workload {
            return Err(AssignmentError::CapacityBelowWorkload {
                staff_id: staff_id.clone(),
                capacity,
                workload: member.current_workload,
            });
        }

        member.max_capacity = capacity;
        Ok(member.clone())
    }
}
