use chrono::{DateTime, Utc};
use serde::Serialize;

use super::archival::ArchivalPolicy;
use super::domain::{MaintenanceRequest, RequestId, RequestStatus};

/// Rejections raised by the request state machine. The request is untouched on error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("a non-empty resolution note is required to complete a request")]
    MissingResolution,
    #[error("request has no assigned staff member and cannot enter {to}")]
    Unassigned { to: RequestStatus },
}

impl RequestStatus {
    /// Outbound edges of the lifecycle graph.
    pub const fn next_states(self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            Submitted => &[Acknowledged, Assigned, Cancelled],
            Acknowledged => &[Assigned, Cancelled],
            Assigned => &[InProgress, OnHold, Cancelled],
            InProgress => &[Completed, OnHold, Cancelled],
            OnHold => &[InProgress, Cancelled],
            Reopened => &[InProgress, Assigned, Cancelled],
            Completed | Cancelled => &[Reopened],
            Closed => &[],
        }
    }

    pub fn can_transition_to(self, to: RequestStatus) -> bool {
        self.next_states().contains(&to)
    }
}

/// Record of a status change that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    pub request_id: RequestId,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub at: DateTime<Utc>,
}

/// Stateless guard over [`RequestStatus`] changes.
pub struct RequestLifecycle;

impl RequestLifecycle {
    /// Validate a status change without applying it.
    pub fn check(
        request: &MaintenanceRequest,
        to: RequestStatus,
        note: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let from = request.status;
        if !from.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition { from, to });
        }

        if to == RequestStatus::Completed && non_empty(note).is_none() {
            return Err(LifecycleError::MissingResolution);
        }

        if to.requires_assignee() && request.assigned_staff.is_none() {
            return Err(LifecycleError::Unassigned { to });
        }

        Ok(())
    }

    /// Apply a status change. `note` is the resolution when completing, otherwise an
    /// optional update appended to the request's notes.
    pub fn apply(
        request: &mut MaintenanceRequest,
        to: RequestStatus,
        at: DateTime<Utc>,
        note: Option<&str>,
    ) -> Result<StatusTransition, LifecycleError> {
        Self::check(request, to, note)?;

        let from = request.status;
        let note = non_empty(note);

        match to {
            RequestStatus::Completed => {
                request.resolution = note.map(str::to_string);
                request.completed_at = Some(at);
            }
            RequestStatus::Reopened => {
                if let Some(previous) = request.resolution.take() {
                    request.push_note(at, format!("previous resolution: {previous}"));
                }
                request.completed_at = None;
                ArchivalPolicy::on_reopen(request, from);
            }
            _ => {}
        }

        request.status = to;
        request.updated_at = at;

        if to != RequestStatus::Completed {
            if let Some(text) = note {
                request.push_note(at, text);
            }
        }

        Ok(StatusTransition {
            request_id: request.id.clone(),
            from,
            to,
            at,
        })
    }
}

fn non_empty(note: Option<&str>) -> Option<&str> {
    note.map(str::trim).filter(|text| !text.is_empty())
}
