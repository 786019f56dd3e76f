use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::archival::ArchiveFlags;

/// Identifier wrapper for maintenance requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Identifier wrapper for maintenance staff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaffId(pub String);

/// Identifier wrapper for tenant accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issue category selected by the tenant when filing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Plumbing,
    Electrical,
    Hvac,
    Appliance,
    Structural,
    PestControl,
    SafetySecurity,
    Cleaning,
    Landscaping,
    Emergency,
    Other,
}

impl IssueCategory {
    pub const fn ordered() -> [Self; 11] {
        [
            Self::Plumbing,
            Self::Electrical,
            Self::Hvac,
            Self::Appliance,
            Self::Structural,
            Self::PestControl,
            Self::SafetySecurity,
            Self::Cleaning,
            Self::Landscaping,
            Self::Emergency,
            Self::Other,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Plumbing => "Plumbing",
            Self::Electrical => "Electrical",
            Self::Hvac => "HVAC",
            Self::Appliance => "Appliance",
            Self::Structural => "Structural",
            Self::PestControl => "Pest Control",
            Self::SafetySecurity => "Safety & Security",
            Self::Cleaning => "Cleaning",
            Self::Landscaping => "Landscaping",
            Self::Emergency => "Emergency",
            Self::Other => "Other",
        }
    }
}

/// Triage severity; variants are declared in ascending order so `Ord` follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
    Emergency,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
            Self::Emergency => "emergency",
        }
    }
}

/// Lifecycle status of a maintenance request. Legal edges live in `lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    Acknowledged,
    Assigned,
    InProgress,
    OnHold,
    Reopened,
    Completed,
    Closed,
    Cancelled,
}

impl RequestStatus {
    pub const fn ordered() -> [Self; 9] {
        [
            Self::Submitted,
            Self::Acknowledged,
            Self::Assigned,
            Self::InProgress,
            Self::OnHold,
            Self::Reopened,
            Self::Completed,
            Self::Closed,
            Self::Cancelled,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Acknowledged => "acknowledged",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::OnHold => "on_hold",
            Self::Reopened => "reopened",
            Self::Completed => "completed",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Closed | Self::Cancelled)
    }

    /// States in which the request must reference an assigned staff member.
    pub const fn requires_assignee(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress | Self::Reopened)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Estimated and actual spend recorded against a request, in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCosts {
    pub estimated_cents: Option<u64>,
    pub actual_cents: Option<u64>,
}

/// Free-text update attached to a request, stamped with the status it was written under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestNote {
    pub recorded_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub text: String,
}

/// Tenant-provided fields used to file a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub unit: String,
    pub description: String,
    pub category: IssueCategory,
}

/// A tenant-filed maintenance issue tracked through the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub id: RequestId,
    pub tenant_id: TenantId,
    pub tenant_contact: String,
    pub unit: String,
    pub description: String,
    pub category: IssueCategory,
    pub priority: Priority,
    pub status: RequestStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_staff: Option<StaffId>,
    pub costs: RequestCosts,
    pub resolution: Option<String>,
    pub notes: Vec<RequestNote>,
    pub archive: ArchiveFlags,
}

impl MaintenanceRequest {
    /// Whether the staff/status pairing holds for the current state.
    pub fn assignment_consistent(&self) -> bool {
        match self.status {
            RequestStatus::Submitted => self.assigned_staff.is_none(),
            status if status.requires_assignee() => self.assigned_staff.is_some(),
            _ => true,
        }
    }

    pub fn is_assigned_to(&self, staff_id: &StaffId) -> bool {
        self.assigned_staff.as_ref() == Some(staff_id)
    }

    pub(crate) fn push_note(&mut self, at: DateTime<Utc>, text: impl Into<String>) {
        self.notes.push(RequestNote {
            recorded_at: at,
            status: self.status,
            text: text.into(),
        });
    }

    pub fn summary_view(&self) -> RequestSummaryView {
        RequestSummaryView {
            request_id: self.id.clone(),
            unit: self.unit.clone(),
            category: self.category.label(),
            priority: self.priority.label(),
            status: self.status.label(),
            assigned_staff: self.assigned_staff.clone(),
            updated_at: self.updated_at,
            resolution: self.resolution.clone(),
        }
    }
}

/// Sanitized representation exposed to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummaryView {
    pub request_id: RequestId,
    pub unit: String,
    pub category: &'static str,
    pub priority: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<StaffId>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}
