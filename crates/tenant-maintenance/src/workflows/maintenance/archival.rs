use serde::{Deserialize, Serialize};

use super::domain::{MaintenanceRequest, RequestStatus};

/// Audience whose active list an archive flag applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveViewer {
    Tenant,
    Staff,
}

/// Per-viewer archive flags. Archiving hides a request without touching its status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFlags {
    pub tenant_archived: bool,
    pub staff_archived: bool,
}

impl ArchiveFlags {
    pub fn is_archived_for(&self, viewer: ArchiveViewer) -> bool {
        match viewer {
            ArchiveViewer::Tenant => self.tenant_archived,
            ArchiveViewer::Staff => self.staff_archived,
        }
    }
}

pub struct ArchivalPolicy;

impl ArchivalPolicy {
    /// Set the viewer's flag. Returns `false` when it was already set.
    pub fn archive(request: &mut MaintenanceRequest, viewer: ArchiveViewer) -> bool {
        let flag = match viewer {
            ArchiveViewer::Tenant => &mut request.archive.tenant_archived,
            ArchiveViewer::Staff => &mut request.archive.staff_archived,
        };

        if *flag {
            return false;
        }
        *flag = true;
        true
    }

    /// Reset both flags when a terminal request is reopened.
    ///
    /// Applies to COMPLETED and CANCELLED sources only; other edges leave the flags alone.
    pub fn on_reopen(request: &mut MaintenanceRequest, from: RequestStatus) {
        if matches!(from, RequestStatus::Completed | RequestStatus::Cancelled) {
            request.archive = ArchiveFlags::default();
        }
    }

    pub fn visible_to(request: &MaintenanceRequest, viewer: ArchiveViewer) -> bool {
        !request.archive.is_archived_for(viewer)
    }
}
