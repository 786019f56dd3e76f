use serde::{Deserialize, Serialize};

use super::domain::{StaffId, TenantId};

/// Shared account fields; role-specific data lives in [`UserRole`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub display_name: String,
    pub contact: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserRole {
    Tenant {
        unit: String,
    },
    Staff {
        trade: String,
        #[serde(default)]
        max_capacity: Option<u32>,
    },
    Manager {
        portfolio: Vec<String>,
    },
    Admin,
}

impl UserRole {
    pub const fn label(&self) -> &'static str {
        match self {
            UserRole::Tenant { .. } => "tenant",
            UserRole::Staff { .. } => "staff",
            UserRole::Manager { .. } => "manager",
            UserRole::Admin => "admin",
        }
    }
}

impl UserAccount {
    pub fn tenant_id(&self) -> Option<TenantId> {
        match self.role {
            UserRole::Tenant { .. } => Some(TenantId(self.id.clone())),
            _ => None,
        }
    }

    pub fn staff_id(&self) -> Option<StaffId> {
        match self.role {
            UserRole::Staff { .. } => Some(StaffId(self.id.clone())),
            _ => None,
        }
    }

    /// Unit on the tenant's lease, if this is a tenant account.
    pub fn leased_unit(&self) -> Option<&str> {
        match &self.role {
            UserRole::Tenant { unit } => Some(unit.as_str()),
            _ => None,
        }
    }
}
