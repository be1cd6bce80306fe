use serde::Serialize;
use uuid::Uuid;

use super::registry::{permissions_for, PermissionSet, Role};

/// The authoritative identity acting within one request.
///
/// Always built from the user store, never from client-supplied claims.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    pub permissions: PermissionSet,
}

impl Principal {
    /// A principal holding exactly the registry set for `role`.
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            email: String::new(),
            role,
            tenant_id: None,
            permissions: permissions_for(role),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.allows(permission)
    }

    pub fn belongs_to(&self, tenant_id: Uuid) -> bool {
        self.tenant_id == Some(tenant_id)
    }
}
