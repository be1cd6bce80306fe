use crate::models::tenant::Tenant;

/// Single-slot resolved-tenant cache keyed by subdomain.
///
/// A lookup for any other subdomain misses, so a stale entry is never served
/// after the origin changes. Inactive tenants are never cached.
#[derive(Debug, Clone, Default)]
pub struct TenantCache {
    slot: Option<Tenant>,
}

impl TenantCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subdomain: &str) -> Option<&Tenant> {
        self.slot
            .as_ref()
            .filter(|tenant| tenant.subdomain.eq_ignore_ascii_case(subdomain))
    }

    pub fn store(&mut self, tenant: Tenant) {
        if tenant.is_active() {
            self.slot = Some(tenant);
        } else {
            self.slot = None;
        }
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}
