use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::principal::Principal;
use super::registry::{is_known_permission, permissions::*};
use crate::errors::{AppError, AppResult, LOGIN_PAGE};
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    TenantMismatch,
    InsufficientPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decide whether `principal` may perform an operation requiring `required`
/// against `tenant`.
///
/// Checks run in order and stop at the first failure:
/// 1. no principal -> `Unauthenticated`
/// 2. real tenant and principal bound to another tenant -> `TenantMismatch`
/// 3. nothing required -> allow
/// 4. permission set contains the key (or is `all`) -> allow, else `InsufficientPermission`
pub fn authorize(principal: Option<&Principal>, tenant: &TenantScope, required: Option<&str>) -> Decision {
    let Some(principal) = principal else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };

    if let (Some(tenant_id), Some(member_of)) = (tenant.tenant_id(), principal.tenant_id) {
        if tenant_id != member_of {
            tracing::warn!(
                user_id = %principal.user_id,
                tenant_id = %tenant_id,
                member_of = %member_of,
                "tenant mismatch"
            );
            return Decision::Deny(DenyReason::TenantMismatch);
        }
    }

    let Some(required) = required else {
        return Decision::Allow;
    };

    if principal.has_permission(required) {
        Decision::Allow
    } else {
        tracing::debug!(
            user_id = %principal.user_id,
            permission = %required,
            "permission denied"
        );
        Decision::Deny(DenyReason::InsufficientPermission)
    }
}

impl DenyReason {
    /// The terminal response policy for a denial.
    pub fn into_error(self, principal: Option<&Principal>, tenant: &TenantScope) -> AppError {
        match self {
            DenyReason::Unauthenticated => AppError::unauthorized("authentication required"),
            DenyReason::TenantMismatch => {
                let redirect = match tenant.tenant() {
                    Some(t) => format!("{LOGIN_PAGE}?tenant={}", t.subdomain),
                    None => LOGIN_PAGE.to_string(),
                };
                AppError::TenantMismatch { redirect }
            }
            DenyReason::InsufficientPermission => AppError::InsufficientPermission {
                redirect: principal
                    .map(|p| p.role.landing_page())
                    .unwrap_or(LOGIN_PAGE)
                    .to_string(),
            },
        }
    }
}

/// Page or operation identifier -> required permission key.
///
/// Identifiers missing from the table need no permission beyond being signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PagePermissions {
    entries: BTreeMap<String, String>,
}

impl PagePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, operation: impl Into<String>, permission: impl Into<String>) -> Self {
        self.entries.insert(operation.into(), permission.into());
        self
    }

    pub fn defaults() -> Self {
        let table: &[(&str, &str)] = &[
            // pages
            ("dashboard.html", DASHBOARD_VIEW),
            ("contacts.html", CONTACTS_VIEW),
            ("podcast-calls.html", CALLS_VIEW),
            ("podcast-interviews.html", CALLS_VIEW),
            ("discovery-calls.html", CALLS_VIEW),
            ("strategy-calls.html", CALLS_VIEW),
            ("sales-calls.html", CALLS_VIEW),
            ("pipeline.html", PIPELINE_VIEW),
            ("deals.html", DEALS_VIEW),
            ("cash-flow.html", FINANCIALS_VIEW),
            ("expense-tracker.html", FINANCIALS_VIEW),
            ("campaigns.html", CAMPAIGNS_VIEW),
            ("sprints.html", SPRINTS_VIEW),
            ("availability.html", SPRINTS_VIEW),
            ("user-management.html", USERS_VIEW),
            ("client-portal.html", DASHBOARD_VIEW),
            ("analytics.html", DASHBOARD_VIEW),
            ("reports.html", DASHBOARD_VIEW),
            // api operations
            ("podcast_interviews.list", CALLS_VIEW),
            ("podcast_interviews.create", CALLS_CREATE),
            ("podcast_interviews.update", CALLS_EDIT),
            ("podcast_interviews.delete", CALLS_DELETE),
            ("discovery_calls.list", CALLS_VIEW),
            ("discovery_calls.create", CALLS_CREATE),
            ("discovery_calls.update", CALLS_EDIT),
            ("discovery_calls.delete", CALLS_DELETE),
            ("sales_calls.list", CALLS_VIEW),
            ("sales_calls.create", CALLS_CREATE),
            ("invitations.list", USERS_VIEW),
            ("invitations.create", USERS_CREATE),
            ("invitations.revoke", USERS_DELETE),
            ("users.list", USERS_VIEW),
            ("users.update", USERS_EDIT),
            ("users.set_permissions", USERS_PERMISSIONS),
            ("advisor_clients.list", USERS_VIEW),
            ("advisor_clients.assign", USERS_EDIT),
            ("advisor_clients.disconnect", USERS_EDIT),
            ("tenant.view", BILLING_MANAGE),
            ("tenant.status", BILLING_MANAGE),
        ];

        Self {
            entries: table
                .iter()
                .map(|(op, perm)| (op.to_string(), perm.to_string()))
                .collect(),
        }
    }

    /// Parse a JSON object of `{"operation": "permission.key"}`.
    pub fn from_json(raw: &str) -> AppResult<Self> {
        let de = &mut serde_json::Deserializer::from_str(raw);
        let parsed: PagePermissions = serde_path_to_error::deserialize(de).map_err(|err| {
            AppError::configuration(format!("page permissions at `{}`: {}", err.path(), err.inner()))
        })?;

        if let Some((op, perm)) = parsed.entries.iter().find(|(_, perm)| !is_known_permission(perm)) {
            return Err(AppError::configuration(format!(
                "page permissions: `{op}` requires unknown permission `{perm}`"
            )));
        }

        Ok(parsed)
    }

    /// Defaults overlaid with the entries from a JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| AppError::configuration(format!("failed to read {}: {err}", path.display())))?;
        let overrides = Self::from_json(&raw)?;
        let mut merged = Self::defaults();
        merged.entries.extend(overrides.entries);
        Ok(merged)
    }

    pub fn required(&self, operation: &str) -> Option<&str> {
        self.entries.get(operation).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// [`authorize`] bound to a page/operation permission table.
#[derive(Debug, Clone)]
pub struct Guard {
    pages: Arc<PagePermissions>,
}

impl Guard {
    pub fn new(pages: PagePermissions) -> Self {
        Self { pages: Arc::new(pages) }
    }

    pub fn pages(&self) -> &PagePermissions {
        &self.pages
    }

    pub fn authorize_operation(&self, principal: Option<&Principal>, tenant: &TenantScope, operation: &str) -> Decision {
        authorize(principal, tenant, self.pages.required(operation))
    }
}
