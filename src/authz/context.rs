use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use super::guard::{Decision, Guard};
use super::identity::credential_from_headers;
use super::principal::Principal;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::tenancy::{OriginHint, TenantAccess, TenantScope};

/// Tenant scope and caller identity for one request.
///
/// The tenant is resolved first so an unknown or inactive tenant is reported
/// before anything about the caller. A request with no credential has no
/// principal; a request with a bad credential is rejected outright.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tenant: TenantScope,
    pub principal: Option<Principal>,
}

impl AuthContext {
    async fn resolve(parts: &Parts, state: &AppState, access: TenantAccess) -> AppResult<Self> {
        let hint = OriginHint::from_headers(&parts.headers)?;
        let tenant = state.tenants.resolve(hint.as_ref(), access).await?;

        let principal = match credential_from_headers(&parts.headers) {
            Some(credential) => Some(state.identity.resolve_identity(Some(&credential)).await?),
            None => None,
        };

        // an unscoped request still acts on the principal's own tenant
        if let (TenantScope::Unscoped, Some(home)) = (&tenant, principal.as_ref().and_then(|p| p.tenant_id)) {
            state.tenants.admit_home(home, access).await?;
        }

        Ok(Self { tenant, principal })
    }

    /// Run the guard for `operation` and hand back the allowed principal.
    pub fn authorize(&self, guard: &Guard, operation: &str) -> AppResult<&Principal> {
        match guard.authorize_operation(self.principal.as_ref(), &self.tenant, operation) {
            Decision::Allow => self
                .principal
                .as_ref()
                .ok_or_else(|| AppError::unauthorized("authentication required")),
            Decision::Deny(reason) => Err(reason.into_error(self.principal.as_ref(), &self.tenant)),
        }
    }

    /// Signed-in caller with no particular permission.
    pub fn require_principal(&self) -> AppResult<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }

    /// Tenant that owns data created or listed by this request.
    pub fn data_tenant(&self) -> Option<Uuid> {
        self.tenant
            .tenant_id()
            .or_else(|| self.principal.as_ref().and_then(|p| p.tenant_id))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<AuthContext>() {
            return Ok(cached.clone());
        }

        let context = AuthContext::resolve(parts, state, TenantAccess::Standard).await?;
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

/// [`AuthContext`] for billing and reactivation routes, which may reach an
/// inactive tenant.
#[derive(Debug, Clone)]
pub struct BillingContext(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for BillingContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        AuthContext::resolve(parts, state, TenantAccess::Billing)
            .await
            .map(BillingContext)
    }
}
