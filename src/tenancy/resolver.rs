use std::sync::Arc;

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use super::{is_valid_subdomain, TenancyConfig, TenantCache, TenantScope, TenantStore};
use crate::errors::{AppError, AppResult};
use crate::models::tenant::Tenant;

pub const TENANT_HEADER: &str = "x-tenant";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// What a request tells us about its tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginHint {
    /// Raw `Host` header value, port included.
    Host(String),
    /// Explicit subdomain label.
    Subdomain(String),
    TenantId(Uuid),
}

impl OriginHint {
    /// Explicit tenant headers win over the Host header.
    pub fn from_headers(headers: &HeaderMap) -> AppResult<Option<Self>> {
        if let Some(raw) = header_str(headers, TENANT_ID_HEADER) {
            let id = Uuid::parse_str(raw.trim())
                .map_err(|_| AppError::bad_request("x-tenant-id must be a UUID"))?;
            return Ok(Some(OriginHint::TenantId(id)));
        }

        if let Some(raw) = header_str(headers, TENANT_HEADER) {
            return Ok(Some(OriginHint::Subdomain(raw.trim().to_string())));
        }

        Ok(header_str(headers, header::HOST.as_str()).map(|h| OriginHint::Host(h.to_string())))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

/// Billing and reactivation flows must still reach an inactive tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantAccess {
    Standard,
    Billing,
}

#[derive(Clone)]
pub struct TenantResolver {
    store: Arc<dyn TenantStore>,
    config: Arc<TenancyConfig>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn TenantStore>, config: TenancyConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Subdomain label for a Host value, or `None` when the host carries no tenant.
    pub fn label_for_host(&self, host: &str) -> Option<String> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        let host = host.split(':').next().unwrap_or_default();
        let root = self.config.root_domain.as_str();

        let prefix = host.strip_suffix(root)?.strip_suffix('.')?;
        let label = prefix.split('.').next()?;
        self.scoping_label(label)
    }

    fn scoping_label(&self, label: &str) -> Option<String> {
        let label = label.trim().to_ascii_lowercase();
        if label.is_empty() || self.config.is_reserved(&label) {
            return None;
        }
        Some(label)
    }

    pub async fn resolve(&self, hint: Option<&OriginHint>, access: TenantAccess) -> AppResult<TenantScope> {
        let Some(hint) = hint else {
            return Ok(TenantScope::Unscoped);
        };

        let tenant = match hint {
            OriginHint::TenantId(id) => self.store.tenant_by_id(*id).await?,
            OriginHint::Host(host) => match self.label_for_host(host) {
                Some(label) => self.lookup_label(&label).await?,
                None => return Ok(TenantScope::Unscoped),
            },
            OriginHint::Subdomain(raw) => match self.scoping_label(raw) {
                Some(label) => self.lookup_label(&label).await?,
                None => return Ok(TenantScope::Unscoped),
            },
        };

        let tenant = tenant.ok_or_else(|| {
            tracing::info!(hint = ?hint, "tenant not found");
            self.not_found()
        })?;

        self.admit(tenant, access)
    }

    /// Like [`resolve`](Self::resolve) for subdomain-style hints, consulting `cache` first.
    pub async fn resolve_cached(
        &self,
        hint: Option<&OriginHint>,
        access: TenantAccess,
        cache: &mut TenantCache,
    ) -> AppResult<TenantScope> {
        let label = match hint {
            Some(OriginHint::Host(host)) => self.label_for_host(host),
            Some(OriginHint::Subdomain(raw)) => self.scoping_label(raw),
            _ => return self.resolve(hint, access).await,
        };

        let Some(label) = label else {
            cache.invalidate();
            return Ok(TenantScope::Unscoped);
        };

        if let Some(tenant) = cache.get(&label) {
            tracing::debug!(subdomain = %label, "tenant cache hit");
            return Ok(TenantScope::Tenant(tenant.clone()));
        }

        cache.invalidate();
        let scope = self.resolve(hint, access).await?;
        if let TenantScope::Tenant(tenant) = &scope {
            cache.store(tenant.clone());
        }
        Ok(scope)
    }

    async fn lookup_label(&self, label: &str) -> AppResult<Option<Tenant>> {
        if !is_valid_subdomain(label) {
            return Ok(None);
        }
        self.store.tenant_by_subdomain(label).await
    }

    /// Apply the active-tenant rule to a principal's own tenant when the
    /// request itself named none (root domain, `www`, `localhost`).
    pub async fn admit_home(&self, tenant_id: Uuid, access: TenantAccess) -> AppResult<Tenant> {
        let tenant = self.store.tenant_by_id(tenant_id).await?.ok_or_else(|| {
            tracing::warn!(%tenant_id, "principal belongs to a missing tenant");
            self.not_found()
        })?;

        self.check_active(&tenant, access)?;
        Ok(tenant)
    }

    fn admit(&self, tenant: Tenant, access: TenantAccess) -> AppResult<TenantScope> {
        self.check_active(&tenant, access)?;
        Ok(TenantScope::Tenant(tenant))
    }

    fn check_active(&self, tenant: &Tenant, access: TenantAccess) -> AppResult<()> {
        if !tenant.is_active() && access == TenantAccess::Standard {
            tracing::info!(
                tenant_id = %tenant.id,
                status = tenant.status.as_str(),
                "rejecting request for inactive tenant"
            );
            return Err(AppError::TenantInactive {
                redirect: self.config.inactive_url.clone(),
            });
        }
        Ok(())
    }

    fn not_found(&self) -> AppError {
        AppError::TenantNotFound {
            redirect: self.config.signup_url.clone(),
        }
    }
}
