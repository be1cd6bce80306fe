//! Multi-tenant resolution.
//!
//! Maps a request's origin (Host subdomain or explicit tenant header) to a tenant,
//! or to [`TenantScope::Unscoped`] for the bare product domain and reserved labels.

mod cache;
mod resolver;
mod store;

pub use cache::TenantCache;
pub use resolver::{OriginHint, TenantAccess, TenantResolver};
pub use store::{SqliteTenantStore, TenantStore};

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::tenant::Tenant;

pub const DEFAULT_ROOT_DOMAIN: &str = "growthmanagerpro.com";
const DEFAULT_SIGNUP_URL: &str = "https://growthmanagerpro.com/signup-saas.html";
const DEFAULT_INACTIVE_URL: &str = "https://growthmanagerpro.com/tenant-inactive.html";

/// Result of tenant resolution.
#[derive(Debug, Clone)]
pub enum TenantScope {
    /// Root domain, reserved label or non-product host: no tenant scoping.
    Unscoped,
    Tenant(Tenant),
}

impl TenantScope {
    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            TenantScope::Unscoped => None,
            TenantScope::Tenant(tenant) => Some(tenant),
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant().map(|t| t.id)
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, TenantScope::Tenant(_))
    }
}

#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub root_domain: String,
    pub reserved_labels: BTreeSet<String>,
    pub signup_url: String,
    pub inactive_url: String,
}

impl TenancyConfig {
    pub fn new(root_domain: impl Into<String>) -> Self {
        let root_domain = root_domain.into().trim().trim_end_matches('.').to_ascii_lowercase();
        let mut reserved_labels = BTreeSet::new();
        reserved_labels.insert("www".to_string());
        // the bare product name, e.g. `growthmanagerpro` for growthmanagerpro.com
        if let Some(product) = root_domain.split('.').next() {
            reserved_labels.insert(product.to_string());
        }

        Self {
            root_domain,
            reserved_labels,
            signup_url: DEFAULT_SIGNUP_URL.to_string(),
            inactive_url: DEFAULT_INACTIVE_URL.to_string(),
        }
    }

    pub fn with_reserved(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.reserved_labels
            .extend(labels.into_iter().map(|l| l.trim().to_ascii_lowercase()).filter(|l| !l.is_empty()));
        self
    }

    pub fn from_env() -> Result<Self, AppError> {
        let root = std::env::var("ROOT_DOMAIN").unwrap_or_else(|_| DEFAULT_ROOT_DOMAIN.to_string());
        if root.trim().is_empty() {
            return Err(AppError::configuration("ROOT_DOMAIN must not be empty"));
        }

        let extra = std::env::var("RESERVED_SUBDOMAINS")
            .map(|v| v.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut config = Self::new(root).with_reserved(extra);
        if let Ok(url) = std::env::var("SIGNUP_URL") {
            config.signup_url = url;
        }
        if let Ok(url) = std::env::var("TENANT_INACTIVE_URL") {
            config.inactive_url = url;
        }
        Ok(config)
    }

    pub fn is_reserved(&self, label: &str) -> bool {
        self.reserved_labels.contains(&label.to_ascii_lowercase())
    }
}

/// Lowercase DNS label: 1-63 chars of `[a-z0-9-]`, no leading or trailing hyphen.
pub fn is_valid_subdomain(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
