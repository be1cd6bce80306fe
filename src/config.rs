use std::path::PathBuf;

use crate::authz::PagePermissions;
use crate::automation::AutomationConfig;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::tenancy::TenancyConfig;

/// Everything the router needs besides the pool.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub tenancy: TenancyConfig,
    pub pages: PagePermissions,
    pub automation: AutomationConfig,
}

impl AppConfig {
    pub fn new(jwt: JwtConfig, tenancy: TenancyConfig) -> Self {
        Self {
            jwt,
            tenancy,
            pages: PagePermissions::defaults(),
            automation: AutomationConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let pages = match std::env::var("PAGE_PERMISSIONS_FILE") {
            Ok(path) if !path.trim().is_empty() => {
                let path = PathBuf::from(path.trim());
                let pages = PagePermissions::load(&path)?;
                tracing::info!(path = %path.display(), entries = pages.len(), "loaded page permissions");
                pages
            }
            _ => PagePermissions::defaults(),
        };

        Ok(Self {
            jwt: JwtConfig::from_env()?,
            tenancy: TenancyConfig::from_env()?,
            pages,
            automation: AutomationConfig::from_env()?,
        })
    }
}
