use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::tenant::{DbTenant, Tenant, TENANT_COLUMNS};

/// Read access to tenants. Resolution never writes through this trait.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Case-insensitive exact match on the subdomain.
    async fn tenant_by_subdomain(&self, subdomain: &str) -> AppResult<Option<Tenant>>;

    async fn tenant_by_id(&self, id: Uuid) -> AppResult<Option<Tenant>>;
}

#[derive(Debug, Clone)]
pub struct SqliteTenantStore {
    pool: SqlitePool,
}

impl SqliteTenantStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for SqliteTenantStore {
    async fn tenant_by_subdomain(&self, subdomain: &str) -> AppResult<Option<Tenant>> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE lower(subdomain) = lower(?)");
        let row = sqlx::query_as::<_, DbTenant>(&sql)
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Tenant::try_from).transpose()
    }

    async fn tenant_by_id(&self, id: Uuid) -> AppResult<Option<Tenant>> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?");
        let row = sqlx::query_as::<_, DbTenant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Tenant::try_from).transpose()
    }
}
