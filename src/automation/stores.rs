use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::engine::{CascadeSourceStore, CascadeTargetStore};
use crate::db::pipeline;
use crate::errors::AppResult;
use crate::models::discovery_call::NewDiscoveryCall;
use crate::models::sales_call::NewSalesCall;

/// Interviews as cascade sources.
#[derive(Debug, Clone)]
pub struct InterviewFlags(pub SqlitePool);

/// Discovery calls, both as cascade targets (of interviews) and sources (of sales calls).
#[derive(Debug, Clone)]
pub struct DiscoveryCalls(pub SqlitePool);

#[derive(Debug, Clone)]
pub struct SalesCalls(pub SqlitePool);

#[async_trait]
impl CascadeSourceStore for InterviewFlags {
    async fn mark_cascaded(&self, source_id: Uuid, target_id: Uuid) -> AppResult<bool> {
        pipeline::mark_interview_cascaded(&self.0, source_id, target_id).await
    }
}

#[async_trait]
impl CascadeTargetStore<NewDiscoveryCall> for DiscoveryCalls {
    async fn find_by_source(&self, source_id: Uuid) -> AppResult<Option<Uuid>> {
        pipeline::find_discovery_by_source(&self.0, source_id).await
    }

    async fn insert(&self, draft: &NewDiscoveryCall) -> AppResult<Uuid> {
        pipeline::insert_discovery_call(&self.0, draft).await
    }
}

#[async_trait]
impl CascadeSourceStore for DiscoveryCalls {
    async fn mark_cascaded(&self, source_id: Uuid, target_id: Uuid) -> AppResult<bool> {
        pipeline::mark_discovery_cascaded(&self.0, source_id, target_id).await
    }
}

#[async_trait]
impl CascadeTargetStore<NewSalesCall> for SalesCalls {
    async fn find_by_source(&self, source_id: Uuid) -> AppResult<Option<Uuid>> {
        pipeline::find_sales_by_source(&self.0, source_id).await
    }

    async fn insert(&self, draft: &NewSalesCall) -> AppResult<Uuid> {
        pipeline::insert_sales_call(&self.0, draft).await
    }
}
