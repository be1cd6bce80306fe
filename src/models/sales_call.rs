use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::Loggable;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SalesCall {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    /// Discovery call this sales call was created from, if any.
    pub source_id: Option<Uuid>,
    pub prospect_name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub call_status: String,
    pub deal_value: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for SalesCall {
    fn entity_type() -> &'static str { "sales_call" }
    fn subject_id(&self) -> Uuid { self.id }
}

pub const SALES_COLUMNS: &str =
    "id, tenant_id, source_id, prospect_name, company, email, call_status, deal_value, notes, created_at, updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct NewSalesCall {
    pub tenant_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
    pub prospect_name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub call_status: String,
    pub deal_value: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SalesCallCreateRequest {
    #[schema(example = "Grace Hopper")]
    pub prospect_name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    #[schema(example = "scheduled")]
    pub call_status: Option<String>,
    #[schema(example = 12000.0)]
    pub deal_value: Option<f64>,
    pub notes: Option<String>,
}
