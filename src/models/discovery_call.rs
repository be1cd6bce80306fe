use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::podcast_interview::percentage;
use crate::events::Loggable;

pub const DEFAULT_CALL_STATUS: &str = "scheduled";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DiscoveryCall {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    /// Interview this call was created from, if any.
    pub source_id: Option<Uuid>,
    pub contact_name: String,
    pub company: Option<String>,
    pub email: String,
    pub call_date: Option<DateTime<Utc>>,
    pub call_status: String,
    pub call_source: Option<String>,
    pub notes: Option<String>,
    pub sales_call_created: bool,
    pub sales_call_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for DiscoveryCall {
    fn entity_type() -> &'static str { "discovery_call" }
    fn subject_id(&self) -> Uuid { self.id }
}

pub const DISCOVERY_COLUMNS: &str = "id, tenant_id, source_id, contact_name, company, email, call_date, call_status, call_source, notes, sales_call_created, sales_call_id, created_at, updated_at";

/// Insert payload, shared by the create endpoint and the interview cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscoveryCall {
    pub tenant_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
    pub contact_name: String,
    pub company: Option<String>,
    pub email: String,
    pub call_date: Option<DateTime<Utc>>,
    pub call_status: String,
    pub call_source: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DiscoveryCallCreateRequest {
    #[schema(example = "Grace Hopper")]
    pub contact_name: String,
    pub company: Option<String>,
    #[schema(example = "grace@example.com")]
    pub email: String,
    pub call_date: Option<DateTime<Utc>>,
    #[schema(example = "scheduled")]
    pub call_status: Option<String>,
    #[schema(example = "referral")]
    pub call_source: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DiscoveryCallUpdateRequest {
    pub contact_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub call_date: Option<DateTime<Utc>>,
    #[schema(example = "completed")]
    pub call_status: Option<String>,
    pub call_source: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct DiscoveryStats {
    pub total: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub qualified: usize,
    pub qualification_rate: u32,
    pub auto_progressed_to_sales: usize,
}

impl DiscoveryStats {
    pub fn from_calls(calls: &[DiscoveryCall]) -> Self {
        let count = |status: &str| calls.iter().filter(|c| c.call_status == status).count();
        let qualified = count("qualified");

        Self {
            total: calls.len(),
            scheduled: count("scheduled"),
            completed: count("completed"),
            qualified,
            qualification_rate: percentage(qualified, calls.len()),
            auto_progressed_to_sales: calls.iter().filter(|c| c.sales_call_created).count(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveryCallList {
    pub calls: Vec<DiscoveryCall>,
    pub stats: DiscoveryStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveryCallUpdated {
    pub call: DiscoveryCall,
    pub automation: crate::automation::AutomationReport,
}
