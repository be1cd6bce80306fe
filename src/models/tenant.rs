use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for TenantStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "inactive" => Ok(TenantStatus::Inactive),
            other => Err(AppError::bad_request(format!("invalid tenant status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Suspended,
    Cancelled,
    Trial,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Trial => "trial",
        }
    }

    /// Tenant status implied by a billing transition.
    pub fn implied_tenant_status(&self) -> TenantStatus {
        match self {
            SubscriptionStatus::Active | SubscriptionStatus::Trial => TenantStatus::Active,
            SubscriptionStatus::Suspended | SubscriptionStatus::Cancelled => TenantStatus::Inactive,
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "suspended" => Ok(SubscriptionStatus::Suspended),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "trial" => Ok(SubscriptionStatus::Trial),
            other => Err(AppError::bad_request(format!("invalid subscription status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TenantLimits {
    pub max_contacts: i64,
    pub max_users: i64,
    pub max_advisors: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tenant {
    pub id: Uuid,
    pub subdomain: String,
    pub business_name: String,
    pub subscription_tier: String,
    pub subscription_status: SubscriptionStatus,
    pub status: TenantStatus,
    pub limits: TenantLimits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

impl Loggable for Tenant {
    fn entity_type() -> &'static str { "tenant" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTenant {
    pub id: Uuid,
    pub subdomain: String,
    pub business_name: String,
    pub subscription_tier: String,
    pub subscription_status: String,
    pub status: String,
    pub max_contacts: i64,
    pub max_users: i64,
    pub max_advisors: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTenant> for Tenant {
    type Error = AppError;

    fn try_from(value: DbTenant) -> Result<Self, Self::Error> {
        Ok(Tenant {
            id: value.id,
            subdomain: value.subdomain,
            business_name: value.business_name,
            subscription_tier: value.subscription_tier,
            subscription_status: value.subscription_status.parse()?,
            status: value.status.parse()?,
            limits: TenantLimits {
                max_contacts: value.max_contacts,
                max_users: value.max_users,
                max_advisors: value.max_advisors,
            },
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

pub const TENANT_COLUMNS: &str = "id, subdomain, business_name, subscription_tier, subscription_status, status, max_contacts, max_users, max_advisors, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct TenantSignupRequest {
    #[schema(example = "acme")]
    pub subdomain: String,
    #[schema(example = "Acme Advisory")]
    pub business_name: String,
    #[schema(example = "starter")]
    pub subscription_tier: Option<String>,
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    #[schema(example = "ada@acme.example")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TenantStatusUpdateRequest {
    pub subscription_status: SubscriptionStatus,
}
