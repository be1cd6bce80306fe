use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::authz::{PermissionSet, Role};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            other => Err(AppError::internal(format!("invalid user status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub advisor_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub permissions: PermissionSet,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
    pub advisor_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub permissions: Option<String>,
    pub status: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    /// Stored override when present, the role's registry set otherwise.
    pub fn effective_permissions(&self, role: Role) -> Result<PermissionSet, AppError> {
        match self.permissions.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => PermissionSet::from_stored(raw),
            None => Ok(crate::authz::permissions_for(role)),
        }
    }
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        let role: Role = value.role.parse()?;
        let permissions = value.effective_permissions(role)?;

        Ok(User {
            id: value.id,
            email: value.email,
            full_name: value.full_name,
            role,
            advisor_id: value.advisor_id,
            tenant_id: value.tenant_id,
            permissions,
            status: value.status.parse()?,
            last_login: value.last_login,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

pub const USER_COLUMNS: &str = "id, email, full_name, password_hash, role, advisor_id, tenant_id, permissions, status, last_login, created_at, updated_at";

/// Public view of a client as listed for their advisor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClientSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<User> for ClientSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            status: user.status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    /// Where the client should land after signing in.
    #[schema(example = "/dashboard.html")]
    pub landing_page: String,
}

impl AuthResponse {
    pub fn new(token: String, user: User) -> Self {
        let landing_page = user.role.landing_page().to_string();
        Self { token, user, landing_page }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub landing_page: String,
    pub tenant: Option<crate::models::tenant::Tenant>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccessQuery {
    /// Page file name or API operation id.
    pub page: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessResponse {
    pub page: String,
    pub allowed: bool,
    pub required_permission: Option<String>,
}

/// New stored permission override for a user.
///
/// `"all"` grants everything, `"role"` drops the override so the role's set
/// applies again, and a list stores exactly those keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PermissionsUpdate {
    Keys(Vec<String>),
    Preset(String),
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// Only valid for clients; must name a user who can supervise clients.
    pub advisor_id: Option<Uuid>,
    #[schema(value_type = Option<Object>, example = json!(["calls.view", "users.view"]))]
    pub permissions: Option<PermissionsUpdate>,
}

impl UserUpdateRequest {
    /// Whether anything besides the permission override changes.
    pub fn touches_profile(&self) -> bool {
        self.full_name.is_some() || self.role.is_some() || self.status.is_some() || self.advisor_id.is_some()
    }
}
