use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;
use crate::events::Loggable;

pub const INVITATION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Revoked => "revoked",
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "expired" => Ok(InvitationStatus::Expired),
            "revoked" => Ok(InvitationStatus::Revoked),
            other => Err(AppError::internal(format!("invalid invitation status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Invitation {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: InvitationStatus,
    pub invited_by: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Loggable for Invitation {
    fn entity_type() -> &'static str { "invitation" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbInvitation {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub status: String,
    pub invited_by: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbInvitation> for Invitation {
    type Error = AppError;

    fn try_from(value: DbInvitation) -> Result<Self, Self::Error> {
        Ok(Invitation {
            id: value.id,
            email: value.email,
            role: value.role.parse()?,
            status: value.status.parse()?,
            invited_by: value.invited_by,
            tenant_id: value.tenant_id,
            expires_at: value.expires_at,
            accepted_at: value.accepted_at,
            created_at: value.created_at,
        })
    }
}

pub const INVITATION_COLUMNS: &str = "id, email, role, status, invited_by, tenant_id, expires_at, accepted_at, created_at";

pub fn expiry_from(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(INVITATION_TTL_DAYS)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvitationCreateRequest {
    #[schema(example = "new.advisor@example.com")]
    pub email: String,
    pub role: Role,
}

/// Returned once at creation; the raw token is never stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationCreated {
    pub invitation: Invitation,
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvitationAcceptRequest {
    pub token: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitations_live_for_a_week() {
        let now = Utc::now();
        assert_eq!(expiry_from(now) - now, Duration::days(7));
    }

    #[test]
    fn status_round_trips_through_its_column_value() {
        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Expired,
            InvitationStatus::Revoked,
        ] {
            assert_eq!(status.as_str().parse::<InvitationStatus>().unwrap(), status);
        }
        assert!("opened".parse::<InvitationStatus>().is_err());
    }
}
