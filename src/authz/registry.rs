//! Permission registry.
//!
//! The only place that knows which roles exist, which permission keys exist and
//! which keys each role holds. Everything else asks the registry.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Well-known permission keys
pub mod permissions {
    pub const DASHBOARD_VIEW: &str = "dashboard.view";
    pub const DASHBOARD_EDIT: &str = "dashboard.edit";

    pub const CONTACTS_VIEW: &str = "contacts.view";
    pub const CONTACTS_CREATE: &str = "contacts.create";
    pub const CONTACTS_EDIT: &str = "contacts.edit";
    pub const CONTACTS_DELETE: &str = "contacts.delete";

    pub const CALLS_VIEW: &str = "calls.view";
    pub const CALLS_CREATE: &str = "calls.create";
    pub const CALLS_EDIT: &str = "calls.edit";
    pub const CALLS_DELETE: &str = "calls.delete";

    pub const DEALS_VIEW: &str = "deals.view";
    pub const DEALS_CREATE: &str = "deals.create";
    pub const DEALS_EDIT: &str = "deals.edit";
    pub const DEALS_DELETE: &str = "deals.delete";

    pub const PIPELINE_VIEW: &str = "pipeline.view";
    pub const PIPELINE_EDIT: &str = "pipeline.edit";

    pub const CAMPAIGNS_VIEW: &str = "campaigns.view";
    pub const CAMPAIGNS_CREATE: &str = "campaigns.create";
    pub const CAMPAIGNS_EDIT: &str = "campaigns.edit";
    pub const CAMPAIGNS_DELETE: &str = "campaigns.delete";

    pub const FINANCIALS_VIEW: &str = "financials.view";
    pub const FINANCIALS_EDIT: &str = "financials.edit";

    pub const SPRINTS_VIEW: &str = "sprints.view";
    pub const SPRINTS_CREATE: &str = "sprints.create";
    pub const SPRINTS_EDIT: &str = "sprints.edit";
    pub const SPRINTS_DELETE: &str = "sprints.delete";

    pub const USERS_VIEW: &str = "users.view";
    pub const USERS_CREATE: &str = "users.create";
    pub const USERS_EDIT: &str = "users.edit";
    pub const USERS_DELETE: &str = "users.delete";
    pub const USERS_PERMISSIONS: &str = "users.permissions";

    pub const BILLING_MANAGE: &str = "billing.manage";
}

use permissions::*;

/// Every permission key with its human description.
pub const CATALOG: &[(&str, &str)] = &[
    (DASHBOARD_VIEW, "View main dashboard"),
    (DASHBOARD_EDIT, "Edit dashboard widgets"),
    (CONTACTS_VIEW, "View contacts"),
    (CONTACTS_CREATE, "Create new contacts"),
    (CONTACTS_EDIT, "Edit contacts"),
    (CONTACTS_DELETE, "Delete contacts"),
    (CALLS_VIEW, "View all calls"),
    (CALLS_CREATE, "Schedule calls"),
    (CALLS_EDIT, "Edit call details"),
    (CALLS_DELETE, "Delete calls"),
    (DEALS_VIEW, "View deals"),
    (DEALS_CREATE, "Create deals"),
    (DEALS_EDIT, "Edit deals"),
    (DEALS_DELETE, "Delete deals"),
    (PIPELINE_VIEW, "View pipeline"),
    (PIPELINE_EDIT, "Modify pipeline stages"),
    (CAMPAIGNS_VIEW, "View campaigns"),
    (CAMPAIGNS_CREATE, "Create campaigns"),
    (CAMPAIGNS_EDIT, "Edit campaigns"),
    (CAMPAIGNS_DELETE, "Delete campaigns"),
    (FINANCIALS_VIEW, "View financial data"),
    (FINANCIALS_EDIT, "Edit financial data"),
    (SPRINTS_VIEW, "View sprints"),
    (SPRINTS_CREATE, "Create sprints"),
    (SPRINTS_EDIT, "Edit sprints"),
    (SPRINTS_DELETE, "Delete sprints"),
    (USERS_VIEW, "View users"),
    (USERS_CREATE, "Create users"),
    (USERS_EDIT, "Edit users"),
    (USERS_DELETE, "Delete users"),
    (USERS_PERMISSIONS, "Manage user permissions"),
    (BILLING_MANAGE, "Manage subscription and tenant status"),
];

const ADVISOR_KEYS: &[&str] = &[
    DASHBOARD_VIEW,
    DASHBOARD_EDIT,
    CONTACTS_VIEW,
    CONTACTS_CREATE,
    CONTACTS_EDIT,
    CALLS_VIEW,
    CALLS_CREATE,
    CALLS_EDIT,
    DEALS_VIEW,
    DEALS_CREATE,
    DEALS_EDIT,
    PIPELINE_VIEW,
    PIPELINE_EDIT,
    CAMPAIGNS_VIEW,
    CAMPAIGNS_CREATE,
    CAMPAIGNS_EDIT,
    FINANCIALS_VIEW,
    SPRINTS_VIEW,
    SPRINTS_CREATE,
    SPRINTS_EDIT,
    USERS_VIEW,
];

const CONSULTANT_KEYS: &[&str] = &[
    DASHBOARD_VIEW,
    CONTACTS_VIEW,
    CALLS_VIEW,
    CALLS_CREATE,
    CALLS_EDIT,
    DEALS_VIEW,
    PIPELINE_VIEW,
    CAMPAIGNS_VIEW,
    SPRINTS_VIEW,
];

const CLIENT_KEYS: &[&str] = &[
    DASHBOARD_VIEW,
    CONTACTS_VIEW,
    CALLS_VIEW,
    DEALS_VIEW,
    PIPELINE_VIEW,
    FINANCIALS_VIEW,
];

const DEFAULT_LANDING: &str = "/dashboard.html";
const CLIENT_LANDING: &str = "/client-portal.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Advisor,
    Consultant,
    Client,
    Saas,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Admin, Role::Advisor, Role::Consultant, Role::Client, Role::Saas];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Advisor => "advisor",
            Role::Consultant => "consultant",
            Role::Client => "client",
            Role::Saas => "saas",
        }
    }

    /// Default view a user of this role lands on when a page is denied.
    pub fn landing_page(&self) -> &'static str {
        match self {
            Role::Client => CLIENT_LANDING,
            _ => DEFAULT_LANDING,
        }
    }

    /// Roles a client user may be assigned to as their advisor.
    pub fn can_supervise_clients(&self) -> bool {
        matches!(self, Role::Admin | Role::Advisor)
    }

    /// Roles that count against a tenant's advisor seat limit.
    pub fn is_advisor_seat(&self) -> bool {
        matches!(self, Role::Advisor | Role::Consultant)
    }

    /// Roles that may be managed as an advisor's clients.
    pub fn is_client(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Role given to the owner created at tenant signup.
    pub fn tenant_owner() -> Role {
        Role::Saas
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| {
                AppError::bad_request(format!(
                    "invalid role, must be one of: {}",
                    Role::ALL.map(|r| r.as_str()).join(", ")
                ))
            })
    }
}

/// A user's effective permissions: either unrestricted or an explicit key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSet {
    All,
    Keys(BTreeSet<String>),
}

impl PermissionSet {
    pub fn empty() -> Self {
        PermissionSet::Keys(BTreeSet::new())
    }

    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        PermissionSet::Keys(keys.into_iter().map(str::to_string).collect())
    }

    pub fn allows(&self, permission: &str) -> bool {
        match self {
            PermissionSet::All => true,
            PermissionSet::Keys(keys) => keys.contains(permission),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PermissionSet::All)
    }

    /// Parse the stored column value: the string `"all"` or a JSON array of keys.
    /// Keys that are not in the registry are dropped.
    pub fn from_stored(raw: &str) -> Result<Self, AppError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));

        match value {
            serde_json::Value::String(s) if s == "all" => Ok(PermissionSet::All),
            serde_json::Value::Array(items) => {
                let mut keys = BTreeSet::new();
                for item in items {
                    let key = item
                        .as_str()
                        .ok_or_else(|| AppError::internal("permission keys must be strings"))?;
                    if is_known_permission(key) {
                        keys.insert(key.to_string());
                    } else {
                        tracing::warn!(permission = %key, "dropping unknown permission key");
                    }
                }
                Ok(PermissionSet::Keys(keys))
            }
            other => Err(AppError::internal(format!("unsupported permission value: {other}"))),
        }
    }

    pub fn to_stored(&self) -> String {
        match self {
            PermissionSet::All => "\"all\"".to_string(),
            PermissionSet::Keys(keys) => serde_json::Value::from(keys.iter().cloned().collect::<Vec<_>>()).to_string(),
        }
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PermissionSet::All => serializer.serialize_str("all"),
            PermissionSet::Keys(keys) => keys.serialize(serializer),
        }
    }
}

pub fn permissions_for(role: Role) -> PermissionSet {
    match role {
        Role::Admin | Role::Saas => PermissionSet::All,
        Role::Advisor => PermissionSet::from_keys(ADVISOR_KEYS.iter().copied()),
        Role::Consultant => PermissionSet::from_keys(CONSULTANT_KEYS.iter().copied()),
        Role::Client => PermissionSet::from_keys(CLIENT_KEYS.iter().copied()),
    }
}

/// Lookup by raw role name. Unknown roles hold nothing.
pub fn permissions_for_name(role: &str) -> PermissionSet {
    role.parse::<Role>()
        .map(permissions_for)
        .unwrap_or_else(|_| PermissionSet::empty())
}

pub fn is_known_permission(key: &str) -> bool {
    CATALOG.iter().any(|(known, _)| *known == key)
}

pub fn describe(key: &str) -> Option<&'static str> {
    CATALOG.iter().find(|(known, _)| *known == key).map(|(_, desc)| *desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_maps_to_a_defined_set() {
        for role in Role::ALL {
            let first = permissions_for(role);
            let second = permissions_for(role);
            assert_eq!(first, second, "{role} must be deterministic");

            if let PermissionSet::Keys(keys) = &first {
                assert!(!keys.is_empty(), "{role} should hold at least one key");
                for key in keys {
                    assert!(is_known_permission(key), "{role} holds unknown key {key}");
                }
            }
        }
    }

    #[test]
    fn unknown_role_holds_nothing() {
        assert_eq!(permissions_for_name("manager"), PermissionSet::empty());
        assert_eq!(permissions_for_name(""), PermissionSet::empty());
        assert!(permissions_for_name("ADMIN").is_all());
    }

    #[test]
    fn admin_is_unrestricted_and_client_is_read_only() {
        assert!(permissions_for(Role::Admin).allows("anything.at.all"));

        let client = permissions_for(Role::Client);
        assert!(client.allows(DEALS_VIEW));
        assert!(!client.allows(DEALS_EDIT));
        assert!(!client.allows(USERS_VIEW));
    }

    #[test]
    fn known_permission_lookup() {
        assert!(is_known_permission("contacts.create"));
        assert!(!is_known_permission("contacts.archive"));
        assert_eq!(describe(CALLS_VIEW), Some("View all calls"));
    }

    #[test]
    fn stored_values_parse_into_tagged_variant() {
        assert!(PermissionSet::from_stored("all").unwrap().is_all());
        assert!(PermissionSet::from_stored("\"all\"").unwrap().is_all());

        let parsed = PermissionSet::from_stored(r#"["calls.view", "made.up"]"#).unwrap();
        assert_eq!(parsed, PermissionSet::from_keys([CALLS_VIEW]));
        assert_eq!(parsed.to_stored(), r#"["calls.view"]"#);

        assert!(PermissionSet::from_stored("42").is_err());
    }

    #[test]
    fn landing_pages_are_role_specific() {
        assert_eq!(Role::Client.landing_page(), "/client-portal.html");
        assert_eq!(Role::Advisor.landing_page(), "/dashboard.html");
    }

    #[test]
    fn supervising_roles() {
        assert!(Role::Admin.can_supervise_clients());
        assert!(Role::Advisor.can_supervise_clients());
        assert!(!Role::Client.can_supervise_clients());
        assert!(!Role::Saas.can_supervise_clients());
    }
}
