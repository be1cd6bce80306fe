//! Authorization: the permission registry, request identity and the access guard.
//!
//! A request is decided in three steps. [`TenantResolver`](crate::tenancy::TenantResolver)
//! scopes it to a tenant, [`IdentityResolver`] turns its session credential into a
//! [`Principal`], and [`authorize`] checks the principal against the tenant and the
//! permission the page or operation requires.

mod context;
mod guard;
mod identity;
mod principal;
mod registry;

pub use context::{AuthContext, BillingContext};
pub use guard::{authorize, Decision, DenyReason, Guard, PagePermissions};
pub use identity::{
    credential_from_headers, principal_for, IdentityResolver, IdentityStore, SqliteIdentityStore, SESSION_COOKIE,
};
pub use principal::Principal;
pub use registry::{
    describe, is_known_permission, permissions, permissions_for, permissions_for_name, PermissionSet, Role,
    CATALOG,
};
