use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::principal::Principal;
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::models::user::{DbUser, User, UserStatus, USER_COLUMNS};

pub const SESSION_COOKIE: &str = "session";

/// Session credential carried by a request: `Authorization: Bearer` first,
/// then the `session` cookie.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;

    async fn is_session_revoked(&self, jti: Uuid) -> AppResult<bool>;
}

#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn is_session_revoked(&self, jti: Uuid) -> AppResult<bool> {
        let hit: Option<String> = sqlx::query_scalar("SELECT jti FROM revoked_sessions WHERE jti = ?")
            .bind(jti.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(hit.is_some())
    }
}

/// Turns a session credential into the authoritative [`Principal`].
///
/// Role and permissions always come from the user store; the credential
/// only names the user.
#[derive(Clone)]
pub struct IdentityResolver {
    jwt: Arc<JwtConfig>,
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(jwt: Arc<JwtConfig>, store: Arc<dyn IdentityStore>) -> Self {
        Self { jwt, store }
    }

    pub async fn resolve_identity(&self, credential: Option<&str>) -> AppResult<Principal> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::unauthorized("authentication required"))?;

        let claims = self.jwt.decode(credential)?;

        if self.store.is_session_revoked(claims.jti).await? {
            tracing::debug!(user_id = %claims.sub, "session was signed out");
            return Err(AppError::unauthorized("session has ended"));
        }

        let user = self
            .store
            .user_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid session"))?;

        if user.status != UserStatus::Active {
            tracing::info!(user_id = %user.id, "inactive user presented a session");
            return Err(AppError::unauthorized("account is inactive"));
        }

        Ok(principal_for(user))
    }
}

pub fn principal_for(user: User) -> Principal {
    let mut principal = Principal::new(user.id, user.role)
        .with_email(user.email)
        .with_permissions(user.permissions);
    principal.tenant_id = user.tenant_id;
    principal
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use axum::http::HeaderValue;
    use chrono::Utc;

    use super::*;
    use crate::authz::{permissions_for, PermissionSet, Role};

    #[derive(Default)]
    struct MemoryIdentities {
        users: Mutex<HashMap<Uuid, User>>,
        revoked: Mutex<HashSet<Uuid>>,
    }

    #[async_trait]
    impl IdentityStore for MemoryIdentities {
        async fn user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
            Ok(self.users.lock().unwrap().get(&user_id).cloned())
        }

        async fn is_session_revoked(&self, jti: Uuid) -> AppResult<bool> {
            Ok(self.revoked.lock().unwrap().contains(&jti))
        }
    }

    fn user(role: Role, status: UserStatus) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: format!("{role}@example.com"),
            full_name: "Test User".into(),
            role,
            advisor_id: None,
            tenant_id: Some(Uuid::new_v4()),
            permissions: permissions_for(role),
            status,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn setup() -> (Arc<JwtConfig>, Arc<MemoryIdentities>, IdentityResolver) {
        let jwt = Arc::new(JwtConfig::new("identity-secret", 1));
        let store = Arc::new(MemoryIdentities::default());
        let resolver = IdentityResolver::new(jwt.clone(), store.clone());
        (jwt, store, resolver)
    }

    #[tokio::test]
    async fn resolves_role_and_tenant_from_the_store() {
        let (jwt, store, resolver) = setup();
        let advisor = user(Role::Advisor, UserStatus::Active);
        store.users.lock().unwrap().insert(advisor.id, advisor.clone());

        let token = jwt.encode(advisor.id).unwrap();
        let principal = resolver.resolve_identity(Some(&token)).await.unwrap();

        assert_eq!(principal.user_id, advisor.id);
        assert_eq!(principal.role, Role::Advisor);
        assert_eq!(principal.tenant_id, advisor.tenant_id);
        assert_eq!(principal.permissions, permissions_for(Role::Advisor));
    }

    #[tokio::test]
    async fn stored_override_wins_over_role_set() {
        let (jwt, store, resolver) = setup();
        let mut client = user(Role::Client, UserStatus::Active);
        client.permissions = PermissionSet::All;
        store.users.lock().unwrap().insert(client.id, client.clone());

        let principal = resolver.resolve_identity(Some(&jwt.encode(client.id).unwrap())).await.unwrap();
        assert!(principal.permissions.is_all());
    }

    #[tokio::test]
    async fn missing_garbage_and_unknown_users_are_unauthenticated() {
        let (jwt, _store, resolver) = setup();

        for credential in [None, Some(""), Some("not-a-token")] {
            let err = resolver.resolve_identity(credential).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)), "{credential:?}");
        }

        let ghost = jwt.encode(Uuid::new_v4()).unwrap();
        assert!(matches!(
            resolver.resolve_identity(Some(&ghost)).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn inactive_users_and_revoked_sessions_are_rejected() {
        let (jwt, store, resolver) = setup();
        let inactive = user(Role::Consultant, UserStatus::Inactive);
        store.users.lock().unwrap().insert(inactive.id, inactive.clone());
        let err = resolver
            .resolve_identity(Some(&jwt.encode(inactive.id).unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let active = user(Role::Admin, UserStatus::Active);
        store.users.lock().unwrap().insert(active.id, active.clone());
        let token = jwt.encode(active.id).unwrap();
        let jti = jwt.decode(&token).unwrap().jti;
        store.revoked.lock().unwrap().insert(jti);

        assert!(resolver.resolve_identity(Some(&token)).await.is_err());
    }

    #[test]
    fn bearer_header_takes_precedence_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=from-cookie"));
        assert_eq!(credential_from_headers(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(credential_from_headers(&headers).as_deref(), Some("from-header"));

        assert_eq!(credential_from_headers(&HeaderMap::new()), None);
    }
}
