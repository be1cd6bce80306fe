use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, UserStatus, USER_COLUMNS};
use crate::utils::utc_now;

pub struct NewUser<'a> {
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    pub advisor_id: Option<Uuid>,
}

pub async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(email.trim())
        .fetch_optional(pool)
        .await?)
}

pub async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email.trim())
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub async fn insert_user(tx: &mut Transaction<'_, Sqlite>, user: NewUser<'_>) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    let now = utc_now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, email, full_name, password_hash, role, advisor_id, tenant_id, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)
        "#,
    )
    .bind(id)
    .bind(user.email.trim())
    .bind(user.full_name.trim())
    .bind(user.password_hash)
    .bind(user.role.as_str())
    .bind(user.advisor_id)
    .bind(user.tenant_id)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(id),
        Err(err) => {
            let err = AppError::from(err);
            if err.is_unique_violation() {
                Err(AppError::conflict("email already in use"))
            } else {
                Err(err)
            }
        }
    }
}

/// Users of a tenant holding one of `roles`.
pub async fn count_tenant_users(pool: &SqlitePool, tenant_id: Uuid, roles: &[Role]) -> AppResult<i64> {
    let placeholders = vec!["?"; roles.len()].join(", ");
    let sql = format!("SELECT COUNT(1) FROM users WHERE tenant_id = ? AND status = 'active' AND role IN ({placeholders})");

    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(tenant_id);
    for role in roles {
        query = query.bind(role.as_str());
    }
    Ok(query.fetch_one(pool).await?)
}

/// A user only if they belong to `tenant_id`.
pub async fn fetch_tenant_user(pool: &SqlitePool, tenant_id: Option<Uuid>, user_id: Uuid) -> AppResult<DbUser> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND tenant_id IS ?");
    sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn list_clients_of(pool: &SqlitePool, advisor_id: Uuid) -> AppResult<Vec<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE advisor_id = ? ORDER BY full_name");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(advisor_id)
        .fetch_all(pool)
        .await?)
}

/// Point a client at `advisor_id`, or detach it with `None`. `expected` guards
/// against racing with another reassignment.
pub async fn set_advisor(
    pool: &SqlitePool,
    client_id: Uuid,
    expected: Option<Uuid>,
    advisor_id: Option<Uuid>,
) -> AppResult<bool> {
    let result = sqlx::query("UPDATE users SET advisor_id = ?, updated_at = ? WHERE id = ? AND advisor_id IS ?")
        .bind(advisor_id)
        .bind(utc_now())
        .bind(client_id)
        .bind(expected)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list_tenant_users(pool: &SqlitePool, tenant_id: Option<Uuid>) -> AppResult<Vec<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id IS ? ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await?)
}

/// Full replacement of the editable user columns.
pub struct UserChanges<'a> {
    pub full_name: &'a str,
    pub role: Role,
    pub status: UserStatus,
    pub advisor_id: Option<Uuid>,
    /// Serialized override, `None` for the role's registry set.
    pub permissions: Option<String>,
}

pub async fn apply_user_changes(tx: &mut Transaction<'_, Sqlite>, user_id: Uuid, changes: &UserChanges<'_>) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET full_name = ?, role = ?, status = ?, advisor_id = ?, permissions = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(changes.full_name.trim())
    .bind(changes.role.as_str())
    .bind(changes.status.as_str())
    .bind(changes.advisor_id)
    .bind(changes.permissions.as_deref())
    .bind(utc_now())
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Detach every client of `advisor_id`; returns how many were detached.
pub async fn detach_clients(tx: &mut Transaction<'_, Sqlite>, advisor_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query("UPDATE users SET advisor_id = NULL, updated_at = ? WHERE advisor_id = ?")
        .bind(utc_now())
        .bind(advisor_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}
