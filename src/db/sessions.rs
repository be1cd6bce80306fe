use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::utils::utc_now;

/// Record a logged-out session so its token is refused until it expires.
pub async fn revoke_session(pool: &SqlitePool, jti: Uuid, user_id: Uuid, expires_at: DateTime<Utc>) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO revoked_sessions (jti, user_id, revoked_at, expires_at) VALUES (?, ?, ?, ?) ON CONFLICT(jti) DO NOTHING",
    )
    .bind(jti.to_string())
    .bind(user_id)
    .bind(utc_now())
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop revocations whose token has expired anyway.
pub async fn prune_expired_sessions(pool: &SqlitePool) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM revoked_sessions WHERE expires_at <= ?")
        .bind(utc_now())
        .execute(pool)
        .await?;

    let pruned = result.rows_affected();
    if pruned > 0 {
        tracing::debug!(pruned, "pruned expired session revocations");
    }
    Ok(pruned)
}
