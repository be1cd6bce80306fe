use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{permissions_for, AuthContext, Role};
use crate::db::users::{count_tenant_users, fetch_user_by_id, find_user_by_email, insert_user, NewUser};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::api::ApiResponse;
use crate::models::invitation::{
    expiry_from, DbInvitation, Invitation, InvitationAcceptRequest, InvitationCreateRequest, InvitationCreated,
    InvitationStatus, INVITATION_COLUMNS,
};
use crate::models::user::{AuthResponse, User};
use crate::routes::tenants::fetch_tenant;
use crate::utils::{generate_token, hash_password, hash_token, is_valid_email, normalize_email, utc_now};

#[utoipa::path(
    get,
    path = "/invitations",
    tag = "Invitations",
    responses(
        (status = 200, description = "Invitations of the current tenant", body = [Invitation]),
        (status = 403, description = "Missing users.view")
    )
)]
pub async fn list_invitations(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<Vec<Invitation>>>> {
    ctx.authorize(&state.guard, "invitations.list")?;

    let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE tenant_id IS ? ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, DbInvitation>(&sql)
        .bind(ctx.data_tenant())
        .fetch_all(&state.pool)
        .await?;

    let invitations = rows
        .into_iter()
        .map(Invitation::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ApiResponse::ok(invitations)))
}

#[utoipa::path(
    post,
    path = "/invitations",
    tag = "Invitations",
    request_body = InvitationCreateRequest,
    responses(
        (status = 201, description = "Invitation created; the token is only returned here", body = InvitationCreated),
        (status = 400, description = "Invalid email or tenant seat limit reached"),
        (status = 403, description = "Missing users.create or role above the inviter's"),
        (status = 409, description = "User exists or invitation already pending")
    )
)]
pub async fn create_invitation(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<InvitationCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<InvitationCreated>>)> {
    let principal = ctx.authorize(&state.guard, "invitations.create")?;

    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("invalid email format"));
    }
    if permissions_for(payload.role).is_all() && !principal.permissions.is_all() {
        return Err(AppError::forbidden("cannot invite a role with more access than your own"));
    }
    if find_user_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::conflict("A user with this email already exists"));
    }
    expire_stale_invitations(&state, &email).await?;
    if pending_invitation_exists(&state, &email).await? {
        return Err(AppError::conflict("There is already a pending invitation for this email"));
    }

    let tenant_id = ctx.data_tenant();
    if let Some(tenant_id) = tenant_id {
        ensure_seat_available(&state, tenant_id, payload.role).await?;
    }

    let id = Uuid::new_v4();
    let token = generate_token();
    let now = utc_now();

    let inserted = sqlx::query(
        r#"
        INSERT INTO invitations (id, email, role, token_hash, status, invited_by, tenant_id, expires_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&email)
    .bind(payload.role.as_str())
    .bind(hash_token(&token))
    .bind(principal.user_id)
    .bind(tenant_id)
    .bind(expiry_from(now))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await;

    if let Err(err) = inserted {
        let err = AppError::from(err);
        return Err(if err.is_unique_violation() {
            AppError::conflict("There is already a pending invitation for this email")
        } else {
            err
        });
    }

    let invitation = fetch_invitation(&state, id).await?;
    log_activity(&state.events, "created", Some(principal.user_id), &invitation);
    tracing::info!(invitation_id = %id, role = %payload.role, "invitation created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(InvitationCreated { invitation, token }).with_message("Invitation created successfully")),
    ))
}

#[utoipa::path(
    post,
    path = "/invitations/accept",
    tag = "Invitations",
    request_body = InvitationAcceptRequest,
    responses(
        (status = 201, description = "Account created from the invitation", body = AuthResponse),
        (status = 400, description = "Token unknown, already used, revoked or expired")
    )
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Json(payload): Json<InvitationAcceptRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    if payload.full_name.trim().is_empty() {
        return Err(AppError::bad_request("full name is required"));
    }

    let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token_hash = ?");
    let invitation: Invitation = sqlx::query_as::<_, DbInvitation>(&sql)
        .bind(hash_token(payload.token.trim()))
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::bad_request("invalid invitation token"))?
        .try_into()?;

    if invitation.status != InvitationStatus::Pending {
        return Err(AppError::bad_request(format!("invitation is {}", invitation.status.as_str())));
    }

    let now = utc_now();
    if invitation.is_expired_at(now) {
        sqlx::query("UPDATE invitations SET status = 'expired', updated_at = ? WHERE id = ? AND status = 'pending'")
            .bind(now)
            .bind(invitation.id)
            .execute(&state.pool)
            .await?;
        log_activity(&state.events, "expired", None, &invitation);
        return Err(AppError::bad_request("invitation has expired"));
    }

    let password_hash = hash_password(&payload.password)?;
    let advisor_id = client_advisor(&state, &invitation).await?;

    let mut tx = state.pool.begin().await?;

    // single use: only the first redeemer flips the row
    let claimed = sqlx::query(
        "UPDATE invitations SET status = 'accepted', accepted_at = ?, updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(now)
    .bind(invitation.id)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() != 1 {
        return Err(AppError::bad_request("invitation has already been used"));
    }

    let user_id = insert_user(
        &mut tx,
        NewUser {
            email: &invitation.email,
            full_name: &payload.full_name,
            password_hash: &password_hash,
            role: invitation.role,
            tenant_id: invitation.tenant_id,
            advisor_id,
        },
    )
    .await?;

    tx.commit().await?;

    let user: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;
    log_activity(&state.events, "accepted", Some(user.id), &invitation);
    log_activity(&state.events, "registered", Some(user.id), &user);
    tracing::info!(invitation_id = %invitation.id, user_id = %user.id, "invitation accepted");

    let token = state.jwt.encode(user.id)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(AuthResponse::new(token, user)))))
}

#[utoipa::path(
    post,
    path = "/invitations/{id}/revoke",
    tag = "Invitations",
    params(("id" = Uuid, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Invitation revoked", body = Invitation),
        (status = 400, description = "Invitation is no longer pending"),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn revoke_invitation(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Invitation>>> {
    let principal = ctx.authorize(&state.guard, "invitations.revoke")?;

    let result = sqlx::query(
        "UPDATE invitations SET status = 'revoked', updated_at = ? WHERE id = ? AND tenant_id IS ? AND status = 'pending'",
    )
    .bind(utc_now())
    .bind(id)
    .bind(ctx.data_tenant())
    .execute(&state.pool)
    .await?;

    let invitation = fetch_invitation(&state, id).await?;
    if invitation.tenant_id != ctx.data_tenant() {
        return Err(AppError::not_found("invitation not found"));
    }
    if result.rows_affected() == 0 {
        return Err(AppError::bad_request(format!("invitation is {}", invitation.status.as_str())));
    }

    log_activity(&state.events, "revoked", Some(principal.user_id), &invitation);
    Ok(Json(ApiResponse::ok(invitation)))
}

async fn fetch_invitation(state: &AppState, id: Uuid) -> AppResult<Invitation> {
    let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = ?");
    sqlx::query_as::<_, DbInvitation>(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("invitation not found"))?
        .try_into()
}

/// Pending rows past their expiry stop blocking new invitations to the same email.
async fn expire_stale_invitations(state: &AppState, email: &str) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE invitations SET status = 'expired', updated_at = ? WHERE email = ? AND status = 'pending' AND expires_at <= ?",
    )
    .bind(utc_now())
    .bind(email)
    .bind(utc_now())
    .execute(&state.pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(expired = result.rows_affected(), "expired stale invitations before re-inviting");
    }
    Ok(())
}

async fn pending_invitation_exists(state: &AppState, email: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM invitations WHERE email = ? AND status = 'pending'")
        .bind(email)
        .fetch_one(&state.pool)
        .await?;
    Ok(count > 0)
}

/// Pending invitations hold a seat as well as active users.
async fn ensure_seat_available(state: &AppState, tenant_id: Uuid, role: Role) -> AppResult<()> {
    let tenant = fetch_tenant(&state.pool, tenant_id).await?;

    let users = count_tenant_users(&state.pool, tenant_id, &Role::ALL).await? + pending_seats(state, tenant_id, &Role::ALL).await?;
    if users >= tenant.limits.max_users {
        return Err(AppError::bad_request(format!(
            "tenant has reached its limit of {} users",
            tenant.limits.max_users
        )));
    }

    if role.is_advisor_seat() {
        let seats: Vec<Role> = Role::ALL.into_iter().filter(Role::is_advisor_seat).collect();
        let advisors = count_tenant_users(&state.pool, tenant_id, &seats).await? + pending_seats(state, tenant_id, &seats).await?;
        if advisors >= tenant.limits.max_advisors {
            return Err(AppError::bad_request(format!(
                "tenant has reached its limit of {} advisors",
                tenant.limits.max_advisors
            )));
        }
    }

    Ok(())
}

async fn pending_seats(state: &AppState, tenant_id: Uuid, roles: &[Role]) -> AppResult<i64> {
    let placeholders = vec!["?"; roles.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(1) FROM invitations WHERE tenant_id = ? AND status = 'pending' AND expires_at > ? AND role IN ({placeholders})"
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(tenant_id).bind(utc_now());
    for role in roles {
        query = query.bind(role.as_str());
    }
    Ok(query.fetch_one(&state.pool).await?)
}

/// A client invited by someone who may supervise clients is connected to them.
async fn client_advisor(state: &AppState, invitation: &Invitation) -> AppResult<Option<Uuid>> {
    let Some(inviter_id) = invitation.invited_by.filter(|_| invitation.role.is_client()) else {
        return Ok(None);
    };

    let inviter: User = fetch_user_by_id(&state.pool, inviter_id).await?.try_into()?;
    Ok(inviter.role.can_supervise_clients().then_some(inviter.id))
}
