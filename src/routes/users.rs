use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{is_known_permission, permissions_for, AuthContext, PermissionSet, Principal};
use crate::db::users::{apply_user_changes, detach_clients, fetch_tenant_user, list_tenant_users, UserChanges};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity_with_context;
use crate::models::api::ApiResponse;
use crate::models::user::{PermissionsUpdate, User, UserUpdateRequest};

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses(
        (status = 200, description = "Users of the current tenant, newest first", body = [User]),
        (status = 403, description = "Missing users.view")
    )
)]
pub async fn list_users(State(state): State<AppState>, ctx: AuthContext) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    ctx.authorize(&state.guard, "users.list")?;

    let users = list_tenant_users(&state.pool, ctx.data_tenant())
        .await?
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ApiResponse::ok(users)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    ctx.authorize(&state.guard, "users.list")?;
    let user: User = fetch_tenant_user(&state.pool, ctx.data_tenant(), id).await?.try_into()?;
    Ok(Json(ApiResponse::ok(user)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid role, advisor or permission key"),
        (status = 403, description = "Missing users.edit / users.permissions, or grant above your own access"),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let mut allowed = None;
    if payload.touches_profile() {
        allowed = Some(ctx.authorize(&state.guard, "users.update")?);
    }
    if payload.permissions.is_some() {
        allowed = Some(ctx.authorize(&state.guard, "users.set_permissions")?);
    }
    let principal = allowed.ok_or_else(|| AppError::bad_request("nothing to update"))?;

    let db_user = fetch_tenant_user(&state.pool, ctx.data_tenant(), id).await?;
    let stored_permissions = db_user.permissions.clone();
    let before: User = db_user.try_into()?;

    if before.permissions.is_all() && !principal.permissions.is_all() {
        return Err(AppError::forbidden("cannot modify a user with more access than your own"));
    }

    let role = payload.role.unwrap_or(before.role);
    let status = payload.status.unwrap_or(before.status);
    if before.id == principal.user_id && (role != before.role || status != before.status) {
        return Err(AppError::bad_request("you cannot change your own role or status"));
    }
    if role != before.role && permissions_for(role).is_all() && !principal.permissions.is_all() {
        return Err(AppError::forbidden("cannot grant a role with more access than your own"));
    }

    let full_name = match payload.full_name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("full name cannot be empty")),
        Some(name) => name.to_string(),
        None => before.full_name.clone(),
    };

    let advisor_id = match payload.advisor_id {
        Some(_) if !role.is_client() => {
            return Err(AppError::bad_request("only clients can be connected to an advisor"));
        }
        Some(advisor_id) => {
            let advisor: User = fetch_tenant_user(&state.pool, ctx.data_tenant(), advisor_id).await?.try_into()?;
            if !advisor.role.can_supervise_clients() {
                return Err(AppError::bad_request(format!("a {} cannot supervise clients", advisor.role)));
            }
            Some(advisor.id)
        }
        // only clients keep an advisor
        None if role.is_client() => before.advisor_id,
        None => None,
    };

    let permissions = match payload.permissions {
        Some(update) => stored_override(update, principal)?,
        None => stored_permissions,
    };

    let mut tx = state.pool.begin().await?;
    apply_user_changes(
        &mut tx,
        before.id,
        &UserChanges {
            full_name: &full_name,
            role,
            status,
            advisor_id,
            permissions,
        },
    )
    .await?;

    let detached = if before.role.can_supervise_clients() && !role.can_supervise_clients() {
        detach_clients(&mut tx, before.id).await?
    } else {
        0
    };
    tx.commit().await?;

    let after: User = fetch_tenant_user(&state.pool, ctx.data_tenant(), id).await?.try_into()?;
    log_activity_with_context(&state.events, "updated", Some(principal.user_id), &after, Some(&before), None);
    tracing::info!(
        user_id = %after.id,
        role = %after.role,
        status = after.status.as_str(),
        detached_clients = detached,
        "user updated"
    );

    Ok(Json(ApiResponse::ok(after).with_message("User updated successfully")))
}

/// Validate a permission override and serialize it for storage.
fn stored_override(update: PermissionsUpdate, grantor: &Principal) -> AppResult<Option<String>> {
    let set = match update {
        PermissionsUpdate::Preset(preset) if preset == "role" => return Ok(None),
        PermissionsUpdate::Preset(preset) if preset == "all" => PermissionSet::All,
        PermissionsUpdate::Preset(other) => {
            return Err(AppError::bad_request(format!("unknown permission preset `{other}`")));
        }
        PermissionsUpdate::Keys(keys) => {
            if let Some(unknown) = keys.iter().find(|k| !is_known_permission(k)) {
                return Err(AppError::bad_request(format!("unknown permission `{unknown}`")));
            }
            PermissionSet::from_keys(keys.iter().map(String::as_str))
        }
    };

    let escalates = match &set {
        PermissionSet::All => !grantor.permissions.is_all(),
        PermissionSet::Keys(keys) => keys.iter().any(|k| !grantor.has_permission(k)),
    };
    if escalates {
        return Err(AppError::forbidden("cannot grant permissions you do not hold"));
    }

    Ok(Some(set.to_stored()))
}
