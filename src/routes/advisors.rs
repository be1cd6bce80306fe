use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, AuthContext, Decision, Principal};
use crate::db::users::{fetch_tenant_user, list_clients_of, set_advisor};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity_with_context;
use crate::models::api::ApiResponse;
use crate::models::user::{ClientSummary, User};

#[utoipa::path(
    get,
    path = "/advisors/{id}/clients",
    tag = "Advisors",
    params(("id" = Uuid, Path, description = "Advisor id")),
    responses(
        (status = 200, description = "Clients connected to the advisor", body = [ClientSummary]),
        (status = 400, description = "User cannot supervise clients"),
        (status = 404, description = "Advisor not found in this tenant")
    )
)]
pub async fn list_clients(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(advisor_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<ClientSummary>>>> {
    ctx.authorize(&state.guard, "advisor_clients.list")?;
    let advisor = supervisor(&state, &ctx, advisor_id).await?;

    let mut clients = Vec::new();
    for row in list_clients_of(&state.pool, advisor.id).await? {
        let user: User = row.try_into()?;
        if user.role.is_client() {
            clients.push(ClientSummary::from(user));
        }
    }

    Ok(Json(ApiResponse::ok(clients)))
}

#[utoipa::path(
    post,
    path = "/advisors/{id}/clients/{client_id}",
    tag = "Advisors",
    params(
        ("id" = Uuid, Path, description = "Advisor id"),
        ("client_id" = Uuid, Path, description = "Client id")
    ),
    responses(
        (status = 200, description = "Client connected to the advisor", body = ClientSummary),
        (status = 400, description = "Advisor cannot supervise clients or user is not a client"),
        (status = 404, description = "Advisor or client not found in this tenant")
    )
)]
pub async fn assign_client(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((advisor_id, client_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<ClientSummary>>> {
    let principal = ctx.authorize(&state.guard, "advisor_clients.assign")?;
    let advisor = supervisor(&state, &ctx, advisor_id).await?;
    let client = client_in_scope(&state, &ctx, client_id).await?;

    if !set_advisor(&state.pool, client.id, client.advisor_id, Some(advisor.id)).await? {
        return Err(AppError::conflict("client was reassigned concurrently; retry"));
    }

    let after: User = fetch_tenant_user(&state.pool, ctx.data_tenant(), client.id).await?.try_into()?;
    log_activity_with_context(&state.events, "advisor_assigned", Some(principal.user_id), &after, Some(&client), None);
    tracing::info!(advisor_id = %advisor.id, client_id = %client.id, "client assigned to advisor");

    Ok(Json(ApiResponse::ok(ClientSummary::from(after)).with_message("Client assigned successfully")))
}

#[utoipa::path(
    post,
    path = "/advisors/{id}/clients/{client_id}/disconnect",
    tag = "Advisors",
    params(
        ("id" = Uuid, Path, description = "Advisor id"),
        ("client_id" = Uuid, Path, description = "Client id")
    ),
    responses(
        (status = 200, description = "Client disconnected; the account stays active", body = ClientSummary),
        (status = 403, description = "Client is not connected to this advisor"),
        (status = 404, description = "Client not found in this tenant")
    )
)]
pub async fn disconnect_client(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((advisor_id, client_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<ClientSummary>>> {
    let principal = authorize_disconnect(&state, &ctx, advisor_id)?;
    let client = client_in_scope(&state, &ctx, client_id).await?;

    if client.advisor_id != Some(advisor_id) {
        return Err(AppError::forbidden("This client is not connected to you"));
    }
    if !set_advisor(&state.pool, client.id, Some(advisor_id), None).await? {
        return Err(AppError::forbidden("This client is not connected to you"));
    }

    let after: User = fetch_tenant_user(&state.pool, ctx.data_tenant(), client.id).await?.try_into()?;
    log_activity_with_context(&state.events, "advisor_disconnected", Some(principal.user_id), &after, Some(&client), None);
    tracing::info!(%advisor_id, client_id = %client.id, "client disconnected from advisor");

    Ok(Json(ApiResponse::ok(ClientSummary::from(after)).with_message("Client disconnected successfully")))
}

/// The connected advisor may always let a client go; anyone else needs the
/// `advisor_clients.disconnect` permission.
fn authorize_disconnect<'a>(state: &AppState, ctx: &'a AuthContext, advisor_id: Uuid) -> AppResult<&'a Principal> {
    let own = ctx.principal.as_ref().is_some_and(|p| p.user_id == advisor_id);
    if !own {
        return ctx.authorize(&state.guard, "advisor_clients.disconnect");
    }

    match authorize(ctx.principal.as_ref(), &ctx.tenant, None) {
        Decision::Allow => ctx.require_principal(),
        Decision::Deny(reason) => Err(reason.into_error(ctx.principal.as_ref(), &ctx.tenant)),
    }
}

async fn supervisor(state: &AppState, ctx: &AuthContext, advisor_id: Uuid) -> AppResult<User> {
    let advisor: User = fetch_tenant_user(&state.pool, ctx.data_tenant(), advisor_id)
        .await?
        .try_into()?;

    if !advisor.role.can_supervise_clients() {
        return Err(AppError::bad_request(format!("a {} cannot supervise clients", advisor.role)));
    }
    Ok(advisor)
}

async fn client_in_scope(state: &AppState, ctx: &AuthContext, client_id: Uuid) -> AppResult<User> {
    let client: User = fetch_tenant_user(&state.pool, ctx.data_tenant(), client_id)
        .await?
        .try_into()?;

    if !client.role.is_client() {
        return Err(AppError::bad_request("only clients can be connected to an advisor"));
    }
    Ok(client)
}
