use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::AuthContext;
use crate::db::pipeline;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context};
use crate::models::api::ApiResponse;
use crate::models::discovery_call::{
    DiscoveryCall, DiscoveryCallCreateRequest, DiscoveryCallList, DiscoveryCallUpdateRequest, DiscoveryCallUpdated,
    DiscoveryStats, NewDiscoveryCall, DEFAULT_CALL_STATUS,
};
use crate::utils::{is_valid_email, utc_now};

#[utoipa::path(
    get,
    path = "/discovery-calls",
    tag = "Discovery Calls",
    responses(
        (status = 200, description = "Discovery calls of the current tenant with stats", body = DiscoveryCallList),
        (status = 403, description = "Missing calls.view")
    )
)]
pub async fn list_discovery_calls(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<DiscoveryCallList>>> {
    ctx.authorize(&state.guard, "discovery_calls.list")?;
    let calls = pipeline::list_discovery_calls(&state.pool, ctx.data_tenant()).await?;
    let stats = DiscoveryStats::from_calls(&calls);
    Ok(Json(ApiResponse::ok(DiscoveryCallList { calls, stats })))
}

#[utoipa::path(
    get,
    path = "/discovery-calls/{id}",
    tag = "Discovery Calls",
    params(("id" = Uuid, Path, description = "Discovery call id")),
    responses(
        (status = 200, description = "Discovery call", body = DiscoveryCall),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn get_discovery_call(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DiscoveryCall>>> {
    ctx.authorize(&state.guard, "discovery_calls.list")?;
    let call = pipeline::fetch_discovery_call(&state.pool, ctx.data_tenant(), id).await?;
    Ok(Json(ApiResponse::ok(call)))
}

#[utoipa::path(
    post,
    path = "/discovery-calls",
    tag = "Discovery Calls",
    request_body = DiscoveryCallCreateRequest,
    responses(
        (status = 201, description = "Discovery call created", body = DiscoveryCall),
        (status = 400, description = "Missing contact name or invalid email")
    )
)]
pub async fn create_discovery_call(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<DiscoveryCallCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<DiscoveryCall>>)> {
    let principal = ctx.authorize(&state.guard, "discovery_calls.create")?;

    if payload.contact_name.trim().is_empty() {
        return Err(AppError::bad_request("contact name is required"));
    }
    if !is_valid_email(&payload.email) {
        return Err(AppError::bad_request("invalid email format"));
    }

    let tenant_id = ctx.data_tenant();
    let draft = NewDiscoveryCall {
        tenant_id,
        source_id: None,
        contact_name: payload.contact_name.trim().to_string(),
        company: payload.company,
        email: payload.email.trim().to_string(),
        call_date: payload.call_date,
        call_status: payload.call_status.unwrap_or_else(|| DEFAULT_CALL_STATUS.to_string()),
        call_source: payload.call_source,
        notes: payload.notes,
    };

    let id = pipeline::insert_discovery_call(&state.pool, &draft).await?;
    let call = pipeline::fetch_discovery_call(&state.pool, tenant_id, id).await?;
    log_activity(&state.events, "created", Some(principal.user_id), &call);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(call))))
}

#[utoipa::path(
    put,
    path = "/discovery-calls/{id}",
    tag = "Discovery Calls",
    params(("id" = Uuid, Path, description = "Discovery call id")),
    request_body = DiscoveryCallUpdateRequest,
    responses(
        (status = 200, description = "Discovery call updated; automation outcome attached", body = DiscoveryCallUpdated),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn update_discovery_call(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<DiscoveryCallUpdateRequest>,
) -> AppResult<Json<ApiResponse<DiscoveryCallUpdated>>> {
    let principal = ctx.authorize(&state.guard, "discovery_calls.update")?;
    let tenant_id = ctx.data_tenant();

    let before = pipeline::fetch_discovery_call(&state.pool, tenant_id, id).await?;
    let patched = apply_update(before.clone(), payload)?;
    pipeline::update_discovery_call(&state.pool, &patched).await?;

    let updated = pipeline::fetch_discovery_call(&state.pool, tenant_id, id).await?;
    log_activity_with_context(&state.events, "updated", Some(principal.user_id), &updated, Some(&before), None);

    let automation = state
        .automation
        .on_discovery_call_updated(&before, &updated, Some(principal.user_id))
        .await;
    let call = pipeline::fetch_discovery_call(&state.pool, tenant_id, id).await?;

    Ok(Json(ApiResponse::ok(DiscoveryCallUpdated { call, automation })))
}

#[utoipa::path(
    delete,
    path = "/discovery-calls/{id}",
    tag = "Discovery Calls",
    params(("id" = Uuid, Path, description = "Discovery call id")),
    responses(
        (status = 200, description = "Discovery call deleted"),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn delete_discovery_call(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let principal = ctx.authorize(&state.guard, "discovery_calls.delete")?;
    let tenant_id = ctx.data_tenant();

    let call = pipeline::fetch_discovery_call(&state.pool, tenant_id, id).await?;
    pipeline::delete_discovery_call(&state.pool, tenant_id, id).await?;
    log_activity(&state.events, "deleted", Some(principal.user_id), &call);

    Ok(Json(ApiResponse::ok(serde_json::json!({ "id": id })).with_message("Discovery call deleted")))
}

fn apply_update(mut call: DiscoveryCall, payload: DiscoveryCallUpdateRequest) -> AppResult<DiscoveryCall> {
    if let Some(name) = payload.contact_name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("contact name cannot be empty"));
        }
        call.contact_name = name.trim().to_string();
    }
    if let Some(email) = payload.email {
        if !is_valid_email(&email) {
            return Err(AppError::bad_request("invalid email format"));
        }
        call.email = email.trim().to_string();
    }
    if let Some(status) = payload.call_status {
        call.call_status = status.trim().to_string();
    }

    call.company = payload.company.or(call.company);
    call.call_date = payload.call_date.or(call.call_date);
    call.call_source = payload.call_source.or(call.call_source);
    call.notes = payload.notes.or(call.notes);
    call.updated_at = utc_now();

    Ok(call)
}
