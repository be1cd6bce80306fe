use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::AuthContext;
use crate::db::pipeline;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::api::ApiResponse;
use crate::models::discovery_call::DEFAULT_CALL_STATUS;
use crate::models::sales_call::{NewSalesCall, SalesCall, SalesCallCreateRequest};
use crate::utils::is_valid_email;

#[utoipa::path(
    get,
    path = "/sales-calls",
    tag = "Sales Calls",
    responses((status = 200, description = "Sales calls of the current tenant", body = [SalesCall]))
)]
pub async fn list_sales_calls(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<Vec<SalesCall>>>> {
    ctx.authorize(&state.guard, "sales_calls.list")?;
    let calls = pipeline::list_sales_calls(&state.pool, ctx.data_tenant()).await?;
    Ok(Json(ApiResponse::ok(calls)))
}

#[utoipa::path(
    get,
    path = "/sales-calls/{id}",
    tag = "Sales Calls",
    params(("id" = Uuid, Path, description = "Sales call id")),
    responses(
        (status = 200, description = "Sales call", body = SalesCall),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn get_sales_call(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SalesCall>>> {
    ctx.authorize(&state.guard, "sales_calls.list")?;
    let call = pipeline::fetch_sales_call(&state.pool, ctx.data_tenant(), id).await?;
    Ok(Json(ApiResponse::ok(call)))
}

#[utoipa::path(
    post,
    path = "/sales-calls",
    tag = "Sales Calls",
    request_body = SalesCallCreateRequest,
    responses(
        (status = 201, description = "Sales call created", body = SalesCall),
        (status = 400, description = "Missing prospect name, invalid email or negative deal value")
    )
)]
pub async fn create_sales_call(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<SalesCallCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<SalesCall>>)> {
    let principal = ctx.authorize(&state.guard, "sales_calls.create")?;

    if payload.prospect_name.trim().is_empty() {
        return Err(AppError::bad_request("prospect name is required"));
    }
    if let Some(email) = payload.email.as_deref() {
        if !is_valid_email(email) {
            return Err(AppError::bad_request("invalid email format"));
        }
    }
    let deal_value = payload.deal_value.unwrap_or(0.0);
    if !deal_value.is_finite() || deal_value < 0.0 {
        return Err(AppError::bad_request("deal value must be a non-negative number"));
    }

    let tenant_id = ctx.data_tenant();
    let draft = NewSalesCall {
        tenant_id,
        source_id: None,
        prospect_name: payload.prospect_name.trim().to_string(),
        company: payload.company,
        email: payload.email.map(|e| e.trim().to_string()),
        call_status: payload.call_status.unwrap_or_else(|| DEFAULT_CALL_STATUS.to_string()),
        deal_value,
        notes: payload.notes,
    };

    let id = pipeline::insert_sales_call(&state.pool, &draft).await?;
    let call = pipeline::fetch_sales_call(&state.pool, tenant_id, id).await?;
    log_activity(&state.events, "created", Some(principal.user_id), &call);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(call))))
}
