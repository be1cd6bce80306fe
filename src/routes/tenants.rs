use axum::extract::State;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::BillingContext;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity_with_context;
use crate::models::api::ApiResponse;
use crate::models::tenant::{DbTenant, Tenant, TenantStatusUpdateRequest, TENANT_COLUMNS};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/tenant",
    tag = "Tenant",
    responses(
        (status = 200, description = "Current tenant, including inactive ones", body = Tenant),
        (status = 403, description = "Missing billing.manage")
    )
)]
pub async fn get_tenant(
    State(state): State<AppState>,
    BillingContext(ctx): BillingContext,
) -> AppResult<Json<ApiResponse<Tenant>>> {
    ctx.authorize(&state.guard, "tenant.view")?;
    let tenant_id = ctx.data_tenant().ok_or_else(|| AppError::bad_request("no tenant in scope"))?;
    let tenant = fetch_tenant(&state.pool, tenant_id).await?;
    Ok(Json(ApiResponse::ok(tenant)))
}

#[utoipa::path(
    put,
    path = "/tenant/status",
    tag = "Tenant",
    request_body = TenantStatusUpdateRequest,
    responses(
        (status = 200, description = "Subscription updated; tenant status follows it", body = Tenant),
        (status = 403, description = "Missing billing.manage")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    BillingContext(ctx): BillingContext,
    Json(payload): Json<TenantStatusUpdateRequest>,
) -> AppResult<Json<ApiResponse<Tenant>>> {
    let principal = ctx.authorize(&state.guard, "tenant.status")?;
    let tenant_id = ctx.data_tenant().ok_or_else(|| AppError::bad_request("no tenant in scope"))?;
    let before = fetch_tenant(&state.pool, tenant_id).await?;

    let status = payload.subscription_status.implied_tenant_status();
    sqlx::query("UPDATE tenants SET subscription_status = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(payload.subscription_status.as_str())
        .bind(status.as_str())
        .bind(utc_now())
        .bind(tenant_id)
        .execute(&state.pool)
        .await?;

    let after = fetch_tenant(&state.pool, tenant_id).await?;
    log_activity_with_context(&state.events, "status_changed", Some(principal.user_id), &after, Some(&before), None);
    tracing::info!(
        tenant_id = %tenant_id,
        from = before.status.as_str(),
        to = after.status.as_str(),
        "tenant status changed"
    );

    Ok(Json(ApiResponse::ok(after)))
}

pub(crate) async fn fetch_tenant(pool: &SqlitePool, tenant_id: Uuid) -> AppResult<Tenant> {
    let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?");
    sqlx::query_as::<_, DbTenant>(&sql)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("tenant not found"))?
        .try_into()
}
