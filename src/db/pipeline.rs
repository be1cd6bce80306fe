//! SQL for the sales pipeline: podcast interviews, discovery calls, sales calls.
//!
//! Every read and write is scoped with `tenant_id IS ?`, so a `None` tenant only
//! ever sees rows that belong to no tenant.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::discovery_call::{DiscoveryCall, NewDiscoveryCall, DISCOVERY_COLUMNS};
use crate::models::podcast_interview::{PodcastInterview, PodcastInterviewCreateRequest, INTERVIEW_COLUMNS};
use crate::models::sales_call::{NewSalesCall, SalesCall, SALES_COLUMNS};
use crate::utils::utc_now;

// podcast interviews

pub async fn list_interviews(pool: &SqlitePool, tenant_id: Option<Uuid>) -> AppResult<Vec<PodcastInterview>> {
    let sql = format!("SELECT {INTERVIEW_COLUMNS} FROM podcast_interviews WHERE tenant_id IS ? ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, PodcastInterview>(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await?)
}

pub async fn fetch_interview(pool: &SqlitePool, tenant_id: Option<Uuid>, id: Uuid) -> AppResult<PodcastInterview> {
    let sql = format!("SELECT {INTERVIEW_COLUMNS} FROM podcast_interviews WHERE id = ? AND tenant_id IS ?");
    sqlx::query_as::<_, PodcastInterview>(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("interview not found"))
}

pub async fn insert_interview(
    pool: &SqlitePool,
    tenant_id: Option<Uuid>,
    payload: &PodcastInterviewCreateRequest,
) -> AppResult<PodcastInterview> {
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        r#"
        INSERT INTO podcast_interviews
            (id, tenant_id, guest_name, guest_email, company, job_title, scheduled_date, interview_status, notes, zoom_meeting_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(payload.guest_name.trim())
    .bind(payload.guest_email.trim())
    .bind(&payload.company)
    .bind(&payload.job_title)
    .bind(payload.scheduled_date)
    .bind(payload.status.as_deref().unwrap_or("scheduled"))
    .bind(&payload.notes)
    .bind(&payload.zoom_meeting_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_interview(pool, tenant_id, id).await
}

/// Writes the editable columns. The cascade flag and dependent id are only
/// ever touched by [`mark_interview_cascaded`].
pub async fn update_interview(pool: &SqlitePool, interview: &PodcastInterview) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE podcast_interviews SET
            guest_name = ?, guest_email = ?, company = ?, job_title = ?, scheduled_date = ?,
            interview_status = ?, notes = ?, zoom_meeting_id = ?, overall_score = ?, intro_score = ?,
            questions_flow_score = ?, close_next_steps_score = ?, ai_analysis = ?,
            qualified_for_discovery = ?, analyzed_at = ?, updated_at = ?
        WHERE id = ? AND tenant_id IS ?
        "#,
    )
    .bind(&interview.guest_name)
    .bind(&interview.guest_email)
    .bind(&interview.company)
    .bind(&interview.job_title)
    .bind(interview.scheduled_date)
    .bind(&interview.interview_status)
    .bind(&interview.notes)
    .bind(&interview.zoom_meeting_id)
    .bind(interview.overall_score)
    .bind(interview.intro_score)
    .bind(interview.questions_flow_score)
    .bind(interview.close_next_steps_score)
    .bind(&interview.ai_analysis)
    .bind(interview.qualified_for_discovery)
    .bind(interview.analyzed_at)
    .bind(interview.updated_at)
    .bind(interview.id)
    .bind(interview.tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("interview not found"));
    }
    Ok(())
}

pub async fn delete_interview(pool: &SqlitePool, tenant_id: Option<Uuid>, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM podcast_interviews WHERE id = ? AND tenant_id IS ?")
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("interview not found"));
    }
    Ok(())
}

/// Set the cascade flag once. `false` means it was already set.
pub async fn mark_interview_cascaded(pool: &SqlitePool, interview_id: Uuid, discovery_call_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE podcast_interviews SET discovery_call_created = 1, discovery_call_id = ?, updated_at = ? WHERE id = ? AND discovery_call_created = 0",
    )
    .bind(discovery_call_id)
    .bind(utc_now())
    .bind(interview_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Interviews whose discovery call exists but whose flag was never set.
pub async fn unflagged_interviews(pool: &SqlitePool) -> AppResult<Vec<(Uuid, Uuid)>> {
    Ok(sqlx::query_as::<_, (Uuid, Uuid)>(
        r#"
        SELECT i.id, d.id FROM podcast_interviews i
        JOIN discovery_calls d ON d.source_id = i.id
        WHERE i.discovery_call_created = 0
        "#,
    )
    .fetch_all(pool)
    .await?)
}

// discovery calls

pub async fn list_discovery_calls(pool: &SqlitePool, tenant_id: Option<Uuid>) -> AppResult<Vec<DiscoveryCall>> {
    let sql = format!("SELECT {DISCOVERY_COLUMNS} FROM discovery_calls WHERE tenant_id IS ? ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, DiscoveryCall>(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await?)
}

pub async fn fetch_discovery_call(pool: &SqlitePool, tenant_id: Option<Uuid>, id: Uuid) -> AppResult<DiscoveryCall> {
    let sql = format!("SELECT {DISCOVERY_COLUMNS} FROM discovery_calls WHERE id = ? AND tenant_id IS ?");
    sqlx::query_as::<_, DiscoveryCall>(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("discovery call not found"))
}

pub async fn insert_discovery_call(pool: &SqlitePool, call: &NewDiscoveryCall) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        r#"
        INSERT INTO discovery_calls
            (id, tenant_id, source_id, contact_name, company, email, call_date, call_status, call_source, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(call.tenant_id)
    .bind(call.source_id)
    .bind(&call.contact_name)
    .bind(&call.company)
    .bind(&call.email)
    .bind(call.call_date)
    .bind(&call.call_status)
    .bind(&call.call_source)
    .bind(&call.notes)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn find_discovery_by_source(pool: &SqlitePool, source_id: Uuid) -> AppResult<Option<Uuid>> {
    Ok(sqlx::query_scalar::<_, Uuid>("SELECT id FROM discovery_calls WHERE source_id = ?")
        .bind(source_id)
        .fetch_optional(pool)
        .await?)
}

pub async fn update_discovery_call(pool: &SqlitePool, call: &DiscoveryCall) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE discovery_calls SET
            contact_name = ?, company = ?, email = ?, call_date = ?, call_status = ?,
            call_source = ?, notes = ?, updated_at = ?
        WHERE id = ? AND tenant_id IS ?
        "#,
    )
    .bind(&call.contact_name)
    .bind(&call.company)
    .bind(&call.email)
    .bind(call.call_date)
    .bind(&call.call_status)
    .bind(&call.call_source)
    .bind(&call.notes)
    .bind(call.updated_at)
    .bind(call.id)
    .bind(call.tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("discovery call not found"));
    }
    Ok(())
}

pub async fn delete_discovery_call(pool: &SqlitePool, tenant_id: Option<Uuid>, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM discovery_calls WHERE id = ? AND tenant_id IS ?")
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("discovery call not found"));
    }
    Ok(())
}

pub async fn mark_discovery_cascaded(pool: &SqlitePool, discovery_call_id: Uuid, sales_call_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE discovery_calls SET sales_call_created = 1, sales_call_id = ?, updated_at = ? WHERE id = ? AND sales_call_created = 0",
    )
    .bind(sales_call_id)
    .bind(utc_now())
    .bind(discovery_call_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn unflagged_discovery_calls(pool: &SqlitePool) -> AppResult<Vec<(Uuid, Uuid)>> {
    Ok(sqlx::query_as::<_, (Uuid, Uuid)>(
        r#"
        SELECT d.id, s.id FROM discovery_calls d
        JOIN sales_calls s ON s.source_id = d.id
        WHERE d.sales_call_created = 0
        "#,
    )
    .fetch_all(pool)
    .await?)
}

// sales calls

pub async fn list_sales_calls(pool: &SqlitePool, tenant_id: Option<Uuid>) -> AppResult<Vec<SalesCall>> {
    let sql = format!("SELECT {SALES_COLUMNS} FROM sales_calls WHERE tenant_id IS ? ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, SalesCall>(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await?)
}

pub async fn fetch_sales_call(pool: &SqlitePool, tenant_id: Option<Uuid>, id: Uuid) -> AppResult<SalesCall> {
    let sql = format!("SELECT {SALES_COLUMNS} FROM sales_calls WHERE id = ? AND tenant_id IS ?");
    sqlx::query_as::<_, SalesCall>(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("sales call not found"))
}

pub async fn insert_sales_call(pool: &SqlitePool, call: &NewSalesCall) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        r#"
        INSERT INTO sales_calls
            (id, tenant_id, source_id, prospect_name, company, email, call_status, deal_value, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(call.tenant_id)
    .bind(call.source_id)
    .bind(&call.prospect_name)
    .bind(&call.company)
    .bind(&call.email)
    .bind(&call.call_status)
    .bind(call.deal_value)
    .bind(&call.notes)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn find_sales_by_source(pool: &SqlitePool, source_id: Uuid) -> AppResult<Option<Uuid>> {
    Ok(sqlx::query_scalar::<_, Uuid>("SELECT id FROM sales_calls WHERE source_id = ?")
        .bind(source_id)
        .fetch_optional(pool)
        .await?)
}
