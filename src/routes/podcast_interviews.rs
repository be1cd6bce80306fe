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
use crate::models::podcast_interview::{
    InterviewList, InterviewStats, InterviewUpdated, PodcastInterview, PodcastInterviewCreateRequest,
    PodcastInterviewUpdateRequest, MAX_OVERALL_SCORE,
};
use crate::utils::{is_valid_email, utc_now};

#[utoipa::path(
    get,
    path = "/podcast-interviews",
    tag = "Podcast Interviews",
    responses(
        (status = 200, description = "Interviews of the current tenant with stats", body = InterviewList),
        (status = 403, description = "Missing calls.view")
    )
)]
pub async fn list_interviews(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<InterviewList>>> {
    ctx.authorize(&state.guard, "podcast_interviews.list")?;
    let interviews = pipeline::list_interviews(&state.pool, ctx.data_tenant()).await?;
    let stats = InterviewStats::from_interviews(&interviews);
    Ok(Json(ApiResponse::ok(InterviewList { interviews, stats })))
}

#[utoipa::path(
    get,
    path = "/podcast-interviews/{id}",
    tag = "Podcast Interviews",
    params(("id" = Uuid, Path, description = "Interview id")),
    responses(
        (status = 200, description = "Interview", body = PodcastInterview),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn get_interview(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PodcastInterview>>> {
    ctx.authorize(&state.guard, "podcast_interviews.list")?;
    let interview = pipeline::fetch_interview(&state.pool, ctx.data_tenant(), id).await?;
    Ok(Json(ApiResponse::ok(interview)))
}

#[utoipa::path(
    post,
    path = "/podcast-interviews",
    tag = "Podcast Interviews",
    request_body = PodcastInterviewCreateRequest,
    responses(
        (status = 201, description = "Interview scheduled", body = PodcastInterview),
        (status = 400, description = "Missing guest name or invalid email")
    )
)]
pub async fn create_interview(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<PodcastInterviewCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PodcastInterview>>)> {
    let principal = ctx.authorize(&state.guard, "podcast_interviews.create")?;

    if payload.guest_name.trim().is_empty() {
        return Err(AppError::bad_request("guest name is required"));
    }
    if !is_valid_email(&payload.guest_email) {
        return Err(AppError::bad_request("invalid email format"));
    }

    let interview = pipeline::insert_interview(&state.pool, ctx.data_tenant(), &payload).await?;
    log_activity(&state.events, "created", Some(principal.user_id), &interview);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(interview).with_message("Podcast interview scheduled")),
    ))
}

#[utoipa::path(
    put,
    path = "/podcast-interviews/{id}",
    tag = "Podcast Interviews",
    params(("id" = Uuid, Path, description = "Interview id")),
    request_body = PodcastInterviewUpdateRequest,
    responses(
        (status = 200, description = "Interview updated; automation outcome attached", body = InterviewUpdated),
        (status = 400, description = "Score out of range or invalid email"),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn update_interview(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<PodcastInterviewUpdateRequest>,
) -> AppResult<Json<ApiResponse<InterviewUpdated>>> {
    let principal = ctx.authorize(&state.guard, "podcast_interviews.update")?;
    let tenant_id = ctx.data_tenant();

    let before = pipeline::fetch_interview(&state.pool, tenant_id, id).await?;
    let patched = apply_update(before.clone(), payload)?;
    pipeline::update_interview(&state.pool, &patched).await?;

    let updated = pipeline::fetch_interview(&state.pool, tenant_id, id).await?;
    log_activity_with_context(&state.events, "updated", Some(principal.user_id), &updated, Some(&before), None);

    let automation = state
        .automation
        .on_interview_updated(&before, &updated, Some(principal.user_id))
        .await;

    // the cascade may have set the flag and dependent id
    let interview = pipeline::fetch_interview(&state.pool, tenant_id, id).await?;

    Ok(Json(ApiResponse::ok(InterviewUpdated { interview, automation })))
}

#[utoipa::path(
    delete,
    path = "/podcast-interviews/{id}",
    tag = "Podcast Interviews",
    params(("id" = Uuid, Path, description = "Interview id")),
    responses(
        (status = 200, description = "Interview deleted"),
        (status = 404, description = "Not found in this tenant")
    )
)]
pub async fn delete_interview(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let principal = ctx.authorize(&state.guard, "podcast_interviews.delete")?;
    let tenant_id = ctx.data_tenant();

    let interview = pipeline::fetch_interview(&state.pool, tenant_id, id).await?;
    pipeline::delete_interview(&state.pool, tenant_id, id).await?;
    log_activity(&state.events, "deleted", Some(principal.user_id), &interview);

    Ok(Json(ApiResponse::ok(serde_json::json!({ "id": id })).with_message("Podcast interview deleted")))
}

fn check_score(name: &str, score: Option<i64>, max: i64) -> AppResult<()> {
    match score {
        Some(value) if !(0..=max).contains(&value) => {
            Err(AppError::bad_request(format!("{name} must be between 0 and {max}")))
        }
        _ => Ok(()),
    }
}

/// Merge a partial update into the stored interview. Cascade columns are left alone.
fn apply_update(mut interview: PodcastInterview, payload: PodcastInterviewUpdateRequest) -> AppResult<PodcastInterview> {
    check_score("overall_score", payload.overall_score, MAX_OVERALL_SCORE)?;
    check_score("intro_score", payload.intro_score, MAX_OVERALL_SCORE)?;
    check_score("questions_flow_score", payload.questions_flow_score, MAX_OVERALL_SCORE)?;
    check_score("close_next_steps_score", payload.close_next_steps_score, MAX_OVERALL_SCORE)?;

    if let Some(name) = payload.guest_name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("guest name cannot be empty"));
        }
        interview.guest_name = name.trim().to_string();
    }
    if let Some(email) = payload.guest_email {
        if !is_valid_email(&email) {
            return Err(AppError::bad_request("invalid email format"));
        }
        interview.guest_email = email.trim().to_string();
    }

    let scored = payload.overall_score.is_some() || payload.ai_analysis.is_some();

    interview.company = payload.company.or(interview.company);
    interview.job_title = payload.job_title.or(interview.job_title);
    interview.scheduled_date = payload.scheduled_date.or(interview.scheduled_date);
    interview.notes = payload.notes.or(interview.notes);
    interview.zoom_meeting_id = payload.zoom_meeting_id.or(interview.zoom_meeting_id);
    interview.overall_score = payload.overall_score.or(interview.overall_score);
    interview.intro_score = payload.intro_score.or(interview.intro_score);
    interview.questions_flow_score = payload.questions_flow_score.or(interview.questions_flow_score);
    interview.close_next_steps_score = payload.close_next_steps_score.or(interview.close_next_steps_score);
    interview.ai_analysis = payload.ai_analysis.or(interview.ai_analysis);
    if let Some(status) = payload.status {
        interview.interview_status = status;
    }
    if let Some(qualified) = payload.qualified_for_discovery {
        interview.qualified_for_discovery = qualified;
    }

    let now = utc_now();
    if scored {
        interview.analyzed_at = Some(now);
    }
    interview.updated_at = now;

    Ok(interview)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn stored() -> PodcastInterview {
        let now = Utc::now();
        PodcastInterview {
            id: Uuid::new_v4(),
            tenant_id: None,
            guest_name: "Grace Hopper".into(),
            guest_email: "grace@example.com".into(),
            company: Some("Navy".into()),
            job_title: None,
            scheduled_date: None,
            interview_status: "completed".into(),
            notes: Some("first notes".into()),
            zoom_meeting_id: None,
            overall_score: None,
            intro_score: None,
            questions_flow_score: None,
            close_next_steps_score: None,
            ai_analysis: None,
            qualified_for_discovery: false,
            discovery_call_created: false,
            discovery_call_id: None,
            analyzed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn scoring_stamps_analyzed_at() {
        let patched = apply_update(
            stored(),
            PodcastInterviewUpdateRequest {
                overall_score: Some(41),
                qualified_for_discovery: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(patched.overall_score, Some(41));
        assert!(patched.qualified_for_discovery);
        assert!(patched.analyzed_at.is_some());
        assert_eq!(patched.notes.as_deref(), Some("first notes"));
    }

    #[test]
    fn plain_edits_leave_analysis_untouched() {
        let patched = apply_update(
            stored(),
            PodcastInterviewUpdateRequest {
                notes: Some("rescheduled".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(patched.analyzed_at.is_none());
        assert_eq!(patched.notes.as_deref(), Some("rescheduled"));
    }

    #[test]
    fn scores_above_fifty_are_rejected() {
        let err = apply_update(
            stored(),
            PodcastInterviewUpdateRequest {
                overall_score: Some(51),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_email_is_rejected() {
        let result = apply_update(
            stored(),
            PodcastInterviewUpdateRequest {
                guest_email: Some("not-an-email".into()),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
