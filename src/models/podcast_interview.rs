use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::Loggable;

/// Highest possible `overall_score`.
pub const MAX_OVERALL_SCORE: i64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PodcastInterview {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub interview_status: String,
    pub notes: Option<String>,
    pub zoom_meeting_id: Option<String>,
    pub overall_score: Option<i64>,
    pub intro_score: Option<i64>,
    pub questions_flow_score: Option<i64>,
    pub close_next_steps_score: Option<i64>,
    pub ai_analysis: Option<String>,
    pub qualified_for_discovery: bool,
    pub discovery_call_created: bool,
    pub discovery_call_id: Option<Uuid>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for PodcastInterview {
    fn entity_type() -> &'static str { "podcast_interview" }
    fn subject_id(&self) -> Uuid { self.id }
}

pub const INTERVIEW_COLUMNS: &str = "id, tenant_id, guest_name, guest_email, company, job_title, scheduled_date, interview_status, notes, zoom_meeting_id, overall_score, intro_score, questions_flow_score, close_next_steps_score, ai_analysis, qualified_for_discovery, discovery_call_created, discovery_call_id, analyzed_at, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct PodcastInterviewCreateRequest {
    #[schema(example = "Grace Hopper")]
    pub guest_name: String,
    #[schema(example = "grace@example.com")]
    pub guest_email: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    #[schema(example = "scheduled")]
    pub status: Option<String>,
    pub notes: Option<String>,
    pub zoom_meeting_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PodcastInterviewUpdateRequest {
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    #[schema(example = "analyzed")]
    pub status: Option<String>,
    pub notes: Option<String>,
    pub zoom_meeting_id: Option<String>,
    #[schema(example = 41)]
    pub overall_score: Option<i64>,
    pub intro_score: Option<i64>,
    pub questions_flow_score: Option<i64>,
    pub close_next_steps_score: Option<i64>,
    pub ai_analysis: Option<String>,
    #[schema(example = true)]
    pub qualified_for_discovery: Option<bool>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct InterviewStats {
    pub total: usize,
    pub completed: usize,
    pub analyzed: usize,
    pub qualified: usize,
    pub average_score: Option<f64>,
    /// Percentage of all interviews marked qualified.
    pub qualification_rate: u32,
    pub auto_progressed_to_discovery: usize,
}

impl InterviewStats {
    pub fn from_interviews(interviews: &[PodcastInterview]) -> Self {
        let total = interviews.len();
        let scores: Vec<i64> = interviews.iter().filter_map(|i| i.overall_score).collect();
        let qualified = interviews.iter().filter(|i| i.qualified_for_discovery).count();

        Self {
            total,
            completed: interviews
                .iter()
                .filter(|i| matches!(i.interview_status.as_str(), "completed" | "analyzed"))
                .count(),
            analyzed: scores.len(),
            qualified,
            average_score: (!scores.is_empty())
                .then(|| (scores.iter().sum::<i64>() as f64 / scores.len() as f64 * 100.0).round() / 100.0),
            qualification_rate: percentage(qualified, total),
            auto_progressed_to_discovery: interviews.iter().filter(|i| i.discovery_call_created).count(),
        }
    }
}

pub(crate) fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InterviewList {
    pub interviews: Vec<PodcastInterview>,
    pub stats: InterviewStats,
}

/// An updated interview plus what its automation did.
#[derive(Debug, Serialize, ToSchema)]
pub struct InterviewUpdated {
    pub interview: PodcastInterview,
    pub automation: crate::automation::AutomationReport,
}
