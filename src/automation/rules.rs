use uuid::Uuid;

use super::engine::{CascadeRule, CascadeSource, Trigger};
use crate::models::discovery_call::{DiscoveryCall, NewDiscoveryCall, DEFAULT_CALL_STATUS};
use crate::models::podcast_interview::{PodcastInterview, MAX_OVERALL_SCORE};
use crate::models::sales_call::NewSalesCall;

pub const DEFAULT_QUALIFY_THRESHOLD: i64 = 35;
pub const INTERVIEW_TO_DISCOVERY: &str = "interview_to_discovery";
pub const DISCOVERY_TO_SALES: &str = "discovery_to_sales";

const QUALIFIED: &str = "qualified";
const UNQUALIFIED: &str = "unqualified";

impl CascadeSource for PodcastInterview {
    fn id(&self) -> Uuid {
        self.id
    }

    fn cascade_fired(&self) -> bool {
        self.discovery_call_created
    }

    /// Interviews qualify through their flag, not `interview_status`.
    fn status(&self) -> &str {
        if self.qualified_for_discovery {
            QUALIFIED
        } else {
            UNQUALIFIED
        }
    }

    fn score(&self) -> Option<i64> {
        self.overall_score
    }
}

impl CascadeSource for DiscoveryCall {
    fn id(&self) -> Uuid {
        self.id
    }

    fn cascade_fired(&self) -> bool {
        self.sales_call_created
    }

    fn status(&self) -> &str {
        &self.call_status
    }

    fn score(&self) -> Option<i64> {
        None
    }
}

pub fn interview_to_discovery(threshold: i64) -> CascadeRule<PodcastInterview, NewDiscoveryCall> {
    CascadeRule {
        name: INTERVIEW_TO_DISCOVERY,
        trigger: Trigger::on_statuses([QUALIFIED]).with_min_score(threshold),
        map: discovery_draft,
    }
}

pub fn discovery_to_sales() -> CascadeRule<DiscoveryCall, NewSalesCall> {
    CascadeRule {
        name: DISCOVERY_TO_SALES,
        trigger: Trigger::on_statuses(["completed", "qualified"]),
        map: sales_draft,
    }
}

fn discovery_draft(interview: &PodcastInterview) -> NewDiscoveryCall {
    let score = interview
        .overall_score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "n/a".to_string());

    NewDiscoveryCall {
        tenant_id: interview.tenant_id,
        source_id: Some(interview.id),
        contact_name: interview.guest_name.clone(),
        company: interview.company.clone(),
        email: interview.guest_email.clone(),
        call_date: None,
        call_status: DEFAULT_CALL_STATUS.to_string(),
        call_source: Some("podcast_qualified".to_string()),
        notes: Some(with_context(
            format!("Auto-created from podcast interview. AI Score: {score}/{MAX_OVERALL_SCORE}."),
            interview.ai_analysis.as_deref(),
        )),
    }
}

fn sales_draft(call: &DiscoveryCall) -> NewSalesCall {
    NewSalesCall {
        tenant_id: call.tenant_id,
        source_id: Some(call.id),
        prospect_name: call.contact_name.clone(),
        company: call.company.clone(),
        email: Some(call.email.clone()),
        call_status: DEFAULT_CALL_STATUS.to_string(),
        deal_value: 0.0,
        notes: Some(with_context("Auto-created from discovery call.".to_string(), call.notes.as_deref())),
    }
}

fn with_context(headline: String, detail: Option<&str>) -> String {
    match detail.map(str::trim).filter(|d| !d.is_empty()) {
        Some(detail) => format!("{headline} {detail}"),
        None => headline,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn interview(qualified: bool, score: Option<i64>) -> PodcastInterview {
        let now = Utc::now();
        PodcastInterview {
            id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            guest_name: "Grace Hopper".into(),
            guest_email: "grace@example.com".into(),
            company: Some("Navy".into()),
            job_title: None,
            scheduled_date: None,
            interview_status: "analyzed".into(),
            notes: None,
            zoom_meeting_id: None,
            overall_score: score,
            intro_score: None,
            questions_flow_score: None,
            close_next_steps_score: None,
            ai_analysis: Some("Strong fit.".into()),
            qualified_for_discovery: qualified,
            discovery_call_created: false,
            discovery_call_id: None,
            analyzed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn interview_needs_flag_and_threshold() {
        let rule = interview_to_discovery(DEFAULT_QUALIFY_THRESHOLD);
        assert!(rule.trigger.matches(&interview(true, Some(35))));
        assert!(!rule.trigger.matches(&interview(true, Some(34))));
        assert!(!rule.trigger.matches(&interview(false, Some(50))));
        assert!(!rule.trigger.matches(&interview(true, None)));
    }

    #[test]
    fn discovery_draft_carries_contact_and_score() {
        let source = interview(true, Some(42));
        let draft = (interview_to_discovery(DEFAULT_QUALIFY_THRESHOLD).map)(&source);

        assert_eq!(draft.source_id, Some(source.id));
        assert_eq!(draft.tenant_id, source.tenant_id);
        assert_eq!(draft.contact_name, "Grace Hopper");
        assert_eq!(draft.call_status, "scheduled");
        assert_eq!(draft.call_source.as_deref(), Some("podcast_qualified"));
        assert_eq!(
            draft.notes.as_deref(),
            Some("Auto-created from podcast interview. AI Score: 42/50. Strong fit.")
        );
    }

    #[test]
    fn created_targets_do_not_trigger_the_next_hop() {
        let source = interview(true, Some(42));
        let draft = (interview_to_discovery(DEFAULT_QUALIFY_THRESHOLD).map)(&source);
        assert!(!discovery_to_sales()
            .trigger
            .statuses
            .iter()
            .any(|s| *s == draft.call_status));
    }
}
