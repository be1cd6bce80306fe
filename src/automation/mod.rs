//! Cross-entity automation: a qualifying change on one pipeline record creates
//! its follow-up record exactly once.
//!
//! Cascades run only from the source's own update path, one hop per mutation.
//! Their outcome is reported alongside the update and never fails it.

mod engine;
mod rules;
mod stores;

pub use engine::{
    maybe_cascade, CascadeError, CascadeOutcome, CascadeRule, CascadeSource, CascadeSourceStore, CascadeTargetStore,
    Trigger,
};
pub use rules::{
    discovery_to_sales, interview_to_discovery, DEFAULT_QUALIFY_THRESHOLD, DISCOVERY_TO_SALES, INTERVIEW_TO_DISCOVERY,
};
pub use stores::{DiscoveryCalls, InterviewFlags, SalesCalls};

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::pipeline;
use crate::errors::{AppError, AppResult};
use crate::events::{publish, EventBus};
use crate::models::discovery_call::{DiscoveryCall, NewDiscoveryCall};
use crate::models::podcast_interview::PodcastInterview;
use crate::models::sales_call::NewSalesCall;

#[derive(Debug, Clone)]
pub struct AutomationConfig {
    pub qualify_threshold: i64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            qualify_threshold: DEFAULT_QUALIFY_THRESHOLD,
        }
    }
}

impl AutomationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let qualify_threshold = match std::env::var("INTERVIEW_QUALIFY_THRESHOLD") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::configuration("INTERVIEW_QUALIFY_THRESHOLD must be a valid integer"))?,
            Err(_) => DEFAULT_QUALIFY_THRESHOLD,
        };
        Ok(Self { qualify_threshold })
    }
}

/// What a cascade did, as returned to the caller of the triggering update.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AutomationReport {
    pub rule: String,
    pub outcome: Option<CascadeOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileSummary {
    pub interviews: usize,
    pub discovery_calls: usize,
}

#[derive(Clone)]
pub struct Automation {
    pool: SqlitePool,
    events: EventBus,
    interview_rule: Arc<CascadeRule<PodcastInterview, NewDiscoveryCall>>,
    discovery_rule: Arc<CascadeRule<DiscoveryCall, NewSalesCall>>,
}

impl Automation {
    pub fn new(pool: SqlitePool, events: EventBus, config: &AutomationConfig) -> Self {
        Self {
            pool,
            events,
            interview_rule: Arc::new(interview_to_discovery(config.qualify_threshold)),
            discovery_rule: Arc::new(discovery_to_sales()),
        }
    }

    pub async fn on_interview_updated(
        &self,
        before: &PodcastInterview,
        after: &PodcastInterview,
        actor_id: Option<Uuid>,
    ) -> AutomationReport {
        let result = maybe_cascade(
            Some(before),
            after,
            &*self.interview_rule,
            &InterviewFlags(self.pool.clone()),
            &DiscoveryCalls(self.pool.clone()),
        )
        .await;
        self.report(self.interview_rule.name, result, actor_id)
    }

    pub async fn on_discovery_call_updated(
        &self,
        before: &DiscoveryCall,
        after: &DiscoveryCall,
        actor_id: Option<Uuid>,
    ) -> AutomationReport {
        let stores = DiscoveryCalls(self.pool.clone());
        let result = maybe_cascade(Some(before), after, &*self.discovery_rule, &stores, &SalesCalls(self.pool.clone())).await;
        self.report(self.discovery_rule.name, result, actor_id)
    }

    fn report(&self, rule: &str, result: Result<CascadeOutcome, CascadeError>, actor_id: Option<Uuid>) -> AutomationReport {
        match result {
            Ok(outcome) => {
                if let CascadeOutcome::Fired { target_id } | CascadeOutcome::Reconciled { target_id } = outcome {
                    publish(&self.events, "cascade.fired", actor_id, Some(target_id), json!({ "rule": rule, "severity": "important" }));
                }
                AutomationReport { rule: rule.to_string(), outcome: Some(outcome), error: None }
            }
            Err(err) => {
                if let CascadeError::PartialFailure { source_id, target_id, .. } = &err {
                    publish(
                        &self.events,
                        "cascade.partial_failure",
                        actor_id,
                        Some(*source_id),
                        json!({ "rule": rule, "target_id": target_id, "severity": "critical" }),
                    );
                }
                tracing::error!(rule, error = %err, "automation failed");
                AutomationReport { rule: rule.to_string(), outcome: None, error: Some(err.to_string()) }
            }
        }
    }

    /// Link every orphaned target to its source, repairing earlier partial failures.
    pub async fn reconcile_all(&self) -> AppResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for (interview_id, discovery_id) in pipeline::unflagged_interviews(&self.pool).await? {
            if pipeline::mark_interview_cascaded(&self.pool, interview_id, discovery_id).await? {
                tracing::info!(%interview_id, %discovery_id, "reconciled interview cascade");
                summary.interviews += 1;
            }
        }

        for (discovery_id, sales_id) in pipeline::unflagged_discovery_calls(&self.pool).await? {
            if pipeline::mark_discovery_cascaded(&self.pool, discovery_id, sales_id).await? {
                tracing::info!(%discovery_id, %sales_id, "reconciled discovery cascade");
                summary.discovery_calls += 1;
            }
        }

        Ok(summary)
    }
}
