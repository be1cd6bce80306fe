use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// A record that can trigger a cascade.
pub trait CascadeSource {
    fn id(&self) -> Uuid;

    /// Whether this record's cascade has already produced its dependent.
    fn cascade_fired(&self) -> bool;

    fn status(&self) -> &str;

    fn score(&self) -> Option<i64>;
}

/// Qualification condition. Both parts must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub statuses: Vec<String>,
    /// Inclusive lower bound; a missing score never qualifies.
    pub min_score: Option<i64>,
}

impl Trigger {
    pub fn on_statuses<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            statuses: statuses.into_iter().map(str::to_string).collect(),
            min_score: None,
        }
    }

    pub fn with_min_score(mut self, min_score: i64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn matches(&self, source: &impl CascadeSource) -> bool {
        let status_ok = self.statuses.iter().any(|s| s == source.status());
        let score_ok = match self.min_score {
            Some(min) => source.score().is_some_and(|score| score >= min),
            None => true,
        };
        status_ok && score_ok
    }
}

/// Source type `S` produces a target draft `D` when the trigger holds.
pub struct CascadeRule<S, D> {
    pub name: &'static str,
    pub trigger: Trigger,
    pub map: fn(&S) -> D,
}

#[async_trait]
pub trait CascadeSourceStore: Send + Sync {
    /// Set the flag and dependent id, only if the flag is still unset.
    /// Returns `false` when the flag was already set.
    async fn mark_cascaded(&self, source_id: Uuid, target_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait CascadeTargetStore<D: Send + Sync>: Send + Sync {
    async fn find_by_source(&self, source_id: Uuid) -> AppResult<Option<Uuid>>;

    /// Insert a draft. Must fail with a unique violation when a target for the
    /// same source already exists.
    async fn insert(&self, draft: &D) -> AppResult<Uuid>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeOutcome {
    Fired { target_id: Uuid },
    /// A target from an earlier or concurrent run was found and linked.
    Reconciled { target_id: Uuid },
    AlreadyFired,
    NotQualified,
}

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("failed to create dependent record for {source_id}")]
    TargetCreate {
        source_id: Uuid,
        #[source]
        error: AppError,
    },
    #[error("dependent record {target_id} created but {source_id} was not flagged")]
    PartialFailure {
        source_id: Uuid,
        target_id: Uuid,
        #[source]
        error: AppError,
    },
}

/// Evaluate `rule` for a source that just changed from `before` to `after`.
///
/// Creates at most one dependent per source across retries and concurrent
/// callers: the target store's unique `source_id` picks a single winner and
/// every other caller reconciles against it.
pub async fn maybe_cascade<S, D, SS, TS>(
    before: Option<&S>,
    after: &S,
    rule: &CascadeRule<S, D>,
    sources: &SS,
    targets: &TS,
) -> Result<CascadeOutcome, CascadeError>
where
    S: CascadeSource,
    D: Send + Sync,
    SS: CascadeSourceStore + ?Sized,
    TS: CascadeTargetStore<D> + ?Sized,
{
    let source_id = after.id();

    if after.cascade_fired() || before.is_some_and(|b| b.cascade_fired()) {
        return Ok(CascadeOutcome::AlreadyFired);
    }

    if !rule.trigger.matches(after) {
        return Ok(CascadeOutcome::NotQualified);
    }

    let existing = targets
        .find_by_source(source_id)
        .await
        .map_err(|error| CascadeError::TargetCreate { source_id, error })?;

    if let Some(target_id) = existing {
        tracing::info!(rule = rule.name, %source_id, %target_id, "reconciling existing dependent");
        link(sources, source_id, target_id).await?;
        return Ok(CascadeOutcome::Reconciled { target_id });
    }

    let draft = (rule.map)(after);
    let target_id = match targets.insert(&draft).await {
        Ok(id) => id,
        Err(err) if err.is_unique_violation() => {
            let winner = targets
                .find_by_source(source_id)
                .await
                .map_err(|error| CascadeError::TargetCreate { source_id, error })?
                .ok_or(CascadeError::TargetCreate { source_id, error: err })?;

            tracing::info!(rule = rule.name, %source_id, target_id = %winner, "lost cascade race, reconciling");
            link(sources, source_id, winner).await?;
            return Ok(CascadeOutcome::Reconciled { target_id: winner });
        }
        Err(error) => {
            tracing::warn!(rule = rule.name, %source_id, error = %error, "cascade target insert failed");
            return Err(CascadeError::TargetCreate { source_id, error });
        }
    };

    link(sources, source_id, target_id).await?;
    tracing::info!(rule = rule.name, %source_id, %target_id, "cascade fired");
    Ok(CascadeOutcome::Fired { target_id })
}

async fn link<SS>(sources: &SS, source_id: Uuid, target_id: Uuid) -> Result<(), CascadeError>
where
    SS: CascadeSourceStore + ?Sized,
{
    match sources.mark_cascaded(source_id, target_id).await {
        Ok(_) => Ok(()),
        Err(error) => {
            tracing::error!(%source_id, %target_id, error = %error, "cascade flag update failed");
            Err(CascadeError::PartialFailure { source_id, target_id, error })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    struct Lead {
        id: Uuid,
        fired: bool,
        status: &'static str,
        score: Option<i64>,
    }

    impl Lead {
        fn new(status: &'static str, score: Option<i64>) -> Self {
            Self { id: Uuid::new_v4(), fired: false, status, score }
        }
    }

    impl CascadeSource for Lead {
        fn id(&self) -> Uuid { self.id }
        fn cascade_fired(&self) -> bool { self.fired }
        fn status(&self) -> &str { self.status }
        fn score(&self) -> Option<i64> { self.score }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Draft {
        source_id: Uuid,
    }

    fn rule() -> CascadeRule<Lead, Draft> {
        CascadeRule {
            name: "lead_to_call",
            trigger: Trigger::on_statuses(["qualified"]).with_min_score(35),
            map: |lead| Draft { source_id: lead.id },
        }
    }

    #[derive(Default)]
    struct Flags {
        marked: Mutex<HashMap<Uuid, Uuid>>,
        fail: bool,
    }

    #[async_trait]
    impl CascadeSourceStore for Flags {
        async fn mark_cascaded(&self, source_id: Uuid, target_id: Uuid) -> AppResult<bool> {
            if self.fail {
                return Err(AppError::internal("flag write failed"));
            }
            let mut marked = self.marked.lock().unwrap();
            if marked.contains_key(&source_id) {
                return Ok(false);
            }
            marked.insert(source_id, target_id);
            Ok(true)
        }
    }

    #[derive(Default)]
    struct Targets {
        rows: Mutex<HashMap<Uuid, Uuid>>,
        inserts: AtomicUsize,
        fail: bool,
        /// Pretend another worker inserted right after our reconciliation read.
        race: bool,
    }

    #[async_trait]
    impl CascadeTargetStore<Draft> for Targets {
        async fn find_by_source(&self, source_id: Uuid) -> AppResult<Option<Uuid>> {
            Ok(self.rows.lock().unwrap().get(&source_id).copied())
        }

        async fn insert(&self, draft: &Draft) -> AppResult<Uuid> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::internal("insert failed"));
            }
            let mut rows = self.rows.lock().unwrap();
            if self.race {
                rows.insert(draft.source_id, Uuid::new_v4());
            }
            if rows.contains_key(&draft.source_id) {
                return Err(AppError::conflict("duplicate source"));
            }
            let id = Uuid::new_v4();
            rows.insert(draft.source_id, id);
            Ok(id)
        }
    }

    #[tokio::test]
    async fn qualifying_transition_fires_once() {
        let (flags, targets) = (Flags::default(), Targets::default());
        let lead = Lead::new("qualified", Some(41));

        let outcome = maybe_cascade(None, &lead, &rule(), &flags, &targets).await.unwrap();
        let CascadeOutcome::Fired { target_id } = outcome else {
            panic!("expected fired, got {outcome:?}");
        };
        assert_eq!(flags.marked.lock().unwrap().get(&lead.id), Some(&target_id));

        let after = Lead { fired: true, ..lead.clone() };
        let again = maybe_cascade(Some(&lead), &after, &rule(), &flags, &targets).await.unwrap();
        assert_eq!(again, CascadeOutcome::AlreadyFired);
        assert_eq!(targets.inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fired_before_state_short_circuits() {
        let (flags, targets) = (Flags::default(), Targets::default());
        let before = Lead { fired: true, ..Lead::new("qualified", Some(50)) };
        let after = Lead { fired: false, ..before.clone() };

        let outcome = maybe_cascade(Some(&before), &after, &rule(), &flags, &targets).await.unwrap();
        assert_eq!(outcome, CascadeOutcome::AlreadyFired);
        assert_eq!(targets.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn score_threshold_is_inclusive() {
        let (flags, targets) = (Flags::default(), Targets::default());

        let at = Lead::new("qualified", Some(35));
        assert!(matches!(
            maybe_cascade(None, &at, &rule(), &flags, &targets).await.unwrap(),
            CascadeOutcome::Fired { .. }
        ));

        let below = Lead::new("qualified", Some(34));
        assert_eq!(
            maybe_cascade(None, &below, &rule(), &flags, &targets).await.unwrap(),
            CascadeOutcome::NotQualified
        );
    }

    #[tokio::test]
    async fn status_and_score_are_both_required() {
        let (flags, targets) = (Flags::default(), Targets::default());

        for lead in [
            Lead::new("unqualified", Some(50)),
            Lead::new("qualified", None),
            Lead::new("scheduled", Some(10)),
        ] {
            let outcome = maybe_cascade(None, &lead, &rule(), &flags, &targets).await.unwrap();
            assert_eq!(outcome, CascadeOutcome::NotQualified, "{lead:?}");
        }
        assert_eq!(targets.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn orphaned_target_is_reconciled_without_insert() {
        let (flags, targets) = (Flags::default(), Targets::default());
        let lead = Lead::new("qualified", Some(40));
        let orphan = Uuid::new_v4();
        targets.rows.lock().unwrap().insert(lead.id, orphan);

        let outcome = maybe_cascade(None, &lead, &rule(), &flags, &targets).await.unwrap();
        assert_eq!(outcome, CascadeOutcome::Reconciled { target_id: orphan });
        assert_eq!(targets.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(flags.marked.lock().unwrap().get(&lead.id), Some(&orphan));
    }

    #[tokio::test]
    async fn losing_a_concurrent_insert_reconciles_to_the_winner() {
        let flags = Flags::default();
        let targets = Targets { race: true, ..Targets::default() };
        let lead = Lead::new("qualified", Some(45));

        let outcome = maybe_cascade(None, &lead, &rule(), &flags, &targets).await.unwrap();
        let winner = *targets.rows.lock().unwrap().get(&lead.id).unwrap();
        assert_eq!(outcome, CascadeOutcome::Reconciled { target_id: winner });
        assert_eq!(targets.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_failure_leaves_flag_unset() {
        let flags = Flags::default();
        let targets = Targets { fail: true, ..Targets::default() };
        let lead = Lead::new("qualified", Some(45));

        let err = maybe_cascade(None, &lead, &rule(), &flags, &targets).await.unwrap_err();
        assert!(matches!(err, CascadeError::TargetCreate { source_id, .. } if source_id == lead.id));
        assert!(flags.marked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn flag_failure_after_insert_is_a_partial_failure() {
        let flags = Flags { fail: true, ..Flags::default() };
        let targets = Targets::default();
        let lead = Lead::new("qualified", Some(45));

        let err = maybe_cascade(None, &lead, &rule(), &flags, &targets).await.unwrap_err();
        let CascadeError::PartialFailure { source_id, target_id, .. } = err else {
            panic!("expected partial failure");
        };
        assert_eq!(source_id, lead.id);
        assert_eq!(targets.rows.lock().unwrap().get(&lead.id), Some(&target_id));

        // the next evaluation repairs the flag without a second insert
        let healthy = Flags::default();
        let outcome = maybe_cascade(None, &lead, &rule(), &healthy, &targets).await.unwrap();
        assert_eq!(outcome, CascadeOutcome::Reconciled { target_id });
        assert_eq!(targets.inserts.load(Ordering::SeqCst), 1);
    }
}
