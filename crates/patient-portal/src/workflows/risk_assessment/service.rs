use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::answers::{validate, AnswerSheet, ValidationError};
use super::config::AssessmentPolicy;
use super::domain::{
    Alert, AssessmentId, AssessmentRecord, FollowUpKind, OverrideRequest, OverrideRequestId,
    OverrideStatus, RiskLevel, ScheduledFollowUp, SubjectId, TierId,
};
use super::eligibility::{most_recent, EligibilityDecision, EligibilityError, EligibilityGuard};
use super::events::{AssessmentEvent, AssessmentEventHook};
use super::flow::{AssessmentFlow, FlowError, FlowEvent};
use super::outbox::NotificationOutbox;
use super::overrides::{normalize_reason, OverrideError, OverrideOutcome};
use super::question_bank::{catalog, QuestionTier};
use super::repository::{
    AssessmentCommit, AssessmentStore, Notification, Notifier, RepositoryError,
};
use super::scoring::{ScoreComponent, ScoringEngine};
use super::tier::select_tier;

/// Number of mutexes subjects are hashed onto for in-process serialization.
pub const SUBJECT_LOCK_STRIPES: usize = 64;

/// Service composing the eligibility guard, scoring engine, store and notifier.
pub struct RiskAssessmentService<S, N> {
    store: Arc<S>,
    outbox: NotificationOutbox,
    guard: EligibilityGuard,
    engine: ScoringEngine,
    policy: AssessmentPolicy,
    subject_locks: [Mutex<()>; SUBJECT_LOCK_STRIPES],
    hooks: Vec<Arc<dyn AssessmentEventHook>>,
    notifier: PhantomData<fn() -> N>,
}

/// Random ids stay unique across restarts and replicas sharing one store.
pub(crate) fn next_assessment_id() -> AssessmentId {
    AssessmentId(format!("asm-{}", Uuid::new_v4().simple()))
}

/// Derived write performed after the record is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookkeepingStep {
    RiskLevel,
    FollowUp,
    Alert,
}

impl BookkeepingStep {
    pub const fn label(self) -> &'static str {
        match self {
            BookkeepingStep::RiskLevel => "risk_level",
            BookkeepingStep::FollowUp => "follow_up",
            BookkeepingStep::Alert => "alert",
        }
    }
}

/// Result of replaying the derived writes for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookkeepingReport {
    pub assessment_id: AssessmentId,
    pub follow_up: ScheduledFollowUp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    /// Steps still failing after every retry; safe to replay.
    pub pending: Vec<BookkeepingStep>,
}

/// A committed record before its derived writes have run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAssessment {
    pub record: AssessmentRecord,
    pub max_score: u16,
    pub components: Vec<ScoreComponent>,
}

impl RecordedAssessment {
    pub fn into_receipt(self, report: BookkeepingReport) -> AssessmentReceipt {
        AssessmentReceipt {
            record: self.record,
            max_score: self.max_score,
            components: self.components,
            follow_up: report.follow_up,
            alert: report.alert,
            pending_bookkeeping: report.pending,
        }
    }
}

/// What the subject sees once a submission is accepted. Final even when
/// `pending_bookkeeping` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentReceipt {
    pub record: AssessmentRecord,
    pub max_score: u16,
    pub components: Vec<ScoreComponent>,
    pub follow_up: ScheduledFollowUp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    pub pending_bookkeeping: Vec<BookkeepingStep>,
}

impl<S, N> RiskAssessmentService<S, N>
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: AssessmentPolicy) -> Self {
        let outbox = NotificationOutbox::start(notifier, policy.notification_timeout());
        Self {
            store,
            outbox,
            guard: EligibilityGuard::from_policy(&policy),
            engine: ScoringEngine::new(),
            policy,
            subject_locks: std::array::from_fn(|_| Mutex::new(())),
            hooks: Vec::new(),
            notifier: PhantomData,
        }
    }

    /// Register a subscriber for engine events.
    pub fn with_hook(mut self, hook: Arc<dyn AssessmentEventHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn policy(&self) -> &AssessmentPolicy {
        &self.policy
    }

    pub fn active_tier(&self, subject_id: &SubjectId) -> Result<TierId, AssessmentServiceError> {
        let history = self.store.assessment_history(subject_id)?;
        Ok(select_tier(history.len()))
    }

    /// Active tier together with the catalog the subject should be shown.
    pub fn active_catalog(
        &self,
        subject_id: &SubjectId,
    ) -> Result<&'static QuestionTier, AssessmentServiceError> {
        Ok(catalog(self.active_tier(subject_id)?))
    }

    /// Recomputed from stored state on every call.
    pub fn check_eligibility(
        &self,
        subject_id: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<EligibilityDecision, AssessmentServiceError> {
        let history = self.store.assessment_history(subject_id)?;
        let overrides = self.store.override_requests(subject_id)?;
        Ok(self.evaluate(&history, &overrides, now))
    }

    /// Initial screen state for a new session.
    pub fn begin_flow(
        &self,
        subject_id: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<AssessmentFlow, AssessmentServiceError> {
        let history = self.store.assessment_history(subject_id)?;
        let overrides = self.store.override_requests(subject_id)?;
        let eligibility = self.evaluate(&history, &overrides, now);
        let flow = AssessmentFlow::NotStarted.apply(FlowEvent::Enter {
            eligibility,
            tier: select_tier(history.len()),
        })?;
        Ok(flow)
    }

    pub fn assessment_history(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<AssessmentRecord>, AssessmentServiceError> {
        Ok(self.store.assessment_history(subject_id)?)
    }

    /// Score, record, and run the derived writes for an attempt.
    pub fn submit_assessment(
        &self,
        subject_id: &SubjectId,
        sheet: &AnswerSheet,
        now: DateTime<Utc>,
    ) -> Result<AssessmentReceipt, AssessmentServiceError> {
        let recorded = self.record_assessment(subject_id, sheet, now)?;
        let report = self.complete_bookkeeping(&recorded.record);
        Ok(recorded.into_receipt(report))
    }

    /// Score and commit an attempt without touching derived state. Eligibility is
    /// re-checked under the subject lock and the commit is a compare-and-swap, so
    /// only one of two racing submissions lands.
    pub fn record_assessment(
        &self,
        subject_id: &SubjectId,
        sheet: &AnswerSheet,
        now: DateTime<Utc>,
    ) -> Result<RecordedAssessment, AssessmentServiceError> {
        let _serialized = self.subject_lock(subject_id);

        let history = self.store.assessment_history(subject_id)?;
        let overrides = self.store.override_requests(subject_id)?;
        let eligibility = self.evaluate(&history, &overrides, now);

        if let EligibilityDecision::Locked {
            remaining_days,
            unlocks_at,
        } = eligibility
        {
            info!(subject = %subject_id, remaining_days, "assessment submission rejected while locked");
            return Err(EligibilityError::Locked {
                remaining_days,
                unlocks_at,
            }
            .into());
        }

        let tier = select_tier(history.len());
        let answers = validate(sheet, tier)?;
        let outcome = self.engine.score(&answers);

        let consumed_override = match eligibility.override_to_consume() {
            Some(request_id) => {
                let mut request = overrides
                    .iter()
                    .find(|request| &request.id == request_id)
                    .cloned()
                    .ok_or_else(|| OverrideError::NotFound(request_id.clone()))?;
                request.consume(now)?;
                Some(request)
            }
            None => None,
        };

        let prior_count = history.len();
        let record = AssessmentRecord {
            id: next_assessment_id(),
            subject_id: subject_id.clone(),
            tier,
            answers: answers.to_map(),
            raw_score: outcome.raw_score,
            score: outcome.score,
            classification: outcome.classification,
            sequence_number: u32::try_from(prior_count + 1).unwrap_or(u32::MAX),
            created_at: now,
            unlocked_by: consumed_override.as_ref().map(|request| request.id.clone()),
        };

        let commit = AssessmentCommit {
            record,
            expected_prior_count: prior_count,
            consumed_override,
        };
        let record = match self.store.commit_assessment(commit) {
            Ok(record) => record,
            Err(RepositoryError::Conflict) => {
                warn!(subject = %subject_id, prior_count, "assessment commit lost a concurrent race");
                return Err(EligibilityError::Superseded.into());
            }
            Err(err) => {
                error!(subject = %subject_id, error = %err, "failed to persist assessment record");
                return Err(err.into());
            }
        };

        info!(
            subject = %subject_id,
            assessment = %record.id,
            tier = record.tier.label(),
            score = record.score,
            classification = record.classification.label(),
            "assessment recorded"
        );
        self.emit(AssessmentEvent::AssessmentRecorded {
            subject_id: subject_id.clone(),
            assessment_id: record.id.clone(),
            tier: record.tier,
            classification: record.classification,
        });
        if let Some(request_id) = &record.unlocked_by {
            self.emit(AssessmentEvent::OverrideConsumed {
                subject_id: subject_id.clone(),
                request_id: request_id.clone(),
                assessment_id: record.id.clone(),
            });
        }

        Ok(RecordedAssessment {
            record,
            max_score: outcome.max_score,
            components: outcome.components,
        })
    }

    /// Derived writes for a freshly committed record; queues the high-risk
    /// notification without waiting on the transport.
    pub fn complete_bookkeeping(&self, record: &AssessmentRecord) -> BookkeepingReport {
        self.apply_bookkeeping(record, true)
    }

    /// Report with every derived write marked pending, for a caller that stopped
    /// waiting on `complete_bookkeeping`.
    pub fn planned_bookkeeping(&self, record: &AssessmentRecord) -> BookkeepingReport {
        let alert = (record.classification == RiskLevel::High).then(|| alert_for(record));
        let mut pending = vec![BookkeepingStep::RiskLevel, BookkeepingStep::FollowUp];
        if alert.is_some() {
            pending.push(BookkeepingStep::Alert);
        }
        BookkeepingReport {
            assessment_id: record.id.clone(),
            follow_up: self.follow_up_for(record),
            alert,
            pending,
        }
    }

    /// Block until queued notifications are delivered or abandoned.
    pub fn flush_notifications(&self, wait: StdDuration) -> bool {
        self.outbox.flush(wait)
    }

    /// Replay the derived writes for the subject's latest record. Every step is
    /// idempotent, so this is safe to call after a partially applied submission.
    pub fn reconcile_subject(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Option<BookkeepingReport>, AssessmentServiceError> {
        let _serialized = self.subject_lock(subject_id);

        let history = self.store.assessment_history(subject_id)?;
        let Some(latest) = history.iter().max_by_key(|record| record.sequence_number) else {
            debug!(subject = %subject_id, "nothing to reconcile");
            return Ok(None);
        };

        Ok(Some(self.apply_bookkeeping(latest, false)))
    }

    pub fn submit_override_request(
        &self,
        subject_id: &SubjectId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<OverrideRequest, AssessmentServiceError> {
        let reason = normalize_reason(reason)?;

        let _serialized = self.subject_lock(subject_id);

        let existing = self.store.override_requests(subject_id)?;
        let request = OverrideRequest::open(subject_id.clone(), reason, &existing, now)?;
        let stored = self.store.insert_override_request(request)?;

        info!(subject = %subject_id, request = %stored.id, "override request submitted");
        self.emit(AssessmentEvent::OverrideRequested {
            subject_id: subject_id.clone(),
            request_id: stored.id.clone(),
        });
        Ok(stored)
    }

    /// Reviewer decision on a pending request.
    pub fn decide_override_request(
        &self,
        request_id: &OverrideRequestId,
        outcome: OverrideOutcome,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<OverrideRequest, AssessmentServiceError> {
        let reviewer = reviewer.trim();
        if reviewer.is_empty() {
            return Err(ValidationError::EmptyReviewer.into());
        }

        let mut request = self
            .store
            .fetch_override_request(request_id)?
            .ok_or_else(|| OverrideError::NotFound(request_id.clone()))?;
        request.decide(outcome, reviewer, now)?;

        match self
            .store
            .update_override_request(request.clone(), OverrideStatus::Pending)
        {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => {
                let current = self
                    .store
                    .fetch_override_request(request_id)?
                    .map_or(OverrideStatus::Pending, |stored| stored.status);
                return Err(OverrideError::InvalidState {
                    id: request_id.clone(),
                    from: current,
                    to: request.status,
                }
                .into());
            }
            Err(RepositoryError::NotFound) => {
                return Err(OverrideError::NotFound(request_id.clone()).into())
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            subject = %request.subject_id,
            request = %request.id,
            status = request.status.label(),
            reviewer,
            "override request decided"
        );
        self.emit(AssessmentEvent::OverrideDecided {
            subject_id: request.subject_id.clone(),
            request_id: request.id.clone(),
            status: request.status,
        });
        Ok(request)
    }

    /// Reviewer queue, oldest first.
    pub fn pending_reviews(
        &self,
        limit: usize,
    ) -> Result<Vec<OverrideRequest>, AssessmentServiceError> {
        Ok(self.store.pending_override_requests(limit)?)
    }

    fn evaluate(
        &self,
        history: &[AssessmentRecord],
        overrides: &[OverrideRequest],
        now: DateTime<Utc>,
    ) -> EligibilityDecision {
        let latest_record = history.iter().max_by_key(|record| record.sequence_number);
        let latest_override = most_recent(overrides, |request| request.created_at);
        self.guard.evaluate(latest_record, latest_override, now)
    }

    fn subject_lock(&self, subject_id: &SubjectId) -> MutexGuard<'_, ()> {
        self.subject_locks[lock_stripe(subject_id)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_bookkeeping(&self, record: &AssessmentRecord, notify: bool) -> BookkeepingReport {
        let mut pending = Vec::new();

        let risk_level_applied = self.with_retries(BookkeepingStep::RiskLevel, record, || {
            self.store.update_subject_risk_level(
                &record.subject_id,
                record.classification,
                record.created_at,
            )
        });
        if !risk_level_applied {
            pending.push(BookkeepingStep::RiskLevel);
        }

        let follow_up = self.follow_up_for(record);
        if !self.with_retries(BookkeepingStep::FollowUp, record, || {
            self.store.upsert_follow_up(follow_up.clone())
        }) {
            pending.push(BookkeepingStep::FollowUp);
        }

        let alert = (record.classification == RiskLevel::High).then(|| alert_for(record));
        if let Some(alert) = &alert {
            if !self.with_retries(BookkeepingStep::Alert, record, || {
                self.store.upsert_alert(alert.clone())
            }) {
                pending.push(BookkeepingStep::Alert);
            }

            if notify {
                self.outbox.enqueue(Notification::high_risk(alert));
                self.emit(AssessmentEvent::HighRiskAlertRaised {
                    alert: alert.clone(),
                });
            }
        }

        if !pending.is_empty() {
            self.emit(AssessmentEvent::BookkeepingDeferred {
                subject_id: record.subject_id.clone(),
                assessment_id: record.id.clone(),
                steps: pending.clone(),
            });
        }

        BookkeepingReport {
            assessment_id: record.id.clone(),
            follow_up,
            alert,
            pending,
        }
    }

    fn with_retries<F>(&self, step: BookkeepingStep, record: &AssessmentRecord, mut op: F) -> bool
    where
        F: FnMut() -> Result<(), RepositoryError>,
    {
        let attempts = self.policy.derived_write_attempts.max(1);
        for attempt in 1..=attempts {
            match op() {
                Ok(()) => return true,
                Err(err) => warn!(
                    subject = %record.subject_id,
                    assessment = %record.id,
                    step = step.label(),
                    attempt,
                    attempts,
                    error = %err,
                    "derived write failed"
                ),
            }
        }
        false
    }

    fn follow_up_for(&self, record: &AssessmentRecord) -> ScheduledFollowUp {
        ScheduledFollowUp {
            id: format!("{}-follow-up", record.id),
            subject_id: record.subject_id.clone(),
            assessment_id: record.id.clone(),
            due_at: record.created_at + self.policy.follow_up_offset(),
            kind: FollowUpKind::RiskAssessment,
            auto_created: true,
        }
    }

    fn emit(&self, event: AssessmentEvent) {
        for hook in &self.hooks {
            hook.on_event(&event);
        }
    }
}

/// Subjects share a stripe by hash, so the lock table never grows.
pub(crate) fn lock_stripe(subject_id: &SubjectId) -> usize {
    let mut hasher = DefaultHasher::new();
    subject_id.hash(&mut hasher);
    (hasher.finish() % SUBJECT_LOCK_STRIPES as u64) as usize
}

fn alert_for(record: &AssessmentRecord) -> Alert {
    Alert {
        id: format!("{}-alert", record.id),
        subject_id: record.subject_id.clone(),
        assessment_id: record.id.clone(),
        tier: record.tier,
        score: record.score,
        classification: record.classification,
        raised_at: record.created_at,
    }
}

/// Error raised by the risk assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    #[error(transparent)]
    Override(#[from] OverrideError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
