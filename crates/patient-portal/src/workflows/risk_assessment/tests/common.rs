use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::risk_assessment::domain::{
    Alert, AssessmentRecord, OverrideRequest, OverrideRequestId, OverrideStatus, RiskLevel,
    ScheduledFollowUp, Subject, SubjectId, TierId,
};
use crate::workflows::risk_assessment::repository::{
    AssessmentCommit, AssessmentStore, Notification, NotificationError, Notifier,
    RepositoryError,
};
use crate::workflows::risk_assessment::{
    catalog, risk_assessment_router, AnswerSheet, AssessmentPolicy, InMemoryAssessmentStore,
    InMemoryNotifier, RiskAssessmentService,
};

/// Upper bound tests wait for the notification outbox to drain.
pub(super) const FLUSH_WAIT: StdDuration = StdDuration::from_secs(2);

pub(super) fn subject() -> SubjectId {
    SubjectId("subj-0042".to_string())
}

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn day(offset: i64) -> DateTime<Utc> {
    start() + Duration::days(offset)
}

/// Sheet answering every question of `tier` with its zero-weight option, then applying `picks`.
pub(super) fn sheet(tier: TierId, picks: &[(&str, &str)]) -> AnswerSheet {
    let mut answers: BTreeMap<String, String> = catalog(tier)
        .questions
        .iter()
        .map(|question| (question.id.to_string(), question.options[0].id.to_string()))
        .collect();
    for (question_id, option_id) in picks {
        answers.insert((*question_id).to_string(), (*option_id).to_string());
    }
    AnswerSheet::new(tier, answers)
}

/// Sheet picking the heaviest option for every question.
pub(super) fn worst_case_sheet(tier: TierId) -> AnswerSheet {
    let answers = catalog(tier)
        .questions
        .iter()
        .map(|question| {
            let heaviest = question
                .options
                .iter()
                .max_by_key(|option| option.weight)
                .expect("questions carry options");
            (question.id.to_string(), heaviest.id.to_string())
        })
        .collect();
    AnswerSheet::new(tier, answers)
}

/// Basic sheet scoring 3: low.
pub(super) fn low_basic_sheet() -> AnswerSheet {
    sheet(TierId::Basic, &[("general_health", "poor")])
}

/// Basic sheet scoring 10: high.
pub(super) fn high_basic_sheet() -> AnswerSheet {
    sheet(
        TierId::Basic,
        &[
            ("general_health", "poor"),
            ("sleep_quality", "nearly_every_day"),
            ("low_mood", "nearly_every_day"),
            ("physical_activity", "somewhat_active"),
        ],
    )
}

pub(super) fn build_service() -> (
    RiskAssessmentService<InMemoryAssessmentStore, InMemoryNotifier>,
    Arc<InMemoryAssessmentStore>,
    Arc<InMemoryNotifier>,
) {
    let store = Arc::new(InMemoryAssessmentStore::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = RiskAssessmentService::new(
        store.clone(),
        notifier.clone(),
        AssessmentPolicy::default(),
    );
    (service, store, notifier)
}

pub(super) fn router_with_service<S, N>(
    service: RiskAssessmentService<S, N>,
    timeout: StdDuration,
) -> axum::Router
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    risk_assessment_router(Arc::new(service), timeout)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

/// Delivers to an in-memory notifier after sleeping for `delay`.
pub(super) struct SlowNotifier {
    pub(super) delay: StdDuration,
    pub(super) delivered: InMemoryNotifier,
}

impl SlowNotifier {
    pub(super) fn new(delay: StdDuration) -> Self {
        Self {
            delay,
            delivered: InMemoryNotifier::default(),
        }
    }
}

impl Notifier for SlowNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        std::thread::sleep(self.delay);
        self.delivered.notify(notification)
    }
}

/// Wraps the in-memory store and fails every derived write while `failing` is set.
/// Derived writes sleep for `stall` first when it is set.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub(super) inner: InMemoryAssessmentStore,
    pub(super) failing: AtomicBool,
    pub(super) stall: Option<StdDuration>,
}

impl FlakyStore {
    pub(super) fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub(super) fn stalling(stall: StdDuration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::default()
        }
    }

    pub(super) fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    fn derived_write(&self) -> Result<(), RepositoryError> {
        if let Some(stall) = self.stall {
            std::thread::sleep(stall);
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("write timeout".to_string()))
        } else {
            Ok(())
        }
    }
}

impl AssessmentStore for FlakyStore {
    fn assessment_history(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        self.inner.assessment_history(subject_id)
    }

    fn commit_assessment(
        &self,
        commit: AssessmentCommit,
    ) -> Result<AssessmentRecord, RepositoryError> {
        self.inner.commit_assessment(commit)
    }

    fn override_requests(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        self.inner.override_requests(subject_id)
    }

    fn fetch_override_request(
        &self,
        id: &OverrideRequestId,
    ) -> Result<Option<OverrideRequest>, RepositoryError> {
        self.inner.fetch_override_request(id)
    }

    fn insert_override_request(
        &self,
        request: OverrideRequest,
    ) -> Result<OverrideRequest, RepositoryError> {
        self.inner.insert_override_request(request)
    }

    fn update_override_request(
        &self,
        request: OverrideRequest,
        expected: OverrideStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.update_override_request(request, expected)
    }

    fn pending_override_requests(
        &self,
        limit: usize,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        self.inner.pending_override_requests(limit)
    }

    fn subject(&self, subject_id: &SubjectId) -> Result<Option<Subject>, RepositoryError> {
        self.inner.subject(subject_id)
    }

    fn update_subject_risk_level(
        &self,
        subject_id: &SubjectId,
        level: RiskLevel,
        assessed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.derived_write()?;
        self.inner
            .update_subject_risk_level(subject_id, level, assessed_at)
    }

    fn upsert_follow_up(&self, follow_up: ScheduledFollowUp) -> Result<(), RepositoryError> {
        self.derived_write()?;
        self.inner.upsert_follow_up(follow_up)
    }

    fn follow_ups(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<ScheduledFollowUp>, RepositoryError> {
        self.inner.follow_ups(subject_id)
    }

    fn upsert_alert(&self, alert: Alert) -> Result<(), RepositoryError> {
        self.derived_write()?;
        self.inner.upsert_alert(alert)
    }
}

/// Replica that never sees committed records, so every submission decides against
/// an empty history.
#[derive(Default)]
pub(super) struct StaleReadStore {
    pub(super) inner: InMemoryAssessmentStore,
}

impl AssessmentStore for StaleReadStore {
    fn assessment_history(
        &self,
        _subject_id: &SubjectId,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        Ok(Vec::new())
    }

    fn commit_assessment(
        &self,
        commit: AssessmentCommit,
    ) -> Result<AssessmentRecord, RepositoryError> {
        self.inner.commit_assessment(commit)
    }

    fn override_requests(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        self.inner.override_requests(subject_id)
    }

    fn fetch_override_request(
        &self,
        id: &OverrideRequestId,
    ) -> Result<Option<OverrideRequest>, RepositoryError> {
        self.inner.fetch_override_request(id)
    }

    fn insert_override_request(
        &self,
        request: OverrideRequest,
    ) -> Result<OverrideRequest, RepositoryError> {
        self.inner.insert_override_request(request)
    }

    fn update_override_request(
        &self,
        request: OverrideRequest,
        expected: OverrideStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.update_override_request(request, expected)
    }

    fn pending_override_requests(
        &self,
        limit: usize,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        self.inner.pending_override_requests(limit)
    }

    fn subject(&self, subject_id: &SubjectId) -> Result<Option<Subject>, RepositoryError> {
        self.inner.subject(subject_id)
    }

    fn update_subject_risk_level(
        &self,
        subject_id: &SubjectId,
        level: RiskLevel,
        assessed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner
            .update_subject_risk_level(subject_id, level, assessed_at)
    }

    fn upsert_follow_up(&self, follow_up: ScheduledFollowUp) -> Result<(), RepositoryError> {
        self.inner.upsert_follow_up(follow_up)
    }

    fn follow_ups(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<ScheduledFollowUp>, RepositoryError> {
        self.inner.follow_ups(subject_id)
    }

    fn upsert_alert(&self, alert: Alert) -> Result<(), RepositoryError> {
        self.inner.upsert_alert(alert)
    }
}

/// Every call fails as if the document store were offline; reads optionally stall first.
#[derive(Default)]
pub(super) struct UnavailableStore {
    pub(super) stall: Option<StdDuration>,
}

impl UnavailableStore {
    fn offline<T>(&self) -> Result<T, RepositoryError> {
        if let Some(stall) = self.stall {
            std::thread::sleep(stall);
        }
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl AssessmentStore for UnavailableStore {
    fn assessment_history(
        &self,
        _subject_id: &SubjectId,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        self.offline()
    }

    fn commit_assessment(
        &self,
        _commit: AssessmentCommit,
    ) -> Result<AssessmentRecord, RepositoryError> {
        self.offline()
    }

    fn override_requests(
        &self,
        _subject_id: &SubjectId,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        self.offline()
    }

    fn fetch_override_request(
        &self,
        _id: &OverrideRequestId,
    ) -> Result<Option<OverrideRequest>, RepositoryError> {
        self.offline()
    }

    fn insert_override_request(
        &self,
        _request: OverrideRequest,
    ) -> Result<OverrideRequest, RepositoryError> {
        self.offline()
    }

    fn update_override_request(
        &self,
        _request: OverrideRequest,
        _expected: OverrideStatus,
    ) -> Result<(), RepositoryError> {
        self.offline()
    }

    fn pending_override_requests(
        &self,
        _limit: usize,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        self.offline()
    }

    fn subject(&self, _subject_id: &SubjectId) -> Result<Option<Subject>, RepositoryError> {
        self.offline()
    }

    fn update_subject_risk_level(
        &self,
        _subject_id: &SubjectId,
        _level: RiskLevel,
        _assessed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.offline()
    }

    fn upsert_follow_up(&self, _follow_up: ScheduledFollowUp) -> Result<(), RepositoryError> {
        self.offline()
    }

    fn follow_ups(
        &self,
        _subject_id: &SubjectId,
    ) -> Result<Vec<ScheduledFollowUp>, RepositoryError> {
        self.offline()
    }

    fn upsert_alert(&self, _alert: Alert) -> Result<(), RepositoryError> {
        self.offline()
    }
}
