use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    Alert, AssessmentRecord, OverrideRequest, OverrideRequestId, OverrideStatus, RiskLevel,
    ScheduledFollowUp, Subject, SubjectId,
};
use chrono::{DateTime, Utc};

/// Everything that must land atomically when an assessment is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentCommit {
    pub record: AssessmentRecord,
    /// Compare-and-swap token: the history length the engine decided against.
    pub expected_prior_count: usize,
    /// Request already moved to `used`; the stored copy must still be `approved`.
    pub consumed_override: Option<OverrideRequest>,
}

/// Persistence abstraction over the portal's document store.
pub trait AssessmentStore: Send + Sync {
    /// Records for the subject ordered by sequence number.
    fn assessment_history(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError>;
    /// Fails with `Conflict` when the history length or override status moved.
    fn commit_assessment(
        &self,
        commit: AssessmentCommit,
    ) -> Result<AssessmentRecord, RepositoryError>;
    /// Requests for the subject ordered by creation time.
    fn override_requests(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<OverrideRequest>, RepositoryError>;
    fn fetch_override_request(
        &self,
        id: &OverrideRequestId,
    ) -> Result<Option<OverrideRequest>, RepositoryError>;
    fn insert_override_request(
        &self,
        request: OverrideRequest,
    ) -> Result<OverrideRequest, RepositoryError>;
    /// Fails with `Conflict` unless the stored status equals `expected`.
    fn update_override_request(
        &self,
        request: OverrideRequest,
        expected: OverrideStatus,
    ) -> Result<(), RepositoryError>;
    fn pending_override_requests(
        &self,
        limit: usize,
    ) -> Result<Vec<OverrideRequest>, RepositoryError>;
    fn subject(&self, subject_id: &SubjectId) -> Result<Option<Subject>, RepositoryError>;
    /// Ignored when `assessed_at` is older than the stored assessment time, so a
    /// late replay cannot roll the level back.
    fn update_subject_risk_level(
        &self,
        subject_id: &SubjectId,
        level: RiskLevel,
        assessed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    /// Idempotent on `follow_up.id`.
    fn upsert_follow_up(&self, follow_up: ScheduledFollowUp) -> Result<(), RepositoryError>;
    fn follow_ups(&self, subject_id: &SubjectId)
        -> Result<Vec<ScheduledFollowUp>, RepositoryError>;
    /// Idempotent on `alert.id`.
    fn upsert_alert(&self, alert: Alert) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("concurrent write rejected")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (messaging, e-mail, pager adapters).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: String,
    pub subject_id: SubjectId,
    pub payload: BTreeMap<String, String>,
}

impl Notification {
    pub fn high_risk(alert: &Alert) -> Self {
        Self {
            kind: "high_risk_assessment".to_string(),
            subject_id: alert.subject_id.clone(),
            payload: alert.details(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
