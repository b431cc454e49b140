//! Process-local collaborators for demos, the reference HTTP service and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    Alert, AssessmentRecord, OverrideRequest, OverrideRequestId, OverrideStatus, RiskLevel,
    ScheduledFollowUp, Subject, SubjectId,
};
use super::events::{AssessmentEvent, AssessmentEventHook};
use super::repository::{
    AssessmentCommit, AssessmentStore, Notification, NotificationError, Notifier,
    RepositoryError,
};

#[derive(Debug, Default)]
struct StoreState {
    assessments: HashMap<SubjectId, Vec<AssessmentRecord>>,
    overrides: BTreeMap<OverrideRequestId, OverrideRequest>,
    subjects: HashMap<SubjectId, Subject>,
    follow_ups: BTreeMap<String, ScheduledFollowUp>,
    alerts: BTreeMap<String, Alert>,
}

/// Mutex-guarded store honoring the commit and status compare-and-swap contracts.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAssessmentStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryAssessmentStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn alerts(&self) -> Result<Vec<Alert>, RepositoryError> {
        Ok(self.lock()?.alerts.values().cloned().collect())
    }
}

impl AssessmentStore for InMemoryAssessmentStore {
    fn assessment_history(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .assessments
            .get(subject_id)
            .cloned()
            .unwrap_or_default())
    }

    fn commit_assessment(
        &self,
        commit: AssessmentCommit,
    ) -> Result<AssessmentRecord, RepositoryError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let stored_count = state
            .assessments
            .get(&commit.record.subject_id)
            .map_or(0, Vec::len);
        if stored_count != commit.expected_prior_count {
            return Err(RepositoryError::Conflict);
        }

        if let Some(consumed) = &commit.consumed_override {
            match state.overrides.get(&consumed.id) {
                Some(stored) if stored.status == OverrideStatus::Approved => {}
                _ => return Err(RepositoryError::Conflict),
            }
        }

        if let Some(consumed) = commit.consumed_override {
            state.overrides.insert(consumed.id.clone(), consumed);
        }
        state
            .assessments
            .entry(commit.record.subject_id.clone())
            .or_default()
            .push(commit.record.clone());

        Ok(commit.record)
    }

    fn override_requests(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        let guard = self.lock()?;
        let mut requests: Vec<_> = guard
            .overrides
            .values()
            .filter(|request| &request.subject_id == subject_id)
            .cloned()
            .collect();
        requests.sort_by_key(|request| request.created_at);
        Ok(requests)
    }

    fn fetch_override_request(
        &self,
        id: &OverrideRequestId,
    ) -> Result<Option<OverrideRequest>, RepositoryError> {
        Ok(self.lock()?.overrides.get(id).cloned())
    }

    fn insert_override_request(
        &self,
        request: OverrideRequest,
    ) -> Result<OverrideRequest, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.overrides.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.overrides.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update_override_request(
        &self,
        request: OverrideRequest,
        expected: OverrideStatus,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.overrides.get(&request.id) {
            None => Err(RepositoryError::NotFound),
            Some(stored) if stored.status != expected => Err(RepositoryError::Conflict),
            Some(_) => {
                guard.overrides.insert(request.id.clone(), request);
                Ok(())
            }
        }
    }

    fn pending_override_requests(
        &self,
        limit: usize,
    ) -> Result<Vec<OverrideRequest>, RepositoryError> {
        let guard = self.lock()?;
        let mut pending: Vec<_> = guard
            .overrides
            .values()
            .filter(|request| request.status == OverrideStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|request| request.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    fn subject(&self, subject_id: &SubjectId) -> Result<Option<Subject>, RepositoryError> {
        Ok(self.lock()?.subjects.get(subject_id).cloned())
    }

    fn update_subject_risk_level(
        &self,
        subject_id: &SubjectId,
        level: RiskLevel,
        assessed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let subject = guard
            .subjects
            .entry(subject_id.clone())
            .or_insert_with(|| Subject::new(subject_id.clone()));
        if subject
            .last_assessed_at
            .is_some_and(|latest| latest > assessed_at)
        {
            return Ok(());
        }
        subject.risk_level = Some(level);
        subject.last_assessed_at = Some(assessed_at);
        Ok(())
    }

    fn upsert_follow_up(&self, follow_up: ScheduledFollowUp) -> Result<(), RepositoryError> {
        self.lock()?
            .follow_ups
            .insert(follow_up.id.clone(), follow_up);
        Ok(())
    }

    fn follow_ups(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<ScheduledFollowUp>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .follow_ups
            .values()
            .filter(|follow_up| &follow_up.subject_id == subject_id)
            .cloned()
            .collect())
    }

    fn upsert_alert(&self, alert: Alert) -> Result<(), RepositoryError> {
        self.lock()?.alerts.insert(alert.id.clone(), alert);
        Ok(())
    }
}

/// Notifier that keeps every delivered notification.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("notifier mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

/// Hook that keeps every emitted event.
#[derive(Debug, Default, Clone)]
pub struct RecordingHook {
    events: Arc<Mutex<Vec<AssessmentEvent>>>,
}

impl RecordingHook {
    pub fn events(&self) -> Vec<AssessmentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AssessmentEventHook for RecordingHook {
    fn on_event(&self, event: &AssessmentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
