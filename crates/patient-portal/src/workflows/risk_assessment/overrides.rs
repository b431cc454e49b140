use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::answers::ValidationError;
use super::domain::{
    OverrideAuditEntry, OverrideRequest, OverrideRequestId, OverrideStatus, SubjectId,
};

/// Actor recorded on transitions performed by the engine itself.
pub const ENGINE_ACTOR: &str = "risk-engine";

/// Random ids stay unique across restarts and replicas sharing one store.
pub(crate) fn next_override_id() -> OverrideRequestId {
    OverrideRequestId(format!("ovr-{}", Uuid::new_v4().simple()))
}

/// Reviewer verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideOutcome {
    Approved,
    Rejected,
}

impl From<OverrideOutcome> for OverrideStatus {
    fn from(outcome: OverrideOutcome) -> Self {
        match outcome {
            OverrideOutcome::Approved => OverrideStatus::Approved,
            OverrideOutcome::Rejected => OverrideStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    #[error("subject {subject_id} already has a {status} override request ({existing})")]
    DuplicateRequest {
        subject_id: SubjectId,
        existing: OverrideRequestId,
        status: OverrideStatus,
    },
    #[error("override request {id} cannot move from {from} to {to}")]
    InvalidState {
        id: OverrideRequestId,
        from: OverrideStatus,
        to: OverrideStatus,
    },
    #[error("override request {0} not found")]
    NotFound(OverrideRequestId),
}

/// Trim the reason and reject blank submissions.
pub fn normalize_reason(reason: &str) -> Result<String, ValidationError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyReason);
    }
    Ok(trimmed.to_string())
}

impl OverrideRequest {
    /// Open a pending request unless `existing` already holds an outstanding one.
    pub fn open(
        subject_id: SubjectId,
        reason: String,
        existing: &[OverrideRequest],
        now: DateTime<Utc>,
    ) -> Result<Self, OverrideError> {
        if let Some(outstanding) = existing
            .iter()
            .find(|request| request.subject_id == subject_id && request.status.is_outstanding())
        {
            return Err(OverrideError::DuplicateRequest {
                subject_id,
                existing: outstanding.id.clone(),
                status: outstanding.status,
            });
        }

        let actor = subject_id.0.clone();
        Ok(Self {
            id: next_override_id(),
            subject_id,
            reason,
            status: OverrideStatus::Pending,
            created_at: now,
            decided_at: None,
            decided_by: None,
            used_at: None,
            audit: vec![OverrideAuditEntry {
                from: None,
                to: OverrideStatus::Pending,
                at: now,
                actor,
            }],
        })
    }

    /// Reviewer transition out of `pending`.
    pub fn decide(
        &mut self,
        outcome: OverrideOutcome,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OverrideError> {
        let to = OverrideStatus::from(outcome);
        self.transition(OverrideStatus::Pending, to, reviewer, now)?;
        self.decided_at = Some(now);
        self.decided_by = Some(reviewer.to_string());
        Ok(())
    }

    /// Engine transition `approved -> used`.
    pub fn consume(&mut self, now: DateTime<Utc>) -> Result<(), OverrideError> {
        self.transition(OverrideStatus::Approved, OverrideStatus::Used, ENGINE_ACTOR, now)?;
        self.used_at = Some(now);
        Ok(())
    }

    fn transition(
        &mut self,
        required: OverrideStatus,
        to: OverrideStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OverrideError> {
        if self.status != required {
            return Err(OverrideError::InvalidState {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }

        self.audit.push(OverrideAuditEntry {
            from: Some(self.status),
            to,
            at: now,
            actor: actor.to_string(),
        });
        self.status = to;
        Ok(())
    }
}
