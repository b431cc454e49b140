use serde::Serialize;

use super::domain::{
    Alert, AssessmentId, OverrideRequestId, OverrideStatus, RiskLevel, SubjectId, TierId,
};
use super::service::BookkeepingStep;

/// State changes other parts of the portal may react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AssessmentEvent {
    AssessmentRecorded {
        subject_id: SubjectId,
        assessment_id: AssessmentId,
        tier: TierId,
        classification: RiskLevel,
    },
    HighRiskAlertRaised {
        alert: Alert,
    },
    OverrideRequested {
        subject_id: SubjectId,
        request_id: OverrideRequestId,
    },
    OverrideDecided {
        subject_id: SubjectId,
        request_id: OverrideRequestId,
        status: OverrideStatus,
    },
    OverrideConsumed {
        subject_id: SubjectId,
        request_id: OverrideRequestId,
        assessment_id: AssessmentId,
    },
    BookkeepingDeferred {
        subject_id: SubjectId,
        assessment_id: AssessmentId,
        steps: Vec<BookkeepingStep>,
    },
}

/// Subscriber invoked synchronously after each state change. Must not block.
pub trait AssessmentEventHook: Send + Sync {
    fn on_event(&self, event: &AssessmentEvent);
}
