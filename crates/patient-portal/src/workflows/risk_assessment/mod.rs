//! Progressive risk assessment and eligibility engine.
//!
//! A subject answers the tier selected from their history (basic, then intermediate,
//! then advanced). Each attempt is validated against its tier's catalog, scored, and
//! recorded exactly once. Mandatory-tier records lock further attempts for the
//! configured window unless a reviewer approves a single-use override. Derived writes
//! (risk level, follow-up, high-risk alert) run after the record is committed and can
//! be replayed with [`RiskAssessmentService::reconcile_subject`]. High-risk notifications
//! leave through a background outbox and never hold up a submission.

pub mod answers;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod events;
pub mod flow;
pub mod memory;
pub mod outbox;
pub mod overrides;
pub mod question_bank;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod tier;

#[cfg(test)]
mod tests;

pub use answers::{validate, AnswerSheet, ValidatedAnswers, ValidationError};
pub use config::{AssessmentPolicy, MAX_SCHEDULE_DAYS};
pub use domain::{
    Alert, AssessmentId, AssessmentRecord, FollowUpKind, OverrideAuditEntry, OverrideRequest,
    OverrideRequestId, OverrideStatus, RiskLevel, ScheduledFollowUp, Subject, SubjectId, TierId,
};
pub use eligibility::{
    EligibilityBasis, EligibilityDecision, EligibilityError, EligibilityGuard, EligibilityView,
};
pub use events::{AssessmentEvent, AssessmentEventHook};
pub use flow::{AssessmentFlow, FlowError, FlowEvent};
pub use memory::{InMemoryAssessmentStore, InMemoryNotifier, RecordingHook};
pub use overrides::{OverrideError, OverrideOutcome};
pub use question_bank::{catalog, AnswerOption, Question, QuestionTier};
pub use repository::{
    AssessmentCommit, AssessmentStore, Notification, NotificationError, Notifier,
    RepositoryError,
};
pub use router::{risk_assessment_router, status_for};
pub use scoring::{ClassificationBands, ScoreComponent, ScoreOutcome, ScoringEngine};
pub use service::{
    AssessmentReceipt, AssessmentServiceError, BookkeepingReport, BookkeepingStep,
    RecordedAssessment, RiskAssessmentService, SUBJECT_LOCK_STRIPES,
};
pub use tier::select_tier;
