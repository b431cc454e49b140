//! Per-session assessment screen state as an explicit state machine.
//!
//! Transitions are pure: callers feed in the latest eligibility decision or
//! submission result and receive the next state. Nothing here touches storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AssessmentId, RiskLevel, TierId};
use super::eligibility::EligibilityDecision;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssessmentFlow {
    NotStarted,
    Locked {
        remaining_days: i64,
        unlocks_at: DateTime<Utc>,
    },
    InProgress {
        tier: TierId,
    },
    Submitted {
        assessment_id: AssessmentId,
        tier: TierId,
        score: u16,
        classification: RiskLevel,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Subject opens the assessment.
    Enter {
        eligibility: EligibilityDecision,
        tier: TierId,
    },
    /// Eligibility recomputed on demand, e.g. after an override decision.
    Refresh {
        eligibility: EligibilityDecision,
        tier: TierId,
    },
    Recorded {
        assessment_id: AssessmentId,
        tier: TierId,
        score: u16,
        classification: RiskLevel,
    },
    /// Final gate rejected the submission.
    Rejected {
        eligibility: EligibilityDecision,
    },
    Reset,
}

impl FlowEvent {
    fn label(&self) -> &'static str {
        match self {
            FlowEvent::Enter { .. } => "enter",
            FlowEvent::Refresh { .. } => "refresh",
            FlowEvent::Recorded { .. } => "recorded",
            FlowEvent::Rejected { .. } => "rejected",
            FlowEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event '{event}' is not valid in state '{state}'")]
pub struct FlowError {
    pub state: &'static str,
    pub event: &'static str,
}

impl AssessmentFlow {
    pub fn label(&self) -> &'static str {
        match self {
            AssessmentFlow::NotStarted => "not_started",
            AssessmentFlow::Locked { .. } => "locked",
            AssessmentFlow::InProgress { .. } => "in_progress",
            AssessmentFlow::Submitted { .. } => "submitted",
        }
    }

    pub fn apply(self, event: FlowEvent) -> Result<AssessmentFlow, FlowError> {
        match (self, event) {
            (AssessmentFlow::NotStarted, FlowEvent::Enter { eligibility, tier })
            | (AssessmentFlow::Locked { .. }, FlowEvent::Refresh { eligibility, tier })
            | (AssessmentFlow::InProgress { .. }, FlowEvent::Refresh { eligibility, tier }) => {
                Ok(Self::from_eligibility(eligibility, tier))
            }
            (
                AssessmentFlow::InProgress { .. },
                FlowEvent::Recorded {
                    assessment_id,
                    tier,
                    score,
                    classification,
                },
            ) => Ok(AssessmentFlow::Submitted {
                assessment_id,
                tier,
                score,
                classification,
            }),
            (AssessmentFlow::InProgress { tier }, FlowEvent::Rejected { eligibility }) => {
                Ok(Self::from_eligibility(eligibility, tier))
            }
            (_, FlowEvent::Reset) => Ok(AssessmentFlow::NotStarted),
            (state, event) => Err(FlowError {
                state: state.label(),
                event: event.label(),
            }),
        }
    }

    fn from_eligibility(eligibility: EligibilityDecision, tier: TierId) -> AssessmentFlow {
        match eligibility {
            EligibilityDecision::Eligible { .. } => AssessmentFlow::InProgress { tier },
            EligibilityDecision::Locked {
                remaining_days,
                unlocks_at,
            } => AssessmentFlow::Locked {
                remaining_days,
                unlocks_at,
            },
        }
    }
}
