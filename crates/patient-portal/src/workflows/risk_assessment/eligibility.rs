use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::config::AssessmentPolicy;
use super::domain::{
    AssessmentRecord, OverrideRequest, OverrideRequestId, OverrideStatus, SubjectId,
};

/// Why an attempt was allowed to proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityBasis {
    FirstAssessment,
    OptionalTier,
    WindowElapsed,
    /// The approved request must be consumed together with the new record.
    Override { request_id: OverrideRequestId },
}

impl EligibilityBasis {
    pub fn label(&self) -> &'static str {
        match self {
            EligibilityBasis::FirstAssessment => "first_assessment",
            EligibilityBasis::OptionalTier => "optional_tier",
            EligibilityBasis::WindowElapsed => "window_elapsed",
            EligibilityBasis::Override { .. } => "override",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EligibilityDecision {
    Eligible {
        basis: EligibilityBasis,
    },
    Locked {
        /// Display only; never feeds back into the decision.
        remaining_days: i64,
        unlocks_at: DateTime<Utc>,
    },
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityDecision::Eligible { .. })
    }

    pub fn remaining_days(&self) -> Option<i64> {
        match self {
            EligibilityDecision::Locked { remaining_days, .. } => Some(*remaining_days),
            EligibilityDecision::Eligible { .. } => None,
        }
    }

    pub fn override_to_consume(&self) -> Option<&OverrideRequestId> {
        match self {
            EligibilityDecision::Eligible {
                basis: EligibilityBasis::Override { request_id },
            } => Some(request_id),
            _ => None,
        }
    }

    pub fn view(&self, subject_id: SubjectId) -> EligibilityView {
        match self {
            EligibilityDecision::Eligible { basis } => EligibilityView {
                subject_id,
                eligible: true,
                basis: Some(basis.label()),
                remaining_days: None,
                unlocks_at: None,
            },
            EligibilityDecision::Locked {
                remaining_days,
                unlocks_at,
            } => EligibilityView {
                subject_id,
                eligible: false,
                basis: None,
                remaining_days: Some(*remaining_days),
                unlocks_at: Some(*unlocks_at),
            },
        }
    }
}

/// Flattened decision for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityView {
    pub subject_id: SubjectId,
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basis: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocks_at: Option<DateTime<Utc>>,
}

/// Decides whether a new attempt may proceed. Pure over its inputs.
#[derive(Debug, Clone)]
pub struct EligibilityGuard {
    lock_window_days: i64,
}

impl Default for EligibilityGuard {
    fn default() -> Self {
        Self::from_policy(&AssessmentPolicy::default())
    }
}

impl EligibilityGuard {
    pub fn from_policy(policy: &AssessmentPolicy) -> Self {
        Self {
            lock_window_days: policy.lock_window().num_days(),
        }
    }

    pub fn lock_window_days(&self) -> i64 {
        self.lock_window_days
    }

    /// `latest_record` and `latest_override` are the subject's most recent entries.
    pub fn evaluate(
        &self,
        latest_record: Option<&AssessmentRecord>,
        latest_override: Option<&OverrideRequest>,
        now: DateTime<Utc>,
    ) -> EligibilityDecision {
        let Some(record) = latest_record else {
            return EligibilityDecision::Eligible {
                basis: EligibilityBasis::FirstAssessment,
            };
        };

        if !record.tier.is_mandatory() {
            return EligibilityDecision::Eligible {
                basis: EligibilityBasis::OptionalTier,
            };
        }

        // Clock skew can place the record in the future; treat that as day zero.
        let days_since = (now - record.created_at).num_days().max(0);
        if days_since >= self.lock_window_days {
            return EligibilityDecision::Eligible {
                basis: EligibilityBasis::WindowElapsed,
            };
        }

        if let Some(request) =
            latest_override.filter(|request| request.status == OverrideStatus::Approved)
        {
            return EligibilityDecision::Eligible {
                basis: EligibilityBasis::Override {
                    request_id: request.id.clone(),
                },
            };
        }

        EligibilityDecision::Locked {
            remaining_days: self.lock_window_days - days_since,
            unlocks_at: record.created_at + Duration::days(self.lock_window_days),
        }
    }
}

/// Raised when a submission reaches the final gate without eligibility.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EligibilityError {
    #[error("assessment locked for another {remaining_days} day(s)")]
    Locked {
        remaining_days: i64,
        unlocks_at: DateTime<Utc>,
    },
    #[error("another submission for this subject was recorded first")]
    Superseded,
}

/// Picks the most recent entry by creation time; later entries win ties.
pub(crate) fn most_recent<T, F>(items: &[T], created_at: F) -> Option<&T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.iter().fold(None, |latest: Option<&T>, item| match latest {
        Some(current) if created_at(current) > created_at(item) => Some(current),
        _ => Some(item),
    })
}
