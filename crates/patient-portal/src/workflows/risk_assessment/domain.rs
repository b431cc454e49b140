use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for the person being assessed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(pub String);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for stored assessment records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssessmentId(pub String);

impl fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for override requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverrideRequestId(pub String);

impl fmt::Display for OverrideRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Questionnaire tier. Discriminants match the catalog index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierId {
    Basic = 0,
    Intermediate = 1,
    Advanced = 2,
}

impl TierId {
    pub const ALL: [TierId; 3] = [TierId::Basic, TierId::Intermediate, TierId::Advanced];

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            TierId::Basic => "basic",
            TierId::Intermediate => "intermediate",
            TierId::Advanced => "advanced",
        }
    }

    /// Only the first, mandatory tier is subject to the retake lock.
    pub const fn is_mandatory(self) -> bool {
        matches!(self, TierId::Basic)
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Risk classification derived from a tier-relative clamped score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// The person being assessed, as last written by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub risk_level: Option<RiskLevel>,
    pub last_assessed_at: Option<DateTime<Utc>>,
}

impl Subject {
    pub fn new(id: SubjectId) -> Self {
        Self {
            id,
            risk_level: None,
            last_assessed_at: None,
        }
    }
}

/// One completed attempt. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: AssessmentId,
    pub subject_id: SubjectId,
    pub tier: TierId,
    /// Question id to chosen option id.
    pub answers: BTreeMap<String, String>,
    pub raw_score: u16,
    pub score: u16,
    pub classification: RiskLevel,
    /// 1-based count of attempts for the subject.
    pub sequence_number: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_by: Option<OverrideRequestId>,
}

/// Lifecycle of a manual override request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideStatus {
    Pending,
    Approved,
    Rejected,
    Used,
}

impl OverrideStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OverrideStatus::Pending => "pending",
            OverrideStatus::Approved => "approved",
            OverrideStatus::Rejected => "rejected",
            OverrideStatus::Used => "used",
        }
    }

    /// Pending and approved-but-unused requests block a new submission.
    pub const fn is_outstanding(self) -> bool {
        matches!(self, OverrideStatus::Pending | OverrideStatus::Approved)
    }
}

impl fmt::Display for OverrideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Single status transition kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideAuditEntry {
    pub from: Option<OverrideStatus>,
    pub to: OverrideStatus,
    pub at: DateTime<Utc>,
    pub actor: String,
}

/// Subject-initiated request to bypass the retake lock once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub id: OverrideRequestId,
    pub subject_id: SubjectId,
    pub reason: String,
    pub status: OverrideStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub audit: Vec<OverrideAuditEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    RiskAssessment,
}

/// Reminder derived from a completed assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledFollowUp {
    pub id: String,
    pub subject_id: SubjectId,
    pub assessment_id: AssessmentId,
    pub due_at: DateTime<Utc>,
    pub kind: FollowUpKind,
    pub auto_created: bool,
}

/// High-risk notification record handed to outbound collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub subject_id: SubjectId,
    pub assessment_id: AssessmentId,
    pub tier: TierId,
    pub score: u16,
    pub classification: RiskLevel,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn details(&self) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        details.insert("assessment_id".to_string(), self.assessment_id.0.clone());
        details.insert("tier".to_string(), self.tier.label().to_string());
        details.insert("score".to_string(), self.score.to_string());
        details.insert(
            "classification".to_string(),
            self.classification.label().to_string(),
        );
        details.insert("raised_at".to_string(), self.raised_at.to_rfc3339());
        details
    }
}
