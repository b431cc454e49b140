use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::TierId;
use super::question_bank::{catalog, AnswerOption, Question};

/// Submitted answers tagged with the tier the subject was shown.
///
/// Each variant is checked against that tier's catalog before scoring, so a payload
/// built for one tier can never be scored against another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", content = "answers", rename_all = "snake_case")]
pub enum AnswerSheet {
    Basic(BTreeMap<String, String>),
    Intermediate(BTreeMap<String, String>),
    Advanced(BTreeMap<String, String>),
}

impl AnswerSheet {
    pub fn new(tier: TierId, answers: BTreeMap<String, String>) -> Self {
        match tier {
            TierId::Basic => AnswerSheet::Basic(answers),
            TierId::Intermediate => AnswerSheet::Intermediate(answers),
            TierId::Advanced => AnswerSheet::Advanced(answers),
        }
    }

    pub fn tier(&self) -> TierId {
        match self {
            AnswerSheet::Basic(_) => TierId::Basic,
            AnswerSheet::Intermediate(_) => TierId::Intermediate,
            AnswerSheet::Advanced(_) => TierId::Advanced,
        }
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        match self {
            AnswerSheet::Basic(answers)
            | AnswerSheet::Intermediate(answers)
            | AnswerSheet::Advanced(answers) => answers,
        }
    }
}

/// Malformed or incomplete input rejected before any write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("answers were submitted for the {submitted} tier but the active tier is {expected}")]
    TierMismatch { expected: TierId, submitted: TierId },
    #[error("unknown question '{question_id}'")]
    UnknownQuestion { question_id: String },
    #[error("unknown option '{option_id}' for question '{question_id}'")]
    UnknownOption {
        question_id: String,
        option_id: String,
    },
    #[error("missing answers for: {}", .question_ids.join(", "))]
    MissingAnswers { question_ids: Vec<String> },
    #[error("override request reason must not be empty")]
    EmptyReason,
    #[error("reviewer id must not be empty")]
    EmptyReviewer,
}

/// One resolved question/option pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub question: &'static Question,
    pub option: &'static AnswerOption,
}

/// Answer sheet proven complete and well-formed for its tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAnswers {
    tier: TierId,
    selections: Vec<Selection>,
}

impl ValidatedAnswers {
    pub fn tier(&self) -> TierId {
        self.tier
    }

    /// Selections in catalog order.
    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.selections
            .iter()
            .map(|selection| {
                (
                    selection.question.id.to_string(),
                    selection.option.id.to_string(),
                )
            })
            .collect()
    }
}

/// Check a sheet against the catalog of `expected`.
pub fn validate(sheet: &AnswerSheet, expected: TierId) -> Result<ValidatedAnswers, ValidationError> {
    if sheet.tier() != expected {
        return Err(ValidationError::TierMismatch {
            expected,
            submitted: sheet.tier(),
        });
    }

    let tier = catalog(expected);
    let answers = sheet.answers();

    if let Some(question_id) = answers
        .keys()
        .find(|question_id| tier.question(question_id).is_none())
    {
        return Err(ValidationError::UnknownQuestion {
            question_id: question_id.clone(),
        });
    }

    let mut selections = Vec::with_capacity(tier.questions.len());
    let mut missing = Vec::new();
    for question in tier.questions {
        let Some(option_id) = answers.get(question.id) else {
            missing.push(question.id.to_string());
            continue;
        };
        let option = question
            .option(option_id)
            .ok_or_else(|| ValidationError::UnknownOption {
                question_id: question.id.to_string(),
                option_id: option_id.clone(),
            })?;
        selections.push(Selection { question, option });
    }

    if !missing.is_empty() {
        return Err(ValidationError::MissingAnswers {
            question_ids: missing,
        });
    }

    Ok(ValidatedAnswers {
        tier: expected,
        selections,
    })
}
