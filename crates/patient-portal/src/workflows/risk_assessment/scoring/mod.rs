mod policy;
mod rules;

pub use policy::ClassificationBands;

use super::answers::{validate, AnswerSheet, ValidatedAnswers, ValidationError};
use super::domain::{RiskLevel, TierId};
use serde::{Deserialize, Serialize};

/// Stateless reducer from validated answers to a bounded score and classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, answers: &ValidatedAnswers) -> ScoreOutcome {
        let tier = answers.tier();
        let (components, raw_score) = rules::sum_weights(answers);
        let score = rules::clamp(raw_score, tier);

        ScoreOutcome {
            tier,
            raw_score,
            score,
            max_score: rules::max_score(tier),
            classification: policy::classify(score, tier),
            components,
        }
    }

    /// Validate `sheet` against `tier` and score it.
    pub fn score_sheet(
        &self,
        sheet: &AnswerSheet,
        tier: TierId,
    ) -> Result<ScoreOutcome, ValidationError> {
        let answers = validate(sheet, tier)?;
        Ok(self.score(&answers))
    }
}

/// Weight contributed by one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub question_id: String,
    pub option_id: String,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub tier: TierId,
    pub raw_score: u16,
    pub score: u16,
    pub max_score: u16,
    pub classification: RiskLevel,
    pub components: Vec<ScoreComponent>,
}
