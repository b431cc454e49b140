use super::super::answers::ValidatedAnswers;
use super::super::domain::TierId;
use super::ScoreComponent;

/// Cap applied to the raw sum for each tier.
pub(crate) const fn max_score(tier: TierId) -> u16 {
    match tier {
        TierId::Basic => 15,
        TierId::Intermediate => 18,
        TierId::Advanced => 25,
    }
}

pub(crate) fn sum_weights(answers: &ValidatedAnswers) -> (Vec<ScoreComponent>, u16) {
    let mut components = Vec::with_capacity(answers.selections().len());
    let mut raw_score: u16 = 0;

    for selection in answers.selections() {
        let weight = u16::from(selection.option.weight);
        raw_score = raw_score.saturating_add(weight);
        components.push(ScoreComponent {
            question_id: selection.question.id.to_string(),
            option_id: selection.option.id.to_string(),
            weight,
        });
    }

    (components, raw_score)
}

pub(crate) fn clamp(raw_score: u16, tier: TierId) -> u16 {
    raw_score.min(max_score(tier))
}
