use super::domain::TierId;

/// Tier for the next attempt given how many assessments are already stored.
/// The advanced tier is reused for every attempt after the second.
pub fn select_tier(prior_assessment_count: usize) -> TierId {
    match prior_assessment_count {
        0 => TierId::Basic,
        1 => TierId::Intermediate,
        _ => TierId::Advanced,
    }
}
