use serde::Serialize;

use super::super::domain::{RiskLevel, TierId};
use super::rules::max_score;

const LOW_PERCENT: u16 = 20;
const MEDIUM_PERCENT: u16 = 50;

/// Inclusive upper bounds of the low and medium bands for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationBands {
    pub max_score: u16,
    pub low_ceiling: u16,
    pub medium_ceiling: u16,
}

impl ClassificationBands {
    /// Bands are floor(percent * max) in integer arithmetic, recomputed per tier.
    pub const fn for_tier(tier: TierId) -> Self {
        let max = max_score(tier);
        Self {
            max_score: max,
            low_ceiling: max * LOW_PERCENT / 100,
            medium_ceiling: max * MEDIUM_PERCENT / 100,
        }
    }

    pub fn classify(&self, score: u16) -> RiskLevel {
        if score <= self.low_ceiling {
            RiskLevel::Low
        } else if score <= self.medium_ceiling {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

pub(crate) fn classify(score: u16, tier: TierId) -> RiskLevel {
    ClassificationBands::for_tier(tier).classify(score)
}
