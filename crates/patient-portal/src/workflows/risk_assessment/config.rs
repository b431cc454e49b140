use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Longest lock window or follow-up offset the engine schedules, in days.
pub const MAX_SCHEDULE_DAYS: i64 = 3_650;

/// Engine dials that operators may tune without a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentPolicy {
    /// Cooldown applied to retaking the mandatory basic tier.
    pub lock_window_days: i64,
    /// Offset of the automatic follow-up reminder from completion.
    pub follow_up_days: i64,
    /// Tries per derived write (risk level, follow-up, alert) before deferring it.
    pub derived_write_attempts: u8,
    /// How long the outbox waits on a single notifier delivery before moving on.
    pub notification_timeout_ms: u64,
}

impl Default for AssessmentPolicy {
    fn default() -> Self {
        Self {
            lock_window_days: 30,
            follow_up_days: 30,
            derived_write_attempts: 3,
            notification_timeout_ms: 2_000,
        }
    }
}

impl AssessmentPolicy {
    /// Lock window clamped to `1..=MAX_SCHEDULE_DAYS`.
    pub fn lock_window(&self) -> Duration {
        Duration::days(self.lock_window_days.clamp(1, MAX_SCHEDULE_DAYS))
    }

    /// Follow-up offset clamped to `0..=MAX_SCHEDULE_DAYS`.
    pub fn follow_up_offset(&self) -> Duration {
        Duration::days(self.follow_up_days.clamp(0, MAX_SCHEDULE_DAYS))
    }

    pub fn notification_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.notification_timeout_ms.max(1))
    }
}
