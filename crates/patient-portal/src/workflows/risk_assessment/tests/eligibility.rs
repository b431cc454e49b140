use std::collections::BTreeMap;

use super::common::*;
use chrono::{DateTime, Duration, Utc};

use crate::workflows::risk_assessment::domain::{
    AssessmentId, AssessmentRecord, OverrideRequest, OverrideStatus, RiskLevel, TierId,
};
use crate::workflows::risk_assessment::eligibility::{
    EligibilityBasis, EligibilityDecision, EligibilityGuard,
};
use crate::workflows::risk_assessment::{AssessmentPolicy, MAX_SCHEDULE_DAYS};

fn record(tier: TierId, created_at: DateTime<Utc>) -> AssessmentRecord {
    AssessmentRecord {
        id: AssessmentId("asm-test".to_string()),
        subject_id: subject(),
        tier,
        answers: BTreeMap::new(),
        raw_score: 3,
        score: 3,
        classification: RiskLevel::Low,
        sequence_number: 1,
        created_at,
        unlocked_by: None,
    }
}

fn request(status: OverrideStatus, created_at: DateTime<Utc>) -> OverrideRequest {
    let mut request = OverrideRequest::open(subject(), "moved clinics".to_string(), &[], created_at)
        .expect("no outstanding requests");
    request.status = status;
    request
}

#[test]
fn first_attempt_is_always_eligible() {
    let decision = EligibilityGuard::default().evaluate(None, None, start());
    assert_eq!(
        decision,
        EligibilityDecision::Eligible {
            basis: EligibilityBasis::FirstAssessment
        }
    );
}

#[test]
fn optional_tiers_never_lock() {
    let latest = record(TierId::Intermediate, day(0));
    let decision = EligibilityGuard::default().evaluate(Some(&latest), None, day(1));
    assert_eq!(
        decision,
        EligibilityDecision::Eligible {
            basis: EligibilityBasis::OptionalTier
        }
    );
}

#[test]
fn basic_tier_locks_for_the_window() {
    let latest = record(TierId::Basic, day(0));
    let decision = EligibilityGuard::default().evaluate(Some(&latest), None, day(10));

    assert_eq!(
        decision,
        EligibilityDecision::Locked {
            remaining_days: 20,
            unlocks_at: day(30),
        }
    );
}

#[test]
fn lock_flips_exactly_at_the_window_boundary() {
    let guard = EligibilityGuard::default();
    let latest = record(TierId::Basic, day(0));

    let almost = guard.evaluate(Some(&latest), None, day(30) - Duration::seconds(1));
    assert_eq!(almost.remaining_days(), Some(1));

    let elapsed = guard.evaluate(Some(&latest), None, day(30));
    assert_eq!(
        elapsed,
        EligibilityDecision::Eligible {
            basis: EligibilityBasis::WindowElapsed
        }
    );
}

#[test]
fn future_records_count_as_day_zero() {
    let latest = record(TierId::Basic, day(2));
    let decision = EligibilityGuard::default().evaluate(Some(&latest), None, day(0));
    assert_eq!(decision.remaining_days(), Some(30));
}

#[test]
fn approved_override_unlocks_once() {
    let latest = record(TierId::Basic, day(0));
    let approved = request(OverrideStatus::Approved, day(5));

    let decision = EligibilityGuard::default().evaluate(Some(&latest), Some(&approved), day(10));
    assert_eq!(decision.override_to_consume(), Some(&approved.id));
}

#[test]
fn non_approved_overrides_do_not_unlock() {
    let guard = EligibilityGuard::default();
    let latest = record(TierId::Basic, day(0));

    for status in [
        OverrideStatus::Pending,
        OverrideStatus::Rejected,
        OverrideStatus::Used,
    ] {
        let latest_request = request(status, day(5));
        let decision = guard.evaluate(Some(&latest), Some(&latest_request), day(10));
        assert!(!decision.is_eligible(), "{status} must not unlock");
    }
}

#[test]
fn custom_windows_come_from_policy() {
    let guard = EligibilityGuard::from_policy(&AssessmentPolicy {
        lock_window_days: 7,
        ..AssessmentPolicy::default()
    });
    let latest = record(TierId::Basic, day(0));

    assert_eq!(guard.lock_window_days(), 7);
    assert_eq!(
        guard.evaluate(Some(&latest), None, day(3)).remaining_days(),
        Some(4)
    );
    assert!(guard.evaluate(Some(&latest), None, day(7)).is_eligible());
}

#[test]
fn oversized_window_is_capped_instead_of_overflowing() {
    let guard = EligibilityGuard::from_policy(&AssessmentPolicy {
        lock_window_days: i64::MAX,
        ..AssessmentPolicy::default()
    });
    let latest = record(TierId::Basic, day(0));

    assert_eq!(guard.lock_window_days(), MAX_SCHEDULE_DAYS);
    match guard.evaluate(Some(&latest), None, day(1)) {
        EligibilityDecision::Locked {
            remaining_days,
            unlocks_at,
        } => {
            assert_eq!(remaining_days, MAX_SCHEDULE_DAYS - 1);
            assert_eq!(unlocks_at, day(0) + Duration::days(MAX_SCHEDULE_DAYS));
        }
        other => panic!("expected a lock, got {other:?}"),
    }
}

#[test]
fn service_recomputes_eligibility_from_stored_history() {
    let (service, _, _) = build_service();
    let subject = subject();

    service
        .submit_assessment(&subject, &low_basic_sheet(), day(0))
        .expect("first attempt recorded");

    let locked = service
        .check_eligibility(&subject, day(10))
        .expect("eligibility computed");
    assert_eq!(locked.remaining_days(), Some(20));

    let view = locked.view(subject.clone());
    assert!(!view.eligible);
    assert_eq!(view.unlocks_at, Some(day(30)));

    let reopened = service
        .check_eligibility(&subject, day(30))
        .expect("eligibility computed");
    assert!(reopened.is_eligible());
}
