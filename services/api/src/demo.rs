use crate::infra::parse_tier;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use patient_portal::error::AppError;
use patient_portal::workflows::risk_assessment::{
    catalog, AnswerSheet, AssessmentPolicy, AssessmentReceipt, AssessmentServiceError,
    ClassificationBands, EligibilityDecision, InMemoryAssessmentStore, InMemoryNotifier,
    OverrideOutcome, QuestionTier, RiskAssessmentService, SubjectId, TierId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::warn;

const NOTIFICATION_DRAIN: StdDuration = StdDuration::from_secs(2);

#[derive(Args, Debug, Default)]
pub(crate) struct CatalogArgs {
    /// Tier to print (basic, intermediate, advanced or 0-2). Prints every tier when omitted.
    #[arg(long, value_parser = parse_tier)]
    pub(crate) tier: Option<TierId>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Subject identifier used for the scripted walkthrough.
    #[arg(long, default_value = "demo-subject")]
    pub(crate) subject: String,
}

pub(crate) fn run_catalog(args: CatalogArgs) -> Result<(), AppError> {
    let tiers = match args.tier {
        Some(tier) => vec![tier],
        None => TierId::ALL.to_vec(),
    };
    for tier in tiers {
        render_catalog(catalog(tier));
    }
    Ok(())
}

fn render_catalog(tier: &QuestionTier) {
    let bands = ClassificationBands::for_tier(tier.tier);
    println!(
        "\n{} [{}] version {} (max score {}, low <= {}, medium <= {})",
        tier.title,
        tier.tier,
        tier.version,
        bands.max_score,
        bands.low_ceiling,
        bands.medium_ceiling
    );
    for question in tier.questions {
        println!("  {}: {}", question.id, question.prompt);
        for option in question.options {
            println!("      - {:<18} {:>2}  {}", option.id, option.weight, option.label);
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let subject = SubjectId(args.subject);
    let store = Arc::new(InMemoryAssessmentStore::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = RiskAssessmentService::new(
        store.clone(),
        notifier.clone(),
        AssessmentPolicy::default(),
    );
    let start = Utc::now();
    let at = |days: i64| start + Duration::days(days);

    println!("Risk assessment demo for subject {subject}");

    let receipt = service.submit_assessment(&subject, &answers_at(TierId::Basic, 2), at(0))?;
    render_receipt("day 0", &receipt);

    render_eligibility("day 10", &service.check_eligibility(&subject, at(10))?);
    match service.submit_assessment(&subject, &answers_at(TierId::Intermediate, 1), at(10)) {
        Err(AssessmentServiceError::Eligibility(err)) => println!("  day 10 retake rejected: {err}"),
        Err(err) => return Err(err.into()),
        Ok(_) => println!("  day 10 retake unexpectedly accepted"),
    }

    let request =
        service.submit_override_request(&subject, "Care team changed my plan", at(11))?;
    println!("  day 11 override {} filed ({})", request.id, request.status);
    let request = service.decide_override_request(
        &request.id,
        OverrideOutcome::Approved,
        "demo-reviewer",
        at(12),
    )?;
    println!(
        "  day 12 override {} {} by {}",
        request.id,
        request.status,
        request.decided_by.as_deref().unwrap_or("unknown")
    );

    let receipt =
        service.submit_assessment(&subject, &answers_at(TierId::Intermediate, 1), at(12))?;
    render_receipt("day 12", &receipt);

    let receipt = service.submit_assessment(&subject, &answers_at(TierId::Advanced, 4), at(13))?;
    render_receipt("day 13", &receipt);

    let alerts = store.alerts().map_err(AssessmentServiceError::from)?;
    if !service.flush_notifications(NOTIFICATION_DRAIN) {
        warn!("notification outbox still busy; count below may be short");
    }
    println!(
        "\nAlerts raised: {} | notifications sent: {}",
        alerts.len(),
        notifier.events().len()
    );
    Ok(())
}

/// Picks the option at `level` (clamped) for every question of `tier`.
fn answers_at(tier: TierId, level: usize) -> AnswerSheet {
    let answers: BTreeMap<String, String> = catalog(tier)
        .questions
        .iter()
        .filter_map(|question| {
            let index = level.min(question.options.len().saturating_sub(1));
            question
                .options
                .get(index)
                .map(|option| (question.id.to_string(), option.id.to_string()))
        })
        .collect();
    AnswerSheet::new(tier, answers)
}

fn render_receipt(label: &str, receipt: &AssessmentReceipt) {
    let record = &receipt.record;
    println!(
        "  {label} {} #{} tier {} scored {}/{} ({}){}",
        record.id,
        record.sequence_number,
        record.tier,
        record.score,
        receipt.max_score,
        record.classification.label(),
        if receipt.alert.is_some() {
            " - alert raised"
        } else {
            ""
        }
    );
    println!("      follow-up due {}", format_day(receipt.follow_up.due_at));
}

fn render_eligibility(label: &str, decision: &EligibilityDecision) {
    match decision {
        EligibilityDecision::Eligible { basis } => {
            println!("  {label} eligible ({})", basis.label())
        }
        EligibilityDecision::Locked {
            remaining_days,
            unlocks_at,
        } => println!(
            "  {label} locked for {remaining_days} more day(s), unlocks {}",
            format_day(*unlocks_at)
        ),
    }
}

fn format_day(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
