use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{error, warn};

use super::answers::AnswerSheet;
use super::domain::{AssessmentRecord, OverrideRequestId, SubjectId, TierId};
use super::eligibility::EligibilityError;
use super::overrides::{OverrideError, OverrideOutcome};
use super::question_bank::{catalog, QuestionTier};
use super::repository::{AssessmentStore, Notifier, RepositoryError};
use super::scoring::ClassificationBands;
use super::service::{AssessmentServiceError, BookkeepingReport, RiskAssessmentService};

/// Size of the reviewer queue returned in one page.
const PENDING_REVIEW_PAGE: usize = 50;

pub(crate) struct RouterState<S, N> {
    service: Arc<RiskAssessmentService<S, N>>,
    request_timeout: Duration,
}

impl<S, N> Clone for RouterState<S, N> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            request_timeout: self.request_timeout,
        }
    }
}

/// Router builder exposing the engine's produced interface over HTTP.
pub fn risk_assessment_router<S, N>(
    service: Arc<RiskAssessmentService<S, N>>,
    request_timeout: Duration,
) -> Router
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/subjects/:subject_id/assessment/tier",
            get(tier_handler::<S, N>),
        )
        .route(
            "/api/v1/subjects/:subject_id/assessment/eligibility",
            get(eligibility_handler::<S, N>),
        )
        .route(
            "/api/v1/subjects/:subject_id/assessment/flow",
            get(flow_handler::<S, N>),
        )
        .route(
            "/api/v1/subjects/:subject_id/assessments",
            get(history_handler::<S, N>).post(submit_handler::<S, N>),
        )
        .route(
            "/api/v1/subjects/:subject_id/override-requests",
            post(override_request_handler::<S, N>),
        )
        .route(
            "/api/v1/subjects/:subject_id/reconcile",
            post(reconcile_handler::<S, N>),
        )
        .route(
            "/api/v1/override-requests/pending",
            get(pending_reviews_handler::<S, N>),
        )
        .route(
            "/api/v1/override-requests/:request_id/decision",
            post(decision_handler::<S, N>),
        )
        .with_state(RouterState {
            service,
            request_timeout,
        })
}

#[derive(Debug, Serialize)]
pub struct TierView {
    pub subject_id: SubjectId,
    pub tier: TierId,
    pub bands: ClassificationBands,
    pub catalog: &'static QuestionTier,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequestPayload {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionPayload {
    pub outcome: OverrideOutcome,
    pub reviewer: String,
}

#[derive(Debug)]
pub(crate) enum RouteError {
    Service(AssessmentServiceError),
    Timeout,
    Worker(String),
}

/// Runs store-bound work on the blocking pool, bounded by the request timeout.
async fn run_blocking<S, N, T, F>(state: &RouterState<S, N>, op: F) -> Result<T, RouteError>
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
    T: Send + 'static,
    F: FnOnce(&RiskAssessmentService<S, N>) -> Result<T, AssessmentServiceError>
        + Send
        + 'static,
{
    run_blocking_until(state, Instant::now() + state.request_timeout, op).await
}

/// A timed-out task is abandoned, not cancelled; the store's compare-and-swap keeps
/// a late commit from double-recording.
async fn run_blocking_until<S, N, T, F>(
    state: &RouterState<S, N>,
    deadline: Instant,
    op: F,
) -> Result<T, RouteError>
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
    T: Send + 'static,
    F: FnOnce(&RiskAssessmentService<S, N>) -> Result<T, AssessmentServiceError>
        + Send
        + 'static,
{
    let service = Arc::clone(&state.service);
    let task = tokio::task::spawn_blocking(move || op(&service));
    match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok(result)) => result.map_err(RouteError::Service),
        Ok(Err(join_error)) => Err(RouteError::Worker(join_error.to_string())),
        Err(_) => Err(RouteError::Timeout),
    }
}

/// Gives the derived writes whatever is left of the request budget. Once the
/// record is committed the answer is final, so writes still running at the
/// deadline are reported as pending and left to finish in the background.
async fn finish_bookkeeping<S, N>(
    state: &RouterState<S, N>,
    record: &AssessmentRecord,
    deadline: Instant,
) -> BookkeepingReport
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let service = Arc::clone(&state.service);
    let committed = record.clone();
    let task = tokio::task::spawn_blocking(move || service.complete_bookkeeping(&committed));
    match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok(report)) => report,
        Ok(Err(join_error)) => {
            error!(
                assessment = %record.id,
                error = %join_error,
                "bookkeeping task failed; reporting derived writes as pending"
            );
            state.service.planned_bookkeeping(record)
        }
        Err(_) => {
            warn!(
                assessment = %record.id,
                "bookkeeping outlived the request deadline; reporting derived writes as pending"
            );
            state.service.planned_bookkeeping(record)
        }
    }
}

pub(crate) async fn tier_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let subject_id = SubjectId(subject_id);
    let lookup = subject_id.clone();
    match run_blocking(&state, move |service| service.active_tier(&lookup)).await {
        Ok(tier) => {
            let view = TierView {
                subject_id,
                tier,
                bands: ClassificationBands::for_tier(tier),
                catalog: catalog(tier),
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn eligibility_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let subject_id = SubjectId(subject_id);
    let lookup = subject_id.clone();
    let now = Utc::now();
    match run_blocking(&state, move |service| {
        service.check_eligibility(&lookup, now)
    })
    .await
    {
        Ok(decision) => (StatusCode::OK, Json(decision.view(subject_id))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn flow_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let subject_id = SubjectId(subject_id);
    let now = Utc::now();
    match run_blocking(&state, move |service| service.begin_flow(&subject_id, now)).await {
        Ok(flow) => (StatusCode::OK, Json(flow)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn history_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let subject_id = SubjectId(subject_id);
    match run_blocking(&state, move |service| {
        service.assessment_history(&subject_id)
    })
    .await
    {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(subject_id): Path<String>,
    Json(sheet): Json<AnswerSheet>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let subject_id = SubjectId(subject_id);
    let now = Utc::now();
    let deadline = Instant::now() + state.request_timeout;
    let recorded = match run_blocking_until(&state, deadline, move |service| {
        service.record_assessment(&subject_id, &sheet, now)
    })
    .await
    {
        Ok(recorded) => recorded,
        Err(err) => return error_response(err),
    };

    let report = finish_bookkeeping(&state, &recorded.record, deadline).await;
    (StatusCode::CREATED, Json(recorded.into_receipt(report))).into_response()
}

pub(crate) async fn override_request_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(subject_id): Path<String>,
    Json(payload): Json<OverrideRequestPayload>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let subject_id = SubjectId(subject_id);
    let now = Utc::now();
    match run_blocking(&state, move |service| {
        service.submit_override_request(&subject_id, &payload.reason, now)
    })
    .await
    {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decision_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(request_id): Path<String>,
    Json(payload): Json<DecisionPayload>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let request_id = OverrideRequestId(request_id);
    let now = Utc::now();
    match run_blocking(&state, move |service| {
        service.decide_override_request(&request_id, payload.outcome, &payload.reviewer, now)
    })
    .await
    {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn pending_reviews_handler<S, N>(
    State(state): State<RouterState<S, N>>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    match run_blocking(&state, |service| {
        service.pending_reviews(PENDING_REVIEW_PAGE)
    })
    .await
    {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reconcile_handler<S, N>(
    State(state): State<RouterState<S, N>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: AssessmentStore + 'static,
    N: Notifier + 'static,
{
    let subject_id = SubjectId(subject_id);
    let lookup = subject_id.clone();
    match run_blocking(&state, move |service| service.reconcile_subject(&lookup)).await {
        Ok(report) => {
            let payload = json!({ "subject_id": subject_id, "report": report });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// HTTP status for a service failure.
pub fn status_for(err: &AssessmentServiceError) -> StatusCode {
    match err {
        AssessmentServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentServiceError::Eligibility(EligibilityError::Locked { .. }) => StatusCode::LOCKED,
        AssessmentServiceError::Eligibility(EligibilityError::Superseded) => StatusCode::CONFLICT,
        AssessmentServiceError::Override(OverrideError::NotFound(_)) => StatusCode::NOT_FOUND,
        AssessmentServiceError::Override(_) | AssessmentServiceError::Flow(_) => {
            StatusCode::CONFLICT
        }
        AssessmentServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AssessmentServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        AssessmentServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn error_response(err: RouteError) -> Response {
    match err {
        RouteError::Service(err) => {
            let status = status_for(&err);
            let payload = match &err {
                AssessmentServiceError::Eligibility(EligibilityError::Locked {
                    remaining_days,
                    unlocks_at,
                }) => json!({
                    "error": err.to_string(),
                    "remaining_days": remaining_days,
                    "unlocks_at": unlocks_at,
                }),
                _ => json!({ "error": err.to_string() }),
            };
            (status, Json(payload)).into_response()
        }
        RouteError::Timeout => {
            let payload = json!({ "error": "collaborator did not respond in time" });
            (StatusCode::GATEWAY_TIMEOUT, Json(payload)).into_response()
        }
        RouteError::Worker(detail) => {
            error!(%detail, "assessment worker task failed");
            let payload = json!({ "error": "internal error" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
