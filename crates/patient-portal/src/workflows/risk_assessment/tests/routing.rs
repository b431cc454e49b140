use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::risk_assessment::domain::TierId;
use crate::workflows::risk_assessment::repository::AssessmentStore;
use crate::workflows::risk_assessment::{
    risk_assessment_router, AssessmentPolicy, InMemoryAssessmentStore, InMemoryNotifier,
    RiskAssessmentService,
};

const TIMEOUT: Duration = Duration::from_secs(2);

fn json_request(method: &str, uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload).expect("serialize")))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn tier_route_returns_catalog_and_bands() {
    let (service, _, _) = build_service();
    let router = router_with_service(service, TIMEOUT);

    let response = router
        .oneshot(get("/api/v1/subjects/subj-0042/assessment/tier"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["tier"], json!("basic"));
    assert_eq!(payload["bands"]["medium_ceiling"], json!(7));
    assert_eq!(
        payload["catalog"]["questions"]
            .as_array()
            .map(Vec::len),
        Some(5)
    );
}

#[tokio::test]
async fn submit_route_records_and_returns_created() {
    let (service, _, _) = build_service();
    let router = router_with_service(service, TIMEOUT);

    let body = serde_json::to_value(high_basic_sheet()).expect("sheet json");
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/assessments",
            &body,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["record"]["score"], json!(10));
    assert_eq!(payload["record"]["classification"], json!("high"));
    assert!(payload["alert"].is_object());
    assert_eq!(payload["pending_bookkeeping"], json!([]));
}

#[tokio::test]
async fn locked_submissions_map_to_423_with_countdown() {
    let (service, _, _) = build_service();
    service
        .submit_assessment(&subject(), &low_basic_sheet(), chrono::Utc::now())
        .expect("first attempt");
    let router = router_with_service(service, TIMEOUT);

    let body = serde_json::to_value(sheet(TierId::Intermediate, &[])).expect("sheet json");
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/assessments",
            &body,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::LOCKED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["remaining_days"], json!(30));
    assert!(payload["unlocks_at"].is_string());
}

#[tokio::test]
async fn malformed_answers_map_to_unprocessable() {
    let (service, _, _) = build_service();
    let router = router_with_service(service, TIMEOUT);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/assessments",
            &json!({ "tier": "basic", "answers": { "general_health": "good" } }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("missing answers"));
}

#[tokio::test]
async fn eligibility_route_reports_first_assessment() {
    let (service, _, _) = build_service();
    let router = router_with_service(service, TIMEOUT);

    let response = router
        .oneshot(get("/api/v1/subjects/subj-0042/assessment/eligibility"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["eligible"], json!(true));
    assert_eq!(payload["basis"], json!("first_assessment"));
}

#[tokio::test]
async fn override_routes_cover_request_and_decision() {
    let (service, _, _) = build_service();
    let router = router_with_service(service, TIMEOUT);

    let created = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/override-requests",
            &json!({ "reason": "changed clinics" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let request = read_json_body(created).await;
    let request_id = request["id"].as_str().expect("request id").to_string();

    let queue = router
        .clone()
        .oneshot(get("/api/v1/override-requests/pending"))
        .await
        .expect("route executes");
    let queue = read_json_body(queue).await;
    assert_eq!(queue.as_array().map(Vec::len), Some(1));

    let decision_uri = format!("/api/v1/override-requests/{request_id}/decision");
    let decided = router
        .clone()
        .oneshot(json_request(
            "POST",
            &decision_uri,
            &json!({ "outcome": "approved", "reviewer": "dr-lee" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(decided.status(), StatusCode::OK);
    assert_eq!(read_json_body(decided).await["status"], json!("approved"));

    let repeat = router
        .oneshot(json_request(
            "POST",
            &decision_uri,
            &json!({ "outcome": "rejected", "reviewer": "dr-kim" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(repeat.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_override_requests_map_to_not_found() {
    let (service, _, _) = build_service();
    let router = router_with_service(service, TIMEOUT);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/override-requests/ovr-missing/decision",
            &json!({ "outcome": "approved", "reviewer": "dr-lee" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unavailable_store_maps_to_service_unavailable() {
    let service = RiskAssessmentService::new(
        Arc::new(UnavailableStore::default()),
        Arc::new(InMemoryNotifier::default()),
        AssessmentPolicy::default(),
    );
    let router = router_with_service(service, TIMEOUT);

    let response = router
        .oneshot(get("/api/v1/subjects/subj-0042/assessments"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn stalled_store_maps_to_gateway_timeout() {
    let service = RiskAssessmentService::new(
        Arc::new(UnavailableStore {
            stall: Some(Duration::from_millis(250)),
        }),
        Arc::new(InMemoryNotifier::default()),
        AssessmentPolicy::default(),
    );
    let router = router_with_service(service, Duration::from_millis(20));

    let response = router
        .oneshot(get("/api/v1/subjects/subj-0042/assessment/flow"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn reconcile_route_reports_nothing_for_new_subjects() {
    let (service, _, _) = build_service();
    let router = router_with_service(service, TIMEOUT);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/reconcile",
            &json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["report"], Value::Null);
}

#[tokio::test]
async fn slow_notifier_does_not_turn_a_commit_into_a_timeout() {
    let store = Arc::new(InMemoryAssessmentStore::default());
    let notifier = Arc::new(SlowNotifier::new(Duration::from_millis(400)));
    let service = Arc::new(RiskAssessmentService::new(
        store.clone(),
        notifier.clone(),
        AssessmentPolicy::default(),
    ));
    let router = risk_assessment_router(Arc::clone(&service), Duration::from_millis(100));

    let body = serde_json::to_value(high_basic_sheet()).expect("sheet json");
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/assessments",
            &body,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["record"]["classification"], json!("high"));
    assert_eq!(payload["pending_bookkeeping"], json!([]));
    assert_eq!(store.assessment_history(&subject()).expect("history").len(), 1);

    let retry = router
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/assessments",
            &body,
        ))
        .await
        .expect("route executes");
    assert_eq!(retry.status(), StatusCode::LOCKED);

    let flushed = tokio::task::spawn_blocking(move || service.flush_notifications(FLUSH_WAIT))
        .await
        .expect("flush task");
    assert!(flushed);
    assert_eq!(notifier.delivered.events().len(), 1);
}

#[tokio::test]
async fn slow_derived_writes_are_reported_pending_once_committed() {
    let store = Arc::new(FlakyStore::stalling(Duration::from_millis(150)));
    let service = RiskAssessmentService::new(
        store.clone(),
        Arc::new(InMemoryNotifier::default()),
        AssessmentPolicy::default(),
    );
    let router = router_with_service(service, Duration::from_millis(50));

    let body = serde_json::to_value(low_basic_sheet()).expect("sheet json");
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/subjects/subj-0042/assessments",
            &body,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["record"]["sequence_number"], json!(1));
    assert_eq!(
        payload["pending_bookkeeping"],
        json!(["risk_level", "follow_up"])
    );
    assert_eq!(
        store
            .inner
            .assessment_history(&subject())
            .expect("history")
            .len(),
        1
    );
}
