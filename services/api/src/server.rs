use crate::cli::ServeArgs;
use crate::infra::{AppState, TracingEventHook, TracingNotifier};
use crate::routes::with_assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use patient_portal::config::AppConfig;
use patient_portal::error::AppError;
use patient_portal::telemetry;
use patient_portal::workflows::risk_assessment::{
    InMemoryAssessmentStore, RiskAssessmentService,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryAssessmentStore::default());
    let notifier = Arc::new(TracingNotifier);
    let assessment_service = Arc::new(
        RiskAssessmentService::new(store, notifier, config.assessment.clone())
            .with_hook(Arc::new(TracingEventHook)),
    );

    let app = with_assessment_routes(assessment_service, config.server.request_timeout)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        lock_window_days = config.assessment.lock_window_days,
        notification_timeout_ms = config.assessment.notification_timeout_ms,
        "risk assessment engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
