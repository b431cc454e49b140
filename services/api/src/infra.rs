use metrics_exporter_prometheus::PrometheusHandle;
use patient_portal::workflows::risk_assessment::{
    AssessmentEvent, AssessmentEventHook, Notification, NotificationError, Notifier, TierId,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notifier for deployments without an outbound channel: high-risk alerts land in the log.
#[derive(Debug, Default, Clone)]
pub(crate) struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        warn!(
            kind = %notification.kind,
            subject = %notification.subject_id,
            payload = ?notification.payload,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Logs every engine event as structured JSON.
#[derive(Debug, Default, Clone)]
pub(crate) struct TracingEventHook;

impl AssessmentEventHook for TracingEventHook {
    fn on_event(&self, event: &AssessmentEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => info!(target: "risk_assessment::events", %payload, "engine event"),
            Err(err) => warn!(error = %err, "failed to encode engine event"),
        }
    }
}

pub(crate) fn parse_tier(raw: &str) -> Result<TierId, String> {
    let wanted = raw.trim().to_ascii_lowercase();
    TierId::ALL
        .into_iter()
        .find(|tier| tier.label() == wanted || tier.index().to_string() == wanted)
        .ok_or_else(|| format!("unknown tier '{raw}' (expected basic, intermediate or advanced)"))
}
