use blind_hire::workflows::matching::{MatchingNotice, NotificationError, NotificationPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Keeps every notice in memory until a real mail or inbox transport is wired in.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationOutbox {
    events: Arc<Mutex<Vec<MatchingNotice>>>,
}

impl NotificationPublisher for InMemoryNotificationOutbox {
    fn publish(&self, notice: MatchingNotice) -> Result<(), NotificationError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("outbox lock poisoned".to_string()))?;
        debug!(template = %notice.template, "queued matching notice");
        guard.push(notice);
        Ok(())
    }
}

impl InMemoryNotificationOutbox {
    pub(crate) fn events(&self) -> Vec<MatchingNotice> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}
