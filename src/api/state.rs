use crate::application::MetricsService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub metrics_service: Arc<MetricsService>,
    /// Absent when no global recorder was installed (tests)
    pub prometheus: Option<PrometheusHandle>,
}
