use std::sync::Arc;

use panic_dashboard_domain::{
    services::telemetry::TelemetryGuard, storage::MetricStore, topology::TopologyStore,
};

#[derive(Clone)]
pub struct AppState {
    topology: Arc<TopologyStore>,
    store: Arc<dyn MetricStore>,
    telemetry: TelemetryGuard,
}

impl AppState {
    pub fn new(
        topology: Arc<TopologyStore>,
        store: Arc<dyn MetricStore>,
        telemetry: TelemetryGuard,
    ) -> Self {
        Self {
            topology,
            store,
            telemetry,
        }
    }

    pub fn topology(&self) -> &TopologyStore {
        self.topology.as_ref()
    }

    pub fn store(&self) -> &dyn MetricStore {
        self.store.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }
}
