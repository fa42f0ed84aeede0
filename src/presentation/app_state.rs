// Application state for HTTP handlers
use crate::application::monitoring_service::MonitoringService;
use std::time::Duration;

pub const DEFAULT_STREAM_PERIOD: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct AppState {
    pub service: MonitoringService,
    /// How often `/api/stream` pushes a snapshot.
    pub stream_period: Duration,
}

impl AppState {
    pub fn new(service: MonitoringService) -> Self {
        Self {
            service,
            stream_period: DEFAULT_STREAM_PERIOD,
        }
    }
}
