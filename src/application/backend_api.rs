// Backend API trait for alert and threshold access
use crate::domain::alert::Alert;
use crate::domain::thresholds::Thresholds;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("failed to parse response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /api/alerts/active`
    async fn fetch_active_alerts(&self) -> Result<Vec<Alert>, BackendError>;

    /// `POST /api/alerts/resolve-all`, returns how many alerts were resolved when reported
    async fn resolve_all_alerts(&self) -> Result<Option<u64>, BackendError>;

    /// `GET /api/settings/thresholds`
    async fn fetch_thresholds(&self) -> Result<Thresholds, BackendError>;

    /// `PUT /api/settings/thresholds` with the full object
    async fn update_thresholds(&self, thresholds: &Thresholds) -> Result<Thresholds, BackendError>;
}
