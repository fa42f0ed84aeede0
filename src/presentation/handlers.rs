// HTTP request handlers
use crate::application::alerts::{AlertBoard, Toast};
use crate::application::commands::{CommandError, MotorCommand};
use crate::application::monitoring_service::ServiceError;
use crate::application::state_store::MotorSnapshot;
use crate::application::transport::SessionStatus;
use crate::domain::alert::Alert;
use crate::domain::control::MaintenanceCommand;
use crate::domain::telemetry::{
    GeneralOverride, GeneralReading, HistoryPoint, MetricKey, PhaseReadings,
};
use crate::domain::thresholds::Thresholds;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_HISTORY_SECONDS: u64 = 300;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Command(CommandError::NotConnected(_))
            | ServiceError::Command(CommandError::Transport(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Command(CommandError::InvalidSamplingRate(_))
            | ServiceError::InvalidThresholds(_) => StatusCode::BAD_REQUEST,
            ServiceError::Command(CommandError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Backend(_) => StatusCode::BAD_GATEWAY,
            ServiceError::AlreadyStarted => StatusCode::CONFLICT,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", self.status, self.message);
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    /// Window in seconds; `0` returns everything retained.
    pub seconds: Option<u64>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub key: MetricKey,
    pub points: Vec<HistoryPoint>,
}

#[derive(Serialize)]
pub struct MlAlertsResponse {
    pub alerts: Vec<Alert>,
    pub has_anomaly: bool,
}

#[derive(Serialize)]
pub struct ResolveAllResponse {
    pub resolved: Option<u64>,
}

#[derive(Serialize)]
pub struct CommandAck {
    pub topic: &'static str,
}

#[derive(Deserialize)]
pub struct SamplingRateRequest {
    #[serde(alias = "ms")]
    pub interval_ms: u32,
}

#[derive(Serialize)]
struct StreamFrame {
    status: SessionStatus,
    snapshot: MotorSnapshot,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    Json(state.service.status())
}

pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<MotorSnapshot> {
    Json(state.service.snapshot().await)
}

pub async fn list_history_keys(State(state): State<Arc<AppState>>) -> Json<Vec<MetricKey>> {
    Json(state.service.history_keys().await)
}

/// Windowed history for one metric, oldest point first
pub async fn get_history(
    Path(key): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let key: MetricKey = key
        .parse()
        .map_err(|e| ApiError::new(StatusCode::NOT_FOUND, format!("{}", e)))?;
    let window = match query.seconds.unwrap_or(DEFAULT_HISTORY_SECONDS) {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    };

    let points = state.service.history(key, window).await;
    Ok(Json(HistoryResponse { key, points }))
}

pub async fn get_alerts(State(state): State<Arc<AppState>>) -> Json<AlertBoard> {
    Json(state.service.alert_board().await)
}

pub async fn get_ml_alerts(State(state): State<Arc<AppState>>) -> Json<MlAlertsResponse> {
    let alerts = state.service.ml_alerts().await;
    Json(MlAlertsResponse {
        has_anomaly: !alerts.is_empty(),
        alerts,
    })
}

pub async fn get_toasts(State(state): State<Arc<AppState>>) -> Json<Vec<Toast>> {
    Json(state.service.toasts().await)
}

pub async fn dismiss_toast(
    Path(toast_id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    if state.service.dismiss_toast(toast_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("no toast with id {}", toast_id),
        ))
    }
}

pub async fn resolve_all_alerts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResolveAllResponse>, ApiError> {
    let resolved = state.service.resolve_all_alerts().await?;
    Ok(Json(ResolveAllResponse { resolved }))
}

pub async fn get_thresholds(State(state): State<Arc<AppState>>) -> Json<Thresholds> {
    Json(state.service.thresholds().await)
}

pub async fn put_thresholds(
    State(state): State<Arc<AppState>>,
    Json(thresholds): Json<Thresholds>,
) -> Result<Json<Thresholds>, ApiError> {
    Ok(Json(state.service.save_thresholds(thresholds).await?))
}

pub async fn refresh_thresholds(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Thresholds>, ApiError> {
    Ok(Json(state.service.refresh_thresholds().await?))
}

async fn send_command(
    state: &AppState,
    command: MotorCommand,
) -> Result<(StatusCode, Json<CommandAck>), ApiError> {
    let topic = command.topic();
    state.service.send_command(command).await?;
    Ok((StatusCode::ACCEPTED, Json(CommandAck { topic })))
}

pub async fn start_motor(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CommandAck>), ApiError> {
    send_command(&state, MotorCommand::Start).await
}

pub async fn stop_motor(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CommandAck>), ApiError> {
    send_command(&state, MotorCommand::Stop).await
}

pub async fn set_sampling_rate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SamplingRateRequest>,
) -> Result<(StatusCode, Json<CommandAck>), ApiError> {
    send_command(&state, MotorCommand::SamplingRate(request.interval_ms)).await
}

pub async fn get_maintenance(
    State(state): State<Arc<AppState>>,
) -> Json<Option<MaintenanceCommand>> {
    Json(state.service.maintenance_command().await)
}

pub async fn override_phases(
    State(state): State<Arc<AppState>>,
    Json(phases): Json<PhaseReadings>,
) -> Json<PhaseReadings> {
    state.service.override_phases(phases).await;
    Json(phases)
}

pub async fn override_general(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<GeneralOverride>,
) -> Json<GeneralReading> {
    Json(state.service.override_general(patch).await)
}

/// Server-sent events carrying the session status and a full snapshot on every tick
pub async fn stream_snapshots(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let service = state.service.clone();
    let period = state.stream_period;

    let stream = async_stream::stream! {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let frame = StreamFrame {
                status: service.status(),
                snapshot: service.snapshot().await,
            };
            match Event::default().event("snapshot").json_data(&frame) {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(e) => tracing::warn!("Failed to encode snapshot event: {}", e),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
