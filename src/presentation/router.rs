// HTTP routes
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    dismiss_toast, get_alerts, get_history, get_maintenance, get_ml_alerts, get_snapshot,
    get_status, get_thresholds, get_toasts, health_check, list_history_keys, override_general,
    override_phases, put_thresholds, refresh_thresholds, resolve_all_alerts, set_sampling_rate,
    start_motor, stop_motor, stream_snapshots,
};
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/history", get(list_history_keys))
        .route("/api/history/:key", get(get_history))
        .route("/api/alerts", get(get_alerts))
        .route("/api/alerts/ml", get(get_ml_alerts))
        .route("/api/alerts/toasts", get(get_toasts))
        .route("/api/alerts/toasts/:id", delete(dismiss_toast))
        .route("/api/alerts/resolve-all", post(resolve_all_alerts))
        .route("/api/thresholds", get(get_thresholds).put(put_thresholds))
        .route("/api/thresholds/refresh", post(refresh_thresholds))
        .route("/api/commands/start", post(start_motor))
        .route("/api/commands/stop", post(stop_motor))
        .route("/api/commands/sampling-rate", post(set_sampling_rate))
        .route("/api/maintenance", get(get_maintenance))
        .route("/api/simulation/phases", put(override_phases))
        .route("/api/simulation/general", patch(override_general))
        .route("/api/stream", get(stream_snapshots))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
