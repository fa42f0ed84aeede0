// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use crate::application::monitoring_service::MonitoringService;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::http_backend::HttpBackend;
use crate::infrastructure::mqtt_session::spawn_session;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;
    tracing::info!(
        "Backend API at {}, MQTT broker at {}:{}",
        config.api.base_url,
        config.mqtt.host,
        config.mqtt.port
    );

    // Adapters (infrastructure layer)
    let backend = Arc::new(HttpBackend::new(
        &config.api.base_url,
        Duration::from_millis(config.api.timeout_ms),
    )?);
    let (session, inbound) = spawn_session(config.mqtt.clone());
    let session = Arc::new(session);

    let mut status_changes = WatchStream::new(session.subscribe_status());
    tokio::spawn(async move {
        while let Some(status) = status_changes.next().await {
            tracing::info!("MQTT session: {}", status.detail);
        }
    });

    // Services (application layer)
    let service = MonitoringService::new(config.polling.clone(), backend, session);
    service.start(inbound).await?;

    // Router (presentation layer)
    let router = build_router(Arc::new(AppState::new(service.clone())));

    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting motor-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
