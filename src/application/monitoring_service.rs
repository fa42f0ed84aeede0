// Monitoring service - Owns the state store and every background task feeding it
use crate::application::alerts::{AlertBoard, Toast};
use crate::application::backend_api::{BackendApi, BackendError};
use crate::application::clock::MonotonicClock;
use crate::application::commands::{CommandError, CommandFacade, MotorCommand};
use crate::application::decoder::decode;
use crate::application::scheduler::ScheduledTask;
use crate::application::state_store::{MotorSnapshot, StateStore};
use crate::application::transport::{CommandTransport, InboundFrame, SessionStatus};
use crate::domain::alert::Alert;
use crate::domain::control::MaintenanceCommand;
use crate::domain::telemetry::{
    GeneralOverride, GeneralReading, HistoryPoint, MetricKey, PhaseReadings,
};
use crate::domain::thresholds::{ThresholdError, Thresholds};
use crate::infrastructure::config::PollingSettings;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

pub type SharedStore = Arc<RwLock<StateStore>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(#[from] ThresholdError),
    #[error("monitoring service already started")]
    AlreadyStarted,
}

struct Running {
    token: CancellationToken,
    tasks: Vec<ScheduledTask>,
}

#[derive(Clone)]
pub struct MonitoringService {
    store: SharedStore,
    backend: Arc<dyn BackendApi>,
    transport: Arc<dyn CommandTransport>,
    commands: CommandFacade,
    polling: PollingSettings,
    clock: MonotonicClock,
    running: Arc<Mutex<Option<Running>>>,
}

impl MonitoringService {
    pub fn new(
        polling: PollingSettings,
        backend: Arc<dyn BackendApi>,
        transport: Arc<dyn CommandTransport>,
    ) -> Self {
        let store = StateStore::new(polling.toast_ttl(), polling.max_toasts);
        Self {
            store: Arc::new(RwLock::new(store)),
            backend,
            commands: CommandFacade::new(transport.clone()),
            transport,
            polling,
            clock: MonotonicClock::new(),
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawns the ingestion task, the three alert polls and the initial threshold fetch.
    pub async fn start(&self, inbound: mpsc::Receiver<InboundFrame>) -> Result<(), ServiceError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ServiceError::AlreadyStarted);
        }

        let token = CancellationToken::new();
        let mut tasks = Vec::with_capacity(5);

        let store = self.store.clone();
        let clock = self.clock;
        tasks.push(ScheduledTask::spawn("ingest", &token, move |cancelled| {
            ingest_frames(store, inbound, clock, cancelled)
        }));

        let store = self.store.clone();
        let backend = self.backend.clone();
        tasks.push(ScheduledTask::spawn("thresholds", &token, move |cancelled| async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                result = load_thresholds(&store, backend.as_ref()) => {
                    if let Err(e) = result {
                        tracing::warn!("Initial threshold fetch failed: {}", e);
                    }
                }
            }
        }));

        let (store, backend) = (self.store.clone(), self.backend.clone());
        tasks.push(ScheduledTask::periodic(
            "alerts",
            self.polling.alerts_period(),
            &token,
            move || {
                let (store, backend) = (store.clone(), backend.clone());
                async move {
                    if let Err(e) = poll_alerts(&store, backend.as_ref()).await {
                        tracing::warn!("Alert poll failed: {}", e);
                    }
                }
            },
        ));

        let (store, backend) = (self.store.clone(), self.backend.clone());
        tasks.push(ScheduledTask::periodic(
            "ml-alerts",
            self.polling.ml_alerts_period(),
            &token,
            move || {
                let (store, backend) = (store.clone(), backend.clone());
                async move {
                    if let Err(e) = poll_ml_alerts(&store, backend.as_ref()).await {
                        tracing::warn!("ML alert poll failed: {}", e);
                    }
                }
            },
        ));

        let (store, backend) = (self.store.clone(), self.backend.clone());
        tasks.push(ScheduledTask::periodic(
            "toasts",
            self.polling.toasts_period(),
            &token,
            move || {
                let (store, backend) = (store.clone(), backend.clone());
                async move {
                    if let Err(e) = poll_toasts(&store, backend.as_ref(), clock).await {
                        tracing::warn!("Toast poll failed: {}", e);
                    }
                }
            },
        ));

        tracing::info!("Monitoring service started with {} tasks", tasks.len());
        *running = Some(Running { token, tasks });
        Ok(())
    }

    /// Cancels and joins every task, then disconnects the transport.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.token.cancel();
            for task in running.tasks {
                let name = task.name();
                task.stop().await;
                tracing::debug!("Task '{}' joined", name);
            }
        }
        self.transport.disconnect().await;
        tracing::info!("Monitoring service stopped");
    }

    pub fn status(&self) -> SessionStatus {
        self.transport.status()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub async fn send_command(&self, command: MotorCommand) -> Result<(), ServiceError> {
        Ok(self.commands.send(command).await?)
    }

    pub async fn snapshot(&self) -> MotorSnapshot {
        self.store.read().await.snapshot()
    }

    pub async fn history(&self, key: MetricKey, window: Option<Duration>) -> Vec<HistoryPoint> {
        let now = self.now_ms();
        self.store.read().await.history_query(key, window, now)
    }

    pub async fn history_keys(&self) -> Vec<MetricKey> {
        self.store.read().await.history().keys()
    }

    /// Alert list and both flags, copied under one read guard.
    pub async fn alert_board(&self) -> AlertBoard {
        self.store.read().await.alerts().clone()
    }

    pub async fn ml_alerts(&self) -> Vec<Alert> {
        self.store.read().await.ml_alerts().alerts().to_vec()
    }

    pub async fn toasts(&self) -> Vec<Toast> {
        let now = self.now_ms();
        self.store.read().await.toasts(now)
    }

    pub async fn dismiss_toast(&self, toast_id: u64) -> bool {
        self.store.write().await.dismiss_toast(toast_id)
    }

    /// Resolves every active alert on the backend, then re-polls right away.
    pub async fn resolve_all_alerts(&self) -> Result<Option<u64>, ServiceError> {
        let resolved = self.backend.resolve_all_alerts().await?;
        tracing::info!("Resolved alerts: {:?}", resolved);
        if let Err(e) = poll_alerts(&self.store, self.backend.as_ref()).await {
            tracing::warn!("Alert re-poll after resolve failed: {}", e);
        }
        Ok(resolved)
    }

    pub async fn thresholds(&self) -> Thresholds {
        *self.store.read().await.thresholds()
    }

    pub async fn refresh_thresholds(&self) -> Result<Thresholds, ServiceError> {
        load_thresholds(&self.store, self.backend.as_ref()).await
    }

    /// Validates and stores `thresholds` on the backend, caches the saved object and
    /// echoes it to the controller when the session is up.
    pub async fn save_thresholds(
        &self,
        thresholds: Thresholds,
    ) -> Result<Thresholds, ServiceError> {
        thresholds.validate()?;
        let saved = self.backend.update_thresholds(&thresholds).await?;
        self.store.write().await.set_thresholds(saved);

        if self.transport.status().is_connected() {
            if let Err(e) = self
                .commands
                .send(MotorCommand::PublishThresholds(saved))
                .await
            {
                tracing::warn!("Thresholds saved but not published: {}", e);
            }
        } else {
            tracing::debug!("Thresholds saved while MQTT is down, skipping publish");
        }
        Ok(saved)
    }

    pub async fn maintenance_command(&self) -> Option<MaintenanceCommand> {
        self.store.read().await.maintenance_command().cloned()
    }

    pub async fn override_phases(&self, phases: PhaseReadings) {
        self.store.write().await.override_phases(phases);
    }

    pub async fn override_general(&self, patch: GeneralOverride) -> GeneralReading {
        let mut store = self.store.write().await;
        store.override_general(&patch);
        *store.general()
    }
}

async fn ingest_frames(
    store: SharedStore,
    mut inbound: mpsc::Receiver<InboundFrame>,
    clock: MonotonicClock,
    cancelled: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancelled.cancelled() => break,
            frame = inbound.recv() => match frame {
                Some(frame) => frame,
                None => {
                    tracing::info!("Inbound channel closed, ingestion finished");
                    break;
                }
            },
        };

        let at = clock.now_ms();
        match decode(&frame.topic, &frame.payload, at) {
            Some(decoded) => store.write().await.apply(decoded, at),
            None => tracing::trace!("Skipped message on {}", frame.topic),
        }
    }
}

async fn poll_alerts(store: &SharedStore, backend: &dyn BackendApi) -> Result<usize, BackendError> {
    let alerts = backend.fetch_active_alerts().await?;
    let count = alerts.len();
    store.write().await.replace_alerts(alerts);
    Ok(count)
}

async fn poll_ml_alerts(
    store: &SharedStore,
    backend: &dyn BackendApi,
) -> Result<usize, BackendError> {
    let alerts = backend.fetch_active_alerts().await?;
    let mut store = store.write().await;
    store.replace_ml_alerts(&alerts);
    Ok(store.ml_alerts().alerts().len())
}

async fn poll_toasts(
    store: &SharedStore,
    backend: &dyn BackendApi,
    clock: MonotonicClock,
) -> Result<usize, BackendError> {
    match backend.fetch_active_alerts().await {
        Ok(alerts) => {
            let added = store.write().await.ingest_toasts(&alerts, clock.now_ms());
            if added > 0 {
                tracing::debug!("{} new alert toasts", added);
            }
            Ok(added)
        }
        Err(e) => {
            store.write().await.sweep_toasts(clock.now_ms());
            Err(e)
        }
    }
}

async fn load_thresholds(
    store: &SharedStore,
    backend: &dyn BackendApi,
) -> Result<Thresholds, ServiceError> {
    let thresholds = backend.fetch_thresholds().await?;
    thresholds.validate()?;
    store.write().await.set_thresholds(thresholds);
    tracing::debug!("Thresholds refreshed from backend");
    Ok(thresholds)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::commands::tests::FakeTransport;
    use crate::application::decoder::TOPIC_THRESHOLD_UPDATE;
    use crate::domain::alert::{Severity, ML_ANOMALY_CATEGORY};
    use crate::domain::telemetry::GeneralField;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Backend double serving a mutable alert list and threshold object.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub alerts: std::sync::Mutex<Vec<Alert>>,
        pub thresholds: std::sync::Mutex<Thresholds>,
        pub updates: std::sync::Mutex<Vec<Thresholds>>,
        pub failing: AtomicBool,
        pub alert_calls: AtomicUsize,
    }

    impl FakeBackend {
        pub(crate) fn with_alerts(alerts: Vec<Alert>) -> Self {
            let backend = Self::default();
            *backend.alerts.lock().unwrap() = alerts;
            backend
        }

        fn unavailable(&self, endpoint: &str) -> Result<(), BackendError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(BackendError::Request {
                    endpoint: endpoint.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BackendApi for FakeBackend {
        async fn fetch_active_alerts(&self) -> Result<Vec<Alert>, BackendError> {
            self.alert_calls.fetch_add(1, Ordering::SeqCst);
            self.unavailable("/api/alerts/active")?;
            Ok(self.alerts.lock().unwrap().clone())
        }

        async fn resolve_all_alerts(&self) -> Result<Option<u64>, BackendError> {
            self.unavailable("/api/alerts/resolve-all")?;
            let mut alerts = self.alerts.lock().unwrap();
            let resolved = alerts.len() as u64;
            alerts.clear();
            Ok(Some(resolved))
        }

        async fn fetch_thresholds(&self) -> Result<Thresholds, BackendError> {
            self.unavailable("/api/settings/thresholds")?;
            Ok(*self.thresholds.lock().unwrap())
        }

        async fn update_thresholds(
            &self,
            thresholds: &Thresholds,
        ) -> Result<Thresholds, BackendError> {
            self.unavailable("/api/settings/thresholds")?;
            self.updates.lock().unwrap().push(*thresholds);
            *self.thresholds.lock().unwrap() = *thresholds;
            Ok(*thresholds)
        }
    }

    pub(crate) fn alert(id: i64, severity: Severity, category: &str) -> Alert {
        Alert {
            id: Some(id),
            severity,
            category: category.to_string(),
            phase: None,
            message: format!("alert {}", id),
            value: Some(1.0),
            threshold: None,
            timestamp: NaiveDateTime::default(),
            resolved: false,
            resolved_at: None,
            details: None,
        }
    }

    fn service(
        backend: Arc<FakeBackend>,
        transport: Arc<FakeTransport>,
    ) -> MonitoringService {
        MonitoringService::new(PollingSettings::default(), backend, transport)
    }

    fn frame(topic: &str, payload: &'static str) -> InboundFrame {
        InboundFrame {
            topic: topic.to_string(),
            payload: Bytes::from_static(payload.as_bytes()),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_initial_polls_and_threshold_fetch() {
        let backend = Arc::new(FakeBackend::with_alerts(vec![
            alert(1, Severity::Critical, "temperature"),
            alert(2, Severity::Warning, ML_ANOMALY_CATEGORY),
        ]));
        backend.thresholds.lock().unwrap().temp_warning = 55.0;
        let service = service(backend.clone(), Arc::new(FakeTransport::connected()));
        let (_tx, rx) = mpsc::channel(8);

        service.start(rx).await.unwrap();
        settle().await;

        let snapshot = service.snapshot().await;
        assert!(snapshot.has_critical);
        assert!(snapshot.has_warning);
        assert!(snapshot.has_ml_anomaly);
        assert_eq!(snapshot.active_alerts, 2);
        assert_eq!(snapshot.thresholds.temp_warning, 55.0);
        assert_eq!(service.ml_alerts().await.len(), 1);
        assert_eq!(service.toasts().await.len(), 2);

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_applied_in_arrival_order() {
        let backend = Arc::new(FakeBackend::default());
        let service = service(backend, Arc::new(FakeTransport::connected()));
        let (tx, rx) = mpsc::channel(8);
        service.start(rx).await.unwrap();

        tx.send(frame("motor/rpm", "1500")).await.unwrap();
        tx.send(frame("motor/unknown", "42")).await.unwrap();
        tx.send(frame("motor/rpm", "1600")).await.unwrap();
        settle().await;

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.general.rpm, 1600.0);
        assert_eq!(snapshot.updates_applied, 2);
        let history = service
            .history(MetricKey::General(GeneralField::Rpm), None)
            .await;
        let values: Vec<f64> = history.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1500.0, 1600.0]);

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_keeps_previous_state() {
        let backend = Arc::new(FakeBackend::with_alerts(vec![alert(
            7,
            Severity::Critical,
            "vibration",
        )]));
        let service = service(backend.clone(), Arc::new(FakeTransport::connected()));
        let (_tx, rx) = mpsc::channel(8);
        service.start(rx).await.unwrap();
        settle().await;
        assert!(service.snapshot().await.has_critical);

        backend.failing.store(true, Ordering::SeqCst);
        let calls_before = backend.alert_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(backend.alert_calls.load(Ordering::SeqCst) > calls_before);
        let snapshot = service.snapshot().await;
        assert!(snapshot.has_critical);
        assert_eq!(service.alert_board().await.active_alerts()[0].id, Some(7));

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_board_flags_match_its_list() {
        let backend = Arc::new(FakeBackend::with_alerts(vec![alert(
            5,
            Severity::Warning,
            "rpm",
        )]));
        let service = service(backend.clone(), Arc::new(FakeTransport::connected()));
        let (tx, rx) = mpsc::channel(8);
        service.start(rx).await.unwrap();
        settle().await;

        let board = service.alert_board().await;
        assert!(board.has_warning());
        assert!(!board.has_critical());
        assert_eq!(board.active_alerts().len(), 1);

        tx.send(frame("motor/failure", r#"{"message":"Stator short"}"#))
            .await
            .unwrap();
        settle().await;

        let board = service.alert_board().await;
        assert!(board.has_critical());
        assert!(board.has_warning());
        assert_eq!(board.active_alerts().len(), 2);
        assert_eq!(board.active_alerts()[0].severity, Severity::Critical);

        backend.alerts.lock().unwrap().clear();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let board = service.alert_board().await;
        assert!(!board.has_critical());
        assert!(!board.has_warning());
        assert!(board.active_alerts().is_empty());

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_toasts_expire_after_display_time() {
        let backend = Arc::new(FakeBackend::with_alerts(vec![alert(
            3,
            Severity::Warning,
            "rpm",
        )]));
        let service = service(backend.clone(), Arc::new(FakeTransport::connected()));
        let (_tx, rx) = mpsc::channel(8);
        service.start(rx).await.unwrap();
        settle().await;
        assert_eq!(service.toasts().await.len(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        backend
            .alerts
            .lock()
            .unwrap()
            .push(alert(4, Severity::Critical, "temperature"));
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let toasts = service.toasts().await;
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].alert.id, Some(4));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let toasts = service.toasts().await;
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].alert.id, Some(4));

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_every_task_and_disconnects() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(FakeTransport::connected());
        let service = service(backend.clone(), transport.clone());
        let (tx, rx) = mpsc::channel(8);
        service.start(rx).await.unwrap();
        settle().await;
        assert!(service.running.lock().await.is_some());

        service.stop().await;
        let calls = backend.alert_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(backend.alert_calls.load(Ordering::SeqCst), calls);
        assert!(*transport.disconnected.lock().unwrap());
        assert!(service.running.lock().await.is_none());

        let _ = tx.send(frame("motor/rpm", "900")).await;
        settle().await;
        assert_eq!(service.snapshot().await.updates_applied, 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let service = service(
            Arc::new(FakeBackend::default()),
            Arc::new(FakeTransport::connected()),
        );
        let (_tx, rx) = mpsc::channel(1);
        let (_tx2, rx2) = mpsc::channel(1);

        service.start(rx).await.unwrap();
        let err = service.start(rx2).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyStarted));
        service.stop().await;
    }

    #[tokio::test]
    async fn test_save_thresholds_puts_then_publishes() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(FakeTransport::connected());
        let service = service(backend.clone(), transport.clone());

        let mut wanted = Thresholds::default();
        wanted.rpm_warning = 2200.0;
        let saved = service.save_thresholds(wanted).await.unwrap();

        assert_eq!(saved, wanted);
        assert_eq!(backend.updates.lock().unwrap().as_slice(), &[wanted]);
        assert_eq!(service.thresholds().await, wanted);
        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, TOPIC_THRESHOLD_UPDATE);
    }

    #[tokio::test]
    async fn test_save_while_disconnected_caches_without_publishing() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(FakeTransport::default());
        let service = service(backend.clone(), transport.clone());

        let mut wanted = Thresholds::default();
        wanted.temp_critical = 75.0;
        service.save_thresholds(wanted).await.unwrap();

        assert_eq!(service.thresholds().await.temp_critical, 75.0);
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_thresholds_never_reach_backend() {
        let backend = Arc::new(FakeBackend::default());
        let service = service(backend.clone(), Arc::new(FakeTransport::connected()));

        let mut inverted = Thresholds::default();
        inverted.vibration_warning = 12.0;
        let err = service.save_thresholds(inverted).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidThresholds(_)));
        assert!(backend.updates.lock().unwrap().is_empty());
        assert_eq!(service.thresholds().await, Thresholds::default());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_cached_thresholds() {
        let backend = Arc::new(FakeBackend::default());
        backend.thresholds.lock().unwrap().rpm_critical = 3500.0;
        let service = service(backend.clone(), Arc::new(FakeTransport::connected()));

        service.refresh_thresholds().await.unwrap();
        backend.failing.store(true, Ordering::SeqCst);
        assert!(service.refresh_thresholds().await.is_err());
        assert_eq!(service.thresholds().await.rpm_critical, 3500.0);
    }

    #[tokio::test]
    async fn test_resolve_all_repolls_alerts() {
        let backend = Arc::new(FakeBackend::with_alerts(vec![
            alert(1, Severity::Critical, "temperature"),
            alert(2, Severity::Warning, "rpm"),
        ]));
        let service = service(backend.clone(), Arc::new(FakeTransport::connected()));
        poll_alerts(&service.store, backend.as_ref()).await.unwrap();
        assert!(service.snapshot().await.has_critical);

        let resolved = service.resolve_all_alerts().await.unwrap();

        assert_eq!(resolved, Some(2));
        let snapshot = service.snapshot().await;
        assert!(!snapshot.has_critical);
        assert_eq!(snapshot.active_alerts, 0);
    }

    #[tokio::test]
    async fn test_command_rejected_while_disconnected() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(Arc::new(FakeBackend::default()), transport.clone());

        let err = service.send_command(MotorCommand::Start).await.unwrap_err();
        assert!(matches!(err, ServiceError::Command(CommandError::NotConnected(_))));
        assert!(transport.published().is_empty());
    }
}
