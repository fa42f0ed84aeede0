// MQTT session - rumqttc client with bounded reconnects and a fixed subscription set
use crate::application::reconnect::{ReconnectStep, ReconnectTracker};
use crate::application::transport::{
    CommandTransport, ConnectionState, DeliveryQuality, InboundFrame, SessionStatus,
    TransportError,
};
use crate::infrastructure::config::MqttSettings;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter,
    Transport,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const SUBSCRIPTION_TOPICS: [&str; 15] = [
    "motor/fase_a/#",
    "motor/fase_b/#",
    "motor/fase_c/#",
    "motor/fase_a",
    "motor/fase_b",
    "motor/fase_c",
    "motor/temperatura",
    "motor/rpm",
    "motor/vibracion",
    "motor/vibracion/#",
    "motor/humedad",
    "motor/status",
    "motor/thresholds/update",
    "motor/maintenance/#",
    "motor/failure",
];

/// Requests the client may queue before the event loop drains them.
const CLIENT_REQUEST_CAPACITY: usize = 64;

fn qos(quality: DeliveryQuality) -> QoS {
    match quality {
        DeliveryQuality::AtMostOnce => QoS::AtMostOnce,
        DeliveryQuality::AtLeastOnce => QoS::AtLeastOnce,
    }
}

pub fn subscriptions() -> Vec<SubscribeFilter> {
    SUBSCRIPTION_TOPICS
        .iter()
        .map(|topic| SubscribeFilter::new(topic.to_string(), qos(DeliveryQuality::AtMostOnce)))
        .collect()
}

pub fn mqtt_options(settings: &MqttSettings, client_id: String) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, settings.host.clone(), settings.port);
    options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(5)));
    options.set_clean_session(true);
    if let Some(username) = settings.username.as_deref().filter(|u| !u.is_empty()) {
        options.set_credentials(username, settings.password.clone().unwrap_or_default());
    }
    if settings.tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    options
}

struct Shared {
    status: watch::Sender<SessionStatus>,
    client: Mutex<Option<AsyncClient>>,
    token: CancellationToken,
}

impl Shared {
    fn set_status(&self, status: SessionStatus) {
        tracing::debug!("MQTT status: {}", status.detail);
        self.status.send_replace(status);
    }

    fn set_client(&self, client: Option<AsyncClient>) {
        if let Ok(mut slot) = self.client.lock() {
            *slot = client;
        }
    }

    fn client(&self) -> Option<AsyncClient> {
        self.client.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Handle to a running broker session. Dropping it does not stop the session;
/// call [`CommandTransport::disconnect`].
pub struct MqttSessionHandle {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttSessionHandle {
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }
}

/// Starts the session task. Inbound publishes arrive on the returned receiver in broker order.
pub fn spawn_session(settings: MqttSettings) -> (MqttSessionHandle, mpsc::Receiver<InboundFrame>) {
    let (inbound_tx, inbound_rx) = mpsc::channel(settings.channel_capacity.max(1));
    let (status, _) = watch::channel(SessionStatus::new(ConnectionState::Disconnected));
    let shared = Arc::new(Shared {
        status,
        client: Mutex::new(None),
        token: CancellationToken::new(),
    });

    let task = tokio::spawn(run_session(settings, shared.clone(), inbound_tx));
    let handle = MqttSessionHandle {
        shared,
        task: Mutex::new(Some(task)),
    };
    (handle, inbound_rx)
}

async fn sleep_or_cancel(token: &CancellationToken, after: Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(after) => true,
    }
}

fn connect(settings: &MqttSettings, shared: &Shared) -> (AsyncClient, EventLoop) {
    let client_id = settings.resolved_client_id();
    tracing::info!(
        "Connecting to MQTT broker {}:{} as {}",
        settings.host,
        settings.port,
        client_id
    );
    let (client, eventloop) =
        AsyncClient::new(mqtt_options(settings, client_id), CLIENT_REQUEST_CAPACITY);
    shared.set_client(Some(client.clone()));
    shared.set_status(SessionStatus::with_detail(
        ConnectionState::Connecting,
        format!("Connecting to {}:{}", settings.host, settings.port),
    ));
    (client, eventloop)
}

async fn run_session(
    settings: MqttSettings,
    shared: Arc<Shared>,
    inbound: mpsc::Sender<InboundFrame>,
) {
    let policy = settings.reconnect_policy();
    let mut tracker = ReconnectTracker::new(policy);

    'session: loop {
        let (client, mut eventloop) = connect(&settings, &shared);

        loop {
            let event = tokio::select! {
                biased;
                _ = shared.token.cancelled() => {
                    let _ = client.try_disconnect();
                    break 'session;
                }
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        tracing::warn!("MQTT broker refused connection: {:?}", ack.code);
                        continue;
                    }
                    tracker.on_connected();
                    shared.set_status(SessionStatus::new(ConnectionState::Connected));
                    let topics = SUBSCRIPTION_TOPICS.len();
                    tracing::info!("MQTT connected, subscribing to {} topics", topics);
                    if let Err(e) = client.try_subscribe_many(subscriptions()) {
                        tracing::error!("MQTT subscribe failed: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let frame = InboundFrame {
                        topic: publish.topic.clone(),
                        payload: publish.payload.clone(),
                    };
                    tokio::select! {
                        biased;
                        _ = shared.token.cancelled() => break 'session,
                        sent = inbound.send(frame) => {
                            if sent.is_err() {
                                tracing::debug!("Inbound receiver dropped, frame discarded");
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => match tracker.on_failure() {
                    ReconnectStep::Retry { attempt, after } => {
                        tracing::warn!(
                            "MQTT connection error: {} (attempt {}/{})",
                            e,
                            attempt,
                            policy.max_attempts
                        );
                        shared.set_status(SessionStatus::with_detail(
                            ConnectionState::Reconnecting(attempt),
                            format!(
                                "Error: {} (reconnecting {}/{})",
                                e,
                                attempt,
                                policy.max_attempts
                            ),
                        ));
                        if !sleep_or_cancel(&shared.token, after).await {
                            break 'session;
                        }
                    }
                    ReconnectStep::Cooldown { after } => {
                        tracing::error!(
                            "MQTT gave up after {} attempts: {}; retrying in {}s",
                            policy.max_attempts,
                            e,
                            after.as_secs()
                        );
                        shared.set_client(None);
                        shared.set_status(SessionStatus::with_detail(
                            ConnectionState::GivenUp,
                            format!(
                                "Error: {} (gave up after {} attempts, retrying in {}s)",
                                e,
                                policy.max_attempts,
                                after.as_secs()
                            ),
                        ));
                        if !sleep_or_cancel(&shared.token, after).await {
                            break 'session;
                        }
                        shared.set_status(SessionStatus::new(ConnectionState::Disconnected));
                        continue 'session;
                    }
                },
            }
        }
    }

    shared.set_client(None);
    shared.set_status(SessionStatus::with_detail(
        ConnectionState::Disconnected,
        "Disconnected",
    ));
    tracing::info!("MQTT session closed");
}

#[async_trait]
impl CommandTransport for MqttSessionHandle {
    fn status(&self) -> SessionStatus {
        self.shared.status.borrow().clone()
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        quality: DeliveryQuality,
    ) -> Result<(), TransportError> {
        if self.shared.token.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if !self.status().is_connected() {
            return Err(TransportError::NotConnected);
        }
        let client = self.shared.client().ok_or(TransportError::NotConnected)?;
        client
            .publish_bytes(topic, qos(quality), false, payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn disconnect(&self) {
        self.shared.token.cancel();
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("MQTT session task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_settings() -> MqttSettings {
        MqttSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            client_id: "motor-test".to_string(),
            reconnect_period_ms: 10,
            max_reconnect_attempts: 2,
            cooldown_secs: 1,
            ..MqttSettings::default()
        }
    }

    #[test]
    fn test_subscription_set_is_fixed_at_qos0() {
        let filters = subscriptions();
        assert_eq!(filters.len(), 15);
        assert!(filters.iter().all(|f| f.qos == QoS::AtMostOnce));
        assert!(filters.iter().any(|f| f.path == "motor/thresholds/update"));
        assert!(filters.iter().any(|f| f.path == "motor/maintenance/#"));
        assert!(filters.iter().any(|f| f.path == "motor/failure"));
        assert!(!filters.iter().any(|f| f.path.starts_with("motor/control")));
    }

    #[test]
    fn test_options_carry_credentials_only_with_username() {
        let settings = MqttSettings {
            username: Some("motor".to_string()),
            password: Some("secret".to_string()),
            keep_alive_secs: 30,
            ..MqttSettings::default()
        };
        let options = mqtt_options(&settings, "panel".to_string());
        assert_eq!(options.client_id(), "panel");
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert_eq!(
            options.credentials(),
            Some(("motor".to_string(), "secret".to_string()))
        );

        let anonymous = mqtt_options(&MqttSettings::default(), "panel".to_string());
        assert_eq!(anonymous.credentials(), None);
    }

    #[test]
    fn test_delivery_quality_mapping() {
        assert_eq!(qos(DeliveryQuality::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(qos(DeliveryQuality::AtLeastOnce), QoS::AtLeastOnce);
    }

    #[tokio::test]
    async fn test_publish_rejected_until_connected_and_after_disconnect() {
        let (handle, _inbound) = spawn_session(unreachable_settings());
        assert!(!handle.status().is_connected());

        let err = handle
            .publish("motor/control/start", Bytes::from_static(b"1"), DeliveryQuality::AtLeastOnce)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotConnected);

        handle.disconnect().await;
        assert_eq!(handle.status().state, ConnectionState::Disconnected);
        let err = handle
            .publish("motor/control/stop", Bytes::from_static(b"0"), DeliveryQuality::AtLeastOnce)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }

    fn is_failure(state: ConnectionState) -> bool {
        matches!(state, ConnectionState::Reconnecting(_) | ConnectionState::GivenUp)
    }

    #[tokio::test]
    async fn test_reconnect_limit_then_cooldown_starts_over() {
        let settings = MqttSettings {
            reconnect_period_ms: 50,
            max_reconnect_attempts: 3,
            cooldown_secs: 1,
            ..unreachable_settings()
        };
        let (handle, _inbound) = spawn_session(settings);
        let mut status = handle.subscribe_status();

        let observed = tokio::time::timeout(Duration::from_secs(5), async {
            let mut observed: Vec<SessionStatus> = Vec::new();
            loop {
                let current = status.borrow_and_update().clone();
                if observed.last() != Some(&current) {
                    observed.push(current);
                }
                let restarted = observed
                    .iter()
                    .skip_while(|s| s.state != ConnectionState::GivenUp)
                    .any(|s| s.state == ConnectionState::Reconnecting(1));
                if restarted || status.changed().await.is_err() {
                    return observed;
                }
            }
        })
        .await
        .unwrap();
        handle.disconnect().await;

        let failures: Vec<ConnectionState> = observed
            .iter()
            .map(|s| s.state)
            .filter(|s| is_failure(*s))
            .collect();
        assert_eq!(
            failures,
            vec![
                ConnectionState::Reconnecting(1),
                ConnectionState::Reconnecting(2),
                ConnectionState::GivenUp,
                ConnectionState::Reconnecting(1),
            ]
        );

        let given_up = observed
            .iter()
            .position(|s| s.state == ConnectionState::GivenUp)
            .unwrap();
        assert!(observed[given_up..]
            .iter()
            .any(|s| s.state == ConnectionState::Connecting));

        for status in observed.iter().filter(|s| is_failure(s.state)) {
            assert!(status.detail.starts_with("Error: "), "{}", status.detail);
        }
    }
}
