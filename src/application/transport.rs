// Transport port - What the core needs from the broker session
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "attempt", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting(u32),
    /// Reconnect budget exhausted; waiting out the cooldown before starting over.
    GivenUp,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("Disconnected"),
            ConnectionState::Connecting => f.write_str("Connecting"),
            ConnectionState::Connected => f.write_str("Connected"),
            ConnectionState::Reconnecting(attempt) => write!(f, "Reconnecting ({})", attempt),
            ConnectionState::GivenUp => f.write_str("Waiting before reconnecting"),
        }
    }
}

/// Connection state plus the human-readable line shown to operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub detail: String,
}

impl SessionStatus {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            detail: state.to_string(),
        }
    }

    pub fn with_detail(state: ConnectionState, detail: impl Into<String>) -> Self {
        Self {
            state,
            detail: detail.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryQuality {
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected to the broker")]
    NotConnected,
    #[error("session is shut down")]
    Closed,
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Raw frame from the broker, handed over untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub topic: String,
    pub payload: Bytes,
}

#[async_trait]
pub trait CommandTransport: Send + Sync {
    fn status(&self) -> SessionStatus;

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: DeliveryQuality,
    ) -> Result<(), TransportError>;

    /// Ends the session for good; no reconnection happens afterwards.
    async fn disconnect(&self);
}
