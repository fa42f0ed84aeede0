// Command facade - Operator commands published to the motor controller
use crate::application::decoder::TOPIC_THRESHOLD_UPDATE;
use crate::application::transport::{CommandTransport, DeliveryQuality, TransportError};
use crate::domain::thresholds::Thresholds;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

pub const TOPIC_CONTROL_START: &str = "motor/control/start";
pub const TOPIC_CONTROL_STOP: &str = "motor/control/stop";
pub const TOPIC_CONTROL_SAMPLING_RATE: &str = "motor/control/sampling_rate";

pub const MAX_SAMPLING_INTERVAL_MS: u32 = 60_000;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("MQTT not connected ({0})")]
    NotConnected(String),
    #[error("sampling interval must be between 1 and 60000 ms, got {0}")]
    InvalidSamplingRate(u32),
    #[error("failed to encode command payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MotorCommand {
    Start,
    Stop,
    /// New sampling interval in milliseconds.
    SamplingRate(u32),
    PublishThresholds(Thresholds),
}

impl MotorCommand {
    pub fn topic(&self) -> &'static str {
        match self {
            MotorCommand::Start => TOPIC_CONTROL_START,
            MotorCommand::Stop => TOPIC_CONTROL_STOP,
            MotorCommand::SamplingRate(_) => TOPIC_CONTROL_SAMPLING_RATE,
            MotorCommand::PublishThresholds(_) => TOPIC_THRESHOLD_UPDATE,
        }
    }

    pub fn payload(&self) -> Result<Bytes, CommandError> {
        let payload = match self {
            MotorCommand::Start => Bytes::from_static(b"1"),
            MotorCommand::Stop => Bytes::from_static(b"0"),
            MotorCommand::SamplingRate(ms) => {
                if *ms == 0 || *ms > MAX_SAMPLING_INTERVAL_MS {
                    return Err(CommandError::InvalidSamplingRate(*ms));
                }
                Bytes::from(ms.to_string())
            }
            MotorCommand::PublishThresholds(thresholds) => {
                Bytes::from(serde_json::to_vec(thresholds)?)
            }
        };
        Ok(payload)
    }
}

/// Publishes commands at least once, and only while the session is connected.
/// Nothing is buffered for later delivery.
#[derive(Clone)]
pub struct CommandFacade {
    transport: Arc<dyn CommandTransport>,
}

impl CommandFacade {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, command: MotorCommand) -> Result<(), CommandError> {
        let payload = command.payload()?;
        self.send_command(command.topic(), payload).await
    }

    pub async fn send_command(&self, topic: &str, payload: Bytes) -> Result<(), CommandError> {
        let status = self.transport.status();
        if !status.is_connected() {
            tracing::warn!("Rejected command on {}: {}", topic, status.detail);
            return Err(CommandError::NotConnected(status.detail));
        }

        self.transport
            .publish(topic, payload, DeliveryQuality::AtLeastOnce)
            .await?;
        tracing::info!("Command sent: {}", topic);
        Ok(())
    }
}
