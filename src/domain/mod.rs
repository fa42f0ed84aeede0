// Domain layer - Telemetry model, thresholds, alerts and control messages
pub mod alert;
pub mod control;
pub mod telemetry;
pub mod thresholds;
