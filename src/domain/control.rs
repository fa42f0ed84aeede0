// Control messages carried on the reserved bus topics
use chrono::NaiveDateTime;
use serde::Serialize;

use super::thresholds::{ThresholdKind, ThresholdPair, Thresholds};

#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdControl {
    /// `{tipo, warning, critical}`: only the named pair changes.
    Pair {
        kind: ThresholdKind,
        pair: ThresholdPair,
    },
    /// A complete threshold object, as published by the settings save flow.
    Full(Thresholds),
}

/// Last command seen on `motor/maintenance/#`, handed to whoever runs techniques.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceCommand {
    pub action: String,
    pub technique: Option<String>,
    pub received_at: i64,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureNotice {
    pub message: String,
    pub value: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Threshold(ThresholdControl),
    Maintenance(MaintenanceCommand),
    Failure(FailureNotice),
}
