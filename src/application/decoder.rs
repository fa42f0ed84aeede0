// Topic decoder - Maps raw bus frames to typed updates and control events
//
// Decoding is total: anything unrecognised yields `None` and is dropped by the caller.
use crate::domain::control::{ControlEvent, FailureNotice, MaintenanceCommand, ThresholdControl};
use crate::domain::telemetry::{
    GeneralField, MetricKey, MetricUpdate, Phase, PhaseField, VibrationField,
};
use crate::domain::thresholds::{ThresholdKind, ThresholdPair, Thresholds};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const TOPIC_THRESHOLD_UPDATE: &str = "motor/thresholds/update";
pub const TOPIC_MAINTENANCE_COMMAND: &str = "motor/maintenance/command";
pub const TOPIC_FAILURE: &str = "motor/failure";

const DEFAULT_FAILURE_MESSAGE: &str = "Motor failure detected";

/// Fields a full threshold object must carry to be taken as a replacement.
const THRESHOLD_FIELDS: [&str; 16] = [
    "voltage_min",
    "voltage_max",
    "current_warning",
    "current_critical",
    "power_warning",
    "power_critical",
    "frequency_min",
    "frequency_max",
    "pf_min",
    "temp_warning",
    "temp_critical",
    "vibration_warning",
    "vibration_critical",
    "rpm_warning",
    "rpm_critical",
    "energy_warning",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// One update for a leaf topic, one per recognised key for a grouped phase message.
    Metrics(Vec<MetricUpdate>),
    Control(ControlEvent),
}

enum Route {
    PhaseGroup(Phase),
    Leaf(MetricKey),
}

fn route(topic: &str) -> Option<Route> {
    let segments: Vec<&str> = topic.split('/').collect();
    match segments.as_slice() {
        ["motor", group] => match Phase::from_topic_segment(group) {
            Some(phase) => Some(Route::PhaseGroup(phase)),
            None => GeneralField::from_wire(group).map(|f| Route::Leaf(MetricKey::General(f))),
        },
        ["motor", "vibracion", field] => {
            VibrationField::from_wire(field).map(|f| Route::Leaf(MetricKey::Vibration(f)))
        }
        ["motor", group, field] => {
            let phase = Phase::from_topic_segment(group)?;
            let field = PhaseField::from_wire(field)?;
            Some(Route::Leaf(MetricKey::Phase(phase, field)))
        }
        _ => None,
    }
}

/// Decodes one frame. `received_at` (epoch ms) stamps control events that carry no time.
pub fn decode(topic: &str, payload: &[u8], received_at: i64) -> Option<Decoded> {
    let control = match topic {
        TOPIC_THRESHOLD_UPDATE => Some(decode_threshold(payload).map(ControlEvent::Threshold)),
        TOPIC_MAINTENANCE_COMMAND => {
            Some(decode_maintenance(payload, received_at).map(ControlEvent::Maintenance))
        }
        TOPIC_FAILURE => Some(decode_failure(payload, received_at).map(ControlEvent::Failure)),
        _ => None,
    };
    if let Some(event) = control {
        return event.map(Decoded::Control);
    }

    match route(topic)? {
        Route::PhaseGroup(phase) => decode_phase_group(phase, payload).map(Decoded::Metrics),
        Route::Leaf(key) => {
            let text = std::str::from_utf8(payload).ok()?;
            let value = parse_number(text)?;
            Some(Decoded::Metrics(vec![MetricUpdate::new(key, value)]))
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn decode_phase_group(phase: Phase, payload: &[u8]) -> Option<Vec<MetricUpdate>> {
    let object: Map<String, Value> = serde_json::from_slice(payload).ok()?;
    let updates: Vec<MetricUpdate> = object
        .iter()
        .filter_map(|(name, value)| {
            let field = PhaseField::from_wire(name)?;
            let value = json_number(value)?;
            Some(MetricUpdate::Phase { phase, field, value })
        })
        .collect();
    (!updates.is_empty()).then_some(updates)
}

#[derive(Deserialize)]
struct PairMessage {
    tipo: String,
    warning: f64,
    critical: f64,
}

fn decode_threshold(payload: &[u8]) -> Option<ThresholdControl> {
    let object: Map<String, Value> = serde_json::from_slice(payload).ok()?;

    if object.contains_key("tipo") {
        let message: PairMessage = serde_json::from_value(Value::Object(object)).ok()?;
        let kind = ThresholdKind::from_wire(&message.tipo)?;
        let pair = ThresholdPair {
            warning: message.warning,
            critical: message.critical,
        };
        pair.validate(kind.name()).ok()?;
        return Some(ThresholdControl::Pair { kind, pair });
    }

    if !THRESHOLD_FIELDS.iter().all(|f| object.contains_key(*f)) {
        return None;
    }
    let thresholds: Thresholds = serde_json::from_value(Value::Object(object)).ok()?;
    thresholds.validate().ok()?;
    Some(ThresholdControl::Full(thresholds))
}

fn decode_maintenance(payload: &[u8], received_at: i64) -> Option<MaintenanceCommand> {
    let raw: Value = serde_json::from_slice(payload).ok()?;
    let object = raw.as_object()?;
    let action = object.get("action")?.as_str()?.to_string();
    let technique = object
        .get("tecnica")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(MaintenanceCommand {
        action,
        technique,
        received_at,
        raw,
    })
}

fn decode_failure(payload: &[u8], received_at: i64) -> Option<FailureNotice> {
    let details: Value = serde_json::from_slice(payload).ok()?;
    let object = details.as_object()?;

    let message = object
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string();
    let timestamp = object
        .get("timestamp")
        .and_then(parse_timestamp)
        .unwrap_or_else(|| millis_to_naive(received_at));
    let value = object.get("value").and_then(json_number);

    Some(FailureNotice {
        message,
        value,
        timestamp,
        details,
    })
}

/// Epoch milliseconds or an ISO-8601 string (with or without offset).
fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.naive_utc())
            .or_else(|_| s.parse::<NaiveDateTime>())
            .ok(),
        _ => None,
    }
}

fn millis_to_naive(ms: i64) -> NaiveDateTime {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}
