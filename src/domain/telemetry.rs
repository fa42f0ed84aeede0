// Telemetry data domain models
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Standard gravity in mm/s², turns an acceleration in g into mm/s².
pub const STANDARD_GRAVITY_MM_S2: f64 = 9806.65;

/// Reference frequency (Hz) for the acceleration -> velocity conversion.
///
/// Assumes the vibration energy sits at a single component at this frequency, which
/// matches the rated frequency of the monitored motor. It is not a general conversion.
pub const VIBRATION_REFERENCE_HZ: f64 = 80.0;

/// Vibration velocity RMS (mm/s) derived from an acceleration RMS reading (g).
pub fn velocity_from_acceleration(arms_g: f64) -> f64 {
    arms_g * STANDARD_GRAVITY_MM_S2 / (2.0 * std::f64::consts::PI * VIBRATION_REFERENCE_HZ)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    A,
    B,
    C,
}

impl Phase {
    /// Maps a topic segment such as `fase_a` to its phase.
    pub fn from_topic_segment(segment: &str) -> Option<Self> {
        match segment {
            "fase_a" => Some(Phase::A),
            "fase_b" => Some(Phase::B),
            "fase_c" => Some(Phase::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseField {
    Voltage,
    Current,
    Power,
    Energy,
    Frequency,
    PowerFactor,
}

impl PhaseField {
    pub const ALL: [PhaseField; 6] = [
        PhaseField::Voltage,
        PhaseField::Current,
        PhaseField::Power,
        PhaseField::Energy,
        PhaseField::Frequency,
        PhaseField::PowerFactor,
    ];

    /// Field name as published on the bus (leaf topic or grouped JSON key).
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "voltaje" => Some(PhaseField::Voltage),
            "corriente" => Some(PhaseField::Current),
            "potencia" => Some(PhaseField::Power),
            "energia" => Some(PhaseField::Energy),
            "frecuencia" => Some(PhaseField::Frequency),
            "factor_potencia" => Some(PhaseField::PowerFactor),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhaseField::Voltage => "voltage",
            PhaseField::Current => "current",
            PhaseField::Power => "power",
            PhaseField::Energy => "energy",
            PhaseField::Frequency => "frequency",
            PhaseField::PowerFactor => "power_factor",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .or_else(|| Self::from_wire(name))
            .or_else(|| (name == "factorPotencia").then_some(PhaseField::PowerFactor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralField {
    Temperature,
    Rpm,
    Vibration,
    Humidity,
}

impl GeneralField {
    pub const ALL: [GeneralField; 4] = [
        GeneralField::Temperature,
        GeneralField::Rpm,
        GeneralField::Vibration,
        GeneralField::Humidity,
    ];

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "temperatura" => Some(GeneralField::Temperature),
            "rpm" => Some(GeneralField::Rpm),
            "vibracion" => Some(GeneralField::Vibration),
            "humedad" => Some(GeneralField::Humidity),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeneralField::Temperature => "temperature",
            GeneralField::Rpm => "rpm",
            GeneralField::Vibration => "vibration",
            GeneralField::Humidity => "humidity",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .or_else(|| Self::from_wire(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VibrationField {
    Arms,
    Apico,
    PicoPico,
}

impl VibrationField {
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "arms" => Some(VibrationField::Arms),
            "apico" => Some(VibrationField::Apico),
            "pico_pico" => Some(VibrationField::PicoPico),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VibrationField::Arms => "arms",
            VibrationField::Apico => "apico",
            VibrationField::PicoPico => "pico_pico",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Self::from_wire(name).or_else(|| (name == "picoPico").then_some(VibrationField::PicoPico))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseReading {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
}

impl PhaseReading {
    pub fn set(&mut self, field: PhaseField, value: f64) {
        let slot = match field {
            PhaseField::Voltage => &mut self.voltage,
            PhaseField::Current => &mut self.current,
            PhaseField::Power => &mut self.power,
            PhaseField::Energy => &mut self.energy,
            PhaseField::Frequency => &mut self.frequency,
            PhaseField::PowerFactor => &mut self.power_factor,
        };
        *slot = value;
    }
}

/// Readings of the three phases, serialized as `{"A": .., "B": .., "C": ..}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseReadings {
    #[serde(rename = "A")]
    pub a: PhaseReading,
    #[serde(rename = "B")]
    pub b: PhaseReading,
    #[serde(rename = "C")]
    pub c: PhaseReading,
}

impl PhaseReadings {
    pub fn get_mut(&mut self, phase: Phase) -> &mut PhaseReading {
        match phase {
            Phase::A => &mut self.a,
            Phase::B => &mut self.b,
            Phase::C => &mut self.c,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralReading {
    pub temperature: f64,
    pub rpm: f64,
    /// Velocity RMS in mm/s, published directly or derived from `arms`.
    pub vibration: f64,
    pub humidity: f64,
}

impl GeneralReading {
    pub fn set(&mut self, field: GeneralField, value: f64) {
        let slot = match field {
            GeneralField::Temperature => &mut self.temperature,
            GeneralField::Rpm => &mut self.rpm,
            GeneralField::Vibration => &mut self.vibration,
            GeneralField::Humidity => &mut self.humidity,
        };
        *slot = value;
    }
}

/// Partial general reading used by the simulation override; absent fields are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct GeneralOverride {
    pub temperature: Option<f64>,
    pub rpm: Option<f64>,
    pub vibration: Option<f64>,
    pub humidity: Option<f64>,
}

impl GeneralOverride {
    pub fn apply_to(&self, reading: &mut GeneralReading) {
        let fields = [
            (GeneralField::Temperature, self.temperature),
            (GeneralField::Rpm, self.rpm),
            (GeneralField::Vibration, self.vibration),
            (GeneralField::Humidity, self.humidity),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                reading.set(field, value);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VibrationDetail {
    /// Acceleration RMS (g)
    pub arms: f64,
    /// Peak acceleration (g)
    pub apico: f64,
    /// Peak-to-peak acceleration (g)
    pub pico_pico: f64,
}

impl VibrationDetail {
    pub fn set(&mut self, field: VibrationField, value: f64) {
        let slot = match field {
            VibrationField::Arms => &mut self.arms,
            VibrationField::Apico => &mut self.apico,
            VibrationField::PicoPico => &mut self.pico_pico,
        };
        *slot = value;
    }
}

/// History key of a metric, rendered as `A.voltage`, `temperature` or `vibration.arms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    Phase(Phase, PhaseField),
    General(GeneralField),
    Vibration(VibrationField),
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKey::Phase(phase, field) => write!(f, "{}.{}", phase.as_str(), field.name()),
            MetricKey::General(field) => f.write_str(field.name()),
            MetricKey::Vibration(field) => write!(f, "vibration.{}", field.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric key: {0}")]
pub struct UnknownMetricKey(pub String);

impl FromStr for MetricKey {
    type Err = UnknownMetricKey;

    /// Accepts both the English field names and the Spanish wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownMetricKey(s.to_string());
        match s.split_once('.') {
            None => GeneralField::parse(s).map(MetricKey::General).ok_or_else(unknown),
            Some(("vibration" | "vibracion", field)) => VibrationField::parse(field)
                .map(MetricKey::Vibration)
                .ok_or_else(unknown),
            Some((phase, field)) => {
                let phase = match phase {
                    "A" | "a" => Phase::A,
                    "B" | "b" => Phase::B,
                    "C" | "c" => Phase::C,
                    _ => return Err(unknown()),
                };
                PhaseField::parse(field)
                    .map(|field| MetricKey::Phase(phase, field))
                    .ok_or_else(unknown)
            }
        }
    }
}

impl Serialize for MetricKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl HistoryPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A single-field telemetry update decoded from the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricUpdate {
    Phase {
        phase: Phase,
        field: PhaseField,
        value: f64,
    },
    General {
        field: GeneralField,
        value: f64,
    },
    Vibration {
        field: VibrationField,
        value: f64,
    },
}

impl MetricUpdate {
    pub fn new(key: MetricKey, value: f64) -> Self {
        match key {
            MetricKey::Phase(phase, field) => MetricUpdate::Phase { phase, field, value },
            MetricKey::General(field) => MetricUpdate::General { field, value },
            MetricKey::Vibration(field) => MetricUpdate::Vibration { field, value },
        }
    }

    pub fn key(&self) -> MetricKey {
        match *self {
            MetricUpdate::Phase { phase, field, .. } => MetricKey::Phase(phase, field),
            MetricUpdate::General { field, .. } => MetricKey::General(field),
            MetricUpdate::Vibration { field, .. } => MetricKey::Vibration(field),
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            MetricUpdate::Phase { value, .. }
            | MetricUpdate::General { value, .. }
            | MetricUpdate::Vibration { value, .. } => value,
        }
    }
}
