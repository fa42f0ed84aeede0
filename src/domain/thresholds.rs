// Alert threshold settings cached from the backend
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("{name}: warning {warning} is above critical {critical}")]
    Inverted {
        name: &'static str,
        warning: f64,
        critical: f64,
    },
    #[error("{name}: min {min} is above max {max}")]
    InvertedBand { name: &'static str, min: f64, max: f64 },
    #[error("{name} is not a finite number")]
    NotFinite { name: &'static str },
}

/// Full threshold object as served by `GET /api/settings/thresholds`.
///
/// Missing fields fall back to the defaults below; unknown fields (`id`,
/// `updated_at`) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub voltage_min: f64,
    pub voltage_max: f64,
    pub current_warning: f64,
    pub current_critical: f64,
    pub power_warning: f64,
    pub power_critical: f64,
    pub frequency_min: f64,
    pub frequency_max: f64,
    pub pf_min: f64,
    pub temp_warning: f64,
    pub temp_critical: f64,
    pub vibration_warning: f64,
    pub vibration_critical: f64,
    pub rpm_warning: f64,
    pub rpm_critical: f64,
    pub energy_warning: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            voltage_min: 200.0,
            voltage_max: 240.0,
            current_warning: 15.0,
            current_critical: 20.0,
            power_warning: 4000.0,
            power_critical: 5000.0,
            frequency_min: 59.0,
            frequency_max: 61.0,
            pf_min: 0.85,
            temp_warning: 60.0,
            temp_critical: 80.0,
            vibration_warning: 7.0,
            vibration_critical: 10.0,
            rpm_warning: 2500.0,
            rpm_critical: 3000.0,
            energy_warning: 100.0,
        }
    }
}

/// Quantities whose pair can be pushed on `motor/thresholds/update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    Temperature,
    Vibration,
    Rpm,
}

impl ThresholdKind {
    pub fn from_wire(tipo: &str) -> Option<Self> {
        match tipo {
            "temperatura" | "temperature" => Some(ThresholdKind::Temperature),
            "vibracion" | "vibration" => Some(ThresholdKind::Vibration),
            "rpm" => Some(ThresholdKind::Rpm),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThresholdKind::Temperature => "temperature",
            ThresholdKind::Vibration => "vibration",
            ThresholdKind::Rpm => "rpm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

impl ThresholdPair {
    pub fn validate(&self, name: &'static str) -> Result<(), ThresholdError> {
        if !self.warning.is_finite() || !self.critical.is_finite() {
            return Err(ThresholdError::NotFinite { name });
        }
        if self.warning > self.critical {
            return Err(ThresholdError::Inverted {
                name,
                warning: self.warning,
                critical: self.critical,
            });
        }
        Ok(())
    }
}

impl Thresholds {
    /// Overwrites only the pair of `kind`.
    pub fn set_pair(&mut self, kind: ThresholdKind, pair: ThresholdPair) {
        let (warning, critical) = match kind {
            ThresholdKind::Temperature => (&mut self.temp_warning, &mut self.temp_critical),
            ThresholdKind::Vibration => {
                (&mut self.vibration_warning, &mut self.vibration_critical)
            }
            ThresholdKind::Rpm => (&mut self.rpm_warning, &mut self.rpm_critical),
        };
        *warning = pair.warning;
        *critical = pair.critical;
    }

    pub fn validate(&self) -> Result<(), ThresholdError> {
        let pairs = [
            ("current", self.current_warning, self.current_critical),
            ("power", self.power_warning, self.power_critical),
            ("temperature", self.temp_warning, self.temp_critical),
            ("vibration", self.vibration_warning, self.vibration_critical),
            ("rpm", self.rpm_warning, self.rpm_critical),
        ];
        for (name, warning, critical) in pairs {
            ThresholdPair { warning, critical }.validate(name)?;
        }

        let bands = [
            ("voltage", self.voltage_min, self.voltage_max),
            ("frequency", self.frequency_min, self.frequency_max),
        ];
        for (name, min, max) in bands {
            if !min.is_finite() || !max.is_finite() {
                return Err(ThresholdError::NotFinite { name });
            }
            if min > max {
                return Err(ThresholdError::InvertedBand { name, min, max });
            }
        }

        if !self.pf_min.is_finite() {
            return Err(ThresholdError::NotFinite { name: "pf_min" });
        }
        if !self.energy_warning.is_finite() {
            return Err(ThresholdError::NotFinite {
                name: "energy_warning",
            });
        }
        Ok(())
    }
}
