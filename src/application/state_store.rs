// State store - Authoritative in-memory snapshot of the monitored motor
use crate::application::alerts::{AlertBoard, MlAlertView, Toast, ToastFeed};
use crate::application::decoder::Decoded;
use crate::application::history::HistoryStore;
use crate::domain::alert::Alert;
use crate::domain::control::{ControlEvent, MaintenanceCommand, ThresholdControl};
use crate::domain::telemetry::{
    velocity_from_acceleration, GeneralField, GeneralOverride, GeneralReading, HistoryPoint,
    MetricKey, MetricUpdate, PhaseReadings, VibrationDetail, VibrationField,
};
use crate::domain::thresholds::Thresholds;
use serde::Serialize;
use std::time::Duration;

/// Point-in-time copy of the current readings, handed to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotorSnapshot {
    pub phases: PhaseReadings,
    pub general: GeneralReading,
    pub vibration: VibrationDetail,
    pub thresholds: Thresholds,
    pub has_critical: bool,
    pub has_warning: bool,
    pub has_ml_anomaly: bool,
    pub active_alerts: usize,
    pub updates_applied: u64,
    pub last_update_at: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    phases: PhaseReadings,
    general: GeneralReading,
    vibration: VibrationDetail,
    thresholds: Thresholds,
    alerts: AlertBoard,
    ml_alerts: MlAlertView,
    toasts: ToastFeed,
    maintenance: Option<MaintenanceCommand>,
    history: HistoryStore,
    updates_applied: u64,
    last_update_at: Option<i64>,
}

impl StateStore {
    pub fn new(toast_ttl: Duration, max_toasts: usize) -> Self {
        Self {
            toasts: ToastFeed::new(toast_ttl, max_toasts),
            ..Default::default()
        }
    }

    pub fn apply(&mut self, decoded: Decoded, at: i64) {
        match decoded {
            Decoded::Metrics(updates) => {
                for update in &updates {
                    self.apply_update(update, at);
                }
            }
            Decoded::Control(event) => self.apply_control(event),
        }
    }

    /// Merges one field and records it in history under the same timestamp.
    pub fn apply_update(&mut self, update: &MetricUpdate, at: i64) {
        match *update {
            MetricUpdate::Phase {
                phase,
                field,
                value,
            } => self.phases.get_mut(phase).set(field, value),
            MetricUpdate::General { field, value } => self.general.set(field, value),
            MetricUpdate::Vibration { field, value } => {
                self.vibration.set(field, value);
                if field == VibrationField::Arms {
                    let velocity = velocity_from_acceleration(value);
                    self.general.vibration = velocity;
                    self.history
                        .append(MetricKey::General(GeneralField::Vibration), velocity, at);
                }
            }
        }
        self.history.append(update.key(), update.value(), at);
        self.updates_applied += 1;
        self.last_update_at = Some(at);
    }

    pub fn apply_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Threshold(ThresholdControl::Pair { kind, pair }) => {
                self.thresholds.set_pair(kind, pair);
            }
            ControlEvent::Threshold(ThresholdControl::Full(thresholds)) => {
                self.thresholds = thresholds;
            }
            ControlEvent::Maintenance(command) => self.maintenance = Some(command),
            ControlEvent::Failure(notice) => {
                self.alerts.push_failure(Alert::from_failure(&notice));
            }
        }
    }

    /// Replaces all phase readings at once. Simulation only; history is untouched.
    pub fn override_phases(&mut self, phases: PhaseReadings) {
        self.phases = phases;
    }

    /// Patches the general readings. Simulation only; history is untouched.
    pub fn override_general(&mut self, patch: &GeneralOverride) {
        patch.apply_to(&mut self.general);
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    /// Feeds one alert poll into the board; the ML and toast views have their own polls.
    pub fn replace_alerts(&mut self, alerts: Vec<Alert>) {
        self.alerts.replace(alerts);
    }

    pub fn replace_ml_alerts(&mut self, alerts: &[Alert]) {
        self.ml_alerts.replace(alerts);
    }

    pub fn ingest_toasts(&mut self, alerts: &[Alert], now: i64) -> usize {
        self.toasts.sweep(now);
        self.toasts.ingest(alerts, now)
    }

    pub fn sweep_toasts(&mut self, now: i64) {
        self.toasts.sweep(now);
    }

    pub fn dismiss_toast(&mut self, toast_id: u64) -> bool {
        self.toasts.dismiss(toast_id)
    }

    pub fn snapshot(&self) -> MotorSnapshot {
        MotorSnapshot {
            phases: self.phases,
            general: self.general,
            vibration: self.vibration,
            thresholds: self.thresholds,
            has_critical: self.alerts.has_critical(),
            has_warning: self.alerts.has_warning(),
            has_ml_anomaly: self.ml_alerts.has_anomaly(),
            active_alerts: self.alerts.active_alerts().len(),
            updates_applied: self.updates_applied,
            last_update_at: self.last_update_at,
        }
    }

    pub fn history_query(
        &self,
        key: MetricKey,
        window: Option<Duration>,
        now: i64,
    ) -> Vec<HistoryPoint> {
        self.history.query(key, window, now)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn general(&self) -> &GeneralReading {
        &self.general
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn alerts(&self) -> &AlertBoard {
        &self.alerts
    }

    pub fn ml_alerts(&self) -> &MlAlertView {
        &self.ml_alerts
    }

    pub fn toasts(&self, now: i64) -> Vec<Toast> {
        self.toasts.active(now)
    }

    pub fn maintenance_command(&self) -> Option<&MaintenanceCommand> {
        self.maintenance.as_ref()
    }
}
