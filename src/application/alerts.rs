// Alert reconciliation views fed by the backend polls and pushed failures
use crate::domain::alert::{Alert, Severity};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

pub const TOAST_DISPLAY_DURATION: Duration = Duration::from_secs(8);
pub const MAX_TOASTS: usize = 5;

/// Active alert list plus the two derived flags.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertBoard {
    alerts: Vec<Alert>,
    has_critical: bool,
    has_warning: bool,
}

impl AlertBoard {
    /// Replaces the list with a fresh poll result and recomputes both flags from it.
    pub fn replace(&mut self, alerts: Vec<Alert>) {
        self.has_critical = alerts.iter().any(|a| a.is_unresolved(Severity::Critical));
        self.has_warning = alerts.iter().any(|a| a.is_unresolved(Severity::Warning));
        self.alerts = alerts;
    }

    /// Prepends a locally raised critical alert; the flag flips without waiting for a poll.
    pub fn push_failure(&mut self, alert: Alert) {
        self.alerts.insert(0, alert);
        self.has_critical = true;
    }

    pub fn active_alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn has_critical(&self) -> bool {
        self.has_critical
    }

    pub fn has_warning(&self) -> bool {
        self.has_warning
    }
}

/// Unresolved `ml_anomaly` alerts, refreshed by their own poll.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MlAlertView {
    alerts: Vec<Alert>,
    has_anomaly: bool,
}

impl MlAlertView {
    pub fn replace(&mut self, alerts: &[Alert]) {
        self.alerts = alerts.iter().filter(|a| a.is_ml_anomaly()).cloned().collect();
        self.has_anomaly = !self.alerts.is_empty();
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn has_anomaly(&self) -> bool {
        self.has_anomaly
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub toast_id: u64,
    pub shown_at: i64,
    #[serde(flatten)]
    pub alert: Alert,
}

/// Short-lived notifications for alerts that were not in the previous poll.
#[derive(Debug, Clone)]
pub struct ToastFeed {
    known_ids: Option<HashSet<i64>>,
    toasts: Vec<Toast>,
    next_toast_id: u64,
    ttl_ms: i64,
    max_toasts: usize,
}

impl Default for ToastFeed {
    fn default() -> Self {
        Self::new(TOAST_DISPLAY_DURATION, MAX_TOASTS)
    }
}

impl ToastFeed {
    pub fn new(ttl: Duration, max_toasts: usize) -> Self {
        Self {
            known_ids: None,
            toasts: Vec::new(),
            next_toast_id: 1,
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            max_toasts,
        }
    }

    /// Diffs the poll against the previous poll's id set and shows the new ones.
    /// Returns how many toasts were added.
    pub fn ingest(&mut self, alerts: &[Alert], now_ms: i64) -> usize {
        let previous = self.known_ids.take().unwrap_or_default();
        let mut fresh: Vec<Toast> = Vec::new();
        for alert in alerts {
            let Some(id) = alert.id else { continue };
            if previous.contains(&id) {
                continue;
            }
            fresh.push(Toast {
                toast_id: self.next_toast_id,
                shown_at: now_ms,
                alert: alert.clone(),
            });
            self.next_toast_id += 1;
        }
        self.known_ids = Some(alerts.iter().filter_map(|a| a.id).collect());

        let added = fresh.len();
        if added > 0 {
            fresh.append(&mut self.toasts);
            fresh.truncate(self.max_toasts);
            self.toasts = fresh;
        }
        added
    }

    /// Drops toasts whose display time is over, whatever their backend state.
    pub fn sweep(&mut self, now_ms: i64) {
        let ttl = self.ttl_ms;
        self.toasts.retain(|t| now_ms.saturating_sub(t.shown_at) < ttl);
    }

    pub fn active(&self, now_ms: i64) -> Vec<Toast> {
        self.toasts
            .iter()
            .filter(|t| now_ms.saturating_sub(t.shown_at) < self.ttl_ms)
            .cloned()
            .collect()
    }

    pub fn dismiss(&mut self, toast_id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.toast_id != toast_id);
        self.toasts.len() != before
    }
}
