// Alert domain model shared with the backend's /api/alerts endpoints
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::control::FailureNotice;

pub const FAILURE_CATEGORY: &str = "failure";
pub const ML_ANOMALY_CATEGORY: &str = "ml_anomaly";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
    #[default]
    #[serde(other)]
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Backend id; `None` for alerts synthesized locally.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub severity: Severity,
    pub category: String,
    #[serde(default)]
    pub phase: Option<String>,
    pub message: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Alert {
    pub fn is_unresolved(&self, severity: Severity) -> bool {
        self.severity == severity && !self.resolved
    }

    pub fn is_ml_anomaly(&self) -> bool {
        self.category == ML_ANOMALY_CATEGORY && !self.resolved
    }

    /// Critical alert raised locally for a failure pushed on `motor/failure`.
    pub fn from_failure(notice: &FailureNotice) -> Self {
        Self {
            id: None,
            severity: Severity::Critical,
            category: FAILURE_CATEGORY.to_string(),
            phase: None,
            message: notice.message.clone(),
            value: notice.value,
            threshold: None,
            timestamp: notice.timestamp,
            resolved: false,
            resolved_at: None,
            details: Some(notice.details.clone()),
        }
    }
}
