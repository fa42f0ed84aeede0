// Bounded per-metric history with time-windowed queries
use crate::domain::telemetry::{HistoryPoint, MetricKey};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Points kept per metric key (~1 h at one sample per second).
pub const MAX_HISTORY_POINTS: usize = 3600;

#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    series: HashMap<MetricKey, VecDeque<HistoryPoint>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY_POINTS)
    }
}

impl HistoryStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    /// Appends a point, dropping the oldest ones so the series never exceeds capacity.
    pub fn append(&mut self, key: MetricKey, value: f64, timestamp: i64) {
        let capacity = self.capacity;
        let series = self
            .series
            .entry(key)
            .or_insert_with(|| VecDeque::with_capacity(capacity.min(256)));
        series.push_back(HistoryPoint::new(timestamp, value));
        while series.len() > capacity {
            series.pop_front();
        }
    }

    /// Points with `timestamp >= now_ms - window`, in insertion order.
    /// `None` returns the whole series; an unknown key returns nothing.
    pub fn query(
        &self,
        key: MetricKey,
        window: Option<Duration>,
        now_ms: i64,
    ) -> Vec<HistoryPoint> {
        let Some(series) = self.series.get(&key) else {
            return Vec::new();
        };
        match window {
            None => series.iter().copied().collect(),
            Some(window) => {
                let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
                let cutoff = now_ms.saturating_sub(window_ms);
                series
                    .iter()
                    .filter(|p| p.timestamp >= cutoff)
                    .copied()
                    .collect()
            }
        }
    }

    pub fn keys(&self) -> Vec<MetricKey> {
        let mut keys: Vec<MetricKey> = self.series.keys().copied().collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{GeneralField, Phase, PhaseField};

    const TEMP: MetricKey = MetricKey::General(GeneralField::Temperature);

    #[test]
    fn test_append_drops_oldest_past_capacity() {
        let mut history = HistoryStore::default();
        let total = MAX_HISTORY_POINTS + 250;
        for i in 0..total {
            history.append(TEMP, i as f64, i as i64);
        }

        let points = history.query(TEMP, None, total as i64);
        assert_eq!(points.len(), MAX_HISTORY_POINTS);
        assert_eq!(points.first().map(|p| p.value), Some(250.0));
        assert_eq!(points.last().map(|p| p.value), Some((total - 1) as f64));
        assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_query_filters_by_window() {
        let mut history = HistoryStore::default();
        let now = 1_000_000;
        history.append(TEMP, 1.0, now - 10_000);
        history.append(TEMP, 2.0, now - 5_000);
        history.append(TEMP, 3.0, now - 1_000);

        let points = history.query(TEMP, Some(Duration::from_secs(5)), now);
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[test]
    fn test_query_keeps_insertion_order() {
        let mut history = HistoryStore::default();
        // Equal timestamps from one burst stay in arrival order.
        history.append(TEMP, 5.0, 100);
        history.append(TEMP, 4.0, 100);
        history.append(TEMP, 6.0, 101);
        let values: Vec<f64> = history.query(TEMP, None, 101).iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5.0, 4.0, 6.0]);
    }

    #[test]
    fn test_query_absent_key_is_empty() {
        let history = HistoryStore::default();
        let key = MetricKey::Phase(Phase::B, PhaseField::Current);
        assert!(history.query(key, Some(Duration::from_secs(300)), 0).is_empty());
        assert!(history.query(key, None, 0).is_empty());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut history = HistoryStore::with_capacity(2);
        let voltage = MetricKey::Phase(Phase::A, PhaseField::Voltage);
        for i in 0..5 {
            history.append(voltage, i as f64, i);
        }
        history.append(TEMP, 40.0, 10);

        assert_eq!(history.query(voltage, None, 10).len(), 2);
        assert_eq!(history.query(TEMP, None, 10).len(), 1);
        assert_eq!(history.keys(), vec![voltage, TEMP]);
    }
}
