// Monotonic wall-clock used to stamp history points and toasts
use tokio::time::Instant;

/// Epoch-millisecond clock anchored to the wall clock once, then advanced by tokio's
/// monotonic clock. Readings never go backwards, and tests with a paused runtime
/// move it with `tokio::time::advance`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch_ms: i64,
    started: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            started: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
