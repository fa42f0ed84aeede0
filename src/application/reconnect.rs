// Reconnect accounting for the broker session
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub period: Duration,
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(5000),
            max_attempts: 10,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Try again after `after`; `attempt` counts from 1.
    Retry { attempt: u32, after: Duration },
    /// Budget spent: tear the client down and start over after `after`.
    Cooldown { after: Duration },
}

/// Counts consecutive failed connection attempts; a successful connect resets it.
#[derive(Debug, Clone)]
pub struct ReconnectTracker {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    pub fn on_failure(&mut self) -> ReconnectStep {
        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts.max(1) {
            self.attempts = 0;
            ReconnectStep::Cooldown {
                after: self.policy.cooldown,
            }
        } else {
            ReconnectStep::Retry {
                attempt: self.attempts,
                after: self.policy.period,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_after_exactly_max_attempts() {
        let policy = ReconnectPolicy {
            period: Duration::from_millis(100),
            max_attempts: 4,
            cooldown: Duration::from_secs(30),
        };
        let mut tracker = ReconnectTracker::new(policy);

        for attempt in 1..4 {
            assert_eq!(
                tracker.on_failure(),
                ReconnectStep::Retry {
                    attempt,
                    after: Duration::from_millis(100)
                }
            );
        }
        assert_eq!(
            tracker.on_failure(),
            ReconnectStep::Cooldown {
                after: Duration::from_secs(30)
            }
        );

        // After the cooldown the whole sequence starts over.
        assert!(matches!(tracker.on_failure(), ReconnectStep::Retry { attempt: 1, .. }));
    }

    #[test]
    fn test_success_resets_the_count() {
        let mut tracker = ReconnectTracker::new(ReconnectPolicy::default());
        for _ in 0..9 {
            tracker.on_failure();
        }
        tracker.on_connected();
        assert!(matches!(tracker.on_failure(), ReconnectStep::Retry { attempt: 1, .. }));
    }
}
