// Named background tasks with their own cancellation handles
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct ScheduledTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Runs `tick` right away and then every `period` until cancelled.
    /// A tick still in flight when the token fires is dropped.
    pub fn periodic<F, Fut>(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = tick() => {}
                }
            }
            tracing::debug!("Scheduled task '{}' stopped", name);
        });

        Self {
            name,
            token,
            handle,
        }
    }

    /// Runs a long-lived future that watches its own token.
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let handle = tokio::spawn(task(token.clone()));
        Self {
            name,
            token,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancels the task and waits for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("Scheduled task '{}' ended abnormally: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
    ) -> (ScheduledTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = ScheduledTask::periodic(name, period, parent, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_immediately_then_each_period() {
        let root = CancellationToken::new();
        let (task, count) = counting_task("alerts", Duration::from_secs(3), &root);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        assert_eq!(task.name(), "alerts");
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_are_cancelled_independently() {
        let root = CancellationToken::new();
        let (alerts, alert_count) = counting_task("alerts", Duration::from_secs(3), &root);
        let (toasts, toast_count) = counting_task("toasts", Duration::from_secs(2), &root);

        tokio::time::sleep(Duration::from_millis(10)).await;
        alerts.stop().await;

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(alert_count.load(Ordering::SeqCst), 1);
        assert_eq!(toast_count.load(Ordering::SeqCst), 4);

        root.cancel();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(toast_count.load(Ordering::SeqCst), 4);
        toasts.stop().await;
    }
}
