//! Per-target monitor loop.
//!
//! Each cycle: retry-wrapped verdict, state decision, optional notification,
//! then a pause of `target.interval`. Within one target these steps are
//! strictly ordered; different targets run independently.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::retry::{ProbeResult, RetryPolicy, Sleeper};
use super::tracker::{HealthTracker, Transition};
use crate::domain::Target;
use crate::health::HealthStore;
use crate::notification::{ConnectionStatus, NotificationEvent, NotificationService};
use crate::probe::ProbeAdapter;

/// What one cycle decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub result: ProbeResult,
    pub transition: Option<Transition>,
}

/// Monitor loop of a single target. Owns the target's failure counter.
pub struct MonitorLoop {
    target: Arc<Target>,
    probe: Arc<dyn ProbeAdapter>,
    policy: RetryPolicy,
    tracker: HealthTracker,
    store: HealthStore,
    notifier: Arc<NotificationService>,
    sleeper: Arc<dyn Sleeper>,
}

impl MonitorLoop {
    pub fn new(
        target: Arc<Target>,
        probe: Arc<dyn ProbeAdapter>,
        store: HealthStore,
        notifier: Arc<NotificationService>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        store.register(Arc::clone(&target));
        let record = store.record(&target.key()).unwrap_or_default();
        Self {
            policy: RetryPolicy::for_target(&target),
            tracker: HealthTracker::from_record(target.retry_buffer, record),
            target,
            probe,
            store,
            notifier,
            sleeper,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run a single cycle without the trailing interval pause.
    ///
    /// Returns `None` when cancelled before a verdict was reached; state is left untouched.
    pub async fn step(&mut self, token: &CancellationToken) -> Option<CycleOutcome> {
        let result = self
            .policy
            .attempt(
                self.probe.as_ref(),
                &self.target,
                self.sleeper.as_ref(),
                token,
            )
            .await?;

        let transition = self.tracker.observe(result.success);
        self.store.update(&self.target.key(), self.tracker.record());
        self.log_result(&result);

        if let Some(transition) = transition {
            let status = match transition {
                Transition::Down => ConnectionStatus::Interrupted,
                Transition::Up => ConnectionStatus::Established,
            };
            self.log_transition(status);

            let event = NotificationEvent::transition(Arc::clone(&self.target), status);
            if let Err(e) = self.notifier.notify(&event).await {
                error!(
                    address = %self.target.address,
                    service = %self.target.service,
                    error = %e,
                    "failed to deliver state change notification"
                );
            }
        }

        Some(CycleOutcome { result, transition })
    }

    /// Cycle until `token` is cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        info!(
            address = %self.target.address,
            service = %self.target.service,
            protocol = %self.target.protocol(),
            interval_secs = self.target.interval.as_secs(),
            retry_buffer = self.target.retry_buffer,
            "monitor started"
        );

        loop {
            if self.step(&token).await.is_none() {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.sleeper.sleep(self.target.interval) => {}
            }
        }

        info!(
            address = %self.target.address,
            protocol = %self.target.protocol(),
            "monitor stopped"
        );
    }

    /// Run on a new task.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    fn log_result(&self, result: &ProbeResult) {
        let target = &self.target;
        let latency_ms = result.measurement.and_then(|m| m.latency_ms());
        let status_code = result
            .measurement
            .and_then(|m| m.status_code())
            .or_else(|| result.error.as_ref().and_then(|e| e.status_code()));

        if result.success {
            info!(
                address = %target.address,
                service = %target.service,
                protocol = %target.protocol(),
                network_zone = %target.network_zone,
                instance_type = %target.instance_type,
                latency_ms,
                status_code,
                attempts = result.attempts,
                "connection[OK]"
            );
        } else {
            warn!(
                address = %target.address,
                service = %target.service,
                protocol = %target.protocol(),
                network_zone = %target.network_zone,
                instance_type = %target.instance_type,
                status_code,
                attempts = result.attempts,
                consecutive_failures = self.tracker.consecutive_failures(),
                retry_buffer = target.retry_buffer,
                error = result.error.as_ref().map(tracing::field::display),
                "connection[KO]"
            );
        }
    }

    fn log_transition(&self, status: ConnectionStatus) {
        let target = &self.target;
        match status {
            ConnectionStatus::Interrupted => warn!(
                address = %target.address,
                service = %target.service,
                protocol = %target.protocol(),
                consecutive_failures = self.tracker.consecutive_failures(),
                "{}", status.label()
            ),
            ConnectionStatus::Established => info!(
                address = %target.address,
                service = %target.service,
                protocol = %target.protocol(),
                "{}", status.label()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::ProbeError;
    use crate::monitor::retry::{RecordingSleeper, TokioSleeper};
    use crate::notification::channels::MockNotificationChannel;
    use crate::notification::events::fixtures::icmp_target;
    use crate::probe::Measurement;

    /// Replays `verdicts`, then answers `fallback` forever.
    struct Scripted {
        verdicts: Mutex<VecDeque<bool>>,
        fallback: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProbeAdapter for Scripted {
        async fn probe(&self, _target: &Target) -> Result<Measurement, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let success = self.verdicts.lock().pop_front().unwrap_or(self.fallback);
            if success {
                Ok(Measurement::Latency(Duration::from_millis(3)))
            } else {
                Err(ProbeError::timeout("echo request timed out"))
            }
        }
    }

    fn scripted(verdicts: &[bool], fallback: bool) -> Arc<Scripted> {
        Arc::new(Scripted {
            verdicts: Mutex::new(verdicts.iter().copied().collect()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    fn notifier(expected: usize) -> Arc<NotificationService> {
        let mut channel = MockNotificationChannel::new();
        channel.expect_channel_type().return_const("mock");
        channel.expect_send().times(expected).returning(|_| Ok(()));
        Arc::new(NotificationService::new(vec![Arc::new(channel)]))
    }

    #[tokio::test]
    async fn test_step_updates_store_and_notifies_on_transition() {
        let target = icmp_target("10.0.0.5", "router");
        let store = HealthStore::new();
        // retry_buffer = 2 with no retries inside the interval
        let mut monitor = MonitorLoop::new(
            Arc::clone(&target),
            scripted(&[false, false, false, true], true),
            store.clone(),
            notifier(2),
            Arc::new(RecordingSleeper::new()),
        )
        .with_policy(RetryPolicy::new(0, Duration::from_secs(1)));
        let token = CancellationToken::new();

        for _ in 0..2 {
            let outcome = monitor.step(&token).await.unwrap();
            assert_eq!(outcome.transition, None);
            assert!(store.get_health(&target.key()));
        }

        let outcome = monitor.step(&token).await.unwrap();
        assert_eq!(outcome.transition, Some(Transition::Down));
        let record = store.record(&target.key()).unwrap();
        assert!(!record.healthy);
        assert_eq!(record.consecutive_failures, 3);

        let outcome = monitor.step(&token).await.unwrap();
        assert_eq!(outcome.transition, Some(Transition::Up));
        assert!(store.get_health(&target.key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycles_on_interval_and_stops_on_cancel() {
        // interval is 5s
        let target = icmp_target("10.0.0.5", "router");
        let probe = scripted(&[], true);
        let monitor = MonitorLoop::new(
            target,
            probe.clone(),
            HealthStore::new(),
            notifier(0),
            Arc::new(TokioSleeper),
        );

        let token = CancellationToken::new();
        let handle = monitor.spawn(token.clone());

        // cycles at 0s, 5s and 10s
        tokio::time::sleep(Duration::from_secs(12)).await;
        token.cancel();
        handle.await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }
}
