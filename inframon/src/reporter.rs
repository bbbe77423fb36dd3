//! Periodic health reporter.
//!
//! Every sweep logs `PASS` or `FAIL` for each registered target. The reporter
//! only reads the store and never notifies.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::health::HealthStore;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub passing: usize,
    pub failing: usize,
}

pub struct HealthReporter {
    store: HealthStore,
    interval: Duration,
}

impl HealthReporter {
    pub fn new(store: HealthStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Log the current state of every target.
    pub fn sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        for (target, record) in self.store.snapshot() {
            if record.healthy {
                summary.passing += 1;
                info!(
                    address = %target.address,
                    service = %target.service,
                    protocol = %target.protocol(),
                    "health check [PASS]"
                );
            } else {
                summary.failing += 1;
                warn!(
                    address = %target.address,
                    service = %target.service,
                    protocol = %target.protocol(),
                    consecutive_failures = record.consecutive_failures,
                    "health check [FAIL]"
                );
            }
        }

        info!(
            passing = summary.passing,
            failing = summary.failing,
            "health sweep complete"
        );
        summary
    }

    /// Sweep every interval until cancelled. The first sweep runs after one interval.
    ///
    /// Returns the number of sweeps performed.
    pub async fn run(self, token: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweeps = 0;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep();
                    sweeps += 1;
                }
            }
        }

        info!(sweeps, "health reporter stopped");
        sweeps
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(token).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::events::fixtures::{http_target, icmp_target};

    #[test]
    fn test_sweep_counts() {
        let router = icmp_target("10.0.0.5", "router");
        let grafana = http_target("https://grafana.internal", "grafana");
        let wiki = http_target("https://wiki.internal", "wiki");
        let store = HealthStore::with_targets([&router, &grafana, &wiki]);
        store.set_health(&wiki.key(), false);

        let reporter = HealthReporter::new(store.clone(), Duration::from_secs(60));
        assert_eq!(
            reporter.sweep(),
            SweepSummary {
                passing: 2,
                failing: 1
            }
        );

        // read-only
        assert!(store.get_health(&router.key()));
        assert!(!store.get_health(&wiki.key()));
    }

    #[test]
    fn test_sweep_sees_latest_write() {
        let router = icmp_target("10.0.0.5", "router");
        let store = HealthStore::with_targets([&router]);
        let reporter = HealthReporter::new(store.clone(), Duration::from_secs(60));

        assert_eq!(reporter.sweep().failing, 0);
        store.set_health(&router.key(), false);
        assert_eq!(reporter.sweep().failing, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_on_interval_and_stops() {
        let store = HealthStore::with_targets([&icmp_target("10.0.0.5", "router")]);
        let reporter = HealthReporter::new(store, Duration::from_secs(30));
        let token = CancellationToken::new();
        let handle = tokio::spawn(reporter.run(token.clone()));

        // sweeps at 30s, 60s and 90s
        tokio::time::sleep(Duration::from_secs(95)).await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), 3);
    }
}
