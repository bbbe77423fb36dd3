//! Wiring of the monitoring engine.
//!
//! One task per target, one health reporter, one summary dispatcher. All of
//! them share the health store and stop on the same cancellation token.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::config::SummarySchedule;
use crate::domain::Target;
use crate::health::HealthStore;
use crate::monitor::{MonitorLoop, Sleeper, TokioSleeper};
use crate::notification::NotificationService;
use crate::probe::ProbeAdapter;
use crate::reporter::HealthReporter;
use crate::schedule::SummaryDispatcher;

pub struct Engine {
    targets: Vec<Arc<Target>>,
    store: HealthStore,
    notifier: Arc<NotificationService>,
    health_check_interval: Duration,
    summary: Option<SummarySchedule>,
    sleeper: Arc<dyn Sleeper>,
}

impl Engine {
    pub fn new(
        targets: Vec<Arc<Target>>,
        notifier: Arc<NotificationService>,
        health_check_interval: Duration,
    ) -> Self {
        let store = HealthStore::with_targets(&targets);
        Self {
            targets,
            store,
            notifier,
            health_check_interval,
            summary: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_summary(mut self, schedule: Option<SummarySchedule>) -> Self {
        self.summary = schedule;
        self
    }

    pub fn store(&self) -> &HealthStore {
        &self.store
    }

    /// Build a probe for every target, then spawn every task.
    ///
    /// Probe construction errors are returned before anything is spawned.
    pub fn start<F>(self, probe_for: F, token: &CancellationToken) -> Result<EngineHandle>
    where
        F: Fn(&Target) -> Result<Arc<dyn ProbeAdapter>>,
    {
        let probes = self
            .targets
            .iter()
            .map(|target| probe_for(target.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut tasks = Vec::with_capacity(self.targets.len() + 2);
        for (target, probe) in self.targets.iter().zip(probes) {
            let monitor = MonitorLoop::new(
                Arc::clone(target),
                probe,
                self.store.clone(),
                Arc::clone(&self.notifier),
                Arc::clone(&self.sleeper),
            );
            tasks.push(monitor.spawn(token.child_token()));
        }

        let reporter = HealthReporter::new(self.store.clone(), self.health_check_interval);
        tasks.push(reporter.spawn(token.child_token()));

        let dispatcher = SummaryDispatcher::new(
            self.summary,
            self.store.clone(),
            Arc::clone(&self.notifier),
        );
        tasks.push(dispatcher.spawn(token.child_token()));

        info!(targets = self.targets.len(), "monitoring engine started");
        Ok(EngineHandle {
            store: self.store,
            tasks,
        })
    }
}

/// Running engine.
pub struct EngineHandle {
    store: HealthStore,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn store(&self) -> &HealthStore {
        &self.store
    }

    /// Wait for every task, giving up after `timeout`.
    pub async fn join(self, timeout: Duration) {
        match tokio::time::timeout(timeout, join_all(self.tasks)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "engine task ended abnormally");
                    }
                }
            }
            Err(_) => warn!(
                timeout_secs = timeout.as_secs(),
                "engine tasks did not stop in time, abandoning them"
            ),
        }
    }
}
