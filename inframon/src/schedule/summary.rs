//! Scheduled summary dispatcher.
//!
//! Polls the cron schedule once per second. On a matching minute it compiles
//! the list of targets currently down and sends one aggregate report. The
//! minute it fired in is remembered so a single matching minute never fires
//! twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Timelike, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::Result;
use crate::config::SummarySchedule;
use crate::health::HealthStore;
use crate::notification::{NotificationService, SummaryReport};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct SummaryDispatcher {
    schedule: Option<SummarySchedule>,
    store: HealthStore,
    notifier: Arc<NotificationService>,
    last_fired: Option<NaiveDateTime>,
}

impl SummaryDispatcher {
    /// `schedule` is `None` when scheduled reports are disabled.
    pub fn new(
        schedule: Option<SummarySchedule>,
        store: HealthStore,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            schedule,
            store,
            notifier,
            last_fired: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Current wall-clock time in the schedule's timezone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        match self.schedule.as_ref().and_then(|s| s.timezone) {
            Some(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
            None => Local::now().fixed_offset(),
        }
    }

    /// Snapshot the store into a report.
    pub fn build_report(&self, now: DateTime<FixedOffset>) -> SummaryReport {
        SummaryReport::new(self.store.failing(), self.store.len(), now)
    }

    /// Evaluate one poll tick at `now`.
    ///
    /// Returns `None` when nothing was due, otherwise the delivery outcome.
    pub async fn tick(&mut self, now: DateTime<FixedOffset>) -> Option<Result<()>> {
        let schedule = self.schedule.as_ref()?;
        if !schedule.cron.matches(&now) {
            return None;
        }

        let minute = now.naive_local().with_second(0)?.with_nanosecond(0)?;
        if self.last_fired == Some(minute) {
            return None;
        }
        self.last_fired = Some(minute);

        let report = self.build_report(now);
        info!(
            failing = report.failing.len(),
            total = report.total,
            status = report.status_label(),
            "sending scheduled report"
        );
        let outcome = self.notifier.notify_summary(&report).await;
        if let Err(e) = &outcome {
            error!(error = %e, "failed to deliver scheduled report");
        }
        Some(outcome)
    }

    /// Poll until cancelled. Returns immediately when disabled.
    pub async fn run(mut self, token: CancellationToken) {
        let Some(schedule) = self.schedule.as_ref() else {
            info!("scheduled report disabled");
            return;
        };

        let expression = schedule.cron.to_string();
        let next = schedule
            .cron
            .next_after(&self.now())
            .map(|t| t.to_rfc3339());
        info!(
            cron = %expression,
            timezone = schedule.timezone.map(|tz| tz.name()).unwrap_or("local"),
            next = next.as_deref(),
            "scheduled report enabled"
        );

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now = self.now();
                    self.tick(now).await;
                }
            }
        }

        info!("scheduled report stopped");
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }
}
