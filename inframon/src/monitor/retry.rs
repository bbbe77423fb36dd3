//! Per-interval retry policy.
//!
//! One monitoring interval calls the probe up to `max_retries + 1` times and
//! condenses the attempts into a single [`ProbeResult`]. The pause before retry
//! `n` (1-based) is `n * step`.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::Target;
use crate::error::ProbeError;
use crate::probe::{Measurement, ProbeAdapter};

/// Default backoff step.
pub const DEFAULT_STEP: Duration = Duration::from_secs(1);

/// Suspends the current task. Injected so retry timing can be tested without real time.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested pauses and returns immediately after yielding.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    recorded: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.recorded.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Linear retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub step: Duration,
}

/// Outcome of one monitoring interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,
    pub measurement: Option<Measurement>,
    /// Last error seen, if the interval failed.
    pub error: Option<ProbeError>,
    /// Probe calls made, including the first one.
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, step: Duration) -> Self {
        Self { max_retries, step }
    }

    /// Policy for a target: its retry buffer bounds the retries.
    pub fn for_target(target: &Target) -> Self {
        Self::new(target.retry_buffer, DEFAULT_STEP)
    }

    /// Pause before retry `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        self.step.saturating_mul(retry)
    }

    /// Run one interval's worth of attempts.
    ///
    /// Returns `None` when `token` is cancelled before a verdict is reached; any
    /// in-flight probe is abandoned.
    pub async fn attempt(
        &self,
        probe: &dyn ProbeAdapter,
        target: &Target,
        sleeper: &dyn Sleeper,
        token: &CancellationToken,
    ) -> Option<ProbeResult> {
        let mut attempts = 0;

        loop {
            if token.is_cancelled() {
                return None;
            }

            attempts += 1;
            let outcome = tokio::select! {
                _ = token.cancelled() => return None,
                outcome = probe.probe(target) => outcome,
            };

            let err = match outcome {
                Ok(measurement) => {
                    return Some(ProbeResult {
                        success: true,
                        measurement: Some(measurement),
                        error: None,
                        attempts,
                    });
                }
                Err(err) => err,
            };

            let retry = attempts;
            if !err.is_retryable() || retry > self.max_retries {
                return Some(ProbeResult {
                    success: false,
                    measurement: None,
                    error: Some(err),
                    attempts,
                });
            }

            let delay = self.delay_before_retry(retry);
            debug!(
                address = %target.address,
                protocol = %target.protocol(),
                retry,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying probe after transient error"
            );
            tokio::select! {
                _ = token.cancelled() => return None,
                _ = sleeper.sleep(delay) => {}
            }
        }
    }
}
