//! Target monitoring.
//!
//! - Retry policy producing one verdict per interval
//! - Debounced up/down state machine
//! - Per-target monitor loop feeding the health store and notifications

mod retry;
mod service;
mod tracker;

pub use retry::{DEFAULT_STEP, ProbeResult, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use service::{CycleOutcome, MonitorLoop};
pub use tracker::{HealthTracker, Transition};
