//! Debounced up/down state machine of a single target.
//!
//! Failures are debounced: the target goes down once the failure streak
//! exceeds the retry buffer. Recovery is immediate on the first success.

use crate::health::HealthRecord;

/// A committed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTracker {
    retry_buffer: u32,
    healthy: bool,
    consecutive_failures: u32,
}

impl HealthTracker {
    /// New tracker in the optimistic initial state: healthy, no failures.
    pub fn new(retry_buffer: u32) -> Self {
        Self::from_record(retry_buffer, HealthRecord::default())
    }

    pub fn from_record(retry_buffer: u32, record: HealthRecord) -> Self {
        Self {
            retry_buffer,
            healthy: record.healthy,
            consecutive_failures: record.consecutive_failures,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record(&self) -> HealthRecord {
        HealthRecord {
            healthy: self.healthy,
            consecutive_failures: self.consecutive_failures,
        }
    }

    /// Feed one interval verdict; returns the transition it caused, if any.
    pub fn observe(&mut self, success: bool) -> Option<Transition> {
        if success {
            self.consecutive_failures = 0;
            if !self.healthy {
                self.healthy = true;
                return Some(Transition::Up);
            }
            return None;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.healthy && self.consecutive_failures > self.retry_buffer {
            self.healthy = false;
            return Some(Transition::Down);
        }
        None
    }
}
