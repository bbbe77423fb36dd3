//! Notification events.
//!
//! Transition events are produced by monitor loops, summary reports by the
//! summary dispatcher, system events by the process itself.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;

use crate::domain::Target;

pub const COLOR_GREEN: u32 = 0x00FF00;
pub const COLOR_RED: u32 = 0xFF0000;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Direction of a committed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Established,
    Interrupted,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Established => "Connection Established",
            Self::Interrupted => "Connection Interrupted",
        }
    }

    /// Short verdict used in descriptions: `OK` or `KO`.
    pub fn verdict(&self) -> &'static str {
        match self {
            Self::Established => "OK",
            Self::Interrupted => "KO",
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            Self::Established => COLOR_GREEN,
            Self::Interrupted => COLOR_RED,
        }
    }
}

/// A target went up or down.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub target: Arc<Target>,
    pub status: ConnectionStatus,
    pub timestamp: DateTime<FixedOffset>,
}

impl TransitionEvent {
    pub fn new(target: Arc<Target>, status: ConnectionStatus) -> Self {
        Self {
            target,
            status,
            timestamp: Local::now().fixed_offset(),
        }
    }

    /// `PROTOCOL :: OK|KO`.
    pub fn description(&self) -> String {
        format!(
            "{} :: {}",
            self.target.protocol().label(),
            self.status.verdict()
        )
    }
}

/// A single-shot notification.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Transition(TransitionEvent),
    /// Process-level event such as startup.
    System {
        title: String,
        description: String,
        timestamp: DateTime<FixedOffset>,
    },
}

impl NotificationEvent {
    pub fn transition(target: Arc<Target>, status: ConnectionStatus) -> Self {
        Self::Transition(TransitionEvent::new(target, status))
    }

    pub fn runtime_start() -> Self {
        Self::System {
            title: "Runtime Start".to_string(),
            description: "inframon monitoring started".to_string(),
            timestamp: Local::now().fixed_offset(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Transition(event) => event.status.label(),
            Self::System { title, .. } => title,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Transition(event) => event.description(),
            Self::System { description, .. } => description.clone(),
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            Self::Transition(event) => event.status.color(),
            Self::System { .. } => COLOR_GREEN,
        }
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        match self {
            Self::Transition(event) => event.timestamp,
            Self::System { timestamp, .. } => *timestamp,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match self {
            Self::Transition(event) => Some(&event.target),
            Self::System { .. } => None,
        }
    }
}

/// Aggregate health across all targets at one instant.
#[derive(Debug, Clone)]
pub struct SummaryReport {
    /// Targets currently down, in configuration order.
    pub failing: Vec<Arc<Target>>,
    pub total: usize,
    pub timestamp: DateTime<FixedOffset>,
}

impl SummaryReport {
    pub const TITLE: &'static str = "Scheduled Report";

    pub fn new(failing: Vec<Arc<Target>>, total: usize, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            failing,
            total,
            timestamp,
        }
    }

    pub fn all_pass(&self) -> bool {
        self.failing.is_empty()
    }

    /// `All Pass` or `Failing Services`.
    pub fn status_label(&self) -> &'static str {
        if self.all_pass() {
            "All Pass"
        } else {
            "Failing Services"
        }
    }

    pub fn color(&self) -> u32 {
        if self.all_pass() { COLOR_GREEN } else { COLOR_RED }
    }

    /// One `PROTOCOL: address (service)` line per failing target.
    pub fn failing_lines(&self) -> Vec<String> {
        self.failing.iter().map(|t| t.summary_line()).collect()
    }
}

pub fn format_date(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format(DATE_FORMAT).to_string()
}

pub fn format_time(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format(TIME_FORMAT).to_string()
}
