//! inframon library crate.
//!
//! Probes ICMP and HTTP targets, debounces their up/down state and sends
//! notifications on transitions and on a cron schedule.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod health;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod panic_hook;
pub mod probe;
pub mod reporter;
pub mod schedule;
pub mod utils;

pub use error::{Error, Result};
