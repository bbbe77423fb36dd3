//! Cron-driven scheduling of summary reports.

mod cron;
mod summary;

pub use cron::CronSchedule;
pub use summary::SummaryDispatcher;
