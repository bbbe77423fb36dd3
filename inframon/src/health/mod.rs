//! Shared health state.

mod store;

pub use store::{HealthRecord, HealthStore};
