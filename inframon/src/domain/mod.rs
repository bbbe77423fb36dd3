//! Domain types shared by every component.

mod target;

pub use target::{ProbeOptions, Protocol, Target, TargetKey};
