//! Concurrency-safe map from target identity to its committed health.
//!
//! Each record is written by exactly one monitor loop; the reporter and the
//! summary dispatcher only read. The lock is never held across an await point.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{Target, TargetKey};

/// Last committed verdict of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthRecord {
    pub healthy: bool,
    /// Failed verdicts since the last success.
    pub consecutive_failures: u32,
}

impl Default for HealthRecord {
    /// Targets start healthy until proven otherwise.
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
        }
    }
}

#[derive(Default)]
struct Inner {
    records: HashMap<TargetKey, HealthRecord>,
    /// Registration order, used to list targets in configuration order.
    targets: Vec<Arc<Target>>,
}

/// Cheaply clonable handle to the shared store.
#[derive(Clone, Default)]
pub struct HealthStore {
    inner: Arc<RwLock<Inner>>,
}

impl HealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store with every target registered in the initial state.
    pub fn with_targets<'a>(targets: impl IntoIterator<Item = &'a Arc<Target>>) -> Self {
        let store = Self::new();
        for target in targets {
            store.register(Arc::clone(target));
        }
        store
    }

    /// Add a target with the default record. Re-registering keeps the existing record.
    pub fn register(&self, target: Arc<Target>) {
        let mut inner = self.inner.write();
        let key = target.key();
        if inner.records.contains_key(&key) {
            return;
        }
        inner.records.insert(key, HealthRecord::default());
        inner.targets.push(target);
    }

    pub fn set_health(&self, key: &TargetKey, healthy: bool) {
        self.inner.write().records.entry(key.clone()).or_default().healthy = healthy;
    }

    /// Committed health; unknown targets read as healthy.
    pub fn get_health(&self, key: &TargetKey) -> bool {
        self.inner
            .read()
            .records
            .get(key)
            .map(|record| record.healthy)
            .unwrap_or(true)
    }

    pub fn record(&self, key: &TargetKey) -> Option<HealthRecord> {
        self.inner.read().records.get(key).copied()
    }

    /// Replace the full record of a target in one write.
    pub fn update(&self, key: &TargetKey, record: HealthRecord) {
        self.inner.write().records.insert(key.clone(), record);
    }

    /// Consistent copy of every registered target with its record, in registration order.
    pub fn snapshot(&self) -> Vec<(Arc<Target>, HealthRecord)> {
        let inner = self.inner.read();
        inner
            .targets
            .iter()
            .map(|target| {
                let record = inner
                    .records
                    .get(&target.key())
                    .copied()
                    .unwrap_or_default();
                (Arc::clone(target), record)
            })
            .collect()
    }

    /// Targets whose committed state is down, in registration order.
    pub fn failing(&self) -> Vec<Arc<Target>> {
        self.snapshot()
            .into_iter()
            .filter(|(_, record)| !record.healthy)
            .map(|(target, _)| target)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
