//! Named monotonic counters.
//!
//! Counters are created through a [`CounterRegistry`], which is the handle the
//! reporting side reads from. Asking the registry twice for the same name
//! returns the same underlying counter.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::DashMap;

/// Namespace shared by the per-case iteration counters so reports can group
/// them together.
pub const CASE_COUNTER_PREFIX: &str = "iterations-";

/// A named counter that only goes up.
#[derive(Debug, Clone)]
pub struct ExecutionCounter {
    name: Arc<str>,
    value: Arc<AtomicU64>,
}

impl ExecutionCounter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Owns every counter created during a run.
#[derive(Debug, Clone, Default)]
pub struct CounterRegistry {
    counters: Arc<DashMap<Arc<str>, ExecutionCounter>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter called `name`, creating it on first use.
    pub fn counter(&self, name: &str) -> ExecutionCounter {
        if let Some(existing) = self.counters.get(name) {
            return existing.clone();
        }
        let name: Arc<str> = Arc::from(name);
        self.counters
            .entry(Arc::clone(&name))
            .or_insert_with(|| ExecutionCounter {
                name,
                value: Arc::new(AtomicU64::new(0)),
            })
            .clone()
    }

    /// Counter for a case, named `iterations-<case>`.
    pub fn case_counter(&self, case: &str) -> ExecutionCounter {
        self.counter(&format!("{CASE_COUNTER_PREFIX}{case}"))
    }

    /// Point in time copy of every counter, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().get()))
            .collect()
    }
}
