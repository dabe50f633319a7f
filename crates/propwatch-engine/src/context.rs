//! Shared observation context: the global enable switch and trigger
//! statistics.
//!
//! Every observer holds a handle to one context. The process-wide context
//! returned by [`ObservationContext::global`] is the default; tests and
//! embedders can hand observers an isolated one instead.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

struct ContextState {
    enabled: AtomicBool,
    triggers: AtomicU64,
    failed_triggers: AtomicU64,
    by_event: DashMap<String, u64>,
    by_property: DashMap<String, u64>,
}

/// Handle to a shared enable flag and statistics store.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct ObservationContext {
    state: Arc<ContextState>,
}

impl ObservationContext {
    /// Create an isolated context, enabled, with zeroed statistics.
    pub fn new() -> Self {
        Self {
            state: Arc::new(ContextState {
                enabled: AtomicBool::new(true),
                triggers: AtomicU64::new(0),
                failed_triggers: AtomicU64::new(0),
                by_event: DashMap::new(),
                by_property: DashMap::new(),
            }),
        }
    }

    /// The process-wide context.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<ObservationContext> = OnceLock::new();
        GLOBAL.get_or_init(ObservationContext::new).clone()
    }

    /// Check whether two handles share state.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Check whether events are enabled.
    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable events for every observer sharing this context.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::Release);
    }

    /// Enable events.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Disable events. Instrumented properties then behave like the
    /// originals, and no trigger is counted.
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Count one trigger of `event` on `property`.
    pub fn record_trigger(&self, event: &str, property: &str) {
        self.state.triggers.fetch_add(1, Ordering::Relaxed);
        *self.state.by_event.entry(event.to_string()).or_insert(0) += 1;
        *self.state.by_property.entry(property.to_string()).or_insert(0) += 1;
    }

    /// Count one trigger whose listeners failed.
    pub fn record_failure(&self) {
        self.state.failed_triggers.fetch_add(1, Ordering::Relaxed);
    }

    /// Total triggers.
    pub fn triggers(&self) -> u64 {
        self.state.triggers.load(Ordering::Relaxed)
    }

    /// Triggers whose listeners failed.
    pub fn failed_triggers(&self) -> u64 {
        self.state.failed_triggers.load(Ordering::Relaxed)
    }

    /// Triggers of one event name.
    pub fn triggers_for_event(&self, event: &str) -> u64 {
        self.state.by_event.get(event).map_or(0, |count| *count)
    }

    /// Triggers on one property name, across all event names.
    pub fn triggers_for_property(&self, property: &str) -> u64 {
        self.state.by_property.get(property).map_or(0, |count| *count)
    }

    /// Get a snapshot of the statistics.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            enabled: self.is_enabled(),
            triggers: self.triggers(),
            failed_triggers: self.failed_triggers(),
            triggers_by_event_name: self
                .state
                .by_event
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            triggers_by_property_name: self
                .state
                .by_property
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }
}

impl Default for ObservationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObservationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationContext")
            .field("enabled", &self.is_enabled())
            .field("triggers", &self.triggers())
            .finish()
    }
}

/// Point-in-time copy of a context's statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Whether events were enabled.
    pub enabled: bool,
    /// Total triggers.
    pub triggers: u64,
    /// Triggers whose listeners failed.
    pub failed_triggers: u64,
    /// Triggers per event name.
    pub triggers_by_event_name: BTreeMap<String, u64>,
    /// Triggers per property name.
    pub triggers_by_property_name: BTreeMap<String, u64>,
}

impl StatisticsSnapshot {
    /// Event names by trigger count, highest first.
    pub fn top_events(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut events: Vec<(&str, u64)> = self
            .triggers_by_event_name
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        events.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        events.truncate(limit);
        events
    }
}
