//! Configuration types for property observers.
//!
//! [`ObserverConfig`] is the builder handed to
//! [`PropertyObserver::new`](crate::PropertyObserver::new).
//! [`ObserverSettings`] is its serializable subset, for loading from files.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use propwatch_core::Object;
use propwatch_events::{Callback, Scheduler, TurnScheduler};

use crate::context::ObservationContext;

/// Which properties an observer instruments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertySelection {
    /// Every own enumerable property of the target at observe time.
    #[default]
    All,
    /// The listed names, in order. Names need not exist yet.
    Names(Vec<String>),
    /// The keys of a mapping, in the order given. Values are ignored;
    /// metadata is always re-derived from the target.
    Mapping(serde_json::Map<String, serde_json::Value>),
}

impl PropertySelection {
    /// Resolve the selection against `target`.
    pub fn resolve(&self, target: &Object) -> Vec<String> {
        match self {
            PropertySelection::All => target.keys(),
            PropertySelection::Names(names) => names.clone(),
            PropertySelection::Mapping(mapping) => mapping.keys().cloned().collect(),
        }
    }
}

impl From<Vec<String>> for PropertySelection {
    fn from(names: Vec<String>) -> Self {
        PropertySelection::Names(names)
    }
}

impl From<Vec<&str>> for PropertySelection {
    fn from(names: Vec<&str>) -> Self {
        PropertySelection::Names(names.into_iter().map(String::from).collect())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for PropertySelection {
    fn from(mapping: serde_json::Map<String, serde_json::Value>) -> Self {
        PropertySelection::Mapping(mapping)
    }
}

/// Configuration for a property observer.
#[derive(Clone)]
pub struct ObserverConfig {
    /// Defer listener invocation to the scheduler.
    ///
    /// Deferred listeners cannot override reads or cancel writes, because
    /// their results arrive after the operation has completed. Defaults to
    /// true.
    pub async_dispatch: bool,

    /// Start observing at construction. Defaults to true.
    pub auto_observe: bool,

    /// Properties to instrument.
    pub properties: PropertySelection,

    /// Listeners registered before observation starts, as
    /// `(event names, callback)` pairs.
    pub listeners: Vec<(String, Callback)>,

    /// Enable switch and statistics store.
    pub context: ObservationContext,

    /// Where deferred listener work runs. Defaults to a [`TurnScheduler`],
    /// which runs it when the intercepted operation returns.
    pub scheduler: Arc<dyn Scheduler>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            async_dispatch: true,
            auto_observe: true,
            properties: PropertySelection::All,
            listeners: Vec::new(),
            context: ObservationContext::global(),
            scheduler: Arc::new(TurnScheduler),
        }
    }
}

impl ObserverConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set deferred dispatch.
    pub fn with_async(mut self, enabled: bool) -> Self {
        self.async_dispatch = enabled;
        self
    }

    /// Set whether construction starts observation.
    pub fn with_auto_observe(mut self, enabled: bool) -> Self {
        self.auto_observe = enabled;
        self
    }

    /// Select the properties to instrument.
    pub fn with_properties(mut self, properties: impl Into<PropertySelection>) -> Self {
        self.properties = properties.into();
        self
    }

    /// Register `callback` for one or more whitespace-separated event names.
    pub fn on(mut self, names: impl Into<String>, callback: Callback) -> Self {
        self.listeners.push((names.into(), callback));
        self
    }

    /// Use the given context instead of the global one.
    pub fn with_context(mut self, context: ObservationContext) -> Self {
        self.context = context;
        self
    }

    /// Use the given scheduler for deferred dispatch.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Synchronous dispatch, so before-listeners can override and cancel.
    pub fn synchronous() -> Self {
        Self::default().with_async(false)
    }

    /// No observation until `observe` is called.
    pub fn manual() -> Self {
        Self::default().with_auto_observe(false)
    }
}

impl std::fmt::Debug for ObserverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverConfig")
            .field("async_dispatch", &self.async_dispatch)
            .field("auto_observe", &self.auto_observe)
            .field("properties", &self.properties)
            .field(
                "listeners",
                &self.listeners.iter().map(|(names, _)| names).collect::<Vec<_>>(),
            )
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Serializable observer options. Unset fields keep the configuration's
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObserverSettings {
    /// Deferred dispatch.
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub async_dispatch: Option<bool>,

    /// Start observing at construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_observe: Option<bool>,

    /// Properties to instrument.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertySelection>,
}

impl ObserverSettings {
    /// Overlay these settings onto `config`.
    pub fn apply(self, mut config: ObserverConfig) -> ObserverConfig {
        if let Some(async_dispatch) = self.async_dispatch {
            config.async_dispatch = async_dispatch;
        }
        if let Some(auto_observe) = self.auto_observe {
            config.auto_observe = auto_observe;
        }
        if let Some(properties) = self.properties {
            config.properties = properties;
        }
        config
    }

    /// A configuration with these settings over the defaults.
    pub fn into_config(self) -> ObserverConfig {
        self.apply(ObserverConfig::default())
    }
}
