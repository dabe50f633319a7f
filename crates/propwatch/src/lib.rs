//! # propwatch - Property Lifecycle Events
//!
//! propwatch instruments the properties of an object so that every read,
//! write and method call emits events to registered listeners. Listeners can
//! inspect operations, override reads, cancel writes, and the
//! instrumentation can be removed again, restoring the object exactly.
//!
//! ## Features
//!
//! - **Interception**: data, accessor and function properties
//! - **Control**: before-listeners override reads and calls or veto writes
//! - **Dispatch**: synchronous, or deferred to a task queue
//! - **Global switch**: disable every observer sharing a context at once
//! - **Statistics**: trigger counts per event and per property
//!
//! ## Quick Start
//!
//! ```ignore
//! use propwatch::prelude::*;
//!
//! let runtime = Propwatch::builder().with_async(false).build();
//!
//! let target = Object::new();
//! target.insert("x", 10);
//!
//! let observer = runtime.observe(target.clone())?;
//! observer.on("set:before:x", Callback::new(|_| Value::Bool(false)), None);
//!
//! target.set("x", 5)?;
//! assert_eq!(target.get("x")?, Value::from(10));
//!
//! observer.unobserve()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                   propwatch (facade)                    │
//! │                  ┌──────────────────┐                   │
//! │                  │ Propwatch Builder│                   │
//! │                  └────────┬─────────┘                   │
//! │                           │                             │
//! │  ┌──────────────────┬─────┴────────────┬─────────────┐  │
//! │  │ propwatch-engine │ propwatch-events │ propwatch-  │  │
//! │  │ (observer,       │ (dispatcher,     │ core        │  │
//! │  │  protocols)      │  scheduling)     │ (objects)   │  │
//! │  └──────────────────┴──────────────────┴─────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::debug;

use propwatch_core::{ListenerError, Object};
use propwatch_engine::{
    ObservationContext, ObserveResult, ObserverConfig, ObserverSettings, PropertyObserver,
    StatisticsSnapshot,
};
use propwatch_events::{Callback, Scheduler, TaskQueue};

// Re-export from sub-crates
pub use propwatch_core;
pub use propwatch_engine;
pub use propwatch_events;

/// Main entry point for propwatch.
pub struct Propwatch;

impl Propwatch {
    /// Create a new runtime builder.
    pub fn builder() -> PropwatchBuilder {
        PropwatchBuilder::new()
    }

    /// Create a runtime with default configuration.
    pub fn with_defaults() -> PropwatchRuntime {
        PropwatchBuilder::new().build()
    }
}

/// Builder for configuring a propwatch runtime.
pub struct PropwatchBuilder {
    context: ObservationContext,
    async_dispatch: bool,
    listeners: Vec<(String, Callback)>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl PropwatchBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            context: ObservationContext::global(),
            async_dispatch: true,
            listeners: Vec::new(),
            scheduler: None,
        }
    }

    /// Share `context` instead of the process-wide one.
    pub fn with_context(mut self, context: ObservationContext) -> Self {
        self.context = context;
        self
    }

    /// Use a fresh context owned by this runtime.
    pub fn with_isolated_context(self) -> Self {
        self.with_context(ObservationContext::new())
    }

    /// Enable or disable deferred dispatch for every observer.
    pub fn with_async(mut self, enabled: bool) -> Self {
        self.async_dispatch = enabled;
        self
    }

    /// Register a listener on every observer the runtime creates.
    pub fn with_listener(mut self, names: impl Into<String>, callback: Callback) -> Self {
        self.listeners.push((names.into(), callback));
        self
    }

    /// Run deferred listeners on `scheduler` instead of the runtime's queue.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build the runtime.
    ///
    /// Unless a scheduler was given, deferred listeners wait in the
    /// runtime's queue until [`PropwatchRuntime::run_pending`]. Pass a
    /// [`TurnScheduler`](propwatch_events::TurnScheduler) to run them as
    /// each operation returns instead.
    pub fn build(self) -> PropwatchRuntime {
        let queue = Arc::new(TaskQueue::new());
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::clone(&queue) as Arc<dyn Scheduler>);

        debug!(
            async_dispatch = self.async_dispatch,
            listeners = self.listeners.len(),
            "Built propwatch runtime"
        );

        PropwatchRuntime {
            context: self.context,
            queue,
            scheduler,
            async_dispatch: self.async_dispatch,
            listeners: self.listeners,
        }
    }
}

impl Default for PropwatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured propwatch runtime.
pub struct PropwatchRuntime {
    context: ObservationContext,
    queue: Arc<TaskQueue>,
    scheduler: Arc<dyn Scheduler>,
    async_dispatch: bool,
    listeners: Vec<(String, Callback)>,
}

impl PropwatchRuntime {
    /// The context shared by this runtime's observers.
    pub fn context(&self) -> &ObservationContext {
        &self.context
    }

    /// The runtime's task queue.
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Observer configuration carrying the runtime's defaults.
    pub fn config(&self) -> ObserverConfig {
        self.listeners.iter().fold(
            ObserverConfig::new()
                .with_async(self.async_dispatch)
                .with_context(self.context.clone())
                .with_scheduler(Arc::clone(&self.scheduler)),
            |config, (names, callback)| config.on(names.clone(), callback.clone()),
        )
    }

    /// Observe every enumerable property of `target`.
    pub fn observe(&self, target: Object) -> ObserveResult<PropertyObserver> {
        PropertyObserver::new(target, self.config())
    }

    /// Observe `target` with `settings` applied over the runtime's defaults.
    pub fn observe_with(
        &self,
        target: Object,
        settings: ObserverSettings,
    ) -> ObserveResult<PropertyObserver> {
        PropertyObserver::new(target, settings.apply(self.config()))
    }

    /// Run deferred listener work queued on the runtime's queue.
    ///
    /// Returns the failures of the listeners that ran.
    pub fn run_pending(&self) -> Vec<ListenerError> {
        self.queue.run_pending()
    }

    /// Snapshot of the context's statistics.
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.context.snapshot()
    }

    /// Enable events for every observer sharing the context.
    pub fn enable_events(&self) {
        self.context.enable();
    }

    /// Disable events for every observer sharing the context.
    pub fn disable_events(&self) {
        self.context.disable();
    }
}

impl std::fmt::Debug for PropwatchRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropwatchRuntime")
            .field("context", &self.context)
            .field("async_dispatch", &self.async_dispatch)
            .field("pending", &self.queue.pending())
            .finish()
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Propwatch, PropwatchBuilder, PropwatchRuntime};

    // Object model
    pub use propwatch_core::{
        Getter, NativeFunction, Object, ObjectError, PropertyDescriptor, Setter, Value,
    };

    // Events
    pub use propwatch_events::{
        Callback, CollectingListener, Event, EventDispatcher, ListenerContext, ListenerError,
        LoggingListener, Scheduler, TaskQueue,
    };

    // Engine
    pub use propwatch_engine::{
        EventName, ObservationContext, ObserveError, ObserverConfig, ObserverSettings,
        PropertyObserver, PropertySelection, StatisticsSnapshot,
    };

    // Common std types
    pub use std::sync::Arc;
}
