//! The property observer.
//!
//! A [`PropertyObserver`] instruments properties of one target object,
//! replacing each with a wrapper that drives the get, set or call protocol
//! through the observer's own [`EventDispatcher`]. `unobserve` reverses the
//! replacement exactly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use propwatch_core::{ListenerResult, Object, PropertyDescriptor, Value};
use propwatch_events::{Callback, EventDispatcher, ListenerContext, TriggerOutcome};

use crate::config::{ObserverConfig, PropertySelection};
use crate::context::ObservationContext;
use crate::error::{ObserveError, ObserveResult};
use crate::protocol::{
    Interception, ObserverCore, function_wrapper, getter_wrapper, setter_wrapper,
};
use crate::record::{PropertyKind, PropertyRecord, PropertySummary};

/// Unique identifier for an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Create a new random observer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instruments the properties of one target object.
///
/// # Example
///
/// ```ignore
/// let target = Object::new();
/// target.insert("x", 10);
///
/// let observer = PropertyObserver::new(target.clone(), ObserverConfig::synchronous())?;
/// observer.on("set:before:x", Callback::new(|_| Value::Bool(false)), None);
///
/// target.set("x", 5)?;
/// assert_eq!(target.get("x")?, Value::from(10));
/// ```
pub struct PropertyObserver {
    target: Object,
    core: Arc<ObserverCore>,
    selection: PropertySelection,
    /// Held for the whole of observe/unobserve, so lifecycle transitions
    /// never interleave.
    records: Mutex<Vec<PropertyRecord>>,
}

impl PropertyObserver {
    /// Create an observer for `target`.
    ///
    /// Listeners from the configuration are registered first; observation
    /// then starts unless `auto_observe` is off.
    pub fn new(target: Object, config: ObserverConfig) -> ObserveResult<Self> {
        let ObserverConfig {
            async_dispatch,
            auto_observe,
            properties,
            listeners,
            context,
            scheduler,
        } = config;

        let core = Arc::new(ObserverCore {
            id: ObserverId::new(),
            dispatcher: EventDispatcher::new(),
            started: AtomicBool::new(false),
            async_dispatch,
            context,
            scheduler,
        });
        for (names, callback) in listeners {
            core.dispatcher.on(&names, callback, None);
        }

        let observer = Self {
            target,
            core,
            selection: properties,
            records: Mutex::new(Vec::new()),
        };
        debug!(observer_id = %observer.id(), async_dispatch, "Created observer");

        if auto_observe {
            observer.observe()?;
        }
        Ok(observer)
    }

    /// Get the observer ID.
    pub fn id(&self) -> ObserverId {
        self.core.id
    }

    /// Start observing. A no-op when already started.
    ///
    /// Instruments every selected property. If one cannot be instrumented,
    /// the properties instrumented by this call are restored and the error
    /// is returned.
    pub fn observe(&self) -> ObserveResult<&Self> {
        let mut records = self.records.lock();
        if self.core.is_started() {
            return Ok(self);
        }
        self.core.started.store(true, Ordering::Release);

        let existing = records.len();
        for name in self.selection.resolve(&self.target) {
            if let Err(err) = self.instrument(&mut records, &name) {
                warn!(
                    observer_id = %self.id(),
                    property = %name,
                    error = %err,
                    "Observation failed, restoring instrumented properties"
                );
                self.core.started.store(false, Ordering::Release);
                let added: Vec<PropertyRecord> = records.drain(existing..).collect();
                if let Err(restore_err) = self.restore_records(added) {
                    warn!(observer_id = %self.id(), error = %restore_err, "Restore after failed observation failed");
                }
                return Err(err);
            }
        }

        info!(
            observer_id = %self.id(),
            properties = records.len(),
            async_dispatch = self.core.async_dispatch,
            "Observation started"
        );
        Ok(self)
    }

    /// Stop observing and restore every instrumented property.
    ///
    /// Each readable property's current value is read, the wrapper deleted,
    /// the original descriptor reinstalled, and the value written back when
    /// the property is writable. A no-op when nothing is observed.
    /// Deferred listener work already scheduled still runs.
    pub fn unobserve(&self) -> ObserveResult<&Self> {
        let mut records = self.records.lock();
        if !self.core.is_started() && records.is_empty() {
            return Ok(self);
        }
        self.core.started.store(false, Ordering::Release);

        let restored = records.len();
        let result = self.restore_records(std::mem::take(&mut *records));
        info!(observer_id = %self.id(), properties = restored, "Observation stopped");
        result.map(|()| self)
    }

    /// Instrument one property.
    ///
    /// The property need not exist yet. Properties already instrumented are
    /// left alone. Events fire only while the observer is started.
    pub fn create_property_observation(&self, name: &str) -> ObserveResult<&Self> {
        let mut records = self.records.lock();
        self.instrument(&mut records, name)?;
        Ok(self)
    }

    /// Remove every listener. Instrumentation stays installed on the target.
    pub fn destroy(&self) -> &Self {
        self.core.dispatcher.clear();
        debug!(observer_id = %self.id(), "Observer destroyed, listeners cleared");
        self
    }

    /// Register `callback` for one or more whitespace-separated events.
    pub fn on(&self, names: &str, callback: Callback, context: Option<ListenerContext>) -> &Self {
        self.core.dispatcher.on(names, callback, context);
        self
    }

    /// Register `callback` to fire at most once.
    pub fn once(&self, names: &str, callback: Callback, context: Option<ListenerContext>) -> &Self {
        self.core.dispatcher.once(names, callback, context);
        self
    }

    /// Remove listeners. See [`EventDispatcher::off`].
    pub fn off(
        &self,
        name: Option<&str>,
        callback: Option<&Callback>,
        context: Option<&ListenerContext>,
    ) -> &Self {
        self.core.dispatcher.off(name, callback, context);
        self
    }

    /// Fire `event` with `(target, property, ...payload)`, subject to the
    /// same gating and dispatch mode as instrumented properties.
    pub fn trigger(
        &self,
        event: &str,
        property: &str,
        payload: &[Value],
    ) -> ListenerResult<TriggerOutcome> {
        self.core.emit(event, &self.target, property, payload)
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }

    pub fn is_async(&self) -> bool {
        self.core.async_dispatch
    }

    /// Check whether `name` is currently instrumented.
    pub fn is_observing(&self, name: &str) -> bool {
        self.records.lock().iter().any(|r| r.name() == name)
    }

    /// Instrumented property names, in instrumentation order.
    pub fn observed_properties(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    /// Classification of one instrumented property.
    pub fn summary(&self, name: &str) -> Option<PropertySummary> {
        self.records
            .lock()
            .iter()
            .find(|r| r.name() == name)
            .map(PropertyRecord::summary)
    }

    /// Classification of every instrumented property.
    pub fn summaries(&self) -> Vec<PropertySummary> {
        self.records.lock().iter().map(PropertyRecord::summary).collect()
    }

    /// The observed object.
    pub fn target(&self) -> &Object {
        &self.target
    }

    /// The observer's listener registry.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.core.dispatcher
    }

    /// The enable switch and statistics store.
    pub fn context(&self) -> &ObservationContext {
        &self.core.context
    }

    fn instrument(&self, records: &mut Vec<PropertyRecord>, name: &str) -> ObserveResult<()> {
        if records.iter().any(|r| r.name() == name) {
            trace!(observer_id = %self.id(), property = name, "Property already observed");
            return Ok(());
        }

        let descriptor = self.target.get_own_property(name);
        if descriptor.as_ref().is_some_and(|d| !d.is_configurable()) {
            return Err(ObserveError::NotConfigurable {
                property: name.to_string(),
            });
        }

        let kind = PropertyKind::classify(descriptor.as_ref());
        let (cache, getter, setter) = match (&kind, &descriptor) {
            (PropertyKind::Accessor { get, set }, _) => (Value::Undefined, get.clone(), set.clone()),
            (_, Some(descriptor)) => (descriptor.value().cloned().unwrap_or_default(), None, None),
            (_, None) => (Value::Undefined, None, None),
        };
        let interception = Arc::new(Interception::new(
            Arc::clone(&self.core),
            name,
            cache,
            getter,
            setter,
        ));

        let original = match &kind {
            PropertyKind::Callable(function) => Some(function.clone()),
            _ => None,
        };
        let mut record = PropertyRecord::new(
            name.to_string(),
            descriptor,
            kind,
            Arc::clone(&interception),
        );
        let enumerable = record.is_enumerable();

        let replacement = match original {
            Some(original) => {
                let wrapper = function_wrapper(Arc::clone(&interception), original);
                record.set_installed(wrapper.clone());
                PropertyDescriptor::Data {
                    value: Value::Function(wrapper),
                    writable: true,
                    enumerable,
                    configurable: true,
                }
            }
            None => PropertyDescriptor::Accessor {
                get: record
                    .is_getable()
                    .then(|| getter_wrapper(Arc::clone(&interception))),
                set: record
                    .is_setable()
                    .then(|| setter_wrapper(Arc::clone(&interception))),
                enumerable,
                configurable: true,
            },
        };

        self.target.define_property(name, replacement)?;
        debug!(
            observer_id = %self.id(),
            property = name,
            kind = record.kind().label(),
            "Instrumented property"
        );
        records.push(record);
        Ok(())
    }

    /// Restore every record, continuing past failures. Returns the first.
    fn restore_records(&self, records: Vec<PropertyRecord>) -> ObserveResult<()> {
        let mut first_error = None;
        for record in &records {
            if let Err(err) = self.restore(record) {
                warn!(observer_id = %self.id(), property = record.name(), error = %err, "Restore failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn restore(&self, record: &PropertyRecord) -> ObserveResult<()> {
        let name = record.name();

        let mut read_error = None;
        let value = if record.is_getable() {
            match self.target.get(name) {
                Ok(value) => Some(value),
                Err(err) => {
                    read_error = Some(err);
                    None
                }
            }
        } else {
            None
        };

        self.target.delete(name);
        if let Some(descriptor) = record.descriptor() {
            self.target.define_property(name, descriptor.clone())?;
        }

        if record.is_setable() {
            if let Some(value) = value {
                // The wrapper itself must not be written over the original.
                let is_wrapper = match (&value, record.installed()) {
                    (Value::Function(function), Some(wrapper)) => function.ptr_eq(wrapper),
                    _ => false,
                };
                // A property that never existed and was never assigned stays absent.
                let never_defined = record.descriptor().is_none() && value.is_undefined();
                if !is_wrapper && !never_defined {
                    self.target.set(name, value)?;
                }
            }
        }

        debug!(observer_id = %self.id(), property = name, "Restored property");
        match read_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PropertyObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyObserver")
            .field("id", &self.id())
            .field("started", &self.is_started())
            .field("async", &self.is_async())
            .field("properties", &self.observed_properties())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use propwatch_core::{Getter, NativeFunction, ObjectError, Setter};
    use propwatch_events::{CollectingListener, ListenerError, TaskQueue};

    const ALL_EVENTS: &str = "get:before get get:after set:before set set:after";

    fn sample() -> Object {
        let target = Object::new();
        target.insert("x", 10);
        target.insert("label", "ten");
        target
    }

    fn sync_config(context: &ObservationContext) -> ObserverConfig {
        ObserverConfig::synchronous().with_context(context.clone())
    }

    fn collect(observer: &PropertyObserver, names: &str) -> Arc<CollectingListener> {
        let collector = Arc::new(CollectingListener::default());
        observer.on(names, Callback::from_arc(Arc::clone(&collector)), None);
        collector
    }

    fn descriptors(target: &Object) -> BTreeMap<String, Option<PropertyDescriptor>> {
        target
            .own_property_names()
            .into_iter()
            .map(|name| {
                let descriptor = target.get_own_property(&name);
                (name, descriptor)
            })
            .collect()
    }

    #[test]
    fn test_round_trip_restores_descriptors() {
        let target = sample();
        target.insert("flag", true);
        let before = descriptors(&target);

        let context = ObservationContext::new();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        assert!(observer.is_started());
        assert!(target.get_own_property("x").unwrap().is_accessor());

        observer.unobserve().unwrap();
        assert!(!observer.is_started());
        assert!(observer.observed_properties().is_empty());
        assert_eq!(descriptors(&target), before);
        assert_eq!(target.own_property_names(), vec!["x", "label", "flag"]);
    }

    #[test]
    fn test_round_trip_keeps_mutations() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();

        target.set("x", 11).unwrap();
        observer.unobserve().unwrap();

        assert_eq!(
            target.get_own_property("x"),
            Some(PropertyDescriptor::data(11))
        );
    }

    #[test]
    fn test_instrumentation_keeps_enumerability() {
        let context = ObservationContext::new();
        let target = sample();
        target
            .define_property("hidden", PropertyDescriptor::data(1).with_enumerable(false))
            .unwrap();

        let observer = PropertyObserver::new(
            target.clone(),
            sync_config(&context).with_properties(vec!["x", "hidden"]),
        )
        .unwrap();

        assert!(target.get_own_property("x").unwrap().is_enumerable());
        assert!(!target.get_own_property("hidden").unwrap().is_enumerable());
        assert!(!observer.summary("hidden").unwrap().is_enumerable);
    }

    #[test]
    fn test_get_protocol_event_order_and_payload() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        let collector = collect(
            &observer,
            "get:before:x get:before get:x get get:after:x get:after",
        );

        assert_eq!(target.get("x").unwrap(), Value::from(10));
        assert_eq!(
            collector.names(),
            vec!["get:before:x", "get:before", "get:x", "get", "get:after:x", "get:after"]
        );

        let events = collector.events();
        assert!(events[0].args[0].as_object().unwrap().ptr_eq(&target));
        assert_eq!(events[0].property(), Some("x"));
        assert!(events[0].payload().is_empty());
        assert_eq!(events[2].payload(), &[Value::from(10)]);
    }

    #[test]
    fn test_set_protocol_event_order_and_payload() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        let collector = collect(
            &observer,
            "set:before:x set:before set:x set set:after:x set:after",
        );

        target.set("x", 5).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(5));
        assert_eq!(
            collector.names(),
            vec!["set:before:x", "set:before", "set:x", "set", "set:after:x", "set:after"]
        );
        for event in collector.events() {
            assert_eq!(event.payload(), &[Value::from(5), Value::from(10)]);
        }
    }

    #[test]
    fn test_unqualified_events_fire_for_every_property() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        let collector = collect(&observer, "get");

        target.get("x").unwrap();
        target.get("label").unwrap();
        let properties: Vec<_> = collector
            .events()
            .iter()
            .map(|e| e.property().unwrap_or_default().to_string())
            .collect();
        assert_eq!(properties, vec!["x", "label"]);
    }

    #[test]
    fn test_set_cancellation() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on("set:before", Callback::new(|_| Value::Bool(false)), None);
        let collector = collect(&observer, "set:x set set:after:x set:after");

        target.set("x", 5).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(10));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_qualified_cancellation_skips_unqualified_before() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on("set:before:x", Callback::new(|_| Value::Bool(false)), None);
        let collector = collect(&observer, "set:before set");

        target.set("x", 5).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(10));
        assert!(collector.is_empty());

        // Other properties are unaffected.
        target.set("label", "eleven").unwrap();
        assert_eq!(collector.names(), vec!["set:before", "set"]);
    }

    #[test]
    fn test_only_false_cancels() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();

        for falsy in [Value::Null, Value::from(0), Value::from(""), Value::Undefined] {
            observer.off(None, None, None);
            observer.on("set:before:x", Callback::new(move |_| falsy.clone()), None);
            target.set("x", 1).unwrap();
            assert_eq!(target.get("x").unwrap(), Value::from(1));
            target.set("x", 10).unwrap();
        }
    }

    #[test]
    fn test_truthy_return_overrides_earlier_false() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on("set:before:x", Callback::new(|_| Value::Bool(false)), None);
        observer.on("set:before:x", Callback::new(|_| Value::from("ok")), None);

        target.set("x", 5).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(5));
    }

    #[test]
    fn test_sync_override_skips_original_getter() {
        let context = ObservationContext::new();
        let reads = Arc::new(AtomicUsize::new(0));
        let target = Object::new();
        let counter = Arc::clone(&reads);
        target
            .define_property(
                "x",
                PropertyDescriptor::accessor(
                    Some(Getter::new(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(Value::from(10))
                    })),
                    None,
                ),
            )
            .unwrap();

        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on("get:before:x", Callback::new(|_| Value::from(42)), None);
        let collector = collect(&observer, "get:x");

        assert_eq!(target.get("x").unwrap(), Value::from(42));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(collector.events()[0].payload(), &[Value::from(42)]);
    }

    #[test]
    fn test_unqualified_before_overrides_when_qualified_is_undefined() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on("get:before:x", Callback::new(|_| Value::Undefined), None);
        observer.on("get:before", Callback::new(|_| Value::from(7)), None);

        assert_eq!(target.get("x").unwrap(), Value::from(7));
        assert_eq!(target.get("label").unwrap(), Value::from(7));
    }

    #[test]
    fn test_async_before_listener_cannot_override() {
        let context = ObservationContext::new();
        let queue = Arc::new(TaskQueue::new());
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            ObserverConfig::new()
                .with_context(context.clone())
                .with_scheduler(queue.clone()),
        )
        .unwrap();
        assert!(observer.is_async());

        observer.on("get:before:x", Callback::new(|_| Value::from(42)), None);
        let collector = collect(&observer, "get:x");

        assert_eq!(target.get("x").unwrap(), Value::from(10));
        assert!(collector.is_empty());
        assert_eq!(queue.pending(), 2);

        assert!(queue.run_pending().is_empty());
        assert_eq!(collector.events()[0].payload(), &[Value::from(10)]);
    }

    #[test]
    fn test_async_before_listener_cannot_cancel() {
        let context = ObservationContext::new();
        let queue = Arc::new(TaskQueue::new());
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            ObserverConfig::new()
                .with_context(context.clone())
                .with_scheduler(queue.clone()),
        )
        .unwrap();
        observer.on("set:before", Callback::new(|_| Value::Bool(false)), None);

        target.set("x", 5).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(5));
        queue.run_pending();
    }

    #[test]
    fn test_deferred_listeners_still_fire_after_unobserve() {
        let context = ObservationContext::new();
        let queue = Arc::new(TaskQueue::new());
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            ObserverConfig::new()
                .with_context(context.clone())
                .with_scheduler(queue.clone()),
        )
        .unwrap();
        let collector = collect(&observer, "set:x");

        target.set("x", 5).unwrap();
        observer.unobserve().unwrap();
        assert!(collector.is_empty());

        queue.run_pending();
        assert_eq!(collector.len(), 1);
        assert!(collector.events()[0].args[0].as_object().unwrap().ptr_eq(&target));
    }

    #[test]
    fn test_default_config_delivers_events_after_each_operation() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            ObserverConfig::default().with_context(context.clone()),
        )
        .unwrap();
        assert!(observer.is_async());
        let collector = collect(&observer, "get get:x get:after");

        for _ in 0..100 {
            assert_eq!(target.get("x").unwrap(), Value::from(10));
        }
        assert_eq!(collector.len(), 300);
        assert_eq!(context.triggers(), 300);
    }

    #[test]
    fn test_default_scheduler_waits_for_outermost_operation() {
        let context = ObservationContext::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let target = sample();
        let body_log = Arc::clone(&log);
        target.insert(
            "read_x",
            NativeFunction::new("read_x", move |this, _| {
                let x = this.get("x")?;
                body_log.lock().push("body");
                Ok(x)
            }),
        );

        let observer = PropertyObserver::new(
            target.clone(),
            ObserverConfig::default().with_context(context.clone()),
        )
        .unwrap();
        let listener_log = Arc::clone(&log);
        observer.on(
            "get:x",
            Callback::new(move |_| {
                listener_log.lock().push("listener");
                Value::Undefined
            }),
            None,
        );

        assert_eq!(target.call("read_x", &[]).unwrap(), Value::from(10));
        assert_eq!(*log.lock(), vec!["body", "listener"]);
    }

    #[test]
    fn test_default_scheduler_counts_deferred_failures() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            ObserverConfig::default().with_context(context.clone()),
        )
        .unwrap();
        observer.on(
            "set",
            Callback::try_new(|_| Err(ListenerError::new("rejected"))),
            None,
        );

        target.set("x", 3).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(3));
        assert_eq!(context.failed_triggers(), 1);
    }

    #[test]
    fn test_mapping_selection_keeps_given_order() {
        let context = ObservationContext::new();
        let target = Object::new();
        target.insert("b", 1);
        target.insert("a", 2);

        let mut mapping = serde_json::Map::new();
        mapping.insert("b".to_string(), serde_json::json!({}));
        mapping.insert("a".to_string(), serde_json::json!({ "isSetable": false }));
        let observer = PropertyObserver::new(
            target.clone(),
            sync_config(&context).with_properties(mapping),
        )
        .unwrap();
        assert_eq!(observer.observed_properties(), vec!["b", "a"]);

        observer.unobserve().unwrap();
        assert_eq!(target.own_property_names(), vec!["b", "a"]);
    }

    #[test]
    fn test_function_pass_through() {
        let context = ObservationContext::new();
        let target = Object::new();
        let sum = NativeFunction::new("sum", |_, args| {
            Ok(Value::from(args.iter().filter_map(Value::as_number).sum::<f64>()))
        });
        target.insert("y", sum.clone());

        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        assert!(observer.summary("y").unwrap().is_function);
        let collector = collect(&observer, "get:before:y get:y");

        let args = [Value::from(1), Value::from(2), Value::from(3)];
        assert_eq!(target.call("y", &args).unwrap(), Value::from(6));

        let events = collector.events();
        assert_eq!(events[0].name, "get:before:y");
        assert_eq!(events[0].payload(), &args);
        assert_eq!(events[1].name, "get:y");
        assert_eq!(
            events[1].payload(),
            &[Value::from(6), Value::from(1), Value::from(2), Value::from(3)]
        );

        // The installed wrapper is a writable data property.
        let installed = target.get_own_property("y").unwrap();
        assert!(installed.is_data());
        assert!(installed.is_writable());
        assert!(!installed.value().unwrap().as_function().unwrap().ptr_eq(&sum));
    }

    #[test]
    fn test_function_override_skips_original() {
        let context = ObservationContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let target = Object::new();
        target.insert(
            "y",
            NativeFunction::new("y", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from("computed"))
            }),
        );

        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on("get:before", Callback::new(|_| Value::from("cached")), None);

        assert_eq!(target.call("y", &[]).unwrap(), Value::from("cached"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_function_receives_target_as_receiver() {
        let context = ObservationContext::new();
        let target = sample();
        target.insert(
            "double",
            NativeFunction::new("double", |this, _| {
                let x = this.get("x")?.as_number().unwrap_or_default();
                Ok(Value::from(x * 2.0))
            }),
        );

        let _observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        assert_eq!(target.call("double", &[]).unwrap(), Value::from(20));
    }

    #[test]
    fn test_function_restored_exactly() {
        let context = ObservationContext::new();
        let target = Object::new();
        let original = NativeFunction::new("y", |_, _| Ok(Value::Null));
        target.insert("y", original.clone());

        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.unobserve().unwrap();

        let restored = target.get("y").unwrap();
        assert!(restored.as_function().unwrap().ptr_eq(&original));
    }

    #[test]
    fn test_non_configurable_property_fails_and_rolls_back() {
        let context = ObservationContext::new();
        let target = sample();
        target
            .define_property("locked", PropertyDescriptor::data(1).with_configurable(false))
            .unwrap();
        let before = descriptors(&target);

        let err = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap_err();
        assert!(matches!(
            err,
            ObserveError::NotConfigurable { ref property } if property == "locked"
        ));
        assert_eq!(descriptors(&target), before);
    }

    #[test]
    fn test_create_property_observation_rejects_non_configurable() {
        let context = ObservationContext::new();
        let target = Object::new();
        target
            .define_property("locked", PropertyDescriptor::data(1).with_configurable(false))
            .unwrap();

        let observer =
            PropertyObserver::new(target.clone(), sync_config(&context).with_auto_observe(false))
                .unwrap();
        assert!(observer.create_property_observation("locked").is_err());
        assert!(!observer.is_observing("locked"));
    }

    #[test]
    fn test_disabled_context_is_a_fast_path() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on("get:before:x", Callback::new(|_| Value::from(42)), None);
        observer.on("set:before:x", Callback::new(|_| Value::Bool(false)), None);
        let collector = collect(&observer, ALL_EVENTS);

        context.disable();
        assert_eq!(target.get("x").unwrap(), Value::from(10));
        target.set("x", 3).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(3));
        assert!(collector.is_empty());
        assert_eq!(context.triggers(), 0);

        context.enable();
        assert_eq!(target.get("x").unwrap(), Value::from(42));
        assert!(!collector.is_empty());
    }

    #[test]
    fn test_context_is_shared_between_observers() {
        let context = ObservationContext::new();
        let first = sample();
        let second = sample();
        let a = PropertyObserver::new(first.clone(), sync_config(&context)).unwrap();
        let b = PropertyObserver::new(second.clone(), sync_config(&context)).unwrap();
        let collected_a = collect(&a, "get");
        let collected_b = collect(&b, "get");

        a.context().disable();
        first.get("x").unwrap();
        second.get("x").unwrap();
        assert!(collected_a.is_empty());
        assert!(collected_b.is_empty());
    }

    #[test]
    fn test_statistics_count_triggers_with_listeners() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        collect(&observer, "get get:x set");

        target.get("x").unwrap();
        target.get("label").unwrap();
        target.set("x", 1).unwrap();

        assert_eq!(context.triggers(), 4);
        assert_eq!(context.triggers_for_event("get"), 2);
        assert_eq!(context.triggers_for_event("get:x"), 1);
        assert_eq!(context.triggers_for_event("get:after"), 0);
        assert_eq!(context.triggers_for_property("x"), 3);
        assert_eq!(context.triggers_for_property("label"), 1);
    }

    #[test]
    fn test_listener_failure_surfaces_in_sync_mode() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        observer.on(
            "get:x",
            Callback::try_new(|_| Err(ListenerError::new("boom"))),
            None,
        );
        let collector = collect(&observer, "get:x get");

        let err = target.get("x").unwrap_err();
        assert_eq!(
            err,
            ObjectError::Listener(ListenerError::new("boom").with_event("get:x"))
        );
        // The second listener of the failing event still ran; later events did not fire.
        assert_eq!(collector.names(), vec!["get:x"]);
        assert_eq!(context.failed_triggers(), 1);
    }

    #[test]
    fn test_deferred_listener_failure_is_reported_by_queue() {
        let context = ObservationContext::new();
        let queue = Arc::new(TaskQueue::new());
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            ObserverConfig::new()
                .with_context(context.clone())
                .with_scheduler(queue.clone()),
        )
        .unwrap();
        observer.on(
            "set",
            Callback::try_new(|_| Err(ListenerError::new("boom"))),
            None,
        );

        target.set("x", 1).unwrap();
        let failures = queue.run_pending();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].event, "set");
        assert_eq!(context.failed_triggers(), 1);
    }

    #[test]
    fn test_destroy_keeps_instrumentation() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        collect(&observer, ALL_EVENTS);

        observer.destroy();
        assert!(observer.dispatcher().is_empty());
        assert!(observer.is_started());
        assert!(target.get_own_property("x").unwrap().is_accessor());

        target.set("x", 2).unwrap();
        assert_eq!(target.get("x").unwrap(), Value::from(2));
    }

    #[test]
    fn test_lifecycle_transitions_are_idempotent() {
        let context = ObservationContext::new();
        let target = sample();
        let observer =
            PropertyObserver::new(target.clone(), sync_config(&context).with_auto_observe(false))
                .unwrap();

        // Never started.
        observer.unobserve().unwrap();
        assert!(target.get_own_property("x").unwrap().is_data());

        observer.observe().unwrap();
        observer.observe().unwrap();
        assert_eq!(observer.observed_properties(), vec!["x", "label"]);

        observer.unobserve().unwrap();
        observer.unobserve().unwrap();
        assert_eq!(target.get_own_property("x"), Some(PropertyDescriptor::data(10)));

        // Observation can start again.
        observer.observe().unwrap();
        assert!(observer.is_observing("x"));
    }

    #[test]
    fn test_selected_missing_property_is_created_on_restore() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            sync_config(&context).with_properties(vec!["late"]),
        )
        .unwrap();
        assert_eq!(observer.observed_properties(), vec!["late"]);
        assert!(!observer.summary("late").unwrap().defined);
        let collector = collect(&observer, "set:late");

        assert_eq!(target.get("late").unwrap(), Value::Undefined);
        target.set("late", 3).unwrap();
        assert_eq!(collector.events()[0].payload(), &[Value::from(3), Value::Undefined]);

        observer.unobserve().unwrap();
        assert_eq!(target.get_own_property("late"), Some(PropertyDescriptor::data(3)));
    }

    #[test]
    fn test_unassigned_missing_property_stays_absent() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            sync_config(&context).with_properties(vec!["late"]),
        )
        .unwrap();
        assert!(target.has_own_property("late"));

        observer.unobserve().unwrap();
        assert!(!target.has_own_property("late"));
    }

    #[test]
    fn test_setter_only_accessor_gets_only_set_wrapper() {
        let context = ObservationContext::new();
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);
        let target = Object::new();
        target
            .define_property(
                "sink",
                PropertyDescriptor::accessor(
                    None,
                    Some(Setter::new(move |_, value| {
                        sink.lock().push(value);
                        Ok(())
                    })),
                ),
            )
            .unwrap();

        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        let summary = observer.summary("sink").unwrap();
        assert!(summary.is_setable);
        assert!(!summary.is_getable);
        assert!(target.get_own_property("sink").unwrap().getter().is_none());

        let collector = collect(&observer, "set:sink");
        target.set("sink", 1).unwrap();
        assert_eq!(*written.lock(), vec![Value::from(1)]);
        assert_eq!(collector.events()[0].payload(), &[Value::from(1), Value::Undefined]);
    }

    #[test]
    fn test_read_only_property_stays_read_only() {
        let context = ObservationContext::new();
        let target = Object::new();
        let original = PropertyDescriptor::data(1).with_writable(false);
        target.define_property("fixed", original.clone()).unwrap();

        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        let collector = collect(&observer, "set:before set");
        target.set("fixed", 2).unwrap();
        assert_eq!(target.get("fixed").unwrap(), Value::from(1));
        assert!(collector.is_empty());

        observer.unobserve().unwrap();
        assert_eq!(target.get_own_property("fixed"), Some(original));
    }

    #[test]
    fn test_accessor_round_trip_uses_original_accessors() {
        let context = ObservationContext::new();
        let store = Arc::new(Mutex::new(Value::from(1)));
        let (read, write) = (Arc::clone(&store), Arc::clone(&store));
        let getter = Getter::new(move |_| Ok(read.lock().clone()));
        let setter = Setter::new(move |_, value| {
            *write.lock() = value;
            Ok(())
        });
        let target = Object::new();
        let original = PropertyDescriptor::accessor(Some(getter), Some(setter));
        target.define_property("v", original.clone()).unwrap();

        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        let collector = collect(&observer, "set:v");
        target.set("v", 2).unwrap();
        assert_eq!(*store.lock(), Value::from(2));
        assert_eq!(collector.events()[0].payload(), &[Value::from(2), Value::from(1)]);

        observer.unobserve().unwrap();
        assert_eq!(target.get_own_property("v"), Some(original));
        assert_eq!(target.get("v").unwrap(), Value::from(2));
    }

    #[test]
    fn test_pre_registered_property_is_silent_until_observe() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            sync_config(&context)
                .with_auto_observe(false)
                .with_properties(vec!["label"]),
        )
        .unwrap();
        observer.create_property_observation("x").unwrap();
        let collector = collect(&observer, "get");

        target.get("x").unwrap();
        assert!(collector.is_empty());

        observer.observe().unwrap();
        assert_eq!(observer.observed_properties(), vec!["x", "label"]);
        target.get("x").unwrap();
        assert_eq!(collector.len(), 1);

        observer.unobserve().unwrap();
        assert!(target.get_own_property("x").unwrap().is_data());
    }

    #[test]
    fn test_config_listeners_and_once() {
        let context = ObservationContext::new();
        let collector = Arc::new(CollectingListener::default());
        let target = sample();
        let observer = PropertyObserver::new(
            target.clone(),
            sync_config(&context).on("get:x set:x", Callback::from_arc(Arc::clone(&collector))),
        )
        .unwrap();
        observer.once("get:before:x", Callback::new(|_| Value::from(99)), None);

        assert_eq!(target.get("x").unwrap(), Value::from(99));
        assert_eq!(target.get("x").unwrap(), Value::from(10));
        target.set("x", 1).unwrap();
        assert_eq!(collector.names(), vec!["get:x", "get:x", "set:x"]);
    }

    #[test]
    fn test_off_by_context() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        let owner = ListenerContext::new();
        let collector = Arc::new(CollectingListener::default());
        observer.on("get set", Callback::from_arc(Arc::clone(&collector)), Some(owner));

        target.get("x").unwrap();
        observer.off(None, None, Some(&owner));
        target.get("x").unwrap();

        assert_eq!(collector.len(), 1);
        assert_eq!(collector.events()[0].context, Some(owner));
        assert!(observer.dispatcher().is_empty());
    }

    #[test]
    fn test_manual_trigger_is_gated() {
        let context = ObservationContext::new();
        let target = sample();
        let observer =
            PropertyObserver::new(target.clone(), sync_config(&context).with_auto_observe(false))
                .unwrap();
        observer.on("custom", Callback::new(|_| Value::from("seen")), None);

        // Stopped observers do not dispatch.
        let outcome = observer.trigger("custom", "x", &[]).unwrap();
        assert_eq!(outcome.listeners(), 0);

        observer.observe().unwrap();
        let outcome = observer.trigger("custom", "x", &[Value::from(1)]).unwrap();
        assert_eq!(outcome.value(), &Value::from("seen"));
        assert_eq!(context.triggers_for_property("x"), 1);
    }

    #[test]
    fn test_summaries_serialize() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();

        let summaries = observer.summaries();
        assert_eq!(summaries.len(), 2);
        let json = serde_json::to_value(&summaries[0]).unwrap();
        assert_eq!(json["name"], "x");
        assert_eq!(json["kind"], "data");
        assert_eq!(json["is_getable"], true);
        assert_eq!(json["is_setable"], true);
        assert_eq!(json["has_getter"], false);
    }

    #[test]
    fn test_cached_value_tracks_writes() {
        let context = ObservationContext::new();
        let target = sample();
        let observer = PropertyObserver::new(target.clone(), sync_config(&context)).unwrap();
        target.set("x", 12).unwrap();

        let records = observer.records.lock();
        assert_eq!(records[0].cached_value(), Value::from(12));
    }
}
