//! Named multi-listener event dispatcher.
//!
//! Listeners are registered per event name and fire in registration order.
//! Each trigger folds the listeners' return values: a truthy return replaces
//! the running result, anything falsy leaves it alone. The final result is
//! therefore the last truthy value returned, or `Undefined`.

use std::collections::HashMap;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{trace, warn};

use propwatch_core::{ListenerError, ListenerResult, Value};

use crate::listener::{Callback, Event, ListenerContext};
use crate::scheduler::Scheduler;

/// One `{callback, context}` entry under an event name.
#[derive(Debug, Clone)]
struct Registration {
    callback: Callback,
    context: Option<ListenerContext>,
    once: bool,
}

impl Registration {
    /// A registration matches when it satisfies every given criterion.
    fn matches(&self, callback: Option<&Callback>, context: Option<&ListenerContext>) -> bool {
        callback.is_none_or(|cb| *cb == self.callback)
            && context.is_none_or(|ctx| self.context.as_ref() == Some(ctx))
    }
}

/// Aggregate result of one trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerOutcome {
    value: Value,
    vetoed: bool,
    listeners: usize,
    failures: usize,
}

impl TriggerOutcome {
    /// Fold one listener return value into the outcome.
    fn absorb(&mut self, value: Value) {
        if value.is_false() {
            self.vetoed = true;
        }
        if value.is_truthy() {
            self.value = value;
        }
    }

    /// The fold result: the last truthy return value, or `Undefined`.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the outcome, returning the fold result.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Whether the trigger asks to cancel the operation.
    ///
    /// A listener returning exactly `false` vetoes, unless a truthy value
    /// took over the fold.
    pub fn is_cancelled(&self) -> bool {
        self.vetoed && self.value.is_undefined()
    }

    /// Number of listeners invoked.
    pub fn listeners(&self) -> usize {
        self.listeners
    }

    /// Number of listeners that failed.
    pub fn failures(&self) -> usize {
        self.failures
    }
}

/// A snapshot of the registrations for one event, ready to be invoked.
///
/// Batches are taken at trigger time, so registrations added or removed
/// afterwards do not affect a batch that was already scheduled.
#[derive(Debug, Clone)]
pub struct ListenerBatch {
    event: String,
    registrations: Vec<Registration>,
}

impl ListenerBatch {
    /// The event name this batch dispatches.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Number of listeners in the batch.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Invoke every listener in order.
    ///
    /// A failing listener does not stop the rest; once all have run, the
    /// first failure is returned.
    pub fn invoke(&self, args: &[Value]) -> ListenerResult<TriggerOutcome> {
        let mut outcome = TriggerOutcome::default();
        let mut first_error: Option<ListenerError> = None;

        for registration in &self.registrations {
            let event = Event::new(&self.event, registration.context.as_ref(), args);
            outcome.listeners += 1;
            match registration.callback.invoke(&event) {
                Ok(value) => outcome.absorb(value),
                Err(err) => {
                    let err = err.with_event(self.event.as_str());
                    warn!(event = %self.event, error = %err.message, "Listener failed");
                    outcome.failures += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }
}

/// Publish/subscribe registry of named events.
#[derive(Default)]
pub struct EventDispatcher {
    events: RwLock<HashMap<String, Vec<Registration>>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for one or more events.
    ///
    /// A name containing whitespace is split and each token registered with
    /// the same callback and context. Duplicate registrations fire twice.
    pub fn on(
        &self,
        names: &str,
        callback: Callback,
        context: Option<ListenerContext>,
    ) -> &Self {
        self.register(names, callback, context, false)
    }

    /// Register `callback` to fire at most once.
    pub fn once(
        &self,
        names: &str,
        callback: Callback,
        context: Option<ListenerContext>,
    ) -> &Self {
        self.register(names, callback, context, true)
    }

    /// Register every `(names, callback)` pair of a map without a context.
    pub fn on_map<I, S>(&self, map: I) -> &Self
    where
        I: IntoIterator<Item = (S, Callback)>,
        S: AsRef<str>,
    {
        for (names, callback) in map {
            self.on(names.as_ref(), callback, None);
        }
        self
    }

    fn register(
        &self,
        names: &str,
        callback: Callback,
        context: Option<ListenerContext>,
        once: bool,
    ) -> &Self {
        if names.contains(char::is_whitespace) {
            for name in names.split_whitespace() {
                self.register(name, callback.clone(), context, once);
            }
            return self;
        }

        let registration = Registration {
            callback,
            context,
            once,
        };
        self.events
            .write()
            .entry(names.to_string())
            .or_default()
            .push(registration);

        trace!(event = names, once, "Registered listener");
        self
    }

    /// Remove listeners.
    ///
    /// - no arguments: remove everything
    /// - only `name`: remove every listener of that event
    /// - `callback` and/or `context` without `name`: remove, across all
    ///   events, each listener matching every given criterion
    /// - `name` with `callback` and/or `context`: the same, for one event
    ///
    /// Event names left without listeners are dropped.
    pub fn off(
        &self,
        name: Option<&str>,
        callback: Option<&Callback>,
        context: Option<&ListenerContext>,
    ) -> &Self {
        let mut events = self.events.write();

        match (name, callback.is_some() || context.is_some()) {
            (None, false) => events.clear(),
            (Some(name), false) => {
                events.remove(name);
            }
            (None, true) => {
                for registrations in events.values_mut() {
                    registrations.retain(|r| !r.matches(callback, context));
                }
                events.retain(|_, registrations| !registrations.is_empty());
            }
            (Some(name), true) => {
                if let Some(registrations) = events.get_mut(name) {
                    registrations.retain(|r| !r.matches(callback, context));
                    if registrations.is_empty() {
                        events.remove(name);
                    }
                }
            }
        }

        self
    }

    /// Remove every listener.
    pub fn clear(&self) -> &Self {
        self.off(None, None, None)
    }

    /// Check whether `name` has any listener.
    pub fn has_listeners(&self, name: &str) -> bool {
        self.events
            .read()
            .get(name)
            .is_some_and(|registrations| !registrations.is_empty())
    }

    /// Number of listeners registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.events.read().get(name).map_or(0, Vec::len)
    }

    /// Names that currently have listeners, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if no listener is registered at all.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Snapshot the listeners of `name`. Returns `None` when there are none.
    ///
    /// Once-registrations are removed as part of the snapshot.
    pub fn prepare(&self, name: &str) -> Option<ListenerBatch> {
        let events = self.events.upgradable_read();
        let registrations = events.get(name).filter(|r| !r.is_empty())?.clone();

        if registrations.iter().any(|r| r.once) {
            let mut events = RwLockUpgradableReadGuard::upgrade(events);
            if let Some(list) = events.get_mut(name) {
                list.retain(|r| !r.once);
                if list.is_empty() {
                    events.remove(name);
                }
            }
        }

        Some(ListenerBatch {
            event: name.to_string(),
            registrations,
        })
    }

    /// Synchronously invoke the listeners of `name` and fold their results.
    ///
    /// Returns an empty outcome when nothing is registered.
    pub fn trigger(&self, name: &str, args: &[Value]) -> ListenerResult<TriggerOutcome> {
        match self.prepare(name) {
            Some(batch) => batch.invoke(args),
            None => Ok(TriggerOutcome::default()),
        }
    }

    /// Schedule the listeners of `name` to run later on `scheduler`.
    ///
    /// `on_failure` sees the first listener error once the batch has run.
    /// Returns the number of listeners scheduled; zero means nothing was
    /// registered and nothing was scheduled.
    pub fn trigger_deferred<F>(
        &self,
        name: &str,
        args: Vec<Value>,
        scheduler: &dyn Scheduler,
        on_failure: F,
    ) -> usize
    where
        F: FnOnce(&ListenerError) + Send + 'static,
    {
        let Some(batch) = self.prepare(name) else {
            return 0;
        };
        let listeners = batch.len();
        scheduler.schedule(Box::new(move || {
            batch.invoke(&args).map(|_| ()).inspect_err(on_failure)
        }));
        listeners
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("events", &self.event_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::scheduler::TaskQueue;

    fn returning(value: Value) -> Callback {
        Callback::new(move |_| value.clone())
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = Arc::clone(counter);
        Callback::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Undefined
        })
    }

    #[test]
    fn test_trigger_without_listeners() {
        let dispatcher = EventDispatcher::new();
        let outcome = dispatcher.trigger("get", &[]).unwrap();
        assert_eq!(outcome, TriggerOutcome::default());
        assert_eq!(outcome.listeners(), 0);
    }

    #[test]
    fn test_fold_keeps_last_truthy_value() {
        let dispatcher = EventDispatcher::new();
        dispatcher
            .on("get", returning(Value::Undefined), None)
            .on("get", returning(Value::from(7)), None)
            .on("get", returning(Value::from(0)), None);

        let outcome = dispatcher.trigger("get", &[]).unwrap();
        assert_eq!(outcome.value(), &Value::from(7));
        assert_eq!(outcome.listeners(), 3);
    }

    #[test]
    fn test_fold_later_truthy_replaces_earlier() {
        let dispatcher = EventDispatcher::new();
        dispatcher
            .on("get", returning(Value::from(1)), None)
            .on("get", returning(Value::from("two")), None);

        let outcome = dispatcher.trigger("get", &[]).unwrap();
        assert_eq!(outcome.into_value(), Value::from("two"));
    }

    #[test]
    fn test_false_vetoes_unless_truthy_wins() {
        let dispatcher = EventDispatcher::new();
        dispatcher.on("set:before", returning(Value::Bool(false)), None);
        assert!(dispatcher.trigger("set:before", &[]).unwrap().is_cancelled());

        dispatcher.on("set:before", returning(Value::from(1)), None);
        assert!(!dispatcher.trigger("set:before", &[]).unwrap().is_cancelled());

        let other = EventDispatcher::new();
        other.on("set:before", returning(Value::from(0)), None);
        assert!(!other.trigger("set:before", &[]).unwrap().is_cancelled());
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.on(
                "set",
                Callback::new(move |_| {
                    order.lock().push(i);
                    Value::Undefined
                }),
                None,
            );
        }

        dispatcher.trigger("set", &[]).unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_whitespace_names_register_each_token() {
        let dispatcher = EventDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher.on("get  set\tset:x", counting(&counter), None);

        assert_eq!(dispatcher.event_names(), vec!["get", "set", "set:x"]);
        dispatcher.trigger("get", &[]).unwrap();
        dispatcher.trigger("set:x", &[]).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_duplicate_registrations_fire_twice() {
        let dispatcher = EventDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let cb = counting(&counter);
        dispatcher.on("get", cb.clone(), None).on("get", cb, None);

        dispatcher.trigger("get", &[]).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_on_map() {
        let dispatcher = EventDispatcher::new();
        dispatcher.on_map([
            ("get", returning(Value::Undefined)),
            ("set set:x", returning(Value::Undefined)),
        ]);
        assert_eq!(dispatcher.event_names(), vec!["get", "set", "set:x"]);
    }

    #[test]
    fn test_listener_removal_matrix() {
        let f = returning(Value::Undefined);
        let g = returning(Value::Undefined);
        let c1 = ListenerContext::new();
        let c2 = ListenerContext::new();

        let setup = || {
            let dispatcher = EventDispatcher::new();
            dispatcher
                .on("set:x", f.clone(), Some(c1))
                .on("set:x", g.clone(), Some(c2))
                .on("get", f.clone(), None);
            dispatcher
        };

        // name + callback removes only the matching listener of that event
        let dispatcher = setup();
        dispatcher.off(Some("set:x"), Some(&f), None);
        assert_eq!(dispatcher.listener_count("set:x"), 1);
        assert_eq!(dispatcher.listener_count("get"), 1);

        // callback alone removes it everywhere
        let dispatcher = setup();
        dispatcher.off(None, Some(&f), None);
        assert_eq!(dispatcher.listener_count("set:x"), 1);
        assert!(!dispatcher.has_listeners("get"));
        assert_eq!(dispatcher.event_names(), vec!["set:x"]);

        // name alone removes both regardless of callback and context
        let dispatcher = setup();
        dispatcher.off(Some("set:x"), None, None);
        assert!(!dispatcher.has_listeners("set:x"));
        assert!(dispatcher.has_listeners("get"));

        // nothing removes everything
        let dispatcher = setup();
        dispatcher.off(None, None, None);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_off_by_context_and_callback_requires_both() {
        let f = returning(Value::Undefined);
        let c1 = ListenerContext::new();
        let c2 = ListenerContext::new();
        let dispatcher = EventDispatcher::new();
        dispatcher
            .on("set", f.clone(), Some(c1))
            .on("set", f.clone(), Some(c2))
            .on("set", f.clone(), None);

        dispatcher.off(None, Some(&f), Some(&c1));
        assert_eq!(dispatcher.listener_count("set"), 2);

        dispatcher.off(Some("set"), None, Some(&c2));
        assert_eq!(dispatcher.listener_count("set"), 1);
    }

    #[test]
    fn test_off_unknown_name_is_noop() {
        let dispatcher = EventDispatcher::new();
        dispatcher.on("get", returning(Value::Undefined), None);
        dispatcher.off(Some("set"), None, None);
        dispatcher.off(Some("set"), Some(&returning(Value::Undefined)), None);
        assert_eq!(dispatcher.listener_count("get"), 1);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let dispatcher = EventDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher.once("get", counting(&counter), None);

        dispatcher.trigger("get", &[]).unwrap();
        dispatcher.trigger("get", &[]).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_off_removes_once_registration_by_callback() {
        let dispatcher = EventDispatcher::new();
        let cb = returning(Value::Undefined);
        dispatcher.once("get", cb.clone(), None);
        dispatcher.off(None, Some(&cb), None);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_failing_listener_does_not_stop_others() {
        let dispatcher = EventDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .on("set", Callback::try_new(|_| Err(ListenerError::new("first"))), None)
            .on("set", counting(&counter), None)
            .on("set", Callback::try_new(|_| Err(ListenerError::new("second"))), None);

        let err = dispatcher.trigger("set", &[]).unwrap_err();
        assert_eq!(err.message, "first");
        assert_eq!(err.event, "set");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_receives_args_and_context() {
        let dispatcher = EventDispatcher::new();
        let ctx = ListenerContext::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&seen);
        dispatcher.on(
            "get:x",
            Callback::new(move |event| {
                *sink.lock() = Some((event.context().copied(), event.args().to_vec()));
                Value::Undefined
            }),
            Some(ctx),
        );

        dispatcher.trigger("get:x", &[Value::from(1), Value::from(2)]).unwrap();
        let (context, args) = seen.lock().clone().unwrap();
        assert_eq!(context, Some(ctx));
        assert_eq!(args, vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn test_deferred_trigger_runs_on_drain() {
        let dispatcher = EventDispatcher::new();
        let queue = TaskQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher.on("set", counting(&counter), None);

        assert_eq!(dispatcher.trigger_deferred("set", vec![], &queue, |_| {}), 1);
        assert_eq!(dispatcher.trigger_deferred("get", vec![], &queue, |_| {}), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // removal after scheduling does not retract the batch
        dispatcher.clear();
        assert!(queue.run_pending().is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_trigger_reports_failure() {
        let dispatcher = EventDispatcher::new();
        let queue = TaskQueue::new();
        let failed = Arc::new(AtomicUsize::new(0));
        dispatcher.on(
            "set",
            Callback::try_new(|_| Err(ListenerError::new("boom"))),
            None,
        );

        let seen = Arc::clone(&failed);
        dispatcher.trigger_deferred("set", vec![], &queue, move |err| {
            assert_eq!(err.event, "set");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(failed.load(Ordering::SeqCst), 0);

        assert_eq!(queue.run_pending().len(), 1);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }
}
