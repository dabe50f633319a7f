//! The get, set and call interception protocols.
//!
//! Installed wrappers hold an [`Interception`], never the observer itself,
//! so dropping an observer does not leak through its target.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace};

use propwatch_core::{Getter, ListenerResult, NativeFunction, Object, ObjectResult, Setter, Value};
use propwatch_events::{EventDispatcher, Scheduler, TriggerOutcome, Turn};

use crate::context::ObservationContext;
use crate::event_name::{GET, GET_AFTER, GET_BEFORE, PropertyEvents, SET, SET_AFTER, SET_BEFORE};
use crate::observer::ObserverId;

/// State shared between an observer and every wrapper it installs.
pub(crate) struct ObserverCore {
    pub(crate) id: ObserverId,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) started: AtomicBool,
    pub(crate) async_dispatch: bool,
    pub(crate) context: ObservationContext,
    pub(crate) scheduler: Arc<dyn Scheduler>,
}

impl ObserverCore {
    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Fire `event` with `(this, property, ...payload)`.
    ///
    /// Nothing happens, and nothing is counted, while events are disabled,
    /// the observer is stopped, or `event` has no listener. In async mode the
    /// listeners are scheduled and the returned outcome is always empty.
    pub(crate) fn emit(
        &self,
        event: &str,
        this: &Object,
        property: &str,
        payload: &[Value],
    ) -> ListenerResult<TriggerOutcome> {
        if !self.context.is_enabled()
            || !self.is_started()
            || !self.dispatcher.has_listeners(event)
        {
            return Ok(TriggerOutcome::default());
        }
        let _turn = Turn::enter();

        let mut args = Vec::with_capacity(payload.len() + 2);
        args.push(Value::Object(this.clone()));
        args.push(Value::from(property));
        args.extend_from_slice(payload);

        if self.async_dispatch {
            let context = self.context.clone();
            let listeners = self.dispatcher.trigger_deferred(
                event,
                args,
                self.scheduler.as_ref(),
                move |_| context.record_failure(),
            );
            if listeners > 0 {
                self.record(event, property, listeners);
            }
            return Ok(TriggerOutcome::default());
        }

        let Some(batch) = self.dispatcher.prepare(event) else {
            return Ok(TriggerOutcome::default());
        };
        self.record(event, property, batch.len());
        batch
            .invoke(&args)
            .inspect_err(|_| self.context.record_failure())
    }

    fn record(&self, event: &str, property: &str, listeners: usize) {
        self.context.record_trigger(event, property);
        trace!(
            observer_id = %self.id,
            event,
            property,
            listeners,
            deferred = self.async_dispatch,
            "Trigger"
        );
    }
}

/// Interception state for one property.
pub(crate) struct Interception {
    core: Arc<ObserverCore>,
    property: String,
    events: PropertyEvents,
    cache: RwLock<Value>,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Interception {
    pub(crate) fn new(
        core: Arc<ObserverCore>,
        property: &str,
        cache: Value,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> Self {
        Self {
            core,
            property: property.to_string(),
            events: PropertyEvents::for_property(property),
            cache: RwLock::new(cache),
            getter,
            setter,
        }
    }

    pub(crate) fn cached_value(&self) -> Value {
        self.cache.read().clone()
    }

    fn read_original(&self, this: &Object) -> ObjectResult<Value> {
        match &self.getter {
            Some(getter) => getter.get(this),
            None => Ok(self.cached_value()),
        }
    }

    fn write_original(&self, this: &Object, value: Value) -> ObjectResult<()> {
        match &self.setter {
            Some(setter) => setter.set(this, value),
            None => {
                *self.cache.write() = value;
                Ok(())
            }
        }
    }

    fn emit(&self, event: &str, this: &Object, payload: &[Value]) -> ObjectResult<TriggerOutcome> {
        Ok(self.core.emit(event, this, &self.property, payload)?)
    }

    /// The qualified then the unqualified before-get event. The first
    /// non-undefined fold result wins.
    fn before_get(&self, this: &Object, args: &[Value]) -> ObjectResult<Value> {
        let result = self.emit(&self.events.get_before, this, args)?.into_value();
        if !result.is_undefined() {
            return Ok(result);
        }
        Ok(self.emit(GET_BEFORE, this, args)?.into_value())
    }

    fn after_get(&self, this: &Object, value: &Value, args: &[Value]) -> ObjectResult<()> {
        let mut payload = Vec::with_capacity(args.len() + 1);
        payload.push(value.clone());
        payload.extend_from_slice(args);

        for event in [self.events.get.as_str(), GET, self.events.get_after.as_str(), GET_AFTER] {
            self.emit(event, this, &payload)?;
        }
        Ok(())
    }

    /// Get protocol.
    pub(crate) fn get(&self, this: &Object) -> ObjectResult<Value> {
        if !self.core.context.is_enabled() {
            return self.read_original(this);
        }
        let _turn = Turn::enter();

        let mut value = self.before_get(this, &[])?;
        if value.is_undefined() {
            value = self.read_original(this)?;
        }
        self.after_get(this, &value, &[])?;
        Ok(value)
    }

    /// Set protocol. Listeners returning exactly `false` before the write
    /// cancel it.
    ///
    /// Each protocol runs inside a [`Turn`], so deferred listeners fire once
    /// the outermost intercepted operation has returned.
    pub(crate) fn set(&self, this: &Object, value: Value) -> ObjectResult<()> {
        if !self.core.context.is_enabled() {
            return self.write_original(this, value);
        }
        let _turn = Turn::enter();

        let old_value = self.read_original(this)?;
        let payload = [value.clone(), old_value];

        for event in [self.events.set_before.as_str(), SET_BEFORE] {
            if self.emit(event, this, &payload)?.is_cancelled() {
                debug!(observer_id = %self.core.id, property = %self.property, event, "Write cancelled");
                return Ok(());
            }
        }

        self.write_original(this, value)?;

        for event in [self.events.set.as_str(), SET, self.events.set_after.as_str(), SET_AFTER] {
            self.emit(event, this, &payload)?;
        }
        Ok(())
    }

    /// Call protocol. A before-listener result replaces the call entirely.
    pub(crate) fn call(
        &self,
        this: &Object,
        original: &NativeFunction,
        args: &[Value],
    ) -> ObjectResult<Value> {
        if !self.core.context.is_enabled() {
            return original.call(this, args);
        }
        let _turn = Turn::enter();

        let mut result = self.before_get(this, args)?;
        if result.is_undefined() {
            result = original.call(this, args)?;
        }
        self.after_get(this, &result, args)?;
        Ok(result)
    }
}

impl std::fmt::Debug for Interception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interception")
            .field("property", &self.property)
            .field("cache", &*self.cache.read())
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// Wrapper function installed in place of a callable property.
pub(crate) fn function_wrapper(
    interception: Arc<Interception>,
    original: NativeFunction,
) -> NativeFunction {
    let name = original.name().to_string();
    NativeFunction::new(name, move |this, args| interception.call(this, &original, args))
}

pub(crate) fn getter_wrapper(interception: Arc<Interception>) -> Getter {
    Getter::new(move |this| interception.get(this))
}

pub(crate) fn setter_wrapper(interception: Arc<Interception>) -> Setter {
    Setter::new(move |this, value| interception.set(this, value))
}
