//! Listener callbacks, bound contexts and the event view they receive.

use std::fmt;
use std::sync::Arc;

use propwatch_core::{ListenerResult, Object, Value};
use uuid::Uuid;

/// Opaque token identifying the context a listener was registered with.
///
/// Contexts let callers register the same callback several times and later
/// remove only the registrations bound to one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerContext(Uuid);

impl ListenerContext {
    /// Create a new random context.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The view of one dispatched event handed to a listener.
///
/// Observers emit arguments in a fixed layout: the observed object, the
/// property name, then operation-specific values (see [`Event::payload`]).
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    name: &'a str,
    context: Option<&'a ListenerContext>,
    args: &'a [Value],
}

impl<'a> Event<'a> {
    /// Create an event view.
    pub fn new(name: &'a str, context: Option<&'a ListenerContext>, args: &'a [Value]) -> Self {
        Self {
            name,
            context,
            args,
        }
    }

    /// The event name that fired.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The context the listener was registered with.
    pub fn context(&self) -> Option<&'a ListenerContext> {
        self.context
    }

    /// All arguments.
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index)
    }

    /// The observed object (argument 0).
    pub fn target(&self) -> Option<&'a Object> {
        self.arg(0).and_then(Value::as_object)
    }

    /// The property name (argument 1).
    pub fn property(&self) -> Option<&'a str> {
        self.arg(1).and_then(Value::as_str)
    }

    /// Operation-specific arguments after the object and property name.
    ///
    /// - `get:before*`: the call arguments (empty for plain reads)
    /// - `get`, `get:<name>`, `get:after*`: the value, then the call arguments
    /// - `set*`: the new value, then the old value
    pub fn payload(&self) -> &'a [Value] {
        self.args.get(2..).unwrap_or(&[])
    }
}

/// Receiver of dispatched events.
///
/// The returned value takes part in the dispatcher's fold; return
/// [`Value::Undefined`] to stay neutral.
pub trait Listener: Send + Sync {
    /// Called for each event the listener is registered for.
    fn on_event(&self, event: &Event<'_>) -> ListenerResult<Value>;
}

impl<F> Listener for F
where
    F: Fn(&Event<'_>) -> ListenerResult<Value> + Send + Sync,
{
    fn on_event(&self, event: &Event<'_>) -> ListenerResult<Value> {
        self(event)
    }
}

struct Infallible<F>(F);

impl<F> Listener for Infallible<F>
where
    F: Fn(&Event<'_>) -> Value + Send + Sync,
{
    fn on_event(&self, event: &Event<'_>) -> ListenerResult<Value> {
        Ok((self.0)(event))
    }
}

/// Shared handle to a listener, compared by identity.
///
/// Removing listeners by callback matches handles cloned from the same
/// `Callback` (or built from the same `Arc`).
#[derive(Clone)]
pub struct Callback(Arc<dyn Listener>);

impl Callback {
    /// Wrap an infallible closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event<'_>) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(Infallible(f)))
    }

    /// Wrap a closure that may fail.
    pub fn try_new<F>(f: F) -> Self
    where
        F: Fn(&Event<'_>) -> ListenerResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wrap an existing shared listener.
    pub fn from_arc<L: Listener + 'static>(listener: Arc<L>) -> Self {
        Self(listener)
    }

    /// Invoke the listener.
    pub fn invoke(&self, event: &Event<'_>) -> ListenerResult<Value> {
        self.0.on_event(event)
    }

    /// Check whether two handles refer to the same listener.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}
