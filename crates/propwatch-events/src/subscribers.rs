//! Stock listeners: in-memory collection and tracing output.

use std::time::Instant;

use parking_lot::RwLock;

use propwatch_core::{ListenerResult, Value};

use crate::listener::{Event, Listener, ListenerContext};

/// An owned copy of a dispatched event.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// Event name.
    pub name: String,
    /// Registration context.
    pub context: Option<ListenerContext>,
    /// Arguments, including the object and property name.
    pub args: Vec<Value>,
    /// When the event was received.
    pub at: Instant,
}

impl RecordedEvent {
    /// The property name (argument 1).
    pub fn property(&self) -> Option<&str> {
        self.args.get(1).and_then(Value::as_str)
    }

    /// Operation-specific arguments after the object and property name.
    pub fn payload(&self) -> &[Value] {
        self.args.get(2..).unwrap_or(&[])
    }
}

impl From<&Event<'_>> for RecordedEvent {
    fn from(event: &Event<'_>) -> Self {
        Self {
            name: event.name().to_string(),
            context: event.context().copied(),
            args: event.args().to_vec(),
            at: Instant::now(),
        }
    }
}

/// A listener that records events for later analysis.
///
/// Always returns `Undefined`, so it never influences a fold.
pub struct CollectingListener {
    events: RwLock<Vec<RecordedEvent>>,
    max_events: usize,
}

impl CollectingListener {
    /// Create a collector keeping at most `max_events` events.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Names of collected events, in arrival order.
    pub fn names(&self) -> Vec<String> {
        self.events.read().iter().map(|e| e.name.clone()).collect()
    }

    /// Collected events with the given name.
    pub fn named(&self, name: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for CollectingListener {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl Listener for CollectingListener {
    fn on_event(&self, event: &Event<'_>) -> ListenerResult<Value> {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push(RecordedEvent::from(event));
        }
        Ok(Value::Undefined)
    }
}

/// A listener that logs every event through `tracing`.
pub struct LoggingListener {
    /// Level events are logged at.
    pub log_level: tracing::Level,
}

impl LoggingListener {
    /// Create a logging listener at DEBUG.
    pub fn new() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.log_level = level;
        self
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener for LoggingListener {
    fn on_event(&self, event: &Event<'_>) -> ListenerResult<Value> {
        let name = event.name();
        let property = event.property().unwrap_or_default();
        let payload = Value::Array(event.payload().to_vec());

        match self.log_level {
            tracing::Level::ERROR => {
                tracing::error!(event = name, property, payload = %payload, "Property event")
            }
            tracing::Level::WARN => {
                tracing::warn!(event = name, property, payload = %payload, "Property event")
            }
            tracing::Level::INFO => {
                tracing::info!(event = name, property, payload = %payload, "Property event")
            }
            tracing::Level::DEBUG => {
                tracing::debug!(event = name, property, payload = %payload, "Property event")
            }
            _ => {
                tracing::trace!(event = name, property, payload = %payload, "Property event")
            }
        }
        Ok(Value::Undefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::dispatcher::EventDispatcher;
    use crate::listener::Callback;

    #[test]
    fn test_collecting_listener() {
        let collector = CollectingListener::new(100);
        let args = vec![Value::Null, Value::from("x"), Value::from(5)];
        collector.on_event(&Event::new("get:x", None, &args)).unwrap();

        assert_eq!(collector.len(), 1);
        let events = collector.events();
        assert_eq!(events[0].name, "get:x");
        assert_eq!(events[0].property(), Some("x"));
        assert_eq!(events[0].payload(), &[Value::from(5)]);
    }

    #[test]
    fn test_collecting_listener_max_events() {
        let collector = CollectingListener::new(2);
        for i in 0..5 {
            let name = format!("event_{i}");
            collector.on_event(&Event::new(&name, None, &[])).unwrap();
        }
        assert_eq!(collector.len(), 2); // Should be capped at max
    }

    #[test]
    fn test_collecting_listener_through_dispatcher() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(CollectingListener::default());
        let callback = Callback::from_arc(Arc::clone(&collector));

        dispatcher.on("get set", callback.clone(), None);
        dispatcher.trigger("set", &[]).unwrap();
        dispatcher.trigger("get", &[]).unwrap();
        assert_eq!(collector.names(), vec!["set", "get"]);
        assert_eq!(collector.named("get").len(), 1);

        dispatcher.off(None, Some(&Callback::from_arc(Arc::clone(&collector))), None);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_logging_listener_is_neutral() {
        let listener = LoggingListener::new().with_level(tracing::Level::TRACE);
        let args = vec![Value::Null, Value::from("x"), Value::from(1)];
        let result = listener.on_event(&Event::new("set:x", None, &args)).unwrap();
        assert!(result.is_undefined());
    }
}
