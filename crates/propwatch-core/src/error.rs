//! Core error types for propwatch.
//!
//! Object operations fail for two reasons: the object model itself refuses
//! (non-configurable or non-callable properties), or code running inside an
//! accessor failed. Listener failures raised while an instrumented accessor
//! runs travel through [`ObjectError::Listener`].

use thiserror::Error;

/// Errors raised by [`Object`](crate::Object) operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectError {
    /// The property exists and is non-configurable, so it cannot be redefined.
    #[error("Property '{0}' is not configurable")]
    NotConfigurable(String),

    /// The property value is not a function.
    #[error("Property '{0}' is not callable")]
    NotCallable(String),

    /// A listener failed while the operation was being dispatched.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// A native function, getter or setter reported a failure.
    #[error("{0}")]
    Failed(String),
}

impl ObjectError {
    /// Create a failure raised by host code.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A failure reported by an event listener.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Listener for '{event}' failed: {message}")]
pub struct ListenerError {
    /// The event name being dispatched when the listener failed.
    pub event: String,
    /// Human-readable failure message.
    pub message: String,
}

impl ListenerError {
    /// Create a listener error. The event name is filled in by the dispatcher.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            event: String::new(),
            message: message.into(),
        }
    }

    /// Attach the event name this failure belongs to.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }
}

/// Result type alias for object operations.
pub type ObjectResult<T> = std::result::Result<T, ObjectError>;

/// Result type alias for listener callbacks.
pub type ListenerResult<T> = std::result::Result<T, ListenerError>;
