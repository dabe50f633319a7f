//! Error types for property observation.

use thiserror::Error;

use propwatch_core::ObjectError;

/// Errors raised while installing or removing property instrumentation.
#[derive(Debug, Error)]
pub enum ObserveError {
    /// The property is non-configurable and cannot be instrumented.
    #[error("Cannot observe non-configurable property '{property}'")]
    NotConfigurable {
        /// The property name.
        property: String,
    },

    /// An object operation failed while installing or restoring a property.
    #[error("Object error: {0}")]
    Object(#[from] ObjectError),
}

/// Errors parsing an event name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventNameError {
    /// The name does not start with `get` or `set`.
    #[error("Unknown operation in event name '{0}'")]
    UnknownOperation(String),

    /// The name ends with a separator but no property.
    #[error("Empty property in event name '{0}'")]
    EmptyProperty(String),
}

/// Result type alias for observation operations.
pub type ObserveResult<T> = std::result::Result<T, ObserveError>;
