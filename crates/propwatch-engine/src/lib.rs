//! propwatch Engine
//!
//! This crate instruments the properties of an [`Object`](propwatch_core::Object)
//! so that reads, writes and calls emit lifecycle events:
//!
//! - [`PropertyObserver`]: install, remove and drive the instrumentation
//! - [`ObserverConfig`]: dispatch mode, property selection and listeners
//! - [`ObservationContext`]: shared enable switch and trigger statistics
//! - [`EventName`]: the `<operation>[:<phase>][:<property>]` grammar
//!
//! # Protocols
//!
//! Reads fire `get:before:<p>` then `get:before`; the first non-undefined
//! result replaces the read. `get:<p>`, `get`, `get:after:<p>` and
//! `get:after` follow with the value. Calls of function properties use the
//! same events, with the call arguments appended.
//!
//! Writes fire `set:before:<p>` then `set:before`; a listener returning
//! `false` cancels the write. `set:<p>`, `set`, `set:after:<p>` and
//! `set:after` follow with the new and old values.
//!
//! Overrides and cancellation need synchronous dispatch. With the default
//! asynchronous dispatch, listeners run later on the configured scheduler.

pub mod config;
pub mod context;
pub mod error;
pub mod event_name;
pub mod observer;
mod protocol;
pub mod record;

pub use config::{ObserverConfig, ObserverSettings, PropertySelection};
pub use context::{ObservationContext, StatisticsSnapshot};
pub use error::{EventNameError, ObserveError, ObserveResult};
pub use event_name::{EventName, Operation, Phase, PropertyEvents};
pub use observer::{ObserverId, PropertyObserver};
pub use record::{PropertyKind, PropertyRecord, PropertySummary};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ObserverConfig, PropertySelection};
    pub use crate::context::ObservationContext;
    pub use crate::error::{ObserveError, ObserveResult};
    pub use crate::observer::PropertyObserver;
}
