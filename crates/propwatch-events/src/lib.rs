//! propwatch Events
//!
//! This crate provides the named publish/subscribe layer observers dispatch
//! through:
//!
//! - [`EventDispatcher`]: per-name listener lists with `on`/`once`/`off`/`trigger`
//! - [`Callback`] and [`ListenerContext`]: listener identity and bound context
//! - [`Scheduler`], [`TurnScheduler`] and [`TaskQueue`]: deferred dispatch
//! - [`CollectingListener`] and [`LoggingListener`]: stock listeners
//!
//! # Event Subscription
//!
//! ```ignore
//! use propwatch_events::{Callback, EventDispatcher};
//! use propwatch_core::Value;
//!
//! let dispatcher = EventDispatcher::new();
//! dispatcher.on("get:before get:before:x", Callback::new(|_| Value::from(42)), None);
//!
//! let outcome = dispatcher.trigger("get:before:x", &[])?;
//! assert_eq!(outcome.value(), &Value::from(42));
//! ```
//!
//! # Deferred Dispatch
//!
//! ```ignore
//! use propwatch_events::TaskQueue;
//!
//! let queue = TaskQueue::new();
//! dispatcher.trigger_deferred("set", args, &queue, |err| eprintln!("{err}"));
//! // ... later, once the current operation has finished ...
//! let failures = queue.run_pending();
//! ```

pub mod dispatcher;
pub mod listener;
pub mod scheduler;
pub mod subscribers;

// Re-export main types
pub use dispatcher::{EventDispatcher, ListenerBatch, TriggerOutcome};
pub use listener::{Callback, Event, Listener, ListenerContext};
#[cfg(feature = "tokio")]
pub use scheduler::TokioScheduler;
pub use scheduler::{Scheduler, Task, TaskQueue, Turn, TurnScheduler};
pub use subscribers::{CollectingListener, LoggingListener, RecordedEvent};

pub use propwatch_core::{ListenerError, ListenerResult};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatcher::{EventDispatcher, TriggerOutcome};
    pub use crate::listener::{Callback, Event, Listener, ListenerContext};
    pub use crate::scheduler::{Scheduler, TaskQueue, TurnScheduler};
    pub use crate::subscribers::CollectingListener;
}
