//! Deferred dispatch.
//!
//! Asynchronous observers do not run listeners inline. They hand a [`Task`]
//! to a [`Scheduler`], which runs it after the current operation completes.
//! [`TurnScheduler`] runs tasks when the outermost [`Turn`] on the current
//! thread ends. [`TaskQueue`] is the explicit executor: tasks accumulate
//! until the owner drains the queue with [`TaskQueue::run_pending`].

use std::cell::RefCell;
use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{debug, error};

use propwatch_core::{ListenerError, ListenerResult};

/// A unit of deferred listener work.
pub type Task = Box<dyn FnOnce() -> ListenerResult<()> + Send + 'static>;

/// Something that runs tasks after the current turn.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run once the current operation has completed.
    fn schedule(&self, task: Task);
}

/// FIFO task queue drained by its owner.
#[derive(Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Check if no task is waiting.
    pub fn is_idle(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Run the oldest task, if any.
    pub fn run_next(&self) -> Option<ListenerResult<()>> {
        // Pop before running so tasks can schedule more work.
        let task = self.tasks.lock().pop_front()?;
        Some(task())
    }

    /// Run tasks until the queue is empty, including tasks scheduled while
    /// draining.
    ///
    /// Failures do not stop the drain. They are logged and returned; this is
    /// the only place deferred listener errors surface.
    pub fn run_pending(&self) -> Vec<ListenerError> {
        let mut failures = Vec::new();
        let mut executed = 0usize;

        while let Some(result) = self.run_next() {
            executed += 1;
            if let Err(err) = result {
                error!(event = %err.event, error = %err.message, "Deferred listener failed");
                failures.push(err);
            }
        }

        if executed > 0 {
            debug!(executed, failed = failures.len(), "Drained task queue");
        }
        failures
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[derive(Default)]
struct TurnState {
    depth: usize,
    tasks: VecDeque<Task>,
}

thread_local! {
    static TURN: RefCell<TurnState> = RefCell::default();
}

/// An open synchronous operation on the current thread.
///
/// Turns nest. Work scheduled on a [`TurnScheduler`] while any turn is open
/// runs when the outermost one is dropped, including work scheduled by that
/// work.
#[must_use = "the turn ends as soon as the guard is dropped"]
pub struct Turn {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Turn {
    /// Open a turn on the current thread.
    pub fn enter() -> Self {
        TURN.with(|turn| turn.borrow_mut().depth += 1);
        Self {
            _not_send: std::marker::PhantomData,
        }
    }

    /// Check whether a turn is open on the current thread.
    pub fn is_active() -> bool {
        TURN.with(|turn| turn.borrow().depth > 0)
    }

    fn drain() {
        let mut executed = 0usize;
        let mut failed = 0usize;
        // The depth stays at one while draining, so turns opened by the
        // tasks themselves only append to the queue.
        while let Some(task) = TURN.with(|turn| turn.borrow_mut().tasks.pop_front()) {
            executed += 1;
            if let Err(err) = task() {
                failed += 1;
                error!(event = %err.event, error = %err.message, "Deferred listener failed");
            }
        }
        if executed > 0 {
            debug!(executed, failed, "Finished turn");
        }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        let outermost = TURN.with(|turn| turn.borrow().depth == 1);
        if outermost && std::thread::panicking() {
            TURN.with(|turn| turn.borrow_mut().tasks.clear());
        } else if outermost {
            Self::drain();
        }
        TURN.with(|turn| turn.borrow_mut().depth -= 1);
    }
}

/// Scheduler that runs tasks after the current [`Turn`] on the scheduling
/// thread. Outside any turn a task runs immediately, since no operation is
/// in progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnScheduler;

impl Scheduler for TurnScheduler {
    fn schedule(&self, task: Task) {
        if Turn::is_active() {
            TURN.with(|turn| turn.borrow_mut().tasks.push_back(task));
            return;
        }
        let _turn = Turn::enter();
        if let Err(err) = task() {
            error!(event = %err.event, error = %err.message, "Deferred listener failed");
        }
    }
}

/// Scheduler that spawns each task onto a tokio runtime after a yield.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioScheduler {
    /// Create a scheduler on the given runtime.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

#[cfg(feature = "tokio")]
impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        self.handle.spawn(async move {
            tokio::task::yield_now().await;
            if let Err(err) = task() {
                error!(event = %err.event, error = %err.message, "Deferred listener failed");
            }
        });
    }
}
