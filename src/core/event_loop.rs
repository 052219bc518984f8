//! # Event loop: the polling primitive shared by every watcher.
//!
//! [`Loop`] wraps a current-thread tokio runtime and a [`LocalSet`]. Each active
//! watcher is one local task parked on the runtime's I/O driver, timer wheel or
//! signal driver; the loop itself only knows how to run, stop and tear down.
//!
//! ## Architecture
//! ```text
//!  Loop (Rc handle, cloneable)
//!   ├─ Runtime (current_thread: io + time + signal drivers)
//!   ├─ LocalSet ──► watcher task ─► Ticket::fire ─► Dispatcher::handler
//!   │              watcher task ─► ...
//!   ├─ CancellationToken (per run)   ◄── stop()
//!   └─ ShutdownHooks                 ◄── shutdown() / last handle dropped
//! ```
//!
//! ## Rules
//! - `run()` blocks the calling thread until `stop()` is called (usually from a callback).
//! - `stop()` outside of `run()` has no effect on the next `run()`.
//! - `run()` is not re-entrant: calling it from a callback returns [`LoopError::AlreadyRunning`].
//! - `shutdown()` stops the loop, fires teardown hooks exactly once and makes further
//!   `run()` calls fail with [`LoopError::Terminated`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use tokio::runtime::{Builder, EnterGuard, Runtime};
use tokio::task::{JoinHandle, LocalSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::core::shutdown::{Hook, HookId, ShutdownHooks};
use crate::error::LoopError;

struct Inner {
    // Field order matters: watcher tasks are dropped before the runtime.
    tasks: LocalSet,
    hooks: ShutdownHooks,
    stop: RefCell<CancellationToken>,
    running: Cell<bool>,
    runtime: Runtime,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.hooks.fire();
    }
}

/// Handle to a single-threaded event loop.
///
/// Cloning is cheap and yields another handle to the same loop.
#[derive(Clone)]
pub struct Loop {
    inner: Rc<Inner>,
}

impl Loop {
    /// Creates a loop with the default [`Config`].
    pub fn new() -> Result<Self, LoopError> {
        Self::with_config(&Config::default())
    }

    /// Creates a loop with the given configuration.
    pub fn with_config(cfg: &Config) -> Result<Self, LoopError> {
        let runtime = Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .event_interval(cfg.event_interval_clamped())
            .build()
            .map_err(|source| LoopError::Runtime { source })?;

        Ok(Self {
            inner: Rc::new(Inner {
                tasks: LocalSet::new(),
                hooks: ShutdownHooks::new(),
                stop: RefCell::new(CancellationToken::new()),
                running: Cell::new(false),
                runtime,
            }),
        })
    }

    /// Runs the loop until [`Loop::stop`] is called.
    pub fn run(&self) -> Result<(), LoopError> {
        if self.inner.hooks.is_fired() {
            return Err(LoopError::Terminated);
        }
        if self.inner.running.replace(true) {
            return Err(LoopError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *self.inner.stop.borrow_mut() = token.clone();

        debug!("event loop running");
        self.inner
            .runtime
            .block_on(self.inner.tasks.run_until(token.cancelled()));
        self.inner.running.set(false);
        debug!("event loop stopped");
        Ok(())
    }

    /// Requests the running loop to return from [`Loop::run`].
    ///
    /// The loop returns once the current callback has finished.
    pub fn stop(&self) {
        self.inner.stop.borrow().cancel();
    }

    /// Returns true while [`Loop::run`] is executing.
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Stops the loop and fires teardown notifications (once).
    ///
    /// Every [`Dispatcher`](crate::Dispatcher) bound to this loop performs its cleanup
    /// pass here.
    pub fn shutdown(&self) {
        self.stop();
        if self.inner.hooks.fire() {
            debug!("event loop shut down");
        }
    }

    /// Returns true once teardown notifications have fired.
    pub fn is_shut_down(&self) -> bool {
        self.inner.hooks.is_fired()
    }

    /// Returns true if both handles refer to the same loop.
    pub fn ptr_eq(&self, other: &Loop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Enters the runtime context so drivers can be registered outside of `run()`.
    pub(crate) fn enter(&self) -> EnterGuard<'_> {
        self.inner.runtime.enter()
    }

    /// Spawns a watcher task onto the loop.
    ///
    /// Tasks spawned while the loop is idle are first polled by the next `run()`.
    pub(crate) fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner.tasks.spawn_local(task)
    }

    /// Subscribes to teardown; `None` if the loop is already shut down.
    pub(crate) fn on_shutdown(&self, hook: Hook) -> Option<HookId> {
        self.inner.hooks.subscribe(hook)
    }

    /// Cancels a teardown subscription.
    pub(crate) fn cancel_shutdown(&self, id: HookId) -> bool {
        self.inner.hooks.unsubscribe(id)
    }
}

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("running", &self.is_running())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
