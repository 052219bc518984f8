//! # Dispatcher: per-target multiplexing over one loop.
//!
//! A [`Dispatcher`] owns the target registry, a handle to the [`Loop`] and one
//! [`ShutdownWatcher`]. Callers attach timer, I/O and signal interest to any
//! [`Target`]; every firing is routed through the same handler.
//!
//! ## Architecture
//! ```text
//! watch_timer / watch_io / watch_signal
//!        │
//!        ▼
//!  setup_watching ──► Registry: find-or-create entry (apply hook on creation)
//!        │                      find-or-create compatible watcher
//!        ▼
//!  Watcher::start ──► Loop task ──► Ticket::fire ──► handler(target, event, payload)
//!                                                       ├─ disable_watching(target)
//!                                                       ├─ on_event(target, event, payload)
//!                                                       └─ enable_watching(target) if true
//!
//! Loop::shutdown ──► ShutdownWatcher ──► cleanup()
//!                                          ├─ CLEANUP to every active target
//!                                          └─ release every target (free hook)
//! ```
//!
//! ## Rules
//! - `watch_*` calls are rejected while a cleanup pass is running.
//! - A target's callback never runs re-entrantly for its own watchers: they are all
//!   stopped before it is invoked, and `enable_watching` on that target is refused
//!   until it returns.
//! - `apply` runs once per Absent→Registered transition, `free` once per
//!   Registered→Absent transition (including cleanup).
//! - No registry borrow is held while user code runs, so callbacks may watch,
//!   release or clean up any target, including their own.
//! - Dropping the last handle performs a final cleanup pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::os::fd::RawFd;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use crate::core::event_loop::Loop;
use crate::core::registry::{Registry, Target};
use crate::error::LoopError;
use crate::events::Event;
use crate::watchers::{Notify, Selector, ShutdownWatcher, Watcher, WatcherInfo};

use super::builder::DispatcherBuilder;

/// Event callback: `(target, event, payload) -> keep watching`.
pub type OnEvent<T> = Rc<dyn Fn(&T, Event, Option<i32>) -> bool>;

/// Target lifecycle hook (`apply` or `free`).
pub type Lifecycle<T> = Rc<dyn Fn(&T)>;

pub(crate) struct Inner<T: Target> {
    this: Weak<Inner<T>>,
    event_loop: Loop,
    registry: RefCell<Registry<T>>,
    cleaning: Cell<bool>,
    on_event: OnEvent<T>,
    apply: Option<Lifecycle<T>>,
    free: Option<Lifecycle<T>>,
    shutdown: RefCell<Option<ShutdownWatcher>>,
}

/// Construction parameters collected by [`DispatcherBuilder`].
pub(crate) struct Parts<T: Target> {
    pub(crate) event_loop: Loop,
    pub(crate) apply: Option<Lifecycle<T>>,
    pub(crate) free: Option<Lifecycle<T>>,
    pub(crate) capacity: usize,
}

/// Multiplexes timer, I/O and signal watchers of many targets over one [`Loop`].
///
/// Cloning is cheap and yields another handle to the same dispatcher. Callbacks that
/// need to reach the dispatcher should hold a [`WeakDispatcher`] (see
/// [`Dispatcher::new_cyclic`]) to avoid a reference cycle.
pub struct Dispatcher<T: Target> {
    inner: Rc<Inner<T>>,
}

impl<T: Target> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Dispatcher`].
pub struct WeakDispatcher<T: Target> {
    inner: Weak<Inner<T>>,
}

impl<T: Target> Clone for WeakDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: Target> WeakDispatcher<T> {
    /// Returns the dispatcher if at least one strong handle is still alive.
    pub fn upgrade(&self) -> Option<Dispatcher<T>> {
        self.inner.upgrade().map(|inner| Dispatcher { inner })
    }
}

impl<T: Target> fmt::Debug for WeakDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDispatcher")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T: Target> Dispatcher<T> {
    /// Creates a dispatcher without lifecycle hooks.
    pub fn new<F>(event_loop: Loop, on_event: F) -> Self
    where
        F: Fn(&T, Event, Option<i32>) -> bool + 'static,
    {
        Self::builder(event_loop).build(on_event)
    }

    /// Creates a dispatcher whose callback is built from a weak handle to itself.
    pub fn new_cyclic<M, F>(event_loop: Loop, make: M) -> Self
    where
        M: FnOnce(&WeakDispatcher<T>) -> F,
        F: Fn(&T, Event, Option<i32>) -> bool + 'static,
    {
        Self::builder(event_loop).build_cyclic(make)
    }

    /// Starts a [`DispatcherBuilder`] bound to `event_loop`.
    pub fn builder(event_loop: Loop) -> DispatcherBuilder<T> {
        DispatcherBuilder::new(event_loop)
    }

    pub(crate) fn assemble<M>(parts: Parts<T>, make: M) -> Self
    where
        M: FnOnce(&WeakDispatcher<T>) -> OnEvent<T>,
    {
        let inner = Rc::new_cyclic(|this: &Weak<Inner<T>>| {
            let on_event = make(&WeakDispatcher {
                inner: this.clone(),
            });

            let weak = this.clone();
            let notify: Notify = Rc::new(move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    inner.cleanup();
                }
            });
            let mut shutdown = ShutdownWatcher::new(parts.event_loop.clone(), notify);
            if !shutdown.start() {
                debug!("loop already shut down; dispatcher relies on drop for cleanup");
            }

            Inner {
                this: this.clone(),
                event_loop: parts.event_loop,
                registry: RefCell::new(Registry::new(parts.capacity)),
                cleaning: Cell::new(false),
                on_event,
                apply: parts.apply,
                free: parts.free,
                shutdown: RefCell::new(Some(shutdown)),
            }
        });
        Self { inner }
    }

    /// Returns a non-owning handle.
    pub fn downgrade(&self) -> WeakDispatcher<T> {
        WeakDispatcher {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same dispatcher.
    pub fn ptr_eq(&self, other: &Dispatcher<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Watches `target` with a repeating timer of period `timeout` seconds.
    ///
    /// The first firing happens after `timeout`. A negative timeout leaves the timer
    /// disabled. Returns the timer's resulting active state; `false` while cleaning.
    pub fn watch_timer(&self, target: &T, timeout: f64) -> bool {
        self.inner
            .setup_watching(target, Selector::Timer, |watcher| match watcher {
                Watcher::Timer(timer) => timer.start(timeout, timeout),
                _ => false,
            })
    }

    /// Watches `fd` for the `READ`/`WRITE` bits of `events` on behalf of `target`.
    ///
    /// Reuses the target's watcher for the same descriptor if there is one.
    pub fn watch_io(&self, target: &T, fd: RawFd, events: Event) -> bool {
        self.inner
            .setup_watching(target, Selector::Io(fd), |watcher| match watcher {
                Watcher::Io(io) => io.start(fd, events),
                _ => false,
            })
    }

    /// Watches process signal `signum` on behalf of `target`.
    pub fn watch_signal(&self, target: &T, signum: i32) -> bool {
        self.inner
            .setup_watching(target, Selector::Signal(signum), |watcher| match watcher {
                Watcher::Signal(signal) => signal.start(signum),
                _ => false,
            })
    }

    /// Restarts every inactive watcher of `target` with its last configuration.
    ///
    /// Returns `false` without effect if the target is absent, a cleanup pass is
    /// running, or the target's own callback is executing.
    pub fn enable_watching(&self, target: &T) -> bool {
        self.inner.enable_watching(target)
    }

    /// Stops every watcher of `target`, keeping their configuration.
    pub fn disable_watching(&self, target: &T) -> bool {
        self.inner.disable_watching(target)
    }

    /// Drops every watcher of `target` and forgets it; invokes the `free` hook.
    pub fn release_watching(&self, target: &T) -> bool {
        self.inner.release_watching(target)
    }

    /// Delivers [`Event::CLEANUP`] to every active target, then releases all targets.
    ///
    /// Safe to call repeatedly and from callbacks.
    pub fn cleanup(&self) {
        self.inner.cleanup();
    }

    /// Returns true while a cleanup pass is running.
    pub fn is_cleaning(&self) -> bool {
        self.inner.cleaning.get()
    }

    /// Returns the loop this dispatcher is bound to.
    pub fn event_loop(&self) -> &Loop {
        &self.inner.event_loop
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `target` is registered.
    pub fn is_watching(&self, target: &T) -> bool {
        self.inner.registry.borrow().contains(target)
    }

    /// Returns true if `target` has at least one active watcher.
    pub fn is_active(&self, target: &T) -> bool {
        self.inner
            .registry
            .borrow()
            .get(target)
            .is_some_and(|entry| entry.is_active())
    }

    /// Registered targets, in no particular order.
    pub fn targets(&self) -> Vec<T> {
        self.inner.registry.borrow().targets()
    }

    /// Watchers of `target` in creation order; `None` if the target is absent.
    pub fn watchers(&self, target: &T) -> Option<Vec<WatcherInfo>> {
        self.inner
            .registry
            .borrow()
            .get(target)
            .map(|entry| entry.watchers.iter().map(Watcher::info).collect())
    }

    /// Runs the bound loop until it is stopped.
    pub fn run(&self) -> Result<(), LoopError> {
        self.inner.event_loop.run()
    }

    /// Stops the bound loop.
    pub fn stop(&self) {
        self.inner.event_loop.stop();
    }
}

impl<T: Target> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("targets", &self.len())
            .field("cleaning", &self.is_cleaning())
            .field("event_loop", &self.inner.event_loop)
            .finish()
    }
}

impl<T: Target> Inner<T> {
    fn setup_watching<S>(&self, target: &T, selector: Selector, start: S) -> bool
    where
        S: FnOnce(&mut Watcher) -> bool,
    {
        if self.cleaning.get() {
            debug!(?selector, "watch rejected: cleanup in progress");
            return false;
        }

        let created = self.registry.borrow_mut().ensure(target);
        if created {
            if let Some(apply) = &self.apply {
                apply(target);
            }
        }

        let mut registry = self.registry.borrow_mut();
        let Some(entry) = registry.get_mut(target) else {
            // Released by the apply hook.
            return false;
        };
        let index = match entry.watchers.iter().position(|w| w.approve(selector)) {
            Some(index) => index,
            None => {
                let notify = self.notify_for(target);
                entry.watchers.push(Watcher::for_selector(
                    selector,
                    self.event_loop.clone(),
                    notify,
                ));
                entry.watchers.len() - 1
            }
        };
        let active = start(&mut entry.watchers[index]);
        trace!(?selector, created, active, "watcher configured");
        active
    }

    fn notify_for(&self, target: &T) -> Notify {
        let (weak, target) = (self.this.clone(), target.clone());
        Rc::new(move |event, payload| {
            if let Some(inner) = weak.upgrade() {
                inner.handler(&target, event, payload);
            }
        })
    }

    fn enable_watching(&self, target: &T) -> bool {
        if self.cleaning.get() {
            return false;
        }
        let mut registry = self.registry.borrow_mut();
        let Some(entry) = registry.get_mut(target) else {
            return false;
        };
        if entry.dispatching {
            return false;
        }
        for watcher in entry.watchers.iter_mut().filter(|w| !w.is_active()) {
            watcher.start();
        }
        true
    }

    fn disable_watching(&self, target: &T) -> bool {
        let mut registry = self.registry.borrow_mut();
        let Some(entry) = registry.get_mut(target) else {
            return false;
        };
        entry.watchers.iter_mut().for_each(Watcher::stop);
        true
    }

    fn release_watching(&self, target: &T) -> bool {
        let removed = self.registry.borrow_mut().remove(target);
        let Some(mut entry) = removed else {
            return false;
        };
        entry.watchers.iter_mut().for_each(Watcher::stop);
        let count = entry.watchers.len();
        drop(entry);

        if let Some(free) = &self.free {
            free(target);
        }
        trace!(watchers = count, "target released");
        true
    }

    fn cleanup(&self) {
        let Some(_pass) = CleaningPass::begin(&self.cleaning) else {
            return;
        };
        let (all, active) = self.registry.borrow().snapshot();
        if all.is_empty() {
            return;
        }
        debug!(targets = all.len(), active = active.len(), "cleanup started");

        for target in &active {
            if self.registry.borrow().contains(target) {
                self.handler(target, Event::CLEANUP, None);
            }
        }
        for target in &all {
            self.release_watching(target);
        }
        debug!("cleanup finished");
    }

    fn handler(&self, target: &T, event: Event, payload: Option<i32>) {
        if !self.disable_watching(target) {
            error!(?event, ?payload, "watcher fired for an unregistered target; event dropped");
            return;
        }
        trace!(event = event.as_label(), ?payload, "dispatching");

        let keep = {
            let _dispatching = Dispatching::enter(&self.registry, target);
            (self.on_event)(target, event, payload)
        };
        if keep {
            self.enable_watching(target);
        }
    }
}

impl<T: Target> Drop for Inner<T> {
    fn drop(&mut self) {
        self.cleanup();
        if let Some(mut shutdown) = self.shutdown.get_mut().take() {
            shutdown.stop();
        }
    }
}

/// Sets the cleaning flag for the duration of one pass.
struct CleaningPass<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> CleaningPass<'a> {
    /// Returns `None` if a pass is already running.
    fn begin(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self { flag })
    }
}

impl Drop for CleaningPass<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Marks a target as dispatching while its callback runs.
///
/// Restores the previous mark on drop, even if the callback panics or the entry was
/// released and re-created meanwhile.
struct Dispatching<'a, T: Target> {
    registry: &'a RefCell<Registry<T>>,
    target: &'a T,
    previous: bool,
}

impl<'a, T: Target> Dispatching<'a, T> {
    fn enter(registry: &'a RefCell<Registry<T>>, target: &'a T) -> Self {
        let previous = registry
            .borrow_mut()
            .get_mut(target)
            .map(|entry| std::mem::replace(&mut entry.dispatching, true))
            .unwrap_or(false);
        Self {
            registry,
            target,
            previous,
        }
    }
}

impl<T: Target> Drop for Dispatching<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            if let Some(entry) = registry.get_mut(self.target) {
                entry.dispatching = self.previous;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<(&'static str, Event)>>>;

    fn recording(ev: &Loop, keep: bool) -> (Dispatcher<&'static str>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let d = Dispatcher::new(ev.clone(), move |t: &&'static str, e, _| {
            sink.borrow_mut().push((*t, e));
            keep
        });
        (d, log)
    }

    #[test]
    fn test_absent_target_operations_return_false() {
        let ev = Loop::new().unwrap();
        let (d, log) = recording(&ev, true);

        assert!(!d.enable_watching(&"ghost"));
        assert!(!d.disable_watching(&"ghost"));
        assert!(!d.release_watching(&"ghost"));
        assert!(d.is_empty());
        assert!(d.watchers(&"ghost").is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_timer_is_reconfigured_not_duplicated() {
        let ev = Loop::new().unwrap();
        let (d, _) = recording(&ev, true);

        assert!(d.watch_timer(&"t", 10.0));
        assert!(d.watch_timer(&"t", 20.0));

        let watchers = d.watchers(&"t").unwrap();
        assert_eq!(watchers.len(), 1);
        assert_eq!(watchers[0].selector, Selector::Timer);
        assert!(watchers[0].active);
    }

    #[test]
    fn test_invalid_timeout_still_registers_target() {
        let ev = Loop::new().unwrap();
        let (d, _) = recording(&ev, true);

        assert!(!d.watch_timer(&"t", -1.0));
        assert!(d.is_watching(&"t"));
        assert!(!d.is_active(&"t"));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn test_disable_then_enable_restores_watchers() {
        let ev = Loop::new().unwrap();
        let (d, _) = recording(&ev, true);
        d.watch_timer(&"t", 10.0);

        assert!(d.disable_watching(&"t"));
        assert!(!d.is_active(&"t"));
        assert!(d.enable_watching(&"t"));
        assert!(d.is_active(&"t"));
    }

    #[test]
    fn test_lifecycle_hooks_run_once_per_transition() {
        let ev = Loop::new().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (a, f) = (calls.clone(), calls.clone());
        let d = Dispatcher::builder(ev)
            .with_lifecycle(
                move |t: &u32| a.borrow_mut().push(("apply", *t)),
                move |t: &u32| f.borrow_mut().push(("free", *t)),
            )
            .build(|_, _, _| true);

        d.watch_timer(&1, 10.0);
        d.watch_timer(&1, 5.0);
        d.watch_signal(&1, -1);
        assert!(d.release_watching(&1));
        assert!(!d.release_watching(&1));
        d.watch_timer(&1, 10.0);

        assert_eq!(
            *calls.borrow(),
            vec![("apply", 1), ("free", 1), ("apply", 1)]
        );
    }

    #[test]
    fn test_cleanup_delivers_to_active_targets_only() {
        let ev = Loop::new().unwrap();
        let (d, log) = recording(&ev, true);
        d.watch_timer(&"a", 10.0);
        d.watch_timer(&"b", 10.0);
        d.watch_timer(&"c", 10.0);
        d.disable_watching(&"b");

        d.cleanup();

        let mut seen = log.borrow().clone();
        seen.sort_by_key(|(target, _)| *target);
        assert_eq!(seen, vec![("a", Event::CLEANUP), ("c", Event::CLEANUP)]);
        assert!(d.is_empty());
        assert!(!d.is_cleaning());

        d.cleanup();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_watch_rejected_while_cleaning() {
        let ev = Loop::new().unwrap();
        let accepted = Rc::new(Cell::new(None));
        let slot = accepted.clone();
        let d = Dispatcher::new_cyclic(ev, move |this: &WeakDispatcher<&'static str>| {
            let this = this.clone();
            move |_: &&'static str, event: Event, _: Option<i32>| {
                if event == Event::CLEANUP {
                    let d = this.upgrade().unwrap();
                    assert!(d.is_cleaning());
                    slot.set(Some(d.watch_timer(&"late", 1.0)));
                }
                true
            }
        });
        d.watch_timer(&"a", 10.0);

        d.cleanup();

        assert_eq!(accepted.get(), Some(false));
        assert!(!d.is_watching(&"late"));
    }

    #[test]
    fn test_dropping_last_handle_cleans_up() {
        let ev = Loop::new().unwrap();
        let (d, log) = recording(&ev, true);
        let weak = d.downgrade();
        d.watch_timer(&"a", 10.0);

        drop(d);

        assert!(weak.upgrade().is_none());
        assert_eq!(*log.borrow(), vec![("a", Event::CLEANUP)]);
    }

    #[test]
    fn test_loop_shutdown_triggers_cleanup_once() {
        let ev = Loop::new().unwrap();
        let (d, log) = recording(&ev, true);
        d.watch_timer(&"a", 10.0);

        ev.shutdown();
        ev.shutdown();

        assert_eq!(*log.borrow(), vec![("a", Event::CLEANUP)]);
        assert!(d.is_empty());
    }

    #[test]
    fn test_handler_for_absent_target_is_dropped() {
        let ev = Loop::new().unwrap();
        let (d, log) = recording(&ev, true);

        d.inner.handler(&"ghost", Event::TIMER, None);

        assert!(log.borrow().is_empty());
    }
}
