//! # Tagged watcher variant and compatibility rule.
//!
//! [`Watcher`] is the uniform handle the dispatcher keeps per target. Its
//! [`Selector`] carries both the event class and the sub-key that distinguishes
//! watchers of the same class, so reuse is a plain comparison:
//!
//! ```text
//! existing \ wanted   Timer   Io(fd)              Signal(n)
//! Timer               yes     -                   -
//! Io(x)               -       x == fd || x == -1  -
//! Signal(s)           -       -                   s == n || s == -1
//! ```

use std::os::fd::RawFd;

use crate::core::event_loop::Loop;

use super::arm::Notify;
use super::io::IoWatcher;
use super::signal::SignalWatcher;
use super::timer::TimerWatcher;

/// Event class of a per-target watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    Timer,
    Io,
    Signal,
}

/// Event class plus sub-key; `-1` marks an unassigned descriptor or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Timer,
    Io(RawFd),
    Signal(i32),
}

impl Selector {
    /// Returns the event class.
    pub fn kind(self) -> WatcherKind {
        match self {
            Selector::Timer => WatcherKind::Timer,
            Selector::Io(_) => WatcherKind::Io,
            Selector::Signal(_) => WatcherKind::Signal,
        }
    }

    /// Returns true if a watcher configured for `self` may be repurposed for `wanted`.
    pub fn approves(self, wanted: Selector) -> bool {
        match (self, wanted) {
            (Selector::Timer, Selector::Timer) => true,
            (Selector::Io(have), Selector::Io(want)) => have == want || have == -1,
            (Selector::Signal(have), Selector::Signal(want)) => have == want || have == -1,
            _ => false,
        }
    }
}

/// Snapshot of one watcher, as reported by [`Dispatcher::watchers`](crate::Dispatcher::watchers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherInfo {
    pub selector: Selector,
    pub active: bool,
}

/// One subscription of a target to one event class.
#[derive(Debug)]
pub enum Watcher {
    Timer(TimerWatcher),
    Io(IoWatcher),
    Signal(SignalWatcher),
}

impl Watcher {
    /// Creates an unassigned, inactive watcher of the selector's class.
    pub(crate) fn for_selector(selector: Selector, event_loop: Loop, notify: Notify) -> Self {
        match selector.kind() {
            WatcherKind::Timer => Watcher::Timer(TimerWatcher::new(event_loop, notify)),
            WatcherKind::Io => Watcher::Io(IoWatcher::new(event_loop, notify)),
            WatcherKind::Signal => Watcher::Signal(SignalWatcher::new(event_loop, notify)),
        }
    }

    /// Returns the current selector.
    pub fn selector(&self) -> Selector {
        match self {
            Watcher::Timer(_) => Selector::Timer,
            Watcher::Io(w) => Selector::Io(w.fileno()),
            Watcher::Signal(w) => Selector::Signal(w.signum()),
        }
    }

    /// Returns true if this watcher may be repurposed for `wanted`.
    pub fn approve(&self, wanted: Selector) -> bool {
        self.selector().approves(wanted)
    }

    pub fn is_active(&self) -> bool {
        match self {
            Watcher::Timer(w) => w.is_active(),
            Watcher::Io(w) => w.is_active(),
            Watcher::Signal(w) => w.is_active(),
        }
    }

    /// Restarts with the last configuration; returns the resulting active state.
    pub fn start(&mut self) -> bool {
        match self {
            Watcher::Timer(w) => w.resume(),
            Watcher::Io(w) => w.resume(),
            Watcher::Signal(w) => w.resume(),
        }
    }

    pub fn stop(&mut self) {
        match self {
            Watcher::Timer(w) => w.stop(),
            Watcher::Io(w) => w.stop(),
            Watcher::Signal(w) => w.stop(),
        }
    }

    pub fn info(&self) -> WatcherInfo {
        WatcherInfo {
            selector: self.selector(),
            active: self.is_active(),
        }
    }
}
