//! # Loop teardown watcher.
//!
//! Fires [`Event::CLEANUP`] once, when the [`Loop`] begins tearing down. Each
//! [`Dispatcher`](crate::Dispatcher) owns exactly one and uses it to run its cleanup pass.

use crate::core::event_loop::Loop;

use super::arm::{Arm, Notify};

/// Watcher over the loop's teardown notification.
#[derive(Debug)]
pub struct ShutdownWatcher {
    arm: Arm,
}

impl ShutdownWatcher {
    pub(crate) fn new(event_loop: Loop, notify: Notify) -> Self {
        Self {
            arm: Arm::new(event_loop, notify),
        }
    }

    /// Returns true until the notification fires or the watcher is stopped.
    pub fn is_active(&self) -> bool {
        self.arm.is_active()
    }

    /// Subscribes to teardown; `false` if the loop is already shut down.
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            return true;
        }
        self.arm.arm_shutdown()
    }

    /// Unsubscribes; no-op when inactive.
    pub fn stop(&mut self) {
        self.arm.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_fires_once_on_shutdown() {
        let ev = Loop::new().unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let mut watcher = ShutdownWatcher::new(
            ev.clone(),
            Rc::new(move |event, payload| {
                assert_eq!((event, payload), (Event::CLEANUP, None));
                h.set(h.get() + 1);
            }),
        );

        assert!(watcher.start());
        assert!(watcher.start());
        ev.shutdown();
        ev.shutdown();

        assert_eq!(hits.get(), 1);
        assert!(!watcher.is_active());
        assert!(!watcher.start());
    }

    #[test]
    fn test_stopped_watcher_stays_silent() {
        let ev = Loop::new().unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let mut watcher = ShutdownWatcher::new(ev.clone(), Rc::new(move |_, _| h.set(1)));

        watcher.start();
        watcher.stop();
        ev.shutdown();

        assert_eq!(hits.get(), 0);
    }
}
