//! # Arming state shared by every watcher kind.
//!
//! An [`Arm`] owns the loop registration of one watcher (a local task or a teardown
//! hook) and a shared state cell holding the generation that is currently armed.
//! The registration receives a [`Ticket`] stamped with its generation.
//!
//! ```text
//! Arm ──owns──► watch future (AsyncFd, Sleep, Signal stream …)
//!  │                 ▲
//!  └─spawns─► Driver ┘ polls it through the shared slot
//! ```
//!
//! ## Rules
//! - A ticket fires only while its generation is the armed one, so a stopped or
//!   restarted watcher never delivers a stale event, even if the loop already had one
//!   in flight.
//! - Disarming clears the state before aborting the registration; it is safe to call
//!   from inside the watcher's own callback.
//! - Disarming drops the watch future on the spot, whether or not the loop is
//!   running. Resources it holds (duplicated descriptors, signal streams) are
//!   released before `disarm` returns.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::core::event_loop::Loop;
use crate::core::shutdown::HookId;
use crate::events::Event;

/// Callback bound to a watcher: `(event, payload)`.
pub(crate) type Notify = Rc<dyn Fn(Event, Option<i32>)>;

type Watch = Pin<Box<dyn Future<Output = ()>>>;

/// Loop-side registration backing an armed watcher.
enum Registration {
    Task {
        task: JoinHandle<()>,
        watch: Rc<Cell<Option<Watch>>>,
    },
    Hook(HookId),
}

/// Local task polling a watch future it does not own.
///
/// The future is taken out of the slot for the duration of one poll and put back
/// only while its generation is still armed.
struct Driver {
    watch: Rc<Cell<Option<Watch>>>,
    state: Rc<Cell<Option<u64>>>,
    generation: u64,
}

impl Future for Driver {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let Some(mut watch) = self.watch.take() else {
            return Poll::Ready(());
        };
        if watch.as_mut().poll(cx).is_ready() {
            return Poll::Ready(());
        }
        if self.state.get() != Some(self.generation) {
            return Poll::Ready(());
        }
        self.watch.set(Some(watch));
        Poll::Pending
    }
}

/// Arming state of one watcher.
pub(crate) struct Arm {
    event_loop: Loop,
    notify: Notify,
    state: Rc<Cell<Option<u64>>>,
    generation: u64,
    registration: Option<Registration>,
}

impl Arm {
    pub(crate) fn new(event_loop: Loop, notify: Notify) -> Self {
        Self {
            event_loop,
            notify,
            state: Rc::new(Cell::new(None)),
            generation: 0,
            registration: None,
        }
    }

    pub(crate) fn event_loop(&self) -> &Loop {
        &self.event_loop
    }

    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.state.get().is_some()
    }

    /// Arms a new generation backed by a local task built from its ticket.
    ///
    /// The future stays owned by this arm; the spawned task only drives it.
    pub(crate) fn arm_task<F, Fut>(&mut self, make: F)
    where
        F: FnOnce(Ticket) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let ticket = self.next_ticket();
        let future: Watch = Box::pin(make(ticket));
        let watch = Rc::new(Cell::new(Some(future)));
        let task = self.event_loop.spawn(Driver {
            watch: watch.clone(),
            state: self.state.clone(),
            generation: self.generation,
        });
        self.registration = Some(Registration::Task { task, watch });
    }

    /// Arms a new generation backed by a loop teardown hook.
    ///
    /// Returns `false` (and stays disarmed) if the loop is already shut down.
    pub(crate) fn arm_shutdown(&mut self) -> bool {
        let ticket = self.next_ticket();
        let hook = Rc::new(move || ticket.fire_once(Event::CLEANUP, None));
        match self.event_loop.on_shutdown(hook) {
            Some(id) => {
                self.registration = Some(Registration::Hook(id));
                true
            }
            None => {
                self.state.set(None);
                false
            }
        }
    }

    /// Disarms the current generation and cancels its registration.
    pub(crate) fn disarm(&mut self) {
        self.state.set(None);
        match self.registration.take() {
            Some(Registration::Task { task, watch }) => {
                task.abort();
                drop(watch.take());
            }
            Some(Registration::Hook(id)) => {
                self.event_loop.cancel_shutdown(id);
            }
            None => {}
        }
    }

    fn next_ticket(&mut self) -> Ticket {
        self.disarm();
        self.generation += 1;
        self.state.set(Some(self.generation));
        Ticket {
            state: self.state.clone(),
            generation: self.generation,
            notify: self.notify.clone(),
        }
    }
}

impl Drop for Arm {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl fmt::Debug for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arm")
            .field("generation", &self.generation)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Capability of one armed generation to deliver events.
pub(crate) struct Ticket {
    state: Rc<Cell<Option<u64>>>,
    generation: u64,
    notify: Notify,
}

impl Ticket {
    #[inline]
    pub(crate) fn is_current(&self) -> bool {
        self.state.get() == Some(self.generation)
    }

    /// Delivers an event if still armed; returns whether it is still armed afterwards.
    pub(crate) fn fire(&self, event: Event, payload: Option<i32>) -> bool {
        if !self.is_current() {
            return false;
        }
        (self.notify)(event, payload);
        self.is_current()
    }

    /// Disarms, then delivers: for registrations that fire at most once.
    pub(crate) fn fire_once(&self, event: Event, payload: Option<i32>) {
        if !self.is_current() {
            return;
        }
        self.state.set(None);
        (self.notify)(event, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Notify, Rc<RefCell<Vec<(Event, Option<i32>)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let notify: Notify = Rc::new(move |ev, payload| sink.borrow_mut().push((ev, payload)));
        (notify, log)
    }

    #[test]
    fn test_stale_ticket_does_not_fire() {
        let ev = Loop::new().unwrap();
        let (notify, log) = recorder();
        let mut arm = Arm::new(ev, notify);

        let first = arm.next_ticket();
        let second = arm.next_ticket();

        assert!(!first.fire(Event::TIMER, None));
        assert!(second.fire(Event::TIMER, None));
        assert_eq!(log.borrow().len(), 1);

        arm.disarm();
        assert!(!arm.is_active());
        assert!(!second.fire(Event::TIMER, None));
        assert_eq!(log.borrow().len(), 1);
    }

    struct Held(Rc<Cell<bool>>);

    impl Drop for Held {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[test]
    fn test_disarm_drops_watch_without_running_loop() {
        let ev = Loop::new().unwrap();
        let mut arm = Arm::new(ev, Rc::new(|_, _| {}));
        let dropped = Rc::new(Cell::new(false));

        let held = Held(dropped.clone());
        arm.arm_task(move |ticket| async move {
            let _held = held;
            let _ticket = ticket;
            std::future::pending::<()>().await;
        });
        assert!(arm.is_active());
        assert!(!dropped.get());

        arm.disarm();
        assert!(dropped.get());
    }

    #[test]
    fn test_rearm_drops_previous_watch() {
        let ev = Loop::new().unwrap();
        let mut arm = Arm::new(ev.clone(), Rc::new(|_, _| {}));
        let first = Rc::new(Cell::new(false));

        let held = Held(first.clone());
        arm.arm_task(move |_| async move {
            let _held = held;
            std::future::pending::<()>().await;
        });
        arm.arm_task(|_| std::future::pending::<()>());

        assert!(first.get());
        assert!(arm.is_active());
    }

    #[test]
    fn test_watch_may_disarm_itself_while_polled() {
        let ev = Loop::new().unwrap();
        let arm = Rc::new(RefCell::new(None::<Arm>));
        let (slot, handle) = (arm.clone(), ev.clone());
        let notify: Notify = Rc::new(move |_, _| {
            if let Some(arm) = slot.borrow_mut().as_mut() {
                arm.disarm();
            }
            handle.stop();
        });

        let mut inner = Arm::new(ev.clone(), notify);
        inner.arm_task(|ticket| async move {
            loop {
                tokio::task::yield_now().await;
                if !ticket.fire(Event::TIMER, None) {
                    return;
                }
            }
        });
        *arm.borrow_mut() = Some(inner);

        ev.run().unwrap();
        assert!(!arm.borrow().as_ref().unwrap().is_active());
    }

    #[test]
    fn test_fire_once_disarms_before_delivery() {
        let ev = Loop::new().unwrap();
        let state_seen = Rc::new(Cell::new(None));
        let mut arm = Arm::new(ev, Rc::new(|_, _| {}));
        let ticket = arm.next_ticket();

        let seen = state_seen.clone();
        let probe = ticket.state.clone();
        let ticket = Ticket {
            notify: Rc::new(move |_, _| seen.set(Some(probe.get().is_some()))),
            ..ticket
        };

        ticket.fire_once(Event::CLEANUP, None);
        assert_eq!(state_seen.get(), Some(false));
        assert!(!arm.is_active());
    }

    #[test]
    fn test_arm_shutdown_fires_on_teardown() {
        let ev = Loop::new().unwrap();
        let (notify, log) = recorder();
        let mut arm = Arm::new(ev.clone(), notify);

        assert!(arm.arm_shutdown());
        assert!(arm.is_active());

        ev.shutdown();
        assert!(!arm.is_active());
        assert_eq!(*log.borrow(), vec![(Event::CLEANUP, None)]);

        assert!(!arm.arm_shutdown());
        assert!(!arm.is_active());
    }
}
