//! # Fault-capturing dispatcher host.
//!
//! [`Host`] adapts a fallible callback `Fn(&T, Event, Option<i32>) -> Result<bool, E>`
//! to the dispatcher's boolean contract.
//!
//! ## Flow
//! ```text
//! callback ─► Ok(keep)   ─► keep
//!          ─► Err(e)     ─► store fault (first wins) ─► Loop::stop ─► false
//!          ─► panic      ─► store fault (first wins) ─► Loop::stop ─► false
//!
//! Host::start ─► Loop::run ─► Dispatcher::cleanup ─► re-raise stored fault
//! ```
//!
//! ## Rules
//! - Faults are never raised while callbacks are still on the stack; they surface
//!   from [`Host::start`] once the loop has returned and cleanup has completed.
//! - Cleanup deliveries go through the same capture, so a fault raised while cleaning
//!   is reported too (unless an earlier one was already stored).

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::warn;

use crate::core::{Dispatcher, DispatcherBuilder, Loop, Target};
use crate::error::HostError;
use crate::events::Event;

/// Fault captured from a callback.
enum Fault<E> {
    Callback(E),
    Panicked(String),
}

type FaultSlot<E> = Rc<RefCell<Option<Fault<E>>>>;

/// Dispatcher driven by a fallible callback.
pub struct Host<T: Target, E> {
    dispatcher: Dispatcher<T>,
    fault: FaultSlot<E>,
}

impl<T, E> Host<T, E>
where
    T: Target,
    E: std::error::Error + 'static,
{
    /// Creates a host over a new dispatcher without lifecycle hooks.
    pub fn new<F>(event_loop: Loop, on_event: F) -> Self
    where
        F: Fn(&T, Event, Option<i32>) -> Result<bool, E> + 'static,
    {
        Self::with_builder(Dispatcher::builder(event_loop), on_event)
    }

    /// Creates a host over a dispatcher configured by `builder`.
    pub fn with_builder<F>(builder: DispatcherBuilder<T>, on_event: F) -> Self
    where
        F: Fn(&T, Event, Option<i32>) -> Result<bool, E> + 'static,
    {
        let fault: FaultSlot<E> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&fault);
        let dispatcher = builder.build_cyclic(move |this| {
            let this = this.clone();
            move |target: &T, event: Event, payload: Option<i32>| {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| on_event(target, event, payload)));
                let captured = match outcome {
                    Ok(Ok(keep)) => return keep,
                    Ok(Err(err)) => Fault::Callback(err),
                    Err(payload) => Fault::Panicked(panic_message(payload.as_ref())),
                };
                store(&slot, captured, event);
                if let Some(dispatcher) = this.upgrade() {
                    dispatcher.stop();
                }
                false
            }
        });
        Self { dispatcher, fault }
    }

    /// Returns the wrapped dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Runs the loop until it stops, performs cleanup, then re-raises the first
    /// captured callback fault.
    pub fn start(&self) -> Result<(), HostError<E>> {
        let ran = self.dispatcher.run();
        self.dispatcher.cleanup();
        ran?;

        match self.fault.borrow_mut().take() {
            None => Ok(()),
            Some(Fault::Callback(err)) => Err(HostError::Callback(err)),
            Some(Fault::Panicked(message)) => Err(HostError::Panicked { message }),
        }
    }
}

fn store<E: std::error::Error>(slot: &RefCell<Option<Fault<E>>>, fault: Fault<E>, event: Event) {
    let mut slot = slot.borrow_mut();
    match (&*slot, &fault) {
        (None, Fault::Callback(err)) => {
            warn!(event = event.as_label(), error = %err, "event callback failed; stopping loop");
        }
        (None, Fault::Panicked(message)) => {
            warn!(event = event.as_label(), panic = %message, "event callback panicked; stopping loop");
        }
        (Some(_), _) => return,
    }
    *slot = Some(fault);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
