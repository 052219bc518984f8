//! # Signal watcher.
//!
//! Fires [`Event::SIGNAL`] with payload `Some(signum)` each time the process receives
//! the watched signal while the watcher is armed. Signals received while it is stopped
//! are not queued.
//!
//! ## Normalization
//! - `signum < 0` → unassigned (`-1`), disabled
//! - signals the platform refuses to handle (`SIGKILL`, `SIGSTOP`, `SIGSEGV`, ...) →
//!   `start` returns `false`
//!
//! Once a signal has been watched, its default disposition stays replaced for the rest
//! of the process lifetime.

use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::warn;

use crate::core::event_loop::Loop;
use crate::events::Event;

use super::arm::{Arm, Notify, Ticket};

/// Watcher over a process signal.
#[derive(Debug)]
pub struct SignalWatcher {
    arm: Arm,
    signum: i32,
}

impl SignalWatcher {
    pub(crate) fn new(event_loop: Loop, notify: Notify) -> Self {
        Self {
            arm: Arm::new(event_loop, notify),
            signum: -1,
        }
    }

    /// Returns the watched signal number, `-1` when unassigned.
    pub fn signum(&self) -> i32 {
        self.signum
    }

    /// Returns true while the watcher is armed.
    pub fn is_active(&self) -> bool {
        self.arm.is_active()
    }

    /// (Re)starts watching `signum`; returns the resulting active state.
    pub fn start(&mut self, signum: i32) -> bool {
        self.arm.disarm();
        self.signum = if signum < 0 { -1 } else { signum };
        if self.signum < 0 {
            return false;
        }

        let listener = {
            let _guard = self.arm.event_loop().enter();
            signal(SignalKind::from_raw(self.signum))
        };
        match listener {
            Ok(stream) => {
                let signum = self.signum;
                self.arm
                    .arm_task(move |ticket| watch_signal(ticket, stream, signum));
            }
            Err(err) => {
                warn!(signum = self.signum, error = %err, "cannot watch signal");
            }
        }
        self.is_active()
    }

    /// Restarts with the last signal number.
    pub fn resume(&mut self) -> bool {
        self.start(self.signum)
    }

    /// Stops watching; no-op when inactive.
    pub fn stop(&mut self) {
        self.arm.disarm();
    }
}

async fn watch_signal(ticket: Ticket, mut stream: Signal, signum: i32) {
    while stream.recv().await.is_some() {
        if !ticket.fire(Event::SIGNAL, Some(signum)) {
            return;
        }
    }
}
