//! # Event codes delivered to target callbacks.
//!
//! [`Event`] is a bit set: a single I/O delivery may carry both [`Event::READ`] and
//! [`Event::WRITE`], and readiness errors add [`Event::ERROR`]. The same type is used
//! as the interest mask for [`Dispatcher::watch_io`](crate::Dispatcher::watch_io),
//! where only the `READ | WRITE` subset is meaningful.
//!
//! ## Payloads
//! | Event              | Payload           |
//! |--------------------|-------------------|
//! | `READ` / `WRITE`   | `Some(fd)`        |
//! | `SIGNAL`           | `Some(signum)`    |
//! | `TIMER`            | `None`            |
//! | `CLEANUP`          | `None`            |
//!
//! ## Example
//! ```rust
//! use evmux::Event;
//!
//! let ev = Event::READ | Event::WRITE;
//! assert!(ev.contains(Event::READ));
//! assert_eq!(ev.io_interest(), Event::READ | Event::WRITE);
//! assert!(Event::TIMER.io_interest().is_empty());
//! ```

use bitflags::bitflags;

bitflags! {
    /// Kinds of events delivered to a target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Event: u32 {
        /// Descriptor is readable (or the peer closed its write half).
        const READ    = 0x0000_0001;
        /// Descriptor is writable.
        const WRITE   = 0x0000_0002;
        /// Timer expired.
        const TIMER   = 0x0000_0100;
        /// Process received the watched signal.
        const SIGNAL  = 0x0000_0400;
        /// Synthetic event delivered once to every active target during cleanup.
        const CLEANUP = 0x0004_0000;
        /// Readiness error reported for the watched descriptor.
        const ERROR   = 0x8000_0000;
    }
}

impl Event {
    /// Returns the subset of this set usable as an I/O interest mask.
    #[inline]
    pub fn io_interest(self) -> Event {
        self & (Event::READ | Event::WRITE)
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// Composite sets report the most significant class first.
    pub fn as_label(self) -> &'static str {
        if self.contains(Event::CLEANUP) {
            "cleanup"
        } else if self.contains(Event::ERROR) {
            "error"
        } else if self.contains(Event::SIGNAL) {
            "signal"
        } else if self.contains(Event::TIMER) {
            "timer"
        } else if self.contains(Event::READ | Event::WRITE) {
            "read_write"
        } else if self.contains(Event::READ) {
            "read"
        } else if self.contains(Event::WRITE) {
            "write"
        } else {
            "none"
        }
    }
}
