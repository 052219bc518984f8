//! Event codes delivered to target callbacks.
//!
//! ## Contents
//! - [`Event`] bit set of event classes, also used as the I/O interest mask

mod event;

pub use event::Event;
