//! Embedding boundary.
//!
//! Helpers for hosts that drive the dispatcher from another error model:
//! - [`Host`]: fallible/panicking callbacks are captured, the loop is stopped and the
//!   fault is re-raised from [`Host::start`] after cleanup;
//! - [`default_loop`]: a per-thread default [`Loop`](crate::Loop) for hosts that do not
//!   manage loop instances themselves.

mod default;
mod host;

pub use default::default_loop;
pub use host::Host;
