//! Runtime core: loop, registry and dispatch.
//!
//! The public API from this module is [`Loop`], [`Dispatcher`] and its builder.
//!
//! Internal modules:
//! - [`event_loop`]: current-thread runtime wrapper with run/stop/shutdown;
//! - [`shutdown`]: one-shot teardown hook list fired by the loop;
//! - [`registry`]: target → watcher set table;
//! - [`dispatcher`]: watch/enable/disable/release/cleanup and event routing;
//! - [`builder`]: dispatcher construction with lifecycle hooks.

mod builder;
mod dispatcher;
pub(crate) mod event_loop;
mod registry;
pub(crate) mod shutdown;

pub use builder::DispatcherBuilder;
pub use dispatcher::{Dispatcher, Lifecycle, OnEvent, WeakDispatcher};
pub use event_loop::Loop;
pub use registry::Target;
