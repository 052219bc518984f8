//! Watchers: one loop subscription each.
//!
//! - [`TimerWatcher`], [`IoWatcher`], [`SignalWatcher`]: per-target event classes,
//!   wrapped in the tagged [`Watcher`] variant.
//! - [`ShutdownWatcher`]: the dispatcher's own loop-teardown subscription.
//! - `arm`: generation-stamped arming shared by all of them.

mod arm;
mod io;
mod shutdown;
mod signal;
mod timer;
mod watcher;

pub(crate) use arm::Notify;
pub use io::IoWatcher;
pub use shutdown::ShutdownWatcher;
pub use signal::SignalWatcher;
pub use timer::TimerWatcher;
pub use watcher::{Selector, Watcher, WatcherInfo, WatcherKind};
