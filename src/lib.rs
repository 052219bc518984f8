//! # evmux
//!
//! **evmux** is a single-threaded event-dispatch core for Rust.
//!
//! It multiplexes timer, I/O-readiness and signal notifications across many
//! independently identified *targets* that share one event loop. Each target owns a
//! small set of watchers; every firing is routed through one callback with strict
//! per-target serialization.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!      ┌──────────┐      ┌──────────┐      ┌──────────┐
//!      │ target A │      │ target B │      │ target C │
//!      │ Timer    │      │ Io(fd 5) │      │ Signal 2 │
//!      │          │      │ Io(fd 6) │      │ Timer    │
//!      └────┬─────┘      └────┬─────┘      └────┬─────┘
//!           └─────────────────┼─────────────────┘
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Dispatcher<T>                                                  │
//! │  - Registry (target → ordered watcher set)                      │
//! │  - on_event callback, optional apply/free hooks                 │
//! │  - ShutdownWatcher (cleanup on loop teardown)                   │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Loop (current-thread tokio runtime + LocalSet)                 │
//! │  - one local task per active watcher                            │
//! │  - io / time / signal drivers                                   │
//! │  - teardown hooks                                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Dispatch
//! ```text
//! watcher fires (target, event, payload)
//!   ├─► disable_watching(target)       every watcher of the target stops
//!   ├─► on_event(target, event, payload)
//!   │       └─ may watch / release / cleanup, including its own target
//!   └─► returned true?  ─► enable_watching(target)
//!       returned false? ─► target stays registered but dormant
//! ```
//!
//! ### Teardown
//! ```text
//! Loop::shutdown() or last Dispatcher handle dropped
//!   └─► cleanup()
//!         ├─ snapshot (all targets, active targets)
//!         ├─ Event::CLEANUP to each active target (return value ignored)
//!         └─ release every target (free hook per target)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                  |
//! |-------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Dispatch**      | Per-target watcher sets, serialized callbacks, cleanup.  | [`Dispatcher`], [`DispatcherBuilder`]      |
//! | **Watchers**      | Timer, I/O readiness and signal subscriptions.           | [`Watcher`], [`Selector`], [`WatcherInfo`] |
//! | **Event loop**    | Run/stop/shutdown over a current-thread runtime.         | [`Loop`]                                   |
//! | **Events**        | Bit set of delivered event kinds.                        | [`Event`]                                  |
//! | **Embedding**     | Fallible callbacks with fault re-raise after cleanup.    | [`embed::Host`], [`embed::default_loop`]   |
//! | **Errors**        | Typed loop and host errors.                              | [`LoopError`], [`HostError`]               |
//! | **Configuration** | Loop and registry settings.                              | [`Config`]                                 |
//!
//! ## Example
//! ```rust
//! use evmux::{Dispatcher, Event, Loop, WeakDispatcher};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let event_loop = Loop::new()?;
//!
//!     let dispatcher = Dispatcher::new_cyclic(event_loop, |this: &WeakDispatcher<&'static str>| {
//!         let this = this.clone();
//!         move |target: &&'static str, event: Event, _payload: Option<i32>| {
//!             println!("{target}: {}", event.as_label());
//!             if let Some(d) = this.upgrade() {
//!                 d.stop();
//!             }
//!             false
//!         }
//!     });
//!
//!     dispatcher.watch_timer(&"hello", 0.01);
//!     dispatcher.run()?;
//!     dispatcher.cleanup();
//!     Ok(())
//! }
//! ```
//!
//! ## Platform
//! Unix only: I/O watchers take raw descriptors and signal watchers take raw signal
//! numbers.

mod config;
mod core;
mod error;
mod events;
mod watchers;

pub mod embed;

// ---- Public re-exports ----

pub use crate::config::Config;
pub use crate::core::{Dispatcher, DispatcherBuilder, Lifecycle, Loop, OnEvent, Target, WeakDispatcher};
pub use crate::error::{HostError, LoopError};
pub use crate::events::Event;
pub use crate::watchers::{
    IoWatcher, Selector, ShutdownWatcher, SignalWatcher, TimerWatcher, Watcher, WatcherInfo,
    WatcherKind,
};
