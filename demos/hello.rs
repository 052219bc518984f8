//! # Example: hello
//!
//! Two repeating timers and a SIGINT watch sharing one dispatcher.
//!
//! Demonstrates how to:
//! - Build a [`Dispatcher`] whose callback can reach the dispatcher itself.
//! - Watch timers and a signal on behalf of plain string targets.
//! - Stop the loop from a callback and clean up.
//!
//! ## Flow
//! ```text
//! "Alesh" ── Timer 1.0 s ──┐
//! "World" ── Timer 3.0 s ──┼──► on_event ─► print, keep watching
//! "SIGINT" ─ Signal 2 ─────┘        └─ SIGNAL ─► stop loop ─► cleanup
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=evmux=debug cargo run --example hello
//! ```

use evmux::{Dispatcher, Event, Loop, WeakDispatcher};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let event_loop = Loop::new()?;
    let dispatcher = Dispatcher::new_cyclic(event_loop, |this: &WeakDispatcher<&'static str>| {
        let this = this.clone();
        move |target: &&'static str, event: Event, payload: Option<i32>| {
            match payload {
                Some(value) => println!("{target}: {} ({value})", event.as_label()),
                None => println!("{target}: {}", event.as_label()),
            }
            if event == Event::SIGNAL {
                if let Some(dispatcher) = this.upgrade() {
                    dispatcher.stop();
                }
                return false;
            }
            true
        }
    });

    dispatcher.watch_timer(&"Alesh", 1.0);
    dispatcher.watch_timer(&"World", 3.0);
    dispatcher.watch_signal(&"SIGINT", libc::SIGINT);

    println!("press Ctrl-C to stop");
    dispatcher.run()?;
    dispatcher.cleanup();
    Ok(())
}
