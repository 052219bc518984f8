use std::cell::OnceCell;

use crate::core::Loop;
use crate::error::LoopError;

thread_local! {
    static DEFAULT: OnceCell<Loop> = const { OnceCell::new() };
}

/// Returns this thread's default loop, creating it on first use.
///
/// Every call on the same thread returns a handle to the same loop. The loop is torn
/// down when the thread exits.
pub fn default_loop() -> Result<Loop, LoopError> {
    DEFAULT.with(|cell| {
        if let Some(event_loop) = cell.get() {
            return Ok(event_loop.clone());
        }
        let event_loop = Loop::new()?;
        Ok(cell.get_or_init(|| event_loop).clone())
    })
}
