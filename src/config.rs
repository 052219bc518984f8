//! # Runtime configuration.
//!
//! Provides [`Config`] centralized settings for the [`Loop`](crate::Loop) and the
//! [`Dispatcher`](crate::Dispatcher) target table.
//!
//! Config is used in two ways:
//! 1. **Loop creation**: `Loop::with_config(&config)`
//! 2. **Dispatcher creation**: `Dispatcher::builder(..).with_config(&config)`
//!
//! ## Sentinel values
//! - `event_interval = 0` → clamped to 1 (driver polled after every task)

/// Configuration for the event loop and dispatcher.
///
/// ## Field semantics
/// - `event_interval`: scheduler ticks between I/O/timer driver polls (min 1)
/// - `registry_capacity`: initial capacity of the target table
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of watcher tasks polled between two polls of the I/O and timer driver.
    ///
    /// Lower values make readiness detection more eager at the cost of throughput.
    pub event_interval: u32,

    /// Initial capacity of the dispatcher's target table.
    ///
    /// The table grows on demand; this only avoids early reallocations.
    pub registry_capacity: usize,
}

impl Config {
    /// Returns the event interval clamped to a minimum of 1.
    #[inline]
    pub fn event_interval_clamped(&self) -> u32 {
        self.event_interval.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `event_interval = 61` (tokio's own default)
    /// - `registry_capacity = 64`
    fn default() -> Self {
        Self {
            event_interval: 61,
            registry_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_interval_is_clamped() {
        let cfg = Config {
            event_interval: 0,
            ..Config::default()
        };
        assert_eq!(cfg.event_interval_clamped(), 1);
        assert_eq!(Config::default().event_interval_clamped(), 61);
    }
}
