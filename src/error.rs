//! Error types used by the event loop and the embedding boundary.
//!
//! This module defines two error enums:
//!
//! - [`LoopError`] — errors raised while building or running the [`Loop`](crate::Loop).
//! - [`HostError`] — faults re-raised by [`Host::start`](crate::embed::Host::start)
//!   after the loop has fully unwound.
//!
//! Dispatcher operations themselves never fail: invalid parameters, absent targets and
//! registrations during cleanup are reported as `false`.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.

use thiserror::Error;

/// # Errors produced by the event loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoopError {
    /// The underlying runtime could not be constructed.
    #[error("failed to build event loop runtime: {source}")]
    Runtime {
        /// The I/O error reported by the runtime builder.
        #[source]
        source: std::io::Error,
    },

    /// `run()` was called while the loop was already running (e.g. from a callback).
    #[error("event loop is already running")]
    AlreadyRunning,

    /// The loop has been shut down and cannot run again.
    #[error("event loop has been shut down")]
    Terminated,
}

impl LoopError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use evmux::LoopError;
    ///
    /// assert_eq!(LoopError::AlreadyRunning.as_label(), "loop_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoopError::Runtime { .. } => "loop_runtime",
            LoopError::AlreadyRunning => "loop_already_running",
            LoopError::Terminated => "loop_terminated",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoopError::Runtime { source } => format!("runtime: {source}"),
            LoopError::AlreadyRunning => "already running".to_string(),
            LoopError::Terminated => "terminated".to_string(),
        }
    }
}

/// # Faults re-raised at the embedding boundary.
///
/// `E` is the embedding layer's own callback error type.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HostError<E>
where
    E: std::error::Error + 'static,
{
    /// The loop could not be run.
    #[error(transparent)]
    Loop(#[from] LoopError),

    /// An event callback returned an error; the loop was stopped.
    #[error("event callback failed: {0}")]
    Callback(#[source] E),

    /// An event callback panicked; the loop was stopped.
    #[error("event callback panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl<E> HostError<E>
where
    E: std::error::Error + 'static,
{
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HostError::Loop(err) => err.as_label(),
            HostError::Callback(_) => "host_callback_failed",
            HostError::Panicked { .. } => "host_callback_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HostError::Loop(err) => err.as_message(),
            HostError::Callback(err) => format!("callback: {err}"),
            HostError::Panicked { message } => format!("panic: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_labels_are_stable() {
        let err = LoopError::Runtime {
            source: std::io::Error::other("no fds"),
        };
        assert_eq!(err.as_label(), "loop_runtime");
        assert_eq!(LoopError::Terminated.as_label(), "loop_terminated");

        let fault: HostError<Boom> = HostError::Callback(Boom);
        assert_eq!(fault.as_label(), "host_callback_failed");
        assert_eq!(fault.as_message(), "callback: boom");

        let wrapped: HostError<Boom> = LoopError::AlreadyRunning.into();
        assert_eq!(wrapped.as_label(), "loop_already_running");
    }
}
