//! # Timer watcher.
//!
//! Fires [`Event::TIMER`] after `after` seconds, then every `repeat` seconds.
//!
//! ## Normalization
//! - `after < 0` (or NaN, or too large for a [`Duration`]) → disabled, never fires
//! - `repeat < 0` → `0` (one-shot)
//! - `after == 0` → fires on the next loop iteration
//!
//! A one-shot timer is inactive by the time its callback runs; restarting it through
//! the parameterless [`TimerWatcher::resume`] arms it again with the same configuration.
//! Repeating ticks never drift: they are scheduled from the first deadline.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::core::event_loop::Loop;
use crate::events::Event;

use super::arm::{Arm, Notify, Ticket};

/// Deadline used when `after` does not fit in an `Instant` (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Watcher over a relative-deadline timer.
#[derive(Debug)]
pub struct TimerWatcher {
    arm: Arm,
    after: f64,
    repeat: f64,
}

impl TimerWatcher {
    pub(crate) fn new(event_loop: Loop, notify: Notify) -> Self {
        Self {
            arm: Arm::new(event_loop, notify),
            after: -1.0,
            repeat: 0.0,
        }
    }

    /// Returns the configured initial delay in seconds (`-1` when disabled).
    pub fn after(&self) -> f64 {
        self.after
    }

    /// Returns the configured repeat period in seconds (`0` for one-shot).
    pub fn repeat(&self) -> f64 {
        self.repeat
    }

    /// Returns true while the timer is armed.
    pub fn is_active(&self) -> bool {
        self.arm.is_active()
    }

    /// (Re)starts the timer; returns the resulting active state.
    pub fn start(&mut self, after: f64, repeat: f64) -> bool {
        self.arm.disarm();
        self.after = if after >= 0.0 { after } else { -1.0 };
        self.repeat = if repeat > 0.0 { repeat } else { 0.0 };

        let Some(delay) = to_duration(self.after) else {
            return false;
        };
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
        match to_duration(self.repeat).filter(|period| !period.is_zero()) {
            Some(period) => self
                .arm
                .arm_task(|ticket| run_repeating(ticket, deadline, period)),
            None => self.arm.arm_task(|ticket| run_once(ticket, deadline)),
        }
        self.is_active()
    }

    /// Restarts with the last configuration.
    pub fn resume(&mut self) -> bool {
        self.start(self.after, self.repeat)
    }

    /// Stops the timer; no-op when inactive.
    pub fn stop(&mut self) {
        self.arm.disarm();
    }
}

fn to_duration(secs: f64) -> Option<Duration> {
    if secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

async fn run_once(ticket: Ticket, deadline: Instant) {
    time::sleep_until(deadline).await;
    ticket.fire_once(Event::TIMER, None);
}

async fn run_repeating(ticket: Ticket, deadline: Instant, period: Duration) {
    let mut ticks = time::interval_at(deadline, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        if !ticket.fire(Event::TIMER, None) {
            return;
        }
    }
}
