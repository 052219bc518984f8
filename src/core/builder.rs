use std::rc::Rc;

use crate::config::Config;
use crate::core::event_loop::Loop;
use crate::core::registry::Target;
use crate::events::Event;

use super::dispatcher::{Dispatcher, Lifecycle, OnEvent, Parts, WeakDispatcher};

/// Builder for constructing a [`Dispatcher`] with optional lifecycle hooks.
pub struct DispatcherBuilder<T: Target> {
    event_loop: Loop,
    apply: Option<Lifecycle<T>>,
    free: Option<Lifecycle<T>>,
    capacity: usize,
}

impl<T: Target> DispatcherBuilder<T> {
    /// Creates a builder bound to `event_loop` with the default [`Config`].
    pub fn new(event_loop: Loop) -> Self {
        Self {
            event_loop,
            apply: None,
            free: None,
            capacity: Config::default().registry_capacity,
        }
    }

    /// Sets the target lifecycle hooks.
    ///
    /// `apply` runs when a target gets its first watcher, `free` after it has been
    /// released (explicitly or by cleanup). Each runs exactly once per transition, so
    /// they can pin and unpin whatever keeps the target alive.
    pub fn with_lifecycle<A, F>(mut self, apply: A, free: F) -> Self
    where
        A: Fn(&T) + 'static,
        F: Fn(&T) + 'static,
    {
        self.apply = Some(Rc::new(apply));
        self.free = Some(Rc::new(free));
        self
    }

    /// Applies dispatcher settings from `cfg`.
    pub fn with_config(mut self, cfg: &Config) -> Self {
        self.capacity = cfg.registry_capacity;
        self
    }

    /// Builds the dispatcher with the given event callback.
    ///
    /// The callback returns `true` to keep the target's watchers running.
    pub fn build<F>(self, on_event: F) -> Dispatcher<T>
    where
        F: Fn(&T, Event, Option<i32>) -> bool + 'static,
    {
        let on_event: OnEvent<T> = Rc::new(on_event);
        Dispatcher::assemble(self.into_parts(), move |_| on_event)
    }

    /// Builds the dispatcher with a callback that holds a weak handle to it.
    pub fn build_cyclic<M, F>(self, make: M) -> Dispatcher<T>
    where
        M: FnOnce(&WeakDispatcher<T>) -> F,
        F: Fn(&T, Event, Option<i32>) -> bool + 'static,
    {
        Dispatcher::assemble(self.into_parts(), move |this| {
            let on_event: OnEvent<T> = Rc::new(make(this));
            on_event
        })
    }

    fn into_parts(self) -> Parts<T> {
        Parts {
            event_loop: self.event_loop,
            apply: self.apply,
            free: self.free,
            capacity: self.capacity,
        }
    }
}
