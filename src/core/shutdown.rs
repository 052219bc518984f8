//! # Loop teardown notifications.
//!
//! [`ShutdownHooks`] is the list of callbacks a [`Loop`](crate::Loop) fires exactly once
//! when it begins tearing down, either through an explicit
//! [`Loop::shutdown`](crate::Loop::shutdown) or when the last loop handle is dropped.
//!
//! ## Rules
//! - Hooks fire in subscription order.
//! - Firing drains the list first, so a hook may subscribe or unsubscribe freely.
//! - After firing, new subscriptions are refused (`None`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifier of a teardown subscription.
pub(crate) type HookId = u64;

/// Teardown callback.
pub(crate) type Hook = Rc<dyn Fn()>;

/// One-shot list of teardown callbacks.
pub(crate) struct ShutdownHooks {
    hooks: RefCell<Vec<(HookId, Hook)>>,
    next_id: Cell<HookId>,
    fired: Cell<bool>,
}

impl ShutdownHooks {
    pub(crate) fn new() -> Self {
        Self {
            hooks: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            fired: Cell::new(false),
        }
    }

    /// Adds a hook; returns `None` if the list has already fired.
    pub(crate) fn subscribe(&self, hook: Hook) -> Option<HookId> {
        if self.fired.get() {
            return None;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.hooks.borrow_mut().push((id, hook));
        Some(id)
    }

    /// Removes a hook; returns `false` if it was not subscribed.
    pub(crate) fn unsubscribe(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.borrow_mut();
        let before = hooks.len();
        hooks.retain(|(hid, _)| *hid != id);
        hooks.len() != before
    }

    /// Fires all hooks once; returns `false` if the list had already fired.
    pub(crate) fn fire(&self) -> bool {
        if self.fired.replace(true) {
            return false;
        }
        let hooks: Vec<(HookId, Hook)> = self.hooks.borrow_mut().drain(..).collect();
        for (_, hook) in hooks {
            hook();
        }
        true
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.fired.get()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.hooks.borrow().len()
    }
}
