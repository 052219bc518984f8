//! # Target registry: per-target watcher sets.
//!
//! The [`Registry`] maps each watched target to its [`Entry`]: the ordered list of
//! watchers created for it and the flag marking that its callback is running.
//!
//! ## Architecture
//! ```text
//! Registry<T>
//!   ├─ "Alesh" → Entry { watchers: [Timer],            dispatching: false }
//!   ├─ "World" → Entry { watchers: [Timer, Io(5)],     dispatching: true  }
//!   └─ conn#7  → Entry { watchers: [Io(7), Signal(2)], dispatching: false }
//! ```
//!
//! ## Rules
//! - An entry exists from the first `watch_*` call until the target is released.
//! - Within an entry there is at most one watcher per selector.
//! - The registry never runs user code; callers drop removed entries outside of any borrow.

use std::collections::HashMap;
use std::hash::Hash;

use crate::watchers::Watcher;

/// Identity used as the registry key.
///
/// Implemented for every `Clone + Eq + Hash + 'static` type; the dispatcher never
/// inspects a target beyond comparing and hashing it.
pub trait Target: Clone + Eq + Hash + 'static {}

impl<T> Target for T where T: Clone + Eq + Hash + 'static {}

/// Watchers of one target.
#[derive(Debug, Default)]
pub(crate) struct Entry {
    pub(crate) watchers: Vec<Watcher>,
    /// True while the target's own event callback is executing.
    pub(crate) dispatching: bool,
}

impl Entry {
    pub(crate) fn is_active(&self) -> bool {
        self.watchers.iter().any(Watcher::is_active)
    }
}

/// Map of watched targets.
pub(crate) struct Registry<T: Target> {
    entries: HashMap<T, Entry>,
}

impl<T: Target> Registry<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Creates an empty entry for `target` if needed; returns true if it was created.
    pub(crate) fn ensure(&mut self, target: &T) -> bool {
        if self.entries.contains_key(target) {
            return false;
        }
        self.entries.insert(target.clone(), Entry::default());
        true
    }

    pub(crate) fn get(&self, target: &T) -> Option<&Entry> {
        self.entries.get(target)
    }

    pub(crate) fn get_mut(&mut self, target: &T) -> Option<&mut Entry> {
        self.entries.get_mut(target)
    }

    pub(crate) fn remove(&mut self, target: &T) -> Option<Entry> {
        self.entries.remove(target)
    }

    pub(crate) fn contains(&self, target: &T) -> bool {
        self.entries.contains_key(target)
    }

    /// Returns `(all targets, targets with at least one active watcher)`.
    pub(crate) fn snapshot(&self) -> (Vec<T>, Vec<T>) {
        let all: Vec<T> = self.entries.keys().cloned().collect();
        let active = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_active())
            .map(|(target, _)| target.clone())
            .collect();
        (all, active)
    }

    pub(crate) fn targets(&self) -> Vec<T> {
        self.entries.keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
