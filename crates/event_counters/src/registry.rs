// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Position of a counter instance in the order counters were created.
///
/// Only used to decide which of several same-named counters is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreationSequence(u64);

impl CreationSequence {
    /// Wraps a raw sequence number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CreationSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Hands out strictly increasing [`CreationSequence`] values, starting at 1.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    last: AtomicU64,
}

impl SequenceGenerator {
    /// Creates a generator whose first value is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: AtomicU64::new(0) }
    }

    /// Returns the next sequence value.
    pub fn next_sequence(&self) -> CreationSequence {
        CreationSequence(self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
    }
}

#[derive(Debug)]
struct Registration<T> {
    sequence: CreationSequence,
    instance: T,
}

/// Tracks the live counter instances of each counter name.
///
/// Any number of instances may share a name. The one registered with the greatest
/// [`CreationSequence`] is the active one, regardless of which instance reported a value most
/// recently. When the active instance is deregistered, the next most recent one takes over.
///
/// Registration, deregistration and lookups are serialized by an internal lock, so a reader
/// never observes a half-applied update.
///
/// # Examples
///
/// ```
/// use event_counters::{CounterRegistry, SequenceGenerator};
///
/// let sequences = SequenceGenerator::new();
/// let registry = CounterRegistry::new();
///
/// registry.register("requests", "first", sequences.next_sequence());
/// registry.register("requests", "second", sequences.next_sequence());
///
/// assert_eq!(registry.resolve_active("requests"), Some("second"));
/// ```
pub struct CounterRegistry<T> {
    entries: RwLock<HashMap<String, Vec<Registration<T>>>>,
}

impl<T> CounterRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a live instance under `counter_name`.
    ///
    /// If an instance with the same name and sequence is already registered, the new
    /// registration takes precedence over it.
    pub fn register(&self, counter_name: impl Into<String>, instance: T, sequence: CreationSequence) {
        self.entries
            .write()
            .entry(counter_name.into())
            .or_default()
            .push(Registration { sequence, instance });
    }

    /// Removes the instance registered under `counter_name` with the given sequence.
    ///
    /// Returns the removed instance, or `None` if there was no such registration.
    pub fn deregister(&self, counter_name: &str, sequence: CreationSequence) -> Option<T> {
        let mut entries = self.entries.write();
        let registrations = entries.get_mut(counter_name)?;

        let index = registrations.iter().rposition(|r| r.sequence == sequence)?;
        let removed = registrations.remove(index);

        if registrations.is_empty() {
            entries.remove(counter_name);
        }

        Some(removed.instance)
    }

    /// Returns the number of distinct counter names with at least one live instance.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no instances are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Clone> CounterRegistry<T> {
    /// Returns the active instance for `counter_name`, if any instance is registered.
    #[must_use]
    pub fn resolve_active(&self, counter_name: &str) -> Option<T> {
        self.entries
            .read()
            .get(counter_name)
            .and_then(|registrations| active_of(registrations))
            .map(|r| r.instance.clone())
    }

    /// Returns a consistent snapshot of the active instance of every counter name.
    #[must_use]
    pub fn active(&self) -> Vec<(String, T)> {
        self.entries
            .read()
            .iter()
            .filter_map(|(name, registrations)| active_of(registrations).map(|r| (name.clone(), r.instance.clone())))
            .collect()
    }
}

/// Greatest sequence wins; among equal sequences the later registration wins.
fn active_of<T>(registrations: &[Registration<T>]) -> Option<&Registration<T>> {
    registrations.iter().max_by_key(|r| r.sequence)
}

impl<T> Default for CounterRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CounterRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_map()
            .entries(entries.iter().map(|(name, registrations)| {
                (name, registrations.iter().map(|r| r.sequence.get()).collect::<Vec<_>>())
            }))
            .finish()
    }
}
