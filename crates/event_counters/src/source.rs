// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::counters::{CounterState, Measurement};
use crate::observation::CounterObservation;
use crate::registry::{CounterRegistry, SequenceGenerator};

/// Receives the observations published by an [`EventSource`].
///
/// Listeners are registered explicitly through [`EventSource::subscribe`]; a source holds
/// no other reference to whatever consumes its counters.
pub trait CounterListener: Send + Sync {
    /// Decides whether the listener wants the counters of the named source.
    ///
    /// Called once, when the listener is offered to a source.
    fn is_enabled_for(&self, source_name: &str) -> bool {
        let _ = source_name;
        true
    }

    /// Handles one observation.
    ///
    /// Called on the thread that publishes the source, with no locks of the source held.
    fn on_observation(&self, observation: &CounterObservation);
}

/// A named notification source that owns counters and publishes their values.
///
/// Counters are attached at creation, see [`EventCounter`][crate::EventCounter] and its
/// siblings. Each call to [`publish`][Self::publish] closes the current polling interval:
/// the active instance of every counter name reports the value it aggregated since the
/// previous call, and each subscribed listener receives it.
///
/// `EventSource` is a cheap handle; clones refer to the same source.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use event_counters::{CounterListener, CounterObservation, EventCounter, EventSource};
///
/// struct Print;
///
/// impl CounterListener for Print {
///     fn on_observation(&self, observation: &CounterObservation) {
///         println!("{}/{} = {}", observation.source_name(), observation.counter_name(), observation.value());
///     }
/// }
///
/// let source = EventSource::new("a");
/// source.subscribe(Arc::new(Print));
///
/// let counter = EventCounter::new("c", &source);
/// counter.write_metric(1.0);
///
/// assert_eq!(source.publish(), 1);
/// ```
#[derive(Clone)]
pub struct EventSource {
    inner: Arc<SourceInner>,
}

struct SourceInner {
    name: Arc<str>,
    sequences: SequenceGenerator,
    counters: CounterRegistry<Arc<CounterState>>,
    listeners: RwLock<Vec<Arc<dyn CounterListener>>>,
}

impl EventSource {
    /// Creates a source without counters or listeners.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                name: name.into(),
                sequences: SequenceGenerator::new(),
                counters: CounterRegistry::new(),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// The name of the source.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Offers a listener to this source.
    ///
    /// Returns `true` if the listener accepted the source and is now subscribed. Offering a
    /// listener that is already subscribed (the same `Arc` allocation) does nothing and
    /// returns `false`.
    pub fn subscribe(&self, listener: Arc<dyn CounterListener>) -> bool {
        if !listener.is_enabled_for(&self.inner.name) {
            tracing::event!(
                name: "event_counters.subscription_declined",
                tracing::Level::DEBUG,
                source.name = %self.inner.name,
            );
            return false;
        }

        {
            let mut listeners = self.inner.listeners.write();
            if listeners.iter().any(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&listener))) {
                tracing::event!(
                    name: "event_counters.already_subscribed",
                    tracing::Level::DEBUG,
                    source.name = %self.inner.name,
                );
                return false;
            }
            listeners.push(listener);
        }

        tracing::event!(
            name: "event_counters.subscribed",
            tracing::Level::DEBUG,
            source.name = %self.inner.name,
        );

        true
    }

    /// Number of subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Number of distinct counter names with at least one live counter.
    #[must_use]
    pub fn counter_count(&self) -> usize {
        self.inner.counters.len()
    }

    /// Closes the current polling interval and delivers one observation per counter that has
    /// a value for it.
    ///
    /// Only the active instance of each counter name is published. Returns the number of
    /// observations produced.
    pub fn publish(&self) -> usize {
        let counters = self.inner.counters.active();
        let listeners = self.inner.listeners.read().clone();
        let timestamp = SystemTime::now();

        let mut published = 0;

        for (_, counter) in counters {
            let Some(value) = counter.take_interval_value() else {
                continue;
            };

            let observation = CounterObservation::new(
                Arc::clone(&self.inner.name),
                Arc::clone(counter.name()),
                value,
                counter.kind(),
                counter.sequence(),
                timestamp,
            );

            for listener in &listeners {
                listener.on_observation(&observation);
            }

            published += 1;
        }

        tracing::event!(
            name: "event_counters.published",
            tracing::Level::TRACE,
            source.name = %self.inner.name,
            observations = published,
            listeners = listeners.len(),
        );

        published
    }

    pub(crate) fn register_counter(&self, name: Arc<str>, measurement: Measurement) -> Arc<CounterState> {
        let sequence = self.inner.sequences.next_sequence();
        let state = Arc::new(CounterState::new(Arc::clone(&name), sequence, measurement));

        self.inner.counters.register(&*name, Arc::clone(&state), sequence);

        tracing::event!(
            name: "event_counters.counter_created",
            tracing::Level::DEBUG,
            source.name = %self.inner.name,
            counter.name = %name,
            counter.kind = state.kind().as_str(),
            counter.sequence = sequence.get(),
        );

        state
    }

    /// Removes a counter instance and moves its unpublished interval data to the instance
    /// that is active afterwards, if any.
    pub(crate) fn deregister_counter(&self, state: &CounterState) {
        let Some(removed) = self.inner.counters.deregister(state.name(), state.sequence()) else {
            return;
        };

        let Some(carryover) = removed.retire() else {
            return;
        };

        while let Some(successor) = self.inner.counters.resolve_active(state.name()) {
            if successor.absorb(carryover) {
                return;
            }
        }
    }

    pub(crate) fn active_counter(&self, name: &str) -> Option<Arc<CounterState>> {
        self.inner.counters.resolve_active(name)
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.inner.name)
            .field("counters", &self.inner.counters)
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}
