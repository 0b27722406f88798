// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Counter types attached to an [`EventSource`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observation::CounterKind;
use crate::registry::CreationSequence;
use crate::source::EventSource;

type PollFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Per-interval aggregation state of one counter instance.
pub(crate) enum Measurement {
    Mean { sum: f64, count: u64 },
    Increment { pending: f64 },
    Polled(PollFn),
    IncrementingPolled { poll: PollFn, previous: f64 },
}

impl Measurement {
    const fn kind(&self) -> CounterKind {
        match self {
            Self::Mean { .. } | Self::Polled(_) => CounterKind::Gauge,
            Self::Increment { .. } | Self::IncrementingPolled { .. } => CounterKind::CumulativeSum,
        }
    }
}

impl fmt::Debug for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean { sum, count } => f.debug_struct("Mean").field("sum", sum).field("count", count).finish(),
            Self::Increment { pending } => f.debug_struct("Increment").field("pending", pending).finish(),
            Self::Polled(_) => f.write_str("Polled"),
            Self::IncrementingPolled { previous, .. } => f.debug_struct("IncrementingPolled").field("previous", previous).finish(),
        }
    }
}

/// Interval data a removed counter instance hands to the instance that replaces it.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Carryover {
    Mean { sum: f64, count: u64 },
    Increment(f64),
}

#[derive(Debug)]
struct Interval {
    measurement: Measurement,
    retired: bool,
}

#[derive(Debug)]
pub(crate) struct CounterState {
    name: Arc<str>,
    sequence: CreationSequence,
    kind: CounterKind,
    interval: Mutex<Interval>,
}

impl CounterState {
    pub(crate) fn new(name: Arc<str>, sequence: CreationSequence, measurement: Measurement) -> Self {
        Self {
            name,
            sequence,
            kind: measurement.kind(),
            interval: Mutex::new(Interval {
                measurement,
                retired: false,
            }),
        }
    }

    pub(crate) const fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) const fn sequence(&self) -> CreationSequence {
        self.sequence
    }

    pub(crate) const fn kind(&self) -> CounterKind {
        self.kind
    }

    /// Adds a written value to the current interval. Polled counters ignore writes.
    ///
    /// Returns `false` if the instance was retired and the value was not recorded.
    fn record(&self, value: f64) -> bool {
        let mut interval = self.interval.lock();
        if interval.retired {
            return false;
        }

        match &mut interval.measurement {
            Measurement::Mean { sum, count } => {
                *sum += value;
                *count += 1;
            }
            Measurement::Increment { pending } => *pending += value,
            Measurement::Polled(_) | Measurement::IncrementingPolled { .. } => {}
        }

        true
    }

    /// Stops accepting writes and returns what was aggregated since the last publish.
    pub(crate) fn retire(&self) -> Option<Carryover> {
        let mut interval = self.interval.lock();
        interval.retired = true;

        match &mut interval.measurement {
            Measurement::Mean { sum, count } if *count > 0 => Some(Carryover::Mean {
                sum: std::mem::take(sum),
                count: std::mem::take(count),
            }),
            Measurement::Increment { pending } => Some(Carryover::Increment(std::mem::take(pending))),
            _ => None,
        }
    }

    /// Merges interval data of a removed instance into this one.
    ///
    /// Returns `false` if this instance was retired in the meantime. Carryover of a different
    /// kind of counter is discarded.
    pub(crate) fn absorb(&self, carryover: Carryover) -> bool {
        let mut interval = self.interval.lock();
        if interval.retired {
            return false;
        }

        match (&mut interval.measurement, carryover) {
            (Measurement::Mean { sum, count }, Carryover::Mean { sum: carried_sum, count: carried_count }) => {
                *sum += carried_sum;
                *count += carried_count;
            }
            (Measurement::Increment { pending }, Carryover::Increment(carried)) => *pending += carried,
            _ => {}
        }

        true
    }

    /// Returns the value for the interval that just ended and starts a new one.
    ///
    /// Poll callbacks run without the state lock held.
    pub(crate) fn take_interval_value(&self) -> Option<f64> {
        let poll = {
            let mut interval = self.interval.lock();
            match &mut interval.measurement {
                Measurement::Mean { sum, count } => {
                    if *count == 0 {
                        return None;
                    }
                    #[expect(clippy::cast_precision_loss, reason = "interval sample counts stay far below 2^52")]
                    let mean = *sum / *count as f64;
                    *sum = 0.0;
                    *count = 0;
                    return Some(mean);
                }
                Measurement::Increment { pending } => return Some(std::mem::take(pending)),
                Measurement::Polled(poll) | Measurement::IncrementingPolled { poll, .. } => Arc::clone(poll),
            }
        };

        let current = poll();

        let mut interval = self.interval.lock();
        match &mut interval.measurement {
            Measurement::IncrementingPolled { previous, .. } => {
                let increment = current - *previous;
                *previous = current;
                Some(increment)
            }
            _ => Some(current),
        }
    }
}

/// Registration of one counter instance on its source, removed on drop.
#[derive(Debug)]
struct CounterHandle {
    source: EventSource,
    state: Arc<CounterState>,
}

impl CounterHandle {
    fn new(name: impl Into<Arc<str>>, source: &EventSource, measurement: Measurement) -> Self {
        Self {
            source: source.clone(),
            state: source.register_counter(name.into(), measurement),
        }
    }

    /// Records on the active instance of this counter's name, which may be a newer instance
    /// than this one.
    fn record(&self, value: f64) {
        loop {
            let target = self
                .source
                .active_counter(&self.state.name)
                .unwrap_or_else(|| Arc::clone(&self.state));

            // A retired target was already removed from the source, so the next lookup
            // resolves its successor.
            if target.record(value) {
                return;
            }
        }
    }

    fn name(&self) -> &str {
        &self.state.name
    }

    fn sequence(&self) -> CreationSequence {
        self.state.sequence
    }
}

impl Drop for CounterHandle {
    fn drop(&mut self) {
        self.source.deregister_counter(&self.state);
    }
}

macro_rules! counter_accessors {
    ($type:ty) => {
        impl $type {
            /// The name of this counter.
            #[must_use]
            pub fn name(&self) -> &str {
                self.handle.name()
            }

            /// The creation sequence of this counter on its source.
            #[must_use]
            pub fn creation_sequence(&self) -> CreationSequence {
                self.handle.sequence()
            }
        }
    };
}

/// A gauge counter that publishes the mean of the values written during each interval.
///
/// An interval without writes publishes nothing, so downstream gauges keep their last value.
///
/// # Examples
///
/// ```
/// use event_counters::{EventCounter, EventSource};
///
/// let source = EventSource::new("a");
/// let counter = EventCounter::new("request-latency", &source);
///
/// counter.write_metric(10.0);
/// counter.write_metric(20.0);
/// ```
#[derive(Debug)]
pub struct EventCounter {
    handle: CounterHandle,
}

impl EventCounter {
    /// Creates the counter and attaches it to `source`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, source: &EventSource) -> Self {
        Self {
            handle: CounterHandle::new(name, source, Measurement::Mean { sum: 0.0, count: 0 }),
        }
    }

    /// Writes a value for the current interval.
    pub fn write_metric(&self, value: f64) {
        self.handle.record(value);
    }
}

counter_accessors!(EventCounter);

/// A cumulative counter that publishes the sum of the increments made during each interval.
#[derive(Debug)]
pub struct IncrementingEventCounter {
    handle: CounterHandle,
}

impl IncrementingEventCounter {
    /// Creates the counter and attaches it to `source`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, source: &EventSource) -> Self {
        Self {
            handle: CounterHandle::new(name, source, Measurement::Increment { pending: 0.0 }),
        }
    }

    /// Adds `by` to the current interval.
    pub fn increment(&self, by: f64) {
        self.handle.record(by);
    }
}

counter_accessors!(IncrementingEventCounter);

/// A gauge counter whose value is read from a callback whenever its source publishes.
#[derive(Debug)]
pub struct PollingCounter {
    handle: CounterHandle,
}

impl PollingCounter {
    /// Creates the counter and attaches it to `source`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, source: &EventSource, poll: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            handle: CounterHandle::new(name, source, Measurement::Polled(Arc::new(poll))),
        }
    }
}

counter_accessors!(PollingCounter);

/// A cumulative counter fed by a callback returning a running total.
///
/// Each publish reports the difference between the current total and the total seen at the
/// previous publish; the first publish reports the total itself.
#[derive(Debug)]
pub struct IncrementingPollingCounter {
    handle: CounterHandle,
}

impl IncrementingPollingCounter {
    /// Creates the counter and attaches it to `source`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, source: &EventSource, poll: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            handle: CounterHandle::new(
                name,
                source,
                Measurement::IncrementingPolled {
                    poll: Arc::new(poll),
                    previous: 0.0,
                },
            ),
        }
    }
}

counter_accessors!(IncrementingPollingCounter);

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    fn state(measurement: Measurement) -> CounterState {
        CounterState::new("c".into(), CreationSequence::new(1), measurement)
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(EventCounter: Send, Sync);
        static_assertions::assert_impl_all!(IncrementingEventCounter: Send, Sync);
        static_assertions::assert_impl_all!(PollingCounter: Send, Sync);
        static_assertions::assert_impl_all!(IncrementingPollingCounter: Send, Sync);
    }

    #[test]
    fn mean_of_interval_values() {
        let state = state(Measurement::Mean { sum: 0.0, count: 0 });

        state.record(10.0);
        state.record(20.0);

        assert_eq!(state.take_interval_value(), Some(15.0));
        assert_eq!(state.take_interval_value(), None);
    }

    #[test]
    fn increments_reset_each_interval() {
        let state = state(Measurement::Increment { pending: 0.0 });

        state.record(1.0);
        state.record(2.5);

        assert_eq!(state.take_interval_value(), Some(3.5));
        assert_eq!(state.take_interval_value(), Some(0.0));
    }

    #[test]
    fn polled_value_ignores_writes() {
        let state = state(Measurement::Polled(Arc::new(|| 42.0)));

        state.record(1.0);

        assert_eq!(state.kind(), CounterKind::Gauge);
        assert_eq!(state.take_interval_value(), Some(42.0));
        assert_eq!(state.take_interval_value(), Some(42.0));
    }

    #[test]
    fn incrementing_poll_reports_differences() {
        let total = Arc::new(AtomicU64::new(5));
        let poll_total = Arc::clone(&total);
        #[expect(clippy::cast_precision_loss, reason = "small test values")]
        let state = state(Measurement::IncrementingPolled {
            poll: Arc::new(move || poll_total.load(Ordering::Relaxed) as f64),
            previous: 0.0,
        });

        assert_eq!(state.kind(), CounterKind::CumulativeSum);
        assert_eq!(state.take_interval_value(), Some(5.0));

        total.store(12, Ordering::Relaxed);
        assert_eq!(state.take_interval_value(), Some(7.0));
        assert_eq!(state.take_interval_value(), Some(0.0));
    }

    #[test]
    fn retired_state_rejects_writes_and_hands_over_interval() {
        let retiring = state(Measurement::Mean { sum: 0.0, count: 0 });
        let successor = state(Measurement::Mean { sum: 0.0, count: 0 });

        assert!(retiring.record(10.0));
        assert!(retiring.record(30.0));
        assert!(successor.record(50.0));

        let carryover = retiring.retire().unwrap();
        assert!(!retiring.record(1.0));
        assert!(!retiring.absorb(carryover));

        assert!(successor.absorb(carryover));
        assert_eq!(successor.take_interval_value(), Some(30.0));
    }

    #[test]
    fn retiring_without_writes_carries_nothing() {
        assert!(state(Measurement::Mean { sum: 0.0, count: 0 }).retire().is_none());
        assert!(state(Measurement::Polled(Arc::new(|| 1.0))).retire().is_none());
    }

    #[test]
    fn mismatched_carryover_is_discarded() {
        let successor = state(Measurement::Mean { sum: 0.0, count: 0 });

        assert!(successor.absorb(Carryover::Increment(5.0)));
        assert_eq!(successor.take_interval_value(), None);
    }

    #[test]
    fn dropping_active_counter_keeps_its_increments() {
        let source = EventSource::new("a");
        let older = IncrementingEventCounter::new("requests", &source);
        let newer = IncrementingEventCounter::new("requests", &source);

        older.increment(5.0);
        drop(newer);
        older.increment(1.0);

        let active = source.active_counter("requests").unwrap();
        assert_eq!(active.sequence(), older.creation_sequence());
        assert_eq!(active.take_interval_value(), Some(6.0));
    }

    #[test]
    fn counters_expose_name_and_sequence() {
        let source = EventSource::new("a");

        let first = EventCounter::new("first", &source);
        let second = IncrementingEventCounter::new("second", &source);
        let third = PollingCounter::new("third", &source, || 1.0);
        let fourth = IncrementingPollingCounter::new("fourth", &source, || 1.0);

        assert_eq!(first.name(), "first");
        assert_eq!(second.name(), "second");
        assert_eq!(third.name(), "third");
        assert_eq!(fourth.name(), "fourth");
        assert!(first.creation_sequence() < second.creation_sequence());
        assert!(third.creation_sequence() < fourth.creation_sequence());
        assert_eq!(source.counter_count(), 4);
    }

    #[test]
    fn measurement_debug_hides_callbacks() {
        assert_eq!(format!("{:?}", Measurement::Polled(Arc::new(|| 0.0))), "Polled");
        assert!(format!("{:?}", Measurement::Increment { pending: 1.0 }).contains("pending"));
    }
}
