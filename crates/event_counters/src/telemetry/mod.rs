// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! OpenTelemetry metrics fed by event source counters.
//!
//! Every counter gets one observable instrument, named by [`instrument_name`]:
//!
//! - [`CounterKind::Gauge`] counters become `f64` observable gauges reporting the last
//!   published value.
//! - [`CounterKind::CumulativeSum`] counters become `f64` observable counters reporting the
//!   sum of all published increments.
//!
//! Instruments are created the first time a counter publishes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use opentelemetry::metrics::{Meter, MeterProvider};
use parking_lot::Mutex;

use crate::error::Result;
use crate::naming::{MAX_INSTRUMENT_NAME_LENGTH, instrument_name};
use crate::observation::{CounterKind, CounterObservation};
use crate::options::EventCountersOptions;
use crate::publisher::Publisher;
use crate::source::{CounterListener, EventSource};

pub(crate) mod metrics;

use metrics::{Instrument, ValueSlot, create_instrument, create_meter};

/// Records the counters of subscribed event sources as OpenTelemetry metrics.
///
/// Only sources named in [`EventCountersOptions::sources`] are subscribed. Options are
/// validated when the instrumentation is created, so a misconfiguration surfaces before any
/// source is subscribed.
///
/// Cloning is cheap; clones share instruments and values.
///
/// # Examples
///
/// ```
/// use event_counters::{EventCounter, EventCountersMetrics, EventCountersOptions, EventSource};
/// use opentelemetry::metrics::MeterProvider;
///
/// # fn example(provider: &dyn MeterProvider) -> Result<(), event_counters::Error> {
/// let options = EventCountersOptions::builder().add_source("a").build()?;
/// let metrics = EventCountersMetrics::new(options, provider)?;
///
/// let source = EventSource::new("a");
/// metrics.listen(&source);
///
/// let counter = EventCounter::new("c", &source);
/// counter.write_metric(1997.0202);
/// source.publish();
/// // The next collection exports a gauge named `ec.a.c` with value 1997.0202.
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventCountersMetrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    options: EventCountersOptions,
    meter: Meter,
    instruments: Mutex<HashMap<String, RegisteredInstrument>>,
}

struct RegisteredInstrument {
    slot: Arc<ValueSlot>,
    instrument: Instrument,
}

impl EventCountersMetrics {
    /// Creates the instrumentation, obtaining its meter from `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, see [`EventCountersOptions::validate`].
    pub fn new(options: EventCountersOptions, provider: &dyn MeterProvider) -> Result<Self> {
        options.validate()?;

        tracing::event!(
            name: "event_counters.instrumentation_created",
            tracing::Level::DEBUG,
            sources = ?options.sources(),
            refresh_interval = options.refresh_interval().as_secs_f32(),
        );

        Ok(Self {
            inner: Arc::new(MetricsInner {
                options,
                meter: create_meter(provider),
                instruments: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// The options this instrumentation was created with.
    #[must_use]
    pub fn options(&self) -> &EventCountersOptions {
        &self.inner.options
    }

    /// Subscribes to `source` if its name is one of the configured sources.
    ///
    /// Returns `true` if the source was subscribed. Listening to a source this
    /// instrumentation (or one of its clones) already listens to returns `false` and leaves
    /// the existing subscription as is.
    pub fn listen(&self, source: &EventSource) -> bool {
        source.subscribe(Arc::clone(&self.inner) as Arc<dyn CounterListener>)
    }

    /// Starts publishing `sources` at the configured refresh interval.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    #[must_use]
    pub fn spawn_publisher(&self, sources: impl IntoIterator<Item = EventSource>) -> Publisher {
        Publisher::spawn(sources, self.inner.options.refresh_interval())
    }

    /// Number of instruments created so far.
    #[must_use]
    pub fn instrument_count(&self) -> usize {
        self.inner.instruments.lock().len()
    }
}

impl MetricsInner {
    fn record(&self, observation: &CounterObservation) {
        let kind = observation.kind();
        let name = instrument_name(observation.source_name(), observation.counter_name());

        let slot = {
            let mut instruments = self.instruments.lock();

            match instruments.entry(name) {
                Entry::Occupied(entry) => {
                    let registered = entry.get();
                    if registered.instrument.kind() != kind {
                        tracing::event!(
                            name: "event_counters.kind_conflict",
                            tracing::Level::WARN,
                            instrument.name = %entry.key(),
                            instrument.kind = registered.instrument.kind().as_str(),
                            observation.kind = kind.as_str(),
                            "instrument kind conflict, observation dropped",
                        );
                        return;
                    }
                    Arc::clone(&registered.slot)
                }
                Entry::Vacant(entry) => {
                    let name = entry.key().clone();
                    if name.chars().count() > MAX_INSTRUMENT_NAME_LENGTH {
                        tracing::event!(
                            name: "event_counters.name_over_budget",
                            tracing::Level::WARN,
                            instrument.name = %name,
                            max_length = MAX_INSTRUMENT_NAME_LENGTH,
                            "instrument name exceeds length budget",
                        );
                    }

                    let slot = Arc::new(ValueSlot::default());
                    let instrument = create_instrument(&self.meter, name.clone(), kind, &slot);

                    tracing::event!(
                        name: "event_counters.instrument_created",
                        tracing::Level::DEBUG,
                        instrument.name = %name,
                        instrument.kind = kind.as_str(),
                    );

                    Arc::clone(&entry.insert(RegisteredInstrument { slot, instrument }).slot)
                }
            }
        };

        match kind {
            CounterKind::Gauge => slot.set(observation.value()),
            CounterKind::CumulativeSum => slot.add(observation.value()),
        }
    }
}

impl CounterListener for MetricsInner {
    fn is_enabled_for(&self, source_name: &str) -> bool {
        self.options.contains_source(source_name)
    }

    fn on_observation(&self, observation: &CounterObservation) {
        self.record(observation);
    }
}

impl CounterListener for EventCountersMetrics {
    fn is_enabled_for(&self, source_name: &str) -> bool {
        self.inner.is_enabled_for(source_name)
    }

    fn on_observation(&self, observation: &CounterObservation) {
        self.inner.record(observation);
    }
}

impl fmt::Debug for EventCountersMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCountersMetrics")
            .field("options", &self.inner.options)
            .field("instruments", &self.inner.instruments.lock().len())
            .finish_non_exhaustive()
    }
}
