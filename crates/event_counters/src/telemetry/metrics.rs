// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Meter, MeterProvider, ObservableCounter, ObservableGauge};
use parking_lot::Mutex;

use crate::observation::CounterKind;

const METER_NAME: &str = "event_counters";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

/// Latest value of one instrument, read by the instrument callback at collection time.
#[derive(Debug, Default)]
pub(crate) struct ValueSlot {
    value: Mutex<f64>,
}

impl ValueSlot {
    pub(crate) fn set(&self, value: f64) {
        *self.value.lock() = value;
    }

    pub(crate) fn add(&self, increment: f64) {
        *self.value.lock() += increment;
    }

    pub(crate) fn get(&self) -> f64 {
        *self.value.lock()
    }
}

/// Keeps the observable instrument registered for as long as the instrumentation lives.
#[derive(Debug)]
pub(crate) enum Instrument {
    Gauge(#[expect(dead_code, reason = "held to keep the callback registered")] ObservableGauge<f64>),
    Sum(#[expect(dead_code, reason = "held to keep the callback registered")] ObservableCounter<f64>),
}

impl Instrument {
    pub(crate) const fn kind(&self) -> CounterKind {
        match self {
            Self::Gauge(_) => CounterKind::Gauge,
            Self::Sum(_) => CounterKind::CumulativeSum,
        }
    }
}

pub(crate) fn create_instrument(meter: &Meter, name: String, kind: CounterKind, slot: &Arc<ValueSlot>) -> Instrument {
    let slot = Arc::clone(slot);

    match kind {
        CounterKind::Gauge => Instrument::Gauge(
            meter
                .f64_observable_gauge(name)
                .with_description("Event counter value")
                .with_callback(move |observer| observer.observe(slot.get(), &[]))
                .build(),
        ),
        CounterKind::CumulativeSum => Instrument::Sum(
            meter
                .f64_observable_counter(name)
                .with_description("Event counter total")
                .with_callback(move |observer| observer.observe(slot.get(), &[]))
                .build(),
        ),
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use opentelemetry_sdk::metrics::InMemoryMetricExporter;

    use super::*;

    #[test]
    fn value_slot_set_and_add() {
        let slot = ValueSlot::default();

        slot.set(2.0);
        slot.add(0.5);
        assert!((slot.get() - 2.5).abs() < f64::EPSILON);

        slot.set(1.0);
        assert!((slot.get() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    #[cfg(not(miri))]
    fn assert_definitions() {
        let exporter = InMemoryMetricExporter::default();
        let meter_provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_periodic_exporter(exporter.clone())
            .build();

        let meter = create_meter(&meter_provider);
        let slot = Arc::new(ValueSlot::default());
        slot.set(7.0);
        let instrument = create_instrument(&meter, "ec.a.c".to_string(), CounterKind::Gauge, &slot);
        assert_eq!(instrument.kind(), CounterKind::Gauge);

        meter_provider.force_flush().unwrap();

        let metrics = exporter.get_finished_metrics().unwrap();
        let str = format!("{metrics:?}");

        assert!(str.contains("ec.a.c"));
        assert!(str.contains("event_counters"));
        assert!(str.contains("v0.1.0"));
        assert!(str.contains("https://opentelemetry.io/schemas/1.47"));
    }
}
