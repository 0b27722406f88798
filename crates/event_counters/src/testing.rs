// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test utilities for collecting exported metrics and captured logs.

use std::io::Write;
use std::sync::{Arc, Mutex};

use opentelemetry_sdk::metrics::data::{AggregatedMetrics, Metric, MetricData, ScopeMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use tracing_subscriber::fmt::MakeWriter;

use crate::observation::CounterKind;

/// One exported `f64` data point.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CollectedMetric {
    pub name: String,
    pub kind: CounterKind,
    pub value: f64,
}

/// Test helper for collecting `OTel` metrics.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    #[must_use]
    pub fn new() -> Self {
        let in_memory = InMemoryMetricExporter::default();

        Self {
            exporter: in_memory.clone(),
            provider: SdkMeterProvider::builder().with_periodic_exporter(in_memory).build(),
        }
    }

    #[must_use]
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Forces a collection and returns the data points of the latest export.
    #[must_use]
    pub fn collect(&self) -> Vec<CollectedMetric> {
        self.provider.force_flush().unwrap();

        self.exporter
            .get_finished_metrics()
            .unwrap()
            .last()
            .map(|resource| {
                resource
                    .scope_metrics()
                    .flat_map(ScopeMetrics::metrics)
                    .flat_map(collect_metric)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn collect_metric(metric: &Metric) -> Vec<CollectedMetric> {
    let name = metric.name().to_string();

    match metric.data() {
        AggregatedMetrics::F64(MetricData::Gauge(data)) => data
            .data_points()
            .map(|point| CollectedMetric {
                name: name.clone(),
                kind: CounterKind::Gauge,
                value: point.value(),
            })
            .collect(),
        AggregatedMetrics::F64(MetricData::Sum(data)) => data
            .data_points()
            .map(|point| CollectedMetric {
                name: name.clone(),
                kind: CounterKind::CumulativeSum,
                value: point.value(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Thread-local log capture buffer for testing.
///
/// Uses `tracing_subscriber::fmt::MakeWriter` to capture formatted log output
/// into a buffer that can be inspected in tests.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured log output as a string.
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
    }

    /// Asserts that the captured log output contains the given string.
    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Creates a `tracing_subscriber` that writes to this capture buffer.
    /// Use with `set_default()` for thread-local capture.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Writer that appends to a shared buffer.
pub(crate) struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
