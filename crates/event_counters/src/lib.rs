// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Bridges event source counters into OpenTelemetry metrics.
//!
//! An [`EventSource`] owns a set of named counters. Every polling interval the source
//! publishes one [`CounterObservation`] per active counter to each subscribed
//! [`CounterListener`]. [`EventCountersMetrics`] is such a listener: it turns observations
//! into OpenTelemetry observable instruments named `ec.<source>.<counter>`.
//!
//! # Instrument Names
//!
//! Instrument names are limited to [`MAX_INSTRUMENT_NAME_LENGTH`] characters. When the full
//! name does not fit, the source segment is truncated and, if even a single character of
//! it does not fit, omitted. The counter segment is never truncated, see
//! [`instrument_name`].
//!
//! ```
//! use event_counters::instrument_name;
//!
//! assert_eq!(instrument_name("a", "c"), "ec.a.c");
//! assert_eq!(
//!     instrument_name("Microsoft-AspNetCore-Server-Kestrel-1", "tls-handshakes-per-second"),
//!     "ec.Microsoft-AspNetCore-Server-Kestre.tls-handshakes-per-second"
//! );
//! ```
//!
//! # Counter Identity
//!
//! Several live counters on one source may share a name. The most recently created one is
//! active: values written through any of them are attributed to it, and only it is
//! published. See [`CounterRegistry`].
//!
//! # Example
//!
//! ```
//! use event_counters::{EventCounter, EventCountersMetrics, EventCountersOptions, EventSource};
//! use opentelemetry::metrics::MeterProvider;
//!
//! # fn example(provider: &dyn MeterProvider) -> Result<(), event_counters::Error> {
//! let options = EventCountersOptions::builder().add_source("my-component").build()?;
//! let metrics = EventCountersMetrics::new(options, provider)?;
//!
//! let source = EventSource::new("my-component");
//! assert!(metrics.listen(&source));
//!
//! let latency = EventCounter::new("request-latency", &source);
//! latency.write_metric(12.5);
//!
//! // Usually driven by a `Publisher` at the configured refresh interval.
//! source.publish();
//! # Ok(())
//! # }
//! ```

mod counters;
mod error;
mod naming;
mod observation;
mod options;
mod publisher;
mod registry;
mod source;
mod telemetry;
#[cfg(test)]
pub(crate) mod testing;

pub use counters::{EventCounter, IncrementingEventCounter, IncrementingPollingCounter, PollingCounter};
pub use error::{Error, Result};
pub use naming::{INSTRUMENT_NAME_PREFIX, MAX_INSTRUMENT_NAME_LENGTH, instrument_name};
pub use observation::{CounterKind, CounterObservation};
pub use options::{
    DEFAULT_REFRESH_INTERVAL, EventCountersOptions, EventCountersOptionsBuilder, MAX_REFRESH_INTERVAL, RESERVED_SOURCES,
};
pub use publisher::Publisher;
pub use registry::{CounterRegistry, CreationSequence, SequenceGenerator};
pub use source::{CounterListener, EventSource};
pub use telemetry::EventCountersMetrics;
