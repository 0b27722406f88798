// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::SystemTime;

use crate::registry::CreationSequence;

/// How the values reported by a counter aggregate downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CounterKind {
    /// Each value replaces the previous one.
    Gauge,

    /// Each value is an increment added to a running total.
    CumulativeSum,
}

impl CounterKind {
    /// Returns a short, stable label for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::CumulativeSum => "cumulative_sum",
        }
    }
}

/// One value reported by a counter for a single polling interval.
///
/// Observations are transient: a source produces them when it publishes and listeners
/// consume them right away.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterObservation {
    source_name: Arc<str>,
    counter_name: Arc<str>,
    value: f64,
    kind: CounterKind,
    created_sequence: CreationSequence,
    timestamp: SystemTime,
}

impl CounterObservation {
    /// Creates an observation.
    ///
    /// `created_sequence` identifies the counter instance the value is attributed to.
    #[must_use]
    pub fn new(
        source_name: impl Into<Arc<str>>,
        counter_name: impl Into<Arc<str>>,
        value: f64,
        kind: CounterKind,
        created_sequence: CreationSequence,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            counter_name: counter_name.into(),
            value,
            kind,
            created_sequence,
            timestamp,
        }
    }

    /// Name of the source that published the value.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Name of the counter that reported the value.
    #[must_use]
    pub fn counter_name(&self) -> &str {
        &self.counter_name
    }

    /// The reported value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// How the value aggregates.
    #[must_use]
    pub const fn kind(&self) -> CounterKind {
        self.kind
    }

    /// Creation sequence of the counter instance the value is attributed to.
    #[must_use]
    pub const fn created_sequence(&self) -> CreationSequence {
        self.created_sequence
    }

    /// When the value was published.
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}
