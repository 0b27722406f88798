// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::error::{Error, Result};

/// How often sources publish their counters unless configured otherwise.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Longest accepted refresh interval.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Sources that other instrumentations already cover, paired with the instrumentation to
/// use instead.
pub const RESERVED_SOURCES: &[(&str, &str)] = &[("System.Runtime", "runtime or process instrumentation")];

/// Configuration of [`EventCountersMetrics`][crate::EventCountersMetrics].
///
/// Build it through [`EventCountersOptions::builder`], which validates eagerly. Options
/// obtained some other way (for example deserialized with the `serde` feature) are
/// validated again when the instrumentation is created.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use event_counters::EventCountersOptions;
///
/// let options = EventCountersOptions::builder()
///     .add_source("Microsoft.AspNetCore.Hosting")
///     .add_sources(["System.Net.Http", "System.Net.Sockets"])
///     .refresh_interval(Duration::from_secs(5))
///     .build()?;
///
/// assert_eq!(options.sources().len(), 3);
/// # Ok::<(), event_counters::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawOptions"))]
pub struct EventCountersOptions {
    sources: Vec<String>,
    refresh_interval: Duration,
}

impl EventCountersOptions {
    /// Starts building options with no sources and [`DEFAULT_REFRESH_INTERVAL`].
    #[must_use]
    pub fn builder() -> EventCountersOptionsBuilder {
        EventCountersOptionsBuilder::default()
    }

    /// Names of the sources to listen to.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Interval at which subscribed sources publish their counters.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Returns `true` if `source_name` is one of the configured sources.
    #[must_use]
    pub fn contains_source(&self, source_name: &str) -> bool {
        self.sources.iter().any(|s| s == source_name)
    }

    #[cfg(test)]
    pub(crate) const fn new_unchecked(sources: Vec<String>, refresh_interval: Duration) -> Self {
        Self { sources, refresh_interval }
    }

    /// Checks the options.
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error for empty source names or a refresh interval that is
    /// zero or longer than [`MAX_REFRESH_INTERVAL`], and a configuration error for sources
    /// listed in [`RESERVED_SOURCES`].
    pub fn validate(&self) -> Result<()> {
        for source in &self.sources {
            validate_source(source)?;
        }

        if self.refresh_interval.is_zero() {
            return Err(Error::invalid_argument("refresh_interval", "refresh interval must be greater than zero"));
        }

        if self.refresh_interval > MAX_REFRESH_INTERVAL {
            return Err(Error::invalid_argument("refresh_interval", "refresh interval must not exceed one day"));
        }

        Ok(())
    }
}

impl Default for EventCountersOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

fn validate_source(source: &str) -> Result<()> {
    if source.trim().is_empty() {
        return Err(Error::invalid_argument("sources", "source names must not be empty"));
    }

    if let Some((_, alternative)) = RESERVED_SOURCES.iter().find(|(reserved, _)| *reserved == source) {
        return Err(Error::reserved_source(source, *alternative));
    }

    Ok(())
}

/// Builder for [`EventCountersOptions`].
#[derive(Debug, Clone, Default)]
pub struct EventCountersOptionsBuilder {
    options: EventCountersOptions,
}

impl EventCountersOptionsBuilder {
    /// Adds one source to listen to. Duplicates are ignored.
    #[must_use]
    pub fn add_source(mut self, source_name: impl Into<String>) -> Self {
        let source_name = source_name.into();
        if !self.options.contains_source(&source_name) {
            self.options.sources.push(source_name);
        }
        self
    }

    /// Adds several sources to listen to.
    #[must_use]
    pub fn add_sources<I, S>(self, source_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        source_names.into_iter().fold(self, Self::add_source)
    }

    /// Sets how often subscribed sources publish their counters.
    #[must_use]
    pub const fn refresh_interval(mut self, interval: Duration) -> Self {
        self.options.refresh_interval = interval;
        self
    }

    /// Validates and returns the options.
    ///
    /// # Errors
    ///
    /// See [`EventCountersOptions::validate`].
    pub fn build(self) -> Result<EventCountersOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

/// Serialized shape of the options, with the interval in whole seconds.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawOptions {
    sources: Vec<String>,
    refresh_interval_secs: u64,
}

#[cfg(feature = "serde")]
impl Default for RawOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
        }
    }
}

#[cfg(feature = "serde")]
impl From<RawOptions> for EventCountersOptions {
    fn from(raw: RawOptions) -> Self {
        Self {
            sources: raw.sources,
            refresh_interval: Duration::from_secs(raw.refresh_interval_secs),
        }
    }
}
