// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

/// The result for fallible operations that use the [`Error`] type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised while configuring event counter instrumentation.
///
/// Errors are raised eagerly, before any source is subscribed, and are not meant to be
/// retried: the configuration has to be fixed instead.
///
/// # Examples
///
/// ```
/// use event_counters::EventCountersOptions;
///
/// let error = EventCountersOptions::builder().add_source("System.Runtime").build().unwrap_err();
/// assert!(error.is_configuration());
/// ```
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(ErrorKind);

#[derive(Debug, thiserror::Error)]
pub(crate) enum ErrorKind {
    #[error("event source '{source_name}' is not supported by event counter instrumentation, use the {alternative} instead")]
    ReservedSource {
        source_name: String,
        alternative: &'static str,
    },

    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument {
        argument: &'static str,
        message: Cow<'static, str>,
    },
}

impl Error {
    pub(crate) const fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub(crate) fn reserved_source(source_name: impl Into<String>, alternative: &'static str) -> Self {
        Self::from_kind(ErrorKind::ReservedSource {
            source_name: source_name.into(),
            alternative,
        })
    }

    pub(crate) fn invalid_argument(argument: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self::from_kind(ErrorKind::InvalidArgument {
            argument,
            message: message.into(),
        })
    }

    /// Returns `true` if the configuration names a source that this instrumentation refuses
    /// to handle.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.0, ErrorKind::ReservedSource { .. })
    }

    /// Returns `true` if an argument was malformed, for example an empty source name.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self.0, ErrorKind::InvalidArgument { .. })
    }
}
