// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Prefix of every instrument name produced by [`instrument_name`].
pub const INSTRUMENT_NAME_PREFIX: &str = "ec";

/// Nominal upper bound, in characters, of an instrument name.
///
/// Names derived from very long counter names may exceed it, see [`instrument_name`].
pub const MAX_INSTRUMENT_NAME_LENGTH: usize = 63;

/// Prefix plus the two segment separators.
const FIXED_LENGTH: usize = INSTRUMENT_NAME_PREFIX.len() + 2;

/// Builds the instrument name for a counter published by an event source.
///
/// The name has the form `ec.<source>.<counter>`. When that exceeds
/// [`MAX_INSTRUMENT_NAME_LENGTH`], the source segment is cut down to its leading characters
/// until the name fits. If not even one source character fits, the source segment is
/// dropped and the name becomes `ec.<counter>`.
///
/// Counter names are never truncated, so a counter name longer than the budget yields an
/// instrument name longer than [`MAX_INSTRUMENT_NAME_LENGTH`].
///
/// Lengths are counted in Unicode scalar values and truncation never splits one.
///
/// # Examples
///
/// ```
/// use event_counters::instrument_name;
///
/// assert_eq!(instrument_name("a", "c"), "ec.a.c");
/// assert_eq!(
///     instrument_name(
///         "Microsoft.AspNetCore.One.Two",
///         "very-very-very-very-very-very-very-very-very-long-event-name"
///     ),
///     "ec.very-very-very-very-very-very-very-very-very-long-event-name"
/// );
/// ```
#[must_use]
pub fn instrument_name(source_name: &str, counter_name: &str) -> String {
    let source_length = source_name.chars().count();
    let counter_length = counter_name.chars().count();

    if FIXED_LENGTH + source_length + counter_length <= MAX_INSTRUMENT_NAME_LENGTH {
        return format!("{INSTRUMENT_NAME_PREFIX}.{source_name}.{counter_name}");
    }

    let allowed_source_length = MAX_INSTRUMENT_NAME_LENGTH.saturating_sub(FIXED_LENGTH + counter_length);

    if allowed_source_length == 0 {
        return format!("{INSTRUMENT_NAME_PREFIX}.{counter_name}");
    }

    let truncated_source = char_prefix(source_name, allowed_source_length);
    format!("{INSTRUMENT_NAME_PREFIX}.{truncated_source}.{counter_name}")
}

/// Returns the first `count` characters of `value`, or all of it when shorter.
fn char_prefix(value: &str, count: usize) -> &str {
    value.char_indices().nth(count).map_or(value, |(end, _)| &value[..end])
}
