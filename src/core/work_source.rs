//! Work sources: date-range partitions for discovery and identifier lists for
//! metadata harvesting.

use std::collections::HashSet;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::error::HarvestError;

/// A half-open `[start, end)` creation-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateInterval {
    /// Inclusive start.
    pub start: NaiveDateTime,
    /// Exclusive end.
    pub end: NaiveDateTime,
}

impl DateInterval {
    /// Create an interval.
    #[must_use]
    pub const fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Width of the interval.
    #[must_use]
    pub fn width(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `instant` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}

/// Upper bound on the number of intervals [`partition`] will build.
pub const MAX_PARTITIONS: usize = 1_000_000;

/// Split `[begin, end)` into `n` contiguous, non-overlapping intervals of equal
/// width (to the millisecond), ordered earliest first.
///
/// The first interval starts at `begin`, each interval starts where the
/// previous one ended, and the last one ends exactly at `end`.
///
/// # Errors
///
/// Returns `HarvestError::InvalidRange` if `n == 0`, if `n` exceeds
/// [`MAX_PARTITIONS`], if `begin >= end`, or if the range is too short to give
/// every interval a non-zero width.
pub fn partition(
    begin: NaiveDateTime,
    end: NaiveDateTime,
    n: usize,
) -> Result<Vec<DateInterval>, HarvestError> {
    if n == 0 {
        return Err(HarvestError::InvalidRange(
            "partition count must be greater than 0".into(),
        ));
    }
    if n > MAX_PARTITIONS {
        return Err(HarvestError::InvalidRange(format!(
            "partition count {n} exceeds the limit of {MAX_PARTITIONS}"
        )));
    }
    if begin >= end {
        return Err(HarvestError::InvalidRange(format!(
            "begin {begin} must be before end {end}"
        )));
    }

    let total_ms = i128::from((end - begin).num_milliseconds());
    let parts = i128::try_from(n)
        .map_err(|_| HarvestError::InvalidRange(format!("partition count {n} is too large")))?;
    if parts > total_ms {
        return Err(HarvestError::InvalidRange(format!(
            "cannot split {total_ms}ms into {n} non-empty intervals"
        )));
    }

    let boundary = |i: i128| -> NaiveDateTime {
        if i == parts {
            return end;
        }
        // i <= parts, so the offset never exceeds the i64 range of total_ms.
        let offset = i64::try_from(total_ms * i / parts).unwrap_or(i64::MAX);
        begin + Duration::milliseconds(offset)
    };

    let mut intervals = Vec::with_capacity(n);
    let mut start = begin;
    for i in 1..=parts {
        let stop = boundary(i);
        intervals.push(DateInterval::new(start, stop));
        start = stop;
    }
    Ok(intervals)
}

/// [`partition`] over whole days, starting and ending at midnight.
///
/// The listing API filters by date, so an interval shorter than a day would
/// only repeat its neighbour's query.
///
/// # Errors
///
/// Same as [`partition`], and `HarvestError::InvalidRange` when `n` exceeds
/// the number of days in the range.
pub fn partition_dates(
    begin: NaiveDate,
    end: NaiveDate,
    n: usize,
) -> Result<Vec<DateInterval>, HarvestError> {
    let days = (end - begin).num_days();
    if days > 0 && i64::try_from(n).map_or(true, |n| n > days) {
        return Err(HarvestError::InvalidRange(format!(
            "cannot split {days} days into {n} intervals"
        )));
    }
    partition(begin.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN), n)
}

/// An ordered, duplicate-free list of resource identifiers.
///
/// Discovery intervals may overlap at their boundaries when the remote API
/// only filters by whole days, so the same identifier can be reported twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierList {
    ids: Vec<String>,
}

impl IdentifierList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over the identifiers in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Consume the list.
    #[must_use]
    pub fn into_inner(self) -> Vec<String> {
        self.ids
    }
}

impl FromIterator<String> for IdentifierList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let ids = iter
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { ids }
    }
}

impl IntoIterator for IdentifierList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}
