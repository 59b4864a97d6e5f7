//! # iso-interval
//!
//! ISO 8601 date, duration and repeating interval parsing with
//! calendar-correct arithmetic.
//!
//! Dates, durations and intervals are parsed character by character into
//! validated parts, resolved to UTC instants, and moved through the
//! calendar the way a wall calendar moves: `P1M` is a month, not 30 days.
//! Repeating intervals answer "when does the current occurrence expire"
//! and "when did it start" relative to a reference instant.
//!
//! ## Modules
//!
//! - [`date`] — calendar, week and ordinal dates with time of day and UTC offset
//! - [`duration`] — `P…T…` durations and duration arithmetic
//! - [`interval`] — the four interval shapes plus the `R<n>/` repeat marker
//! - [`calendar`] — ISO week and ordinal day helpers
//! - [`state`] — one-shot parse state shared by the parser front ends
//! - [`error`] — Error types

pub mod calendar;
mod cursor;
pub mod date;
pub mod duration;
pub mod error;
pub mod interval;
pub mod state;

use chrono::{DateTime, Utc};

pub use calendar::{
    format_instant, iso_week_number, iso_week_one_monday, iso_week_string,
    last_iso_week_of_year, IsoWeek,
};
pub use date::{
    CalendarDate, DateOptions, DateParser, DateParts, OffsetSign, PartialContext, TimeOfDay,
    UtcOffset,
};
pub use duration::{Designator, DurationParser, DurationParts};
pub use error::{Construct, ErrorKind, IsoError};
pub use interval::{Interval, IntervalParser, IntervalType, Recurrence};
pub use state::ParseState;

/// Parse a date literal and resolve it to an instant.
///
/// Literals without an offset are read as local time unless `enforce_utc`
/// is set.
///
/// # Errors
///
/// Returns [`IsoError::MissingSource`] for an empty source and a range
/// class [`IsoError`] for anything that is not a valid ISO 8601 date.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use iso_interval::parse_date;
///
/// let instant = parse_date("2007-04-05T12:30-02:00", false).unwrap();
/// assert_eq!(instant, Utc.with_ymd_and_hms(2007, 4, 5, 14, 30, 0).unwrap());
/// ```
pub fn parse_date(source: &str, enforce_utc: bool) -> error::Result<DateTime<Utc>> {
    let options = DateOptions {
        enforce_utc,
        ..DateOptions::default()
    };
    DateParser::new(source, options).to_instant(enforce_utc)
}

/// Parse a duration literal such as `P1Y2M10DT2H30M`.
///
/// # Examples
///
/// ```
/// use iso_interval::{parse_duration, Designator};
///
/// let duration = parse_duration("PT1,5H").unwrap();
/// assert_eq!(duration.value(Designator::Hours), Some(1.5));
/// assert_eq!(duration.to_string(), "PT1.5H");
/// ```
pub fn parse_duration(source: &str) -> error::Result<DurationParts> {
    DurationParser::new(source).parse().cloned()
}

/// Parse an interval literal, optionally repeated.
///
/// # Examples
///
/// ```
/// use iso_interval::parse_interval;
///
/// let interval = parse_interval("R/P1M", false).unwrap();
/// assert_eq!(interval.to_iso_string().unwrap(), "R-1/P1M");
/// ```
pub fn parse_interval(source: &str, enforce_utc: bool) -> error::Result<Interval> {
    Interval::parse(source, enforce_utc)
}

/// Parse an interval literal and return when its current occurrence
/// expires relative to `compare`.
///
/// `compare` defaults to now. `start` anchors a bare duration.
///
/// # Errors
///
/// Fails when the literal does not parse or the arithmetic is out of range.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use iso_interval::get_expire_at;
///
/// let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
/// assert_eq!(
///     get_expire_at("R3/P1M/2024-07-27T00:00Z", Some(now), None).unwrap(),
///     Utc.with_ymd_and_hms(2024, 6, 27, 0, 0, 0).unwrap()
/// );
/// ```
pub fn get_expire_at(
    source: &str,
    compare: Option<DateTime<Utc>>,
    start: Option<DateTime<Utc>>,
) -> error::Result<DateTime<Utc>> {
    IntervalParser::new(source, false).get_expire_at(compare, start)
}

/// Parse an interval literal and return when its current occurrence
/// started relative to `compare`.
///
/// `end` anchors a bare duration counted backwards.
pub fn get_start_at(
    source: &str,
    compare: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> error::Result<DateTime<Utc>> {
    IntervalParser::new(source, false).get_start_at(compare, end)
}
