//! ISO 8601 durations (`P1Y2M3W4DT5H6M7S`) and calendar-correct duration
//! arithmetic.
//!
//! Years, months, weeks and days are applied by moving calendar fields, so
//! `P1M` from January 31st lands on March 2nd or 3rd just like a wall
//! calendar would. Hours, minutes and seconds are a fixed number of
//! milliseconds wherever they are applied.
//!
//! # Functions
//!
//! - [`DurationParser::parse`] — parse a literal into [`DurationParts`]
//! - [`DurationParts::apply`] — move an instant by the duration N times
//! - [`DurationParts::to_milliseconds`] / [`DurationParts::until_milliseconds`]
//! - [`DurationParts::get_expire_at`] / [`DurationParts::get_start_at`]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::calendar::{calendar_view, CalendarField};
use crate::cursor::Cursor;
use crate::error::{Construct, IsoError, Result};
use crate::state::ParseState;

const DURATION: Construct = Construct::Duration;

/// Longest duration literal accepted, in characters.
pub const MAX_DURATION_LENGTH: usize = 255;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_MINUTE: f64 = 60_000.0;
const MILLIS_PER_SECOND: f64 = 1_000.0;

/// Duration unit letters, in the only order they may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Designator {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl Designator {
    pub const ALL: [Designator; 7] = [
        Designator::Years,
        Designator::Months,
        Designator::Weeks,
        Designator::Days,
        Designator::Hours,
        Designator::Minutes,
        Designator::Seconds,
    ];

    pub fn letter(self) -> char {
        match self {
            Designator::Years => 'Y',
            Designator::Months | Designator::Minutes => 'M',
            Designator::Weeks => 'W',
            Designator::Days => 'D',
            Designator::Hours => 'H',
            Designator::Seconds => 'S',
        }
    }

    pub fn is_time(self) -> bool {
        matches!(
            self,
            Designator::Hours | Designator::Minutes | Designator::Seconds
        )
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Designator named by `letter` in the date or time section.
    fn from_letter(letter: char, time: bool) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.is_time() == time && d.letter() == letter)
    }
}

// ── Parsed parts ────────────────────────────────────────────────────────────

/// A successfully parsed duration.
///
/// Serializes as its canonical string, e.g. `"PT1.5M"`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DurationParts {
    values: [Option<f64>; 7],
    fractional: Option<Designator>,
    time_designator: bool,
}

impl DurationParts {
    /// Value written for `designator`, if any.
    pub fn value(&self, designator: Designator) -> Option<f64> {
        self.values[designator.index()]
    }

    /// The one designator allowed to carry a fraction, if it does.
    pub fn fractional_designator(&self) -> Option<Designator> {
        self.fractional
    }

    /// True when only hours, minutes and seconds are present, making the
    /// duration a fixed number of milliseconds.
    pub fn is_date_indifferent(&self) -> bool {
        Designator::ALL
            .into_iter()
            .filter(|d| !d.is_time())
            .all(|d| self.value(d).is_none())
    }

    /// Fixed milliseconds contributed by hours, minutes and seconds.
    pub fn date_indifferent_milliseconds(&self, repetitions: i64) -> Result<i64> {
        let raw = self.value(Designator::Hours).unwrap_or(0.0) * MILLIS_PER_HOUR
            + self.value(Designator::Minutes).unwrap_or(0.0) * MILLIS_PER_MINUTE
            + self.value(Designator::Seconds).unwrap_or(0.0) * MILLIS_PER_SECOND;
        let millis = (raw * repetitions as f64).round();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return Err(IsoError::OutOfRange(DURATION));
        }
        Ok(millis as i64)
    }

    /// Apply the duration `repetitions` times to `at`, backwards when
    /// `repetitions` is negative.
    ///
    /// Calendar units move wall-clock fields, in UTC when `use_utc` is set
    /// and in local time otherwise. A fraction on the smallest unit is
    /// scaled by the length of the next occurrence of that unit, so `P0.5M`
    /// is half of whichever month follows.
    ///
    /// # Errors
    ///
    /// Returns [`IsoError::OutOfRange`] when the result cannot be
    /// represented.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use iso_interval::parse_duration;
    ///
    /// let duration = parse_duration("P1M").unwrap();
    /// let start = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
    /// let end = duration.apply(start, 1, true).unwrap();
    /// assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    /// ```
    pub fn apply(
        &self,
        at: DateTime<Utc>,
        repetitions: i64,
        use_utc: bool,
    ) -> Result<DateTime<Utc>> {
        let out_of_range = || IsoError::OutOfRange(DURATION);
        let fixed = TimeDelta::try_milliseconds(self.date_indifferent_milliseconds(repetitions)?)
            .ok_or_else(out_of_range)?;
        let mut at = at.checked_add_signed(fixed).ok_or_else(out_of_range)?;
        if self.is_date_indifferent() {
            tracing::trace!(duration = %self, repetitions, use_utc, %at, "applied duration");
            return Ok(at);
        }

        let calendar = calendar_view(use_utc);
        for (designator, field, factor) in [
            (Designator::Years, CalendarField::Year, 1.0),
            (Designator::Months, CalendarField::Month, 1.0),
            (Designator::Weeks, CalendarField::Day, 7.0),
            (Designator::Days, CalendarField::Day, 1.0),
        ] {
            let Some(value) = self.value(designator) else {
                continue;
            };
            let scaled = value * factor * repetitions as f64;
            let whole = scaled.trunc();
            if !whole.is_finite() || whole.abs() >= i64::MAX as f64 {
                return Err(out_of_range());
            }
            at = calendar
                .add(at, field, whole as i64)
                .ok_or_else(out_of_range)?;

            let remainder = scaled - whole;
            if self.fractional == Some(designator) && remainder != 0.0 {
                let step = if repetitions < 0 { -1 } else { 1 };
                let next = calendar.add(at, field, step).ok_or_else(out_of_range)?;
                let unit = (next - at).num_milliseconds() as f64;
                let carry = TimeDelta::try_milliseconds((unit * remainder.abs()).round() as i64)
                    .ok_or_else(out_of_range)?;
                at = at.checked_add_signed(carry).ok_or_else(out_of_range)?;
            }
        }
        tracing::trace!(duration = %self, repetitions, use_utc, %at, "applied duration");
        Ok(at)
    }

    /// Length in milliseconds when applied forward from `start`, which
    /// defaults to 1971-01-01T00:00:00Z, a non-leap year.
    pub fn to_milliseconds(&self, start: Option<DateTime<Utc>>, repetitions: i64) -> Result<i64> {
        let start = start.unwrap_or_else(non_leap_year);
        Ok((self.get_expire_at(Some(start), repetitions)? - start).num_milliseconds())
    }

    /// Length in milliseconds when applied backward from `end`, which
    /// defaults to the Unix epoch. The result is negative.
    pub fn until_milliseconds(&self, end: Option<DateTime<Utc>>, repetitions: i64) -> Result<i64> {
        let end = end.unwrap_or(DateTime::UNIX_EPOCH);
        Ok((self.get_start_at(Some(end), repetitions)? - end).num_milliseconds())
    }

    /// `start` (default now) plus the duration `repetitions` times, in UTC.
    pub fn get_expire_at(
        &self,
        start: Option<DateTime<Utc>>,
        repetitions: i64,
    ) -> Result<DateTime<Utc>> {
        self.apply(start.unwrap_or_else(Utc::now), repetitions, true)
    }

    /// `end` (default now) minus the duration `repetitions` times, in UTC.
    /// Zero repetitions count as one.
    pub fn get_start_at(
        &self,
        end: Option<DateTime<Utc>>,
        repetitions: i64,
    ) -> Result<DateTime<Utc>> {
        let repetitions = if repetitions == 0 { -1 } else { -repetitions };
        self.apply(end.unwrap_or_else(Utc::now), repetitions, true)
    }
}

fn non_leap_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1971, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

impl fmt::Display for DurationParts {
    /// Canonical form: zero-valued designators are left out and `,` becomes `.`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonzero = |d: &Designator| self.value(*d).is_some_and(|v| v != 0.0);
        let (time, date): (Vec<_>, Vec<_>) = Designator::ALL
            .into_iter()
            .filter(nonzero)
            .partition(|d| d.is_time());

        if date.is_empty() && time.is_empty() {
            return f.write_str(if self.time_designator { "PT0S" } else { "P0D" });
        }

        f.write_str("P")?;
        for d in date {
            write!(f, "{}{}", self.values[d.index()].unwrap_or(0.0), d.letter())?;
        }
        if !time.is_empty() {
            f.write_str("T")?;
            for d in time {
                write!(f, "{}{}", self.values[d.index()].unwrap_or(0.0), d.letter())?;
            }
        }
        Ok(())
    }
}

impl FromStr for DurationParts {
    type Err = IsoError;

    fn from_str(s: &str) -> Result<Self> {
        DurationParser::new(s).parse().cloned()
    }
}

impl Serialize for DurationParts {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DurationParts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Scanner ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Expecting `P`.
    Start,
    Date,
    Time,
}

/// Left-to-right duration scanner.
///
/// `next` is the index of the first designator still allowed, which keeps
/// designators unique and in canonical order.
struct DurationScanner<'a> {
    cur: Cursor<'a>,
    phase: Phase,
    next: usize,
    number: String,
    written: usize,
    parts: DurationParts,
}

impl<'a> DurationScanner<'a> {
    fn new(cur: Cursor<'a>) -> Self {
        Self {
            cur,
            phase: Phase::Start,
            next: 0,
            number: String::new(),
            written: 0,
            parts: DurationParts::default(),
        }
    }

    fn run(mut self) -> Result<(DurationParts, Cursor<'a>)> {
        while let Some(c) = self.cur.peek() {
            self.write(c)?;
            self.cur.bump();
        }
        self.finish()?;
        Ok((self.parts, self.cur))
    }

    fn write(&mut self, c: char) -> Result<()> {
        if self.parts.fractional.is_some() {
            return Err(IsoError::FractionNotLast);
        }
        self.written += 1;
        if self.written > MAX_DURATION_LENGTH {
            return Err(IsoError::TooLong {
                construct: DURATION,
                what: "duration",
                limit: MAX_DURATION_LENGTH,
            });
        }

        match (self.phase, c) {
            (Phase::Start, 'P') => self.phase = Phase::Date,
            (Phase::Start, _) => return Err(self.cur.unexpected(DURATION)),
            (_, '0'..='9') => self.number.push(c),
            (_, ',' | '.') if !self.number.is_empty() && !self.number.contains('.') => {
                self.number.push('.');
            }
            (Phase::Date, 'T') if self.number.is_empty() => {
                self.phase = Phase::Time;
                self.next = Designator::Hours.index();
                self.parts.time_designator = true;
            }
            (phase, letter) => {
                let designator = Designator::from_letter(letter, phase == Phase::Time)
                    .filter(|d| d.index() >= self.next)
                    .ok_or_else(|| self.cur.unexpected(DURATION))?;
                self.set_value(designator)?;
            }
        }
        Ok(())
    }

    fn set_value(&mut self, designator: Designator) -> Result<()> {
        if self.number.is_empty() || self.number.ends_with('.') {
            return Err(self.cur.unexpected(DURATION));
        }
        let value: f64 = self
            .number
            .parse()
            .map_err(|_| self.cur.unexpected(DURATION))?;
        if self.number.contains('.') {
            self.parts.fractional = Some(designator);
        }
        self.parts.values[designator.index()] = Some(value);
        self.next = designator.index() + 1;
        self.number.clear();
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if self.written == 0 {
            return Err(IsoError::MissingSource(DURATION));
        }
        let no_values = |time: bool| {
            Designator::ALL
                .into_iter()
                .filter(|d| d.is_time() == time)
                .all(|d| self.parts.value(d).is_none())
        };
        let incomplete = match self.phase {
            Phase::Start => true,
            Phase::Date => no_values(false),
            Phase::Time => no_values(true),
        };
        if incomplete || !self.number.is_empty() {
            return Err(self.cur.unexpected(DURATION));
        }
        Ok(())
    }
}

/// Scan a duration at `cur` up to end of input or the cursor's stop char.
pub(crate) fn scan_duration(cur: Cursor<'_>) -> Result<(DurationParts, Cursor<'_>)> {
    DurationScanner::new(cur).run()
}

// ── Parser front end ────────────────────────────────────────────────────────

/// One-shot parser for a duration literal.
#[derive(Debug, Clone)]
pub struct DurationParser {
    source: String,
    state: ParseState<DurationParts>,
}

impl DurationParser {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: ParseState::Unparsed,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> &ParseState<DurationParts> {
        &self.state
    }

    /// Parse the literal.
    ///
    /// # Errors
    ///
    /// [`IsoError::MissingSource`] for an empty source; otherwise an
    /// unexpected character, [`IsoError::FractionNotLast`] or
    /// [`IsoError::TooLong`]. Later calls after a failure return
    /// [`IsoError::Invalid`].
    pub fn parse(&mut self) -> Result<&DurationParts> {
        let Self { source, state } = self;
        state.resolve(DURATION, || {
            if source.is_empty() {
                return Err(IsoError::MissingSource(DURATION));
            }
            let (parts, _) = scan_duration(Cursor::new(source.as_str()))?;
            Ok(parts)
        })
    }

    pub fn to_iso_string(&mut self) -> Result<String> {
        Ok(self.parse()?.to_string())
    }

    /// [`Self::to_iso_string`], with failures turned into `None`.
    pub fn to_json(&mut self) -> Option<String> {
        self.to_iso_string().ok()
    }
}
