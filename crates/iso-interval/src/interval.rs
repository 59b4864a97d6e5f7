//! ISO 8601 intervals and repeating intervals.
//!
//! Four shapes are accepted, each optionally prefixed with a repeat marker
//! (`R5/`, `R/`, `R-1/`):
//!
//! - `<start>/<end>`, where the end may be abbreviated (`2007-11-13T09:00/15T17:00`)
//! - `<start>/<duration>`
//! - `<duration>/<end>`
//! - `<duration>`
//!
//! A lone `<start>` is accepted as well. Repetition only counts when a
//! duration is present.
//!
//! # Functions
//!
//! - [`Interval::parse`] — parse an interval literal
//! - [`Interval::get_expire_at`] — next occurrence boundary after a reference instant
//! - [`Interval::get_start_at`] — most recent occurrence boundary before it
//! - [`Interval::to_iso_string`] — canonical rendering

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cursor::{Cursor, MINUS_SIGN};
use crate::date::{DateGrammar, DateParts, PartialContext};
use crate::duration::{scan_duration, DurationParts};
use crate::error::{Construct, IsoError, Result};
use crate::state::ParseState;

const INTERVAL: Construct = Construct::Interval;

/// How many times an interval recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Recurrence {
    Bounded(u64),
    /// `R/` or `R-1/`.
    Unbounded,
}

impl Recurrence {
    /// Upper bound on occurrences, with unbounded mapped to `u64::MAX`.
    fn limit(self) -> u64 {
        match self {
            Recurrence::Bounded(n) => n,
            Recurrence::Unbounded => u64::MAX,
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Bounded(n) => write!(f, "R{n}"),
            Recurrence::Unbounded => f.write_str("R-1"),
        }
    }
}

/// Which parts an interval carries, as bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct IntervalType(u8);

impl IntervalType {
    /// An explicit repeat count other than 1, combined with a duration.
    pub const REPEAT: Self = Self(1);
    pub const START: Self = Self(2);
    pub const DURATION: Self = Self(4);
    pub const END: Self = Self(8);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// A parsed interval.
///
/// Serializes as its canonical string.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    source: String,
    /// Repeat marker as written, whether or not it counts.
    pub repeat: Option<Recurrence>,
    pub start: Option<DateParts>,
    pub duration: Option<DurationParts>,
    pub end: Option<DateParts>,
    pub kind: IntervalType,
    /// Read offset-less dates as UTC.
    pub enforce_utc: bool,
}

impl Interval {
    /// Parse an interval literal.
    ///
    /// # Errors
    ///
    /// [`IsoError::MissingSource`] for an empty source. Unknown leading
    /// tokens, bad repeat markers and date or duration grammar errors are
    /// reported as unexpected characters. A start, duration and end
    /// together, or any other leftover input, is an
    /// [`IsoError::IllegalCombination`]. An abbreviated end before its start
    /// is [`IsoError::EndBeforeStart`].
    ///
    /// # Examples
    ///
    /// ```
    /// use iso_interval::{Interval, IntervalType, Recurrence};
    ///
    /// let interval = Interval::parse("R5/2008-03-01T13:00:00Z/P1Y2M10DT2H30M", false).unwrap();
    /// assert_eq!(interval.repeat, Some(Recurrence::Bounded(5)));
    /// assert!(interval.kind.contains(IntervalType::REPEAT));
    /// ```
    pub fn parse(source: &str, enforce_utc: bool) -> Result<Self> {
        if source.is_empty() {
            return Err(IsoError::MissingSource(INTERVAL));
        }
        let mut interval = Interval {
            source: source.to_string(),
            repeat: None,
            start: None,
            duration: None,
            end: None,
            kind: IntervalType::default(),
            enforce_utc,
        };

        let mut cur = Cursor::new(source);
        if cur.eat('R') {
            interval.repeat = Some(recurrence(&mut cur)?);
        }

        match cur.peek() {
            Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | MINUS_SIGN) => {
                let mut grammar = DateGrammar::new(cur.with_stop(Some('/')), false);
                interval.start = Some(grammar.full()?);
                interval.kind.insert(IntervalType::START);
                cur = grammar.cursor().with_stop(None);
            }
            Some('P') => {}
            _ => return Err(cur.unexpected(INTERVAL)),
        }

        let after_start = interval.start.is_none() || cur.eat('/');
        if after_start && cur.peek() == Some('P') {
            let (duration, rest) = scan_duration(cur.with_stop(Some('/')))?;
            cur = rest.with_stop(None);
            interval.duration = Some(duration);
            interval.kind.insert(IntervalType::DURATION);
            if interval
                .repeat
                .is_some_and(|r| r != Recurrence::Bounded(1))
            {
                interval.kind.insert(IntervalType::REPEAT);
            }

            if cur.eat('/') {
                if interval.start.is_some() {
                    return Err(IsoError::IllegalCombination(source.to_string()));
                }
                let mut grammar = DateGrammar::new(cur, false);
                interval.end = Some(grammar.full()?);
                interval.kind.insert(IntervalType::END);
                cur = grammar.cursor();
            }
        } else if after_start {
            if let Some(start) = &interval.start {
                let mut grammar = DateGrammar::inheriting(cur, start.extended);
                let mut end = grammar.partial(PartialContext::from(start))?;
                cur = grammar.cursor();
                if end.offset.is_none() {
                    end.offset = start.offset;
                }
                if end.to_instant(enforce_utc)? < start.to_instant(enforce_utc)? {
                    return Err(IsoError::EndBeforeStart);
                }
                interval.end = Some(end);
                interval.kind.insert(IntervalType::END);
            }
        }

        if !cur.is_done() {
            return Err(IsoError::IllegalCombination(source.to_string()));
        }
        tracing::debug!(source, kind = interval.kind.bits(), "parsed ISO 8601 interval");
        Ok(interval)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Repetitions that count: the repeat marker when it applies, else one.
    pub fn repetitions(&self) -> Recurrence {
        match self.repeat {
            Some(repeat) if self.kind.contains(IntervalType::REPEAT) => repeat,
            _ => Recurrence::Bounded(1),
        }
    }

    pub fn start_date(&self) -> Result<Option<DateTime<Utc>>> {
        self.start
            .as_ref()
            .map(|start| start.to_instant(self.enforce_utc))
            .transpose()
    }

    pub fn end_date(&self) -> Result<Option<DateTime<Utc>>> {
        self.end
            .as_ref()
            .map(|end| end.to_instant(self.enforce_utc))
            .transpose()
    }

    /// The boundary at which the current occurrence expires.
    ///
    /// `compare` defaults to now. `start` anchors a bare duration and
    /// defaults to `compare`. Dates with an offset, or any date when
    /// `enforce_utc` is set, move through the calendar in UTC; the others
    /// in local time.
    ///
    /// # Errors
    ///
    /// Fails when a date or the arithmetic is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use iso_interval::Interval;
    ///
    /// let interval = Interval::parse("R3/P1M/2024-07-27T00:00Z", false).unwrap();
    /// let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    /// assert_eq!(
    ///     interval.get_expire_at(Some(now), None, false).unwrap(),
    ///     Utc.with_ymd_and_hms(2024, 6, 27, 0, 0, 0).unwrap()
    /// );
    /// ```
    pub fn get_expire_at(
        &self,
        compare: Option<DateTime<Utc>>,
        start: Option<DateTime<Utc>>,
        enforce_utc: bool,
    ) -> Result<DateTime<Utc>> {
        let utc = enforce_utc || self.enforce_utc;
        let repetitions = self.repetitions();
        if repetitions == Recurrence::Bounded(1) {
            if let Some(end) = &self.end {
                return end.to_instant(utc);
            }
        }

        let now = compare.unwrap_or_else(Utc::now);
        match (&self.start, &self.duration, &self.end) {
            (Some(from), Some(duration), _) => {
                let walk = Walk::new(duration, repetitions, from.offset.is_some() || utc);
                walk.forward(from.to_instant(utc)?, now)
            }
            (None, Some(duration), Some(end)) => {
                let walk = Walk::new(duration, repetitions, end.offset.is_some() || utc);
                walk.backward(end.to_instant(utc)?, now)
            }
            (None, Some(duration), None) => {
                Walk::new(duration, repetitions, true).forward(start.unwrap_or(now), now)
            }
            (Some(_), None, Some(end)) => end.to_instant(utc),
            (Some(from), None, None) => from.to_instant(utc),
            (None, None, _) => Err(IsoError::Invalid(INTERVAL)),
        }
    }

    /// The boundary at which the current occurrence started.
    ///
    /// `end` anchors a bare duration counted backwards; without it the
    /// duration is placed to expire one step after `compare`.
    pub fn get_start_at(
        &self,
        compare: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        enforce_utc: bool,
    ) -> Result<DateTime<Utc>> {
        let utc = enforce_utc || self.enforce_utc;
        let repetitions = self.repetitions();
        if repetitions == Recurrence::Bounded(1) {
            if let Some(start) = &self.start {
                return start.to_instant(utc);
            }
        }

        let now = compare.unwrap_or_else(Utc::now);
        match (&self.start, &self.duration, &self.end) {
            (Some(anchor), Some(duration), _) | (None, Some(duration), Some(anchor)) => {
                let expire_at = self.get_expire_at(Some(now), None, enforce_utc)?;
                duration.apply(expire_at, -1, anchor.offset.is_some() || utc)
            }
            (None, Some(duration), None) => {
                let expire_at = match end {
                    None => self.get_expire_at(Some(now), Some(now), enforce_utc)?,
                    Some(end) if repetitions == Recurrence::Bounded(1) => end,
                    Some(end) => Walk::new(duration, repetitions, true).backward(end, now)?,
                };
                duration.get_start_at(Some(expire_at), 1)
            }
            (Some(start), None, _) => start.to_instant(utc),
            (None, None, _) => Err(IsoError::Invalid(INTERVAL)),
        }
    }

    /// Canonical rendering, e.g. `R2/2007-03-01T13:00:30.124Z/PT1.5M`.
    ///
    /// Dates are normalized to UTC with millisecond precision. The repeat
    /// marker is kept only when it counts.
    pub fn to_iso_string(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(4);
        if self.kind.contains(IntervalType::REPEAT) {
            if let Some(repeat) = self.repeat {
                parts.push(repeat.to_string());
            }
        }
        if let Some(start) = &self.start {
            parts.push(start.to_iso_string(self.enforce_utc)?);
        }
        if let Some(duration) = &self.duration {
            parts.push(duration.to_string());
        }
        if let Some(end) = &self.end {
            parts.push(end.to_iso_string(self.enforce_utc)?);
        }
        Ok(parts.join("/"))
    }
}

/// Repeat count after the `R`, through the closing `/`.
fn recurrence(cur: &mut Cursor<'_>) -> Result<Recurrence> {
    let recurrence = if cur.eat('-') {
        if !cur.eat('1') {
            return Err(cur.unexpected(INTERVAL));
        }
        Recurrence::Unbounded
    } else {
        let mut count: Option<u64> = None;
        while let Some(d) = cur.eat_digit() {
            let next = count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|n| n.checked_add(u64::from(d)))
                .ok_or(IsoError::OutOfRange(INTERVAL))?;
            count = Some(next);
        }
        count.map_or(Recurrence::Unbounded, Recurrence::Bounded)
    };
    if !cur.eat('/') {
        return Err(cur.unexpected(INTERVAL));
    }
    Ok(recurrence)
}

// ── Occurrence walking ──────────────────────────────────────────────────────

/// Counts whole durations between an anchor and a reference instant.
///
/// The first guess divides by the length of one duration at the anchor,
/// then steps one occurrence at a time since months and years vary in
/// length.
struct Walk<'a> {
    duration: &'a DurationParts,
    limit: u64,
    use_utc: bool,
}

impl<'a> Walk<'a> {
    fn new(duration: &'a DurationParts, repetitions: Recurrence, use_utc: bool) -> Self {
        Self {
            duration,
            limit: repetitions.limit(),
            use_utc,
        }
    }

    fn at(&self, anchor: DateTime<Utc>, n: u64, backwards: bool) -> Result<DateTime<Utc>> {
        let n = i64::try_from(n).map_err(|_| IsoError::OutOfRange(INTERVAL))?;
        self.duration
            .apply(anchor, if backwards { -n } else { n }, self.use_utc)
    }

    /// First boundary after `now`, at most `limit` durations past `start`.
    fn forward(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if self.limit == 0 {
            return Ok(start);
        }
        let step = self.duration.to_milliseconds(Some(start), 1)?;
        if step <= 0 {
            return Ok(start);
        }

        let elapsed = (now - start).num_milliseconds();
        let estimate = if elapsed < 0 {
            1
        } else {
            (elapsed / step) as u64 + 1
        };
        let mut n = estimate.min(self.limit);
        let mut expire_at = self.at(start, n, false)?;

        while n > 1 {
            let previous = self.at(start, n - 1, false)?;
            if previous <= now {
                break;
            }
            n -= 1;
            expire_at = previous;
        }
        while expire_at <= now && n < self.limit {
            n += 1;
            expire_at = self.at(start, n, false)?;
        }
        tracing::trace!(%start, %now, occurrence = n, %expire_at, "walked forward");
        Ok(expire_at)
    }

    /// Earliest boundary after `now`, counting back at most `limit - 1`
    /// durations from `end`.
    fn backward(&self, end: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if self.limit == 0 || now >= end {
            return Ok(end);
        }
        let step = -self.duration.until_milliseconds(Some(end), 1)?;
        if step <= 0 {
            return Ok(end);
        }

        let last = self.limit - 1;
        let mut k = (((end - now).num_milliseconds() / step) as u64).min(last);
        let mut expire_at = self.at(end, k, true)?;

        while k > 0 && expire_at <= now {
            k -= 1;
            expire_at = self.at(end, k, true)?;
        }
        while k < last {
            let earlier = self.at(end, k + 1, true)?;
            if earlier <= now {
                break;
            }
            k += 1;
            expire_at = earlier;
        }
        tracing::trace!(%end, %now, occurrence = k, %expire_at, "walked backward");
        Ok(expire_at)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_iso_string() {
            Ok(iso) => f.write_str(&iso),
            Err(_) => f.write_str(&self.source),
        }
    }
}

impl FromStr for Interval {
    type Err = IsoError;

    fn from_str(s: &str) -> Result<Self> {
        Interval::parse(s, false)
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let iso = self.to_iso_string().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&iso)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Parser front end ────────────────────────────────────────────────────────

/// One-shot interval parser.
#[derive(Debug, Clone)]
pub struct IntervalParser {
    source: String,
    enforce_utc: bool,
    state: ParseState<Interval>,
}

impl IntervalParser {
    pub fn new(source: impl Into<String>, enforce_utc: bool) -> Self {
        Self {
            source: source.into(),
            enforce_utc,
            state: ParseState::Unparsed,
        }
    }

    pub fn state(&self) -> &ParseState<Interval> {
        &self.state
    }

    /// Parse once; see [`Interval::parse`]. After a failure every further
    /// call returns [`IsoError::Invalid`].
    pub fn parse(&mut self) -> Result<&Interval> {
        let Self {
            source,
            enforce_utc,
            state,
        } = self;
        state.resolve(INTERVAL, || Interval::parse(source.as_str(), *enforce_utc))
    }

    pub fn get_expire_at(
        &mut self,
        compare: Option<DateTime<Utc>>,
        start: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        self.parse()?.get_expire_at(compare, start, false)
    }

    pub fn get_start_at(
        &mut self,
        compare: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        self.parse()?.get_start_at(compare, end, false)
    }

    pub fn to_iso_string(&mut self) -> Result<String> {
        self.parse()?.to_iso_string()
    }

    /// [`Self::to_iso_string`], with failures turned into `None`.
    pub fn to_json(&mut self) -> Option<String> {
        self.to_iso_string().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::CalendarDate;
    use crate::duration::Designator;
    use chrono::TimeZone;

    fn parse(source: &str) -> Result<Interval> {
        Interval::parse(source, false)
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        utc(y, m, d, 0, 0)
    }

    // ── grammar ─────────────────────────────────────────────────────────

    #[test]
    fn test_start_and_duration() {
        let interval = parse("2007-03-01T13:00:00Z/P1Y2M10DT2H30M").unwrap();
        assert_eq!(
            interval.kind.bits(),
            IntervalType::START.bits() | IntervalType::DURATION.bits()
        );
        let start = interval.start.as_ref().unwrap();
        assert_eq!(start.date, CalendarDate::Calendar { month: 3, day: 1 });
        let duration = interval.duration.as_ref().unwrap();
        assert_eq!(duration.value(Designator::Days), Some(10.0));
        assert_eq!(duration.value(Designator::Minutes), Some(30.0));
        assert!(interval.end.is_none());
    }

    #[test]
    fn test_start_shapes_with_offsets() {
        for source in [
            "2007-03-01T13:00Z/P1Y2M10DT2H30M",
            "20070301T1300Z/P1Y2M10DT2H30M",
            "2007-03-01T13:00+01/P1Y2M10DT2H30M",
            "20070301T1300+01/P1Y2M10DT2H30M",
            "2007-03-01/P1Y2M10DT2H30M",
            "2008-03-01T13:00:00+01:00:30",
            "20080301T130000+010030",
            "2008-03-01T24:00:00",
        ] {
            assert!(parse(source).is_ok(), "{source}");
        }
    }

    #[test]
    fn test_duration_and_end() {
        let interval = parse("P2Y/2008-03-01T13:00Z").unwrap();
        assert!(interval.kind.contains(IntervalType::DURATION));
        assert!(interval.kind.contains(IntervalType::END));
        assert!(!interval.kind.contains(IntervalType::START));
        assert_eq!(interval.end_date().unwrap(), Some(utc(2008, 3, 1, 13, 0)));
    }

    #[test]
    fn test_duration_only() {
        let interval = parse("PT2H30M1.5S").unwrap();
        assert_eq!(interval.kind, IntervalType::DURATION);
        assert_eq!(
            interval.duration.unwrap().value(Designator::Seconds),
            Some(1.5)
        );
    }

    #[test]
    fn test_start_and_full_end() {
        let interval = parse("2007-03-01T13:00:00Z/2008-05-11T15:30:00Z").unwrap();
        assert_eq!(interval.start_date().unwrap(), Some(utc(2007, 3, 1, 13, 0)));
        assert_eq!(interval.end_date().unwrap(), Some(utc(2008, 5, 11, 15, 30)));
    }

    #[test]
    fn test_abbreviated_end_dates() {
        let end = |source: &str| Interval::parse(source, true).unwrap().end_date().unwrap();
        assert_eq!(end("2007-12-14T13:30/15:30"), Some(utc(2007, 12, 14, 15, 30)));
        assert_eq!(end("2008-02-15/03-14"), Some(day(2008, 3, 14)));
        assert_eq!(end("2007-11-13/15"), Some(day(2007, 11, 15)));
        assert_eq!(end("2007-11-13T09:00/15T17:00"), Some(utc(2007, 11, 15, 17, 0)));
        assert_eq!(end("2007-11-13T00:00/16T00:00"), Some(day(2007, 11, 16)));
        assert_eq!(end("2007-01-01/2008-03"), Some(day(2008, 3, 1)));
        assert_eq!(end("2020-02-01/29"), Some(day(2020, 2, 29)));
        assert_eq!(end("2007-03-01/31"), Some(day(2007, 3, 31)));
        assert_eq!(end("2007-01-01/03-14T01:30"), Some(utc(2007, 3, 14, 1, 30)));
        assert_eq!(end("20071212/13T1200"), Some(utc(2007, 12, 13, 12, 0)));
    }

    #[test]
    fn test_end_inherits_start_offset() {
        let interval = parse("2007-01-01T10:00+02/01T13:00").unwrap();
        assert_eq!(interval.end_date().unwrap(), Some(utc(2007, 1, 1, 11, 0)));

        let interval = parse("2007-01-01T10:00+02/01T13:00-03").unwrap();
        assert_eq!(interval.end_date().unwrap(), Some(utc(2007, 1, 1, 16, 0)));
    }

    #[test]
    fn test_invalid_abbreviated_end() {
        for source in [
            "2007-03-01/32",
            "2007-02-01/29",
            "2019-02-01/29",
            "2007-04-01/31",
            "2007-01-01/00",
            "2007-02-01/02-29",
            "2020-02-01/02-30",
            "2019-02-01/29T12:30",
            "2019-02-01/13-29",
            "2019-02-01/2020-13",
            "2019-02-01/2021-02-29",
        ] {
            let err = parse(source).unwrap_err();
            assert!(err.to_string().starts_with("Invalid ISO 8601"), "{source}: {err}");
        }
    }

    #[test]
    fn test_end_before_start() {
        for source in [
            "2019-02-28/01",
            "2019-02-28/01T12:30",
            "2019-02-28/01-29",
            "2019-02-01T03:00/01:00",
        ] {
            assert_eq!(parse(source).unwrap_err(), IsoError::EndBeforeStart, "{source}");
        }
    }

    #[test]
    fn test_unexpected_characters() {
        for source in [
            "  ",
            "Last wednesday",
            "Past wednesday",
            "Rather",
            "R/And again",
            "2pac",
            "2024-03-08/R",
            "R3//2027-02-01",
            "R3P",
            "2019-02-01/U",
            "2019-02-01/29U",
            "2019-02-01/03-29U",
            "2019-02-01/2020-03-29U",
            "2019-02-01T12:30Z/02T12:30+Z",
            "2019-02-01T12:30Z/02T12:30+25",
        ] {
            let err = parse(source).unwrap_err();
            assert!(
                err.to_string().to_lowercase().contains("unexpected"),
                "{source}: {err}"
            );
        }
        assert!(parse("2019-02-01T12:30Z/02T25:30").is_err());
        assert!(parse("2024-03-00").is_err());
    }

    #[test]
    fn test_unbalanced_separators() {
        for source in [
            "2027-0101",
            "202701-01",
            "2027-01-01T1200",
            "2027-01-01T12:0000",
            "20270101T12:0000",
            "20270101T1200:00",
            "2007-12-12/2027-0101",
            "2007-12-12/202701-01",
            "2007-12-12/2027-01-01T1200",
            "2007-12-12/2027-01-01T12:0000",
            "2007-12-12/20270101T12:0000",
            "20071212/20270101T1200:00",
            "2007-12-12/20270101T120000",
            "20071212/2027-01-01T12:00:00",
            "2007-12-12/13T1200",
            "20071212/12:00:00",
            "2008-03-01T13:00:00+010030",
            "20080301T130000+01:00:30",
        ] {
            let err = parse(source).unwrap_err();
            assert!(
                err.to_string().to_lowercase().contains("unexpected"),
                "{source}: {err}"
            );
        }
    }

    #[test]
    fn test_illegal_combinations() {
        for source in ["R3/2023-12-11/PT2H/2008-03-01", "2023-12-11/PT2H/2008-03-01"] {
            let err = parse(source).unwrap_err();
            assert_eq!(err, IsoError::IllegalCombination(source.to_string()));
            assert!(err.to_string().contains("combination is not allowed"));
        }
        for source in ["PT2H/15:30", "PT2H/15", "PT2H/15T12:00"] {
            assert!(parse(source).is_err(), "{source}");
        }
    }

    #[test]
    fn test_bad_durations_inside_interval() {
        for source in ["P1/15:30", "PT1H2", "PT1H2/15:30", "P1Y1D1M", "PT1H1S1M"] {
            assert!(parse(source).is_err(), "{source}");
        }
        assert_eq!(
            parse("PT0.5M0.1S").unwrap_err(),
            IsoError::FractionNotLast
        );
    }

    #[test]
    fn test_empty_source_is_type_class() {
        let err = parse("").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Type);
    }

    // ── repeat marker ───────────────────────────────────────────────────

    #[test]
    fn test_repeat_values() {
        for (source, expected) in [
            ("R5/2008-03-01T13:00:00Z", Recurrence::Bounded(5)),
            ("R20/2008-03-01T13:00:00Z", Recurrence::Bounded(20)),
            ("R-1/2008-03-01T13:00:00Z", Recurrence::Unbounded),
            ("R/2017-01-01/P3M", Recurrence::Unbounded),
            ("R3/P2Y/2007-03-01T13:00:00Z", Recurrence::Bounded(3)),
            ("R-1/P2Y/2008-03-01T13:00:00Z", Recurrence::Unbounded),
        ] {
            assert_eq!(parse(source).unwrap().repeat, Some(expected), "{source}");
        }
    }

    #[test]
    fn test_repeat_flag_needs_duration() {
        let interval = parse("R5/2008-03-01T13:00:00Z").unwrap();
        assert!(!interval.kind.contains(IntervalType::REPEAT));
        assert_eq!(interval.repetitions(), Recurrence::Bounded(1));

        let interval = parse("R1/2008-03-01T13:00:00Z/P1D").unwrap();
        assert!(!interval.kind.contains(IntervalType::REPEAT));

        let interval = parse("R5/2008-03-01T13:00:00Z/P1Y2M10DT2H30M").unwrap();
        assert!(interval.kind.contains(IntervalType::REPEAT));
        assert_eq!(interval.repetitions(), Recurrence::Bounded(5));
    }

    #[test]
    fn test_bad_repeat_markers() {
        for source in ["R-2/P2Y/2008-03-01T13:00:00Z", "R-/P2Y/2008-03-01T13:00:00Z"] {
            let err = parse(source).unwrap_err();
            assert!(err.to_string().starts_with("Unexpected ISO 8601 interval"), "{err}");
        }
        assert_eq!(
            parse("R99999999999999999999/P1D").unwrap_err(),
            IsoError::OutOfRange(Construct::Interval)
        );
    }

    // ── expire at ───────────────────────────────────────────────────────

    #[test_log::test]
    fn test_expire_at_counts_backwards_from_end() {
        let interval = parse("R3/P1M/2024-07-27T00:00Z").unwrap();
        let expire = |now| interval.get_expire_at(Some(now), None, false).unwrap();

        assert_eq!(expire(day(2024, 1, 1)), day(2024, 5, 27));
        assert_eq!(expire(day(2024, 5, 1)), day(2024, 5, 27));
        assert_eq!(expire(day(2024, 5, 27)), day(2024, 6, 27));
        assert_eq!(expire(day(2024, 6, 27)), day(2024, 7, 27));
        assert_eq!(expire(day(2024, 7, 27)), day(2024, 7, 27));
        assert_eq!(expire(day(2025, 1, 1)), day(2024, 7, 27));
    }

    #[test_log::test]
    fn test_expire_at_counts_forward_from_start() {
        let interval = parse("R5/2024-01-01T00:00:00Z/P1D").unwrap();
        let expire = |now| interval.get_expire_at(Some(now), None, false).unwrap();

        assert_eq!(expire(day(2023, 12, 1)), day(2024, 1, 2));
        assert_eq!(expire(utc(2024, 1, 3, 12, 0)), day(2024, 1, 4));
        assert_eq!(expire(day(2024, 1, 3)), day(2024, 1, 4));
        assert_eq!(expire(day(2024, 2, 1)), day(2024, 1, 6));
    }

    #[test]
    fn test_expire_at_unbounded() {
        let interval = parse("R/2024-01-01T00:00:00Z/P1D").unwrap();
        assert_eq!(
            interval.get_expire_at(Some(day(2024, 2, 1)), None, false).unwrap(),
            day(2024, 2, 2)
        );
    }

    #[test]
    fn test_expire_at_follows_month_lengths() {
        let interval = parse("R/2024-01-31T00:00:00Z/P1M").unwrap();
        assert_eq!(
            interval.get_expire_at(Some(day(2024, 3, 15)), None, false).unwrap(),
            day(2024, 3, 31)
        );
    }

    #[test]
    fn test_expire_at_single_occurrence() {
        let interval = parse("2024-01-01T00:00:00Z/P1D").unwrap();
        assert_eq!(
            interval.get_expire_at(Some(day(2024, 1, 10)), None, false).unwrap(),
            day(2024, 1, 2)
        );

        let interval = parse("P1D/2024-01-10T00:00Z").unwrap();
        assert_eq!(
            interval.get_expire_at(Some(day(2023, 1, 1)), None, false).unwrap(),
            day(2024, 1, 10)
        );
    }

    #[test]
    fn test_expire_at_bare_duration() {
        let interval = parse("PT1H").unwrap();
        assert_eq!(
            interval
                .get_expire_at(Some(day(2024, 1, 1)), Some(day(2024, 1, 1)), false)
                .unwrap(),
            utc(2024, 1, 1, 1, 0)
        );

        let interval = parse("R3/PT1H").unwrap();
        assert_eq!(
            interval
                .get_expire_at(Some(utc(2024, 1, 1, 1, 30)), Some(day(2024, 1, 1)), false)
                .unwrap(),
            utc(2024, 1, 1, 2, 0)
        );
    }

    #[test]
    fn test_expire_at_start_and_end() {
        let interval = parse("2007-03-01T13:00:00Z/2008-05-11T15:30:00Z").unwrap();
        assert_eq!(
            interval.get_expire_at(Some(day(2000, 1, 1)), None, false).unwrap(),
            utc(2008, 5, 11, 15, 30)
        );
        let interval = parse("2007-03-01T13:00:00Z").unwrap();
        assert_eq!(
            interval.get_expire_at(None, None, false).unwrap(),
            utc(2007, 3, 1, 13, 0)
        );
    }

    #[test]
    fn test_expire_at_enforce_utc_reads_local_dates_as_utc() {
        let interval = parse("R2/2024-01-01/P1D").unwrap();
        assert_eq!(
            interval.get_expire_at(Some(utc(2024, 1, 1, 12, 0)), None, true).unwrap(),
            day(2024, 1, 2)
        );
    }

    // ── start at ────────────────────────────────────────────────────────

    #[test]
    fn test_start_at_forward() {
        let interval = parse("R5/2024-01-01T00:00:00Z/P1D").unwrap();
        assert_eq!(
            interval.get_start_at(Some(utc(2024, 1, 3, 12, 0)), None, false).unwrap(),
            day(2024, 1, 3)
        );

        let interval = parse("2024-01-01T00:00:00Z/P1D").unwrap();
        assert_eq!(
            interval.get_start_at(Some(day(2024, 5, 1)), None, false).unwrap(),
            day(2024, 1, 1)
        );
    }

    #[test]
    fn test_start_at_backward() {
        let interval = parse("R3/P1M/2024-07-27T00:00Z").unwrap();
        assert_eq!(
            interval.get_start_at(Some(day(2024, 6, 1)), None, false).unwrap(),
            day(2024, 5, 27)
        );
    }

    #[test]
    fn test_start_at_bare_duration() {
        let interval = parse("P1D").unwrap();
        assert_eq!(
            interval.get_start_at(None, Some(day(2024, 1, 10)), false).unwrap(),
            day(2024, 1, 9)
        );
        assert_eq!(
            interval.get_start_at(Some(day(2024, 1, 10)), None, false).unwrap(),
            day(2024, 1, 10)
        );

        let interval = parse("R3/P1D").unwrap();
        assert_eq!(
            interval
                .get_start_at(Some(utc(2024, 1, 8, 12, 0)), Some(day(2024, 1, 10)), false)
                .unwrap(),
            day(2024, 1, 8)
        );
    }

    // ── canonical form ──────────────────────────────────────────────────

    #[test]
    fn test_to_iso_string() {
        for (source, expected) in [
            ("R/P1M", "R-1/P1M"),
            ("R-1/P1M", "R-1/P1M"),
            ("R2/2007-03-01T13:00:00Z", "2007-03-01T13:00:00.000Z"),
            ("20240127T120001,001Z", "2024-01-27T12:00:01.001Z"),
            (
                "R2/2007-03-01T13:00:30.1235Z/PT1.50M",
                "R2/2007-03-01T13:00:30.124Z/PT1.5M",
            ),
            (
                "R2/2024-02-03T08:06:30\u{2212}02/PT1H",
                "R2/2024-02-03T10:06:30.000Z/PT1H",
            ),
            (
                "P1Y2M10DT2H30M/2008-05-11T15:30:00Z",
                "P1Y2M10DT2H30M/2008-05-11T15:30:00.000Z",
            ),
        ] {
            assert_eq!(parse(source).unwrap().to_iso_string().unwrap(), expected, "{source}");
        }
    }

    #[test]
    fn test_canonical_form_is_fixed_point() {
        let once = parse("R-1/P1M").unwrap().to_iso_string().unwrap();
        let twice = parse(&once).unwrap().to_iso_string().unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_serde_as_string() {
        let interval = parse("R3/P1M/2024-07-27T00:00Z").unwrap();
        let json = serde_json::to_string(&interval).unwrap();
        assert_eq!(json, "\"R3/P1M/2024-07-27T00:00:00.000Z\"");
        let back: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(back.repeat, Some(Recurrence::Bounded(3)));
        assert!(serde_json::from_str::<Interval>("\"R3/\"").is_err());
    }

    // ── parser lifecycle ────────────────────────────────────────────────

    #[test]
    fn test_parser_caches_success() {
        let mut parser = IntervalParser::new("2007-03-01T13:00:00Z/P1Y2M10DT2H30M", false);
        let first = parser.parse().unwrap().clone();
        assert_eq!(parser.parse().unwrap(), &first);
        assert_eq!(
            parser.to_json().as_deref(),
            Some("2007-03-01T13:00:00.000Z/P1Y2M10DT2H30M")
        );
    }

    #[test]
    fn test_parser_failure_turns_generic() {
        let mut parser = IntervalParser::new("2023-12-11/PT2H/2008-03-01", false);
        assert!(matches!(
            parser.parse().unwrap_err(),
            IsoError::IllegalCombination(_)
        ));
        assert_eq!(
            parser.parse().unwrap_err(),
            IsoError::Invalid(Construct::Interval)
        );
        assert_eq!(parser.to_json(), None);
        assert!(parser.get_expire_at(None, None).is_err());
    }

    #[test]
    fn test_parser_expire_and_start() {
        let mut parser = IntervalParser::new("R3/P1M/2024-07-27T00:00Z", false);
        assert_eq!(
            parser.get_expire_at(Some(day(2024, 6, 1)), None).unwrap(),
            day(2024, 6, 27)
        );
        assert_eq!(
            parser.get_start_at(Some(day(2024, 6, 1)), None).unwrap(),
            day(2024, 5, 27)
        );
    }
}
