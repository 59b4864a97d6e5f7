//! ISO 8601 date and date-time literals.
//!
//! Accepts calendar dates (`2024-01-27`, `20240127`, `2024-01`), week dates
//! (`2020-W53-5`, `2020W535`), ordinal dates (`1981-095`, `1981095`) and
//! expanded signed years (`+002024-01-27`), each optionally followed by a
//! time of day (`T12:30:15.250`) and a UTC offset (`Z`, `+02`, `-05:30`).
//!
//! Basic and extended formats cannot be mixed: once the date part is
//! written with `-` the time and offset parts must use `:`, and the other
//! way around.
//!
//! # Functions
//!
//! - [`DateParser::parse`] — parse a complete literal into [`DateParts`]
//! - [`DateParser::parse_partial`] — parse an abbreviated interval end date
//! - [`DateParts::to_instant`] — resolve parsed parts to a UTC instant

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;

use crate::calendar::{self, CalendarView, LocalCalendar};
use crate::cursor::{Cursor, MINUS_SIGN};
use crate::error::{Construct, IsoError, Result};
use crate::state::ParseState;

const DATE: Construct = Construct::Date;

/// Digits allowed after a fraction separator.
pub const MAX_FRACTION_DIGITS: usize = 9;
const MIN_SIGNED_YEAR_DIGITS: usize = 6;
const MAX_SIGNED_YEAR_DIGITS: usize = 9;

// ── Parsed parts ────────────────────────────────────────────────────────────

/// Which of the three ISO date forms a literal used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum CalendarDate {
    /// Month 1-12 and day of month. Year-only and year-month literals land
    /// here with the missing parts set to 1.
    Calendar { month: u32, day: u32 },
    /// ISO week 1-53 and weekday 1-7.
    Week { week: u32, weekday: u32 },
    /// Day of year 1-366.
    Ordinal { day: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeOfDay {
    /// 0-24, where 24 is only written as `24:00[:00[.0]]`.
    pub hour: u32,
    pub minute: u32,
    pub second: Option<u32>,
    /// Fractional second in milliseconds, e.g. `.0011` is `1.1`.
    pub fraction: Option<f64>,
}

impl TimeOfDay {
    fn since_midnight(&self) -> TimeDelta {
        let millis = i64::from(self.hour) * 3_600_000
            + i64::from(self.minute) * 60_000
            + i64::from(self.second.unwrap_or(0)) * 1_000
            + self.fraction.map_or(0, |f| f.round() as i64);
        TimeDelta::milliseconds(millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OffsetSign {
    Plus,
    /// Written as `-` or U+2212.
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UtcOffset {
    /// `Z`
    Zulu,
    Offset {
        sign: OffsetSign,
        hours: u32,
        minutes: Option<u32>,
        seconds: Option<u32>,
    },
}

impl UtcOffset {
    /// Seconds east of UTC.
    pub fn total_seconds(&self) -> i64 {
        match *self {
            UtcOffset::Zulu => 0,
            UtcOffset::Offset {
                sign,
                hours,
                minutes,
                seconds,
            } => {
                let total = i64::from(hours) * 3600
                    + i64::from(minutes.unwrap_or(0)) * 60
                    + i64::from(seconds.unwrap_or(0));
                match sign {
                    OffsetSign::Plus => total,
                    OffsetSign::Minus => -total,
                }
            }
        }
    }
}

/// A successfully parsed date literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateParts {
    pub year: i32,
    pub date: CalendarDate,
    pub time: Option<TimeOfDay>,
    pub offset: Option<UtcOffset>,
    /// Whether the literal used extended format (`-` and `:` separators).
    pub extended: bool,
}

impl DateParts {
    /// The calendar day, with week and ordinal forms reduced to year-month-day.
    pub fn naive_date(&self) -> Option<NaiveDate> {
        match self.date {
            CalendarDate::Calendar { month, day } => NaiveDate::from_ymd_opt(self.year, month, day),
            CalendarDate::Week { week, weekday } => {
                calendar::date_from_week(self.year, week, weekday)
            }
            CalendarDate::Ordinal { day } => calendar::date_from_ordinal(self.year, day),
        }
    }

    /// Resolve to an absolute instant.
    ///
    /// `Z` and numeric offsets are honoured as written. Without an offset
    /// the wall clock is read as UTC when `enforce_utc` is set and as local
    /// time otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`IsoError::OutOfRange`] when the year is beyond what chrono
    /// can represent.
    pub fn to_instant(&self, enforce_utc: bool) -> Result<DateTime<Utc>> {
        let out_of_range = || IsoError::OutOfRange(DATE);
        let midnight = self
            .naive_date()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(out_of_range)?;
        let wall_clock = match &self.time {
            Some(time) => midnight
                .checked_add_signed(time.since_midnight())
                .ok_or_else(out_of_range)?,
            None => midnight,
        };

        match self.offset {
            Some(UtcOffset::Zulu) => Ok(wall_clock.and_utc()),
            Some(offset) => TimeDelta::try_seconds(offset.total_seconds())
                .and_then(|shift| wall_clock.and_utc().checked_sub_signed(shift))
                .ok_or_else(out_of_range),
            None if enforce_utc => Ok(wall_clock.and_utc()),
            None => LocalCalendar.resolve(wall_clock).ok_or_else(out_of_range),
        }
    }

    /// Canonical `YYYY-MM-DDTHH:MM:SS.sssZ` rendering of [`Self::to_instant`].
    pub fn to_iso_string(&self, enforce_utc: bool) -> Result<String> {
        Ok(calendar::format_instant(self.to_instant(enforce_utc)?))
    }
}

impl FromStr for DateParts {
    type Err = IsoError;

    fn from_str(s: &str) -> Result<Self> {
        DateParser::new(s, DateOptions::default()).parse().cloned()
    }
}

/// Year, month, day and week an abbreviated end date inherits from its
/// interval's start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialContext {
    pub year: i32,
    /// Month 1-12.
    pub month: Option<u32>,
    /// Day of month, or weekday when `week` is set.
    pub day: Option<u32>,
    pub week: Option<u32>,
}

impl PartialContext {
    fn inherited_date(&self) -> CalendarDate {
        match (self.month, self.week) {
            (Some(month), _) => CalendarDate::Calendar {
                month,
                day: self.day.unwrap_or(1),
            },
            (None, Some(week)) => CalendarDate::Week {
                week,
                weekday: self.day.unwrap_or(1),
            },
            (None, None) => CalendarDate::Ordinal {
                day: self.day.unwrap_or(1),
            },
        }
    }
}

impl From<&DateParts> for PartialContext {
    fn from(parts: &DateParts) -> Self {
        let year = parts.year;
        match parts.date {
            CalendarDate::Calendar { month, day } => Self {
                year,
                month: Some(month),
                day: Some(day),
                week: None,
            },
            CalendarDate::Week { week, weekday } => Self {
                year,
                month: None,
                day: Some(weekday),
                week: Some(week),
            },
            // ordinal starts are continued as calendar dates
            CalendarDate::Ordinal { day } => {
                let date = calendar::date_from_ordinal(year, day);
                Self {
                    year,
                    month: date.map(|d| chrono::Datelike::month(&d)),
                    day: date.map(|d| chrono::Datelike::day(&d)),
                    week: None,
                }
            }
        }
    }
}

// ── Parser front end ────────────────────────────────────────────────────────

/// Options for [`DateParser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DateOptions {
    /// Byte offset in the source where the literal starts.
    pub offset: usize,
    /// Character that ends the literal early, e.g. `/` inside an interval.
    pub stop: Option<char>,
    /// Require extended format from the first character on.
    pub enforce_separators: bool,
    /// Read offset-less literals as UTC instead of local time.
    pub enforce_utc: bool,
}

/// One-shot parser for a single date literal.
#[derive(Debug, Clone)]
pub struct DateParser {
    source: String,
    options: DateOptions,
    state: ParseState<DateParts>,
}

impl DateParser {
    pub fn new(source: impl Into<String>, options: DateOptions) -> Self {
        Self {
            source: source.into(),
            options,
            state: ParseState::Unparsed,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> &ParseState<DateParts> {
        &self.state
    }

    /// Parse the literal.
    ///
    /// # Errors
    ///
    /// [`IsoError::MissingSource`] for an empty source, otherwise a range
    /// class error describing the first problem found. After a failure every
    /// further call returns [`IsoError::Invalid`].
    ///
    /// # Examples
    ///
    /// ```
    /// use iso_interval::{CalendarDate, DateOptions, DateParser};
    ///
    /// let mut parser = DateParser::new("1981-095", DateOptions::default());
    /// let parts = parser.parse().unwrap();
    /// assert_eq!(parts.date, CalendarDate::Ordinal { day: 95 });
    /// ```
    pub fn parse(&mut self) -> Result<&DateParts> {
        let Self {
            source,
            options,
            state,
        } = self;
        state.resolve(DATE, || {
            let cursor = options.cursor(source.as_str())?;
            let mut grammar = DateGrammar::new(cursor, options.enforce_separators);
            grammar.full()
        })
    }

    /// Parse an abbreviated literal that inherits from `context`, such as the
    /// `15T17:00` in `2007-11-13T09:00/15T17:00`.
    ///
    /// Separator usage follows `enforce_separators`, which callers set from
    /// the start date.
    pub fn parse_partial(&mut self, context: PartialContext) -> Result<&DateParts> {
        let Self {
            source,
            options,
            state,
        } = self;
        state.resolve(DATE, || {
            let cursor = options.cursor(source.as_str())?;
            let mut grammar = DateGrammar::new(cursor, options.enforce_separators);
            grammar.partial(context)
        })
    }

    /// Parse if needed and resolve to an instant.
    pub fn to_instant(&mut self, enforce_utc: bool) -> Result<DateTime<Utc>> {
        let enforce_utc = enforce_utc || self.options.enforce_utc;
        self.parse()?.to_instant(enforce_utc)
    }

    /// # Errors
    ///
    /// Fails when the literal does not parse.
    pub fn to_iso_string(&mut self) -> Result<String> {
        let enforce_utc = self.options.enforce_utc;
        self.parse()?.to_iso_string(enforce_utc)
    }

    /// [`Self::to_iso_string`], with failures turned into `None`.
    pub fn to_json(&mut self) -> Option<String> {
        self.to_iso_string().ok()
    }
}

impl DateOptions {
    fn cursor<'a>(&self, source: &'a str) -> Result<Cursor<'a>> {
        if source.is_empty() {
            return Err(IsoError::MissingSource(DATE));
        }
        Ok(Cursor::at(source, self.offset).with_stop(self.stop))
    }
}

// ── Grammar ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    /// Decided by the character after the year.
    Undecided,
    Basic,
    Extended,
}

pub(crate) struct DateGrammar<'a> {
    cur: Cursor<'a>,
    format: Format,
}

impl<'a> DateGrammar<'a> {
    /// `enforce_separators` fixes extended format; otherwise the literal decides.
    pub(crate) fn new(cur: Cursor<'a>, enforce_separators: bool) -> Self {
        let format = if enforce_separators {
            Format::Extended
        } else {
            Format::Undecided
        };
        Self { cur, format }
    }

    /// Grammar for a partial literal, where the format is already fixed.
    pub(crate) fn inheriting(cur: Cursor<'a>, extended: bool) -> Self {
        let format = if extended {
            Format::Extended
        } else {
            Format::Basic
        };
        Self { cur, format }
    }

    pub(crate) fn cursor(&self) -> Cursor<'a> {
        self.cur
    }

    fn extended(&self) -> bool {
        self.format == Format::Extended
    }

    pub(crate) fn full(&mut self) -> Result<DateParts> {
        let year = self.year()?;
        let date = self.date_after_year(year)?;
        self.finish(year, date)
    }

    pub(crate) fn partial(&mut self, ctx: PartialContext) -> Result<DateParts> {
        if self.format == Format::Undecided {
            self.format = Format::Basic;
        }
        let year = ctx.year;

        match self.cur.peek() {
            Some('+' | '-' | MINUS_SIGN) => return self.full(),
            Some('W') => {
                self.cur.bump();
                let date = self.week_date(year)?;
                return self.finish(year, date);
            }
            _ => {}
        }

        // a lone weekday continues the start's week
        if let Some(week) = ctx.week {
            let weekday = self
                .cur
                .peek()
                .and_then(|c| c.to_digit(10))
                .filter(|d| (1..=7).contains(d));
            if let Some(weekday) = weekday {
                if matches!(self.cur.peek_nth(1), None | Some('T')) {
                    self.cur.bump();
                    return self.finish(year, CalendarDate::Week { week, weekday });
                }
            }
        }

        let value = self.two_digits()?;
        match self.cur.peek() {
            None | Some('T') => {
                let date = self.partial_day(ctx, value)?;
                self.finish(year, date)
            }
            Some(':') if self.extended() => {
                let (time, offset) = self.time_from_minutes(value)?;
                self.expect_end()?;
                Ok(DateParts {
                    year,
                    date: ctx.inherited_date(),
                    time: Some(time),
                    offset,
                    extended: true,
                })
            }
            Some('-') if self.extended() => {
                self.cur.bump();
                let day = self.two_digits()?;
                let date = self.partial_month_day(year, value, day)?;
                self.finish(year, date)
            }
            Some(':' | '-') => Err(self.cur.unbalanced(DATE)),
            Some(c) if c.is_ascii_digit() => {
                let third = self.digit()?;
                match self.cur.peek() {
                    Some(c) if c.is_ascii_digit() => {
                        let fourth = self.digit()?;
                        let year = (value * 100 + third * 10 + fourth) as i32;
                        let date = self.date_after_year(year)?;
                        self.finish(year, date)
                    }
                    None | Some('T') => {
                        let day = value * 10 + third;
                        if day == 0 || day > calendar::days_in_year(year) {
                            return Err(self.invalid("partial date"));
                        }
                        self.finish(year, CalendarDate::Ordinal { day })
                    }
                    Some(_) => Err(self.cur.unexpected(DATE)),
                }
            }
            Some(_) => Err(self.cur.unexpected(DATE)),
        }
    }

    fn partial_day(&self, ctx: PartialContext, day: u32) -> Result<CalendarDate> {
        match ctx.month {
            Some(month) if calendar::is_valid_date(ctx.year, month, day) => {
                Ok(CalendarDate::Calendar { month, day })
            }
            _ => Err(self.invalid("partial date")),
        }
    }

    fn partial_month_day(&self, year: i32, month: u32, day: u32) -> Result<CalendarDate> {
        if calendar::is_valid_date(year, month, day) {
            Ok(CalendarDate::Calendar { month, day })
        } else {
            Err(self.invalid("partial date"))
        }
    }

    /// Optional time of day and offset, then end of input.
    fn finish(&mut self, year: i32, date: CalendarDate) -> Result<DateParts> {
        let (time, offset) = if self.cur.eat('T') {
            let hour = self.two_digits()?;
            let (time, offset) = self.time_from_minutes(hour)?;
            (Some(time), offset)
        } else {
            (None, None)
        };
        self.expect_end()?;
        Ok(DateParts {
            year,
            date,
            time,
            offset,
            extended: self.extended(),
        })
    }

    fn expect_end(&self) -> Result<()> {
        if self.cur.is_done() {
            Ok(())
        } else {
            Err(self.cur.unexpected(DATE))
        }
    }

    // ── date part ───────────────────────────────────────────────────────

    fn year(&mut self) -> Result<i32> {
        let Some(sign @ ('+' | '-' | MINUS_SIGN)) = self.cur.peek() else {
            let mut year = 0;
            for _ in 0..4 {
                year = year * 10 + self.digit()? as i32;
            }
            return Ok(year);
        };

        if self.format == Format::Basic {
            return Err(self.cur.unbalanced(DATE));
        }
        self.cur.bump();

        let mut year: i32 = 0;
        let mut digits = 0;
        while let Some(d) = self.cur.peek().and_then(|c| c.to_digit(10)) {
            if digits == MAX_SIGNED_YEAR_DIGITS {
                return Err(self.cur.unexpected(DATE));
            }
            self.cur.bump();
            year = year * 10 + d as i32;
            digits += 1;
        }
        if digits < MIN_SIGNED_YEAR_DIGITS {
            return Err(self.cur.unexpected(DATE));
        }
        self.format = Format::Extended;
        Ok(if sign == '+' { year } else { -year })
    }

    fn date_after_year(&mut self, year: i32) -> Result<CalendarDate> {
        match self.cur.peek() {
            None => Ok(CalendarDate::Calendar { month: 1, day: 1 }),
            Some('-') => {
                if self.format == Format::Basic {
                    return Err(self.cur.unbalanced(DATE));
                }
                self.format = Format::Extended;
                self.cur.bump();
                self.extended_date(year)
            }
            Some(_) if self.extended() => Err(self.cur.unbalanced(DATE)),
            Some('W') => {
                self.format = Format::Basic;
                self.cur.bump();
                self.week_date(year)
            }
            Some(c) if c.is_ascii_digit() => {
                self.format = Format::Basic;
                self.basic_date(year)
            }
            Some(_) => Err(self.cur.unexpected(DATE)),
        }
    }

    fn extended_date(&mut self, year: i32) -> Result<CalendarDate> {
        if self.cur.eat('W') {
            return self.week_date(year);
        }
        let value = self.two_digits()?;
        match self.cur.peek() {
            Some(c) if c.is_ascii_digit() => {
                let third = self.digit()?;
                self.ordinal_date(year, value * 10 + third)
            }
            Some('-') => {
                self.cur.bump();
                let day = self.two_digits()?;
                self.calendar_date(year, value, day)
            }
            None => self.calendar_date(year, value, 1),
            Some(_) => Err(self.cur.unexpected(DATE)),
        }
    }

    fn basic_date(&mut self, year: i32) -> Result<CalendarDate> {
        let value = self.two_digits()?;
        let third = self.digit()?;
        match self.cur.peek() {
            Some(c) if c.is_ascii_digit() => {
                let fourth = self.digit()?;
                self.calendar_date(year, value, third * 10 + fourth)
            }
            Some('-') => Err(self.cur.unbalanced(DATE)),
            _ => self.ordinal_date(year, value * 10 + third),
        }
    }

    fn calendar_date(&self, year: i32, month: u32, day: u32) -> Result<CalendarDate> {
        if calendar::is_valid_date(year, month, day) {
            Ok(CalendarDate::Calendar { month, day })
        } else {
            Err(self.invalid("date"))
        }
    }

    fn ordinal_date(&self, year: i32, day: u32) -> Result<CalendarDate> {
        if day >= 1 && day <= calendar::days_in_year(year) {
            Ok(CalendarDate::Ordinal { day })
        } else {
            Err(self.invalid("ordinal date"))
        }
    }

    /// Week number and optional weekday after the `W`.
    fn week_date(&mut self, year: i32) -> Result<CalendarDate> {
        let week = self.two_digits()?;
        let weekday = if self.extended() {
            if self.cur.eat('-') {
                self.digit_in(1..=7)?
            } else if self.cur.is_done() {
                1
            } else {
                return Err(self.cur.unexpected(DATE));
            }
        } else {
            match self.cur.peek() {
                Some(c) if c.is_ascii_digit() => self.digit_in(1..=7)?,
                None => 1,
                Some(_) => return Err(self.cur.unexpected(DATE)),
            }
        };

        if week == 0 || week > calendar::last_iso_week_of_year(year) {
            return Err(self.invalid("week date"));
        }
        Ok(CalendarDate::Week { week, weekday })
    }

    // ── time part ───────────────────────────────────────────────────────

    fn time_from_minutes(&mut self, hour: u32) -> Result<(TimeOfDay, Option<UtcOffset>)> {
        if hour > 24 {
            return Err(self.invalid("hours"));
        }
        self.time_separator()?;
        let minute = self.sexagesimal()?;

        let mut time = TimeOfDay {
            hour,
            minute,
            second: None,
            fraction: None,
        };
        if self.continues_time() {
            self.time_separator()?;
            time.second = Some(self.sexagesimal()?);
            if matches!(self.cur.peek(), Some(',' | '.')) {
                self.cur.bump();
                time.fraction = Some(self.fraction()?);
            }
        }

        if hour == 24
            && (minute != 0
                || time.second.is_some_and(|s| s != 0)
                || time.fraction.is_some_and(|f| f != 0.0))
        {
            return Err(self.invalid("hours"));
        }

        let offset = self.offset()?;
        Ok((time, offset))
    }

    /// `:` between components in extended format, nothing in basic format.
    fn time_separator(&mut self) -> Result<()> {
        match (self.extended(), self.cur.peek()) {
            (true, Some(':')) => {
                self.cur.bump();
                Ok(())
            }
            (true, Some(c)) if c.is_ascii_digit() => Err(self.cur.unbalanced(DATE)),
            (true, _) => Err(self.cur.unexpected(DATE)),
            (false, Some(':')) => Err(self.cur.unbalanced(DATE)),
            (false, _) => Ok(()),
        }
    }

    fn continues_time(&self) -> bool {
        self.cur.peek().is_some_and(|c| c == ':' || c.is_ascii_digit())
    }

    fn fraction(&mut self) -> Result<f64> {
        let mut digits = String::new();
        while let Some(c) = self.cur.peek().filter(char::is_ascii_digit) {
            if digits.len() == MAX_FRACTION_DIGITS {
                return Err(IsoError::TooLong {
                    construct: DATE,
                    what: "fraction",
                    limit: MAX_FRACTION_DIGITS,
                });
            }
            digits.push(c);
            self.cur.bump();
        }
        if digits.is_empty() {
            return Err(self.cur.unexpected(DATE));
        }
        Ok(fraction_millis(&digits))
    }

    fn offset(&mut self) -> Result<Option<UtcOffset>> {
        let sign = match self.cur.peek() {
            Some('Z') => {
                self.cur.bump();
                if self.cur.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(self.cur.unexpected(DATE));
                }
                return Ok(Some(UtcOffset::Zulu));
            }
            Some('+') => OffsetSign::Plus,
            Some('-' | MINUS_SIGN) => OffsetSign::Minus,
            _ => return Ok(None),
        };
        self.cur.bump();

        let first = self.digit_in(0..=2)?;
        let second = if first == 2 {
            self.digit_in(0..=3)?
        } else {
            self.digit()?
        };
        let hours = first * 10 + second;

        let mut minutes = None;
        let mut seconds = None;
        if self.continues_time() {
            self.time_separator()?;
            minutes = Some(self.sexagesimal()?);
            if self.continues_time() {
                self.time_separator()?;
                seconds = Some(self.sexagesimal()?);
            }
        }

        Ok(Some(UtcOffset::Offset {
            sign,
            hours,
            minutes,
            seconds,
        }))
    }

    // ── digits ──────────────────────────────────────────────────────────

    fn digit(&mut self) -> Result<u32> {
        self.cur
            .eat_digit()
            .ok_or_else(|| self.cur.unexpected(DATE))
    }

    fn digit_in(&mut self, range: std::ops::RangeInclusive<u32>) -> Result<u32> {
        match self.cur.peek().and_then(|c| c.to_digit(10)) {
            Some(d) if range.contains(&d) => {
                self.cur.bump();
                Ok(d)
            }
            _ => Err(self.cur.unexpected(DATE)),
        }
    }

    fn two_digits(&mut self) -> Result<u32> {
        Ok(self.digit()? * 10 + self.digit()?)
    }

    /// Minutes or seconds, 00-59.
    fn sexagesimal(&mut self) -> Result<u32> {
        Ok(self.digit_in(0..=5)? * 10 + self.digit()?)
    }

    fn invalid(&self, what: &'static str) -> IsoError {
        IsoError::InvalidValue {
            what,
            text: self.cur.parsed().to_string(),
        }
    }
}

/// Fraction digits as milliseconds, keeping sub-millisecond precision.
fn fraction_millis(digits: &str) -> f64 {
    let padded = format!("{digits:0<3}");
    let (millis, rest) = padded.split_at(3);
    let text = if rest.is_empty() {
        millis.to_string()
    } else {
        format!("{millis}.{rest}")
    };
    text.parse().unwrap_or(0.0)
}

impl DateParts {
    /// Extended-format rendering of the fields as parsed, for dates chrono
    /// cannot place on its timeline.
    fn write_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if (0..=9999).contains(&self.year) {
            write!(f, "{:04}", self.year)?;
        } else {
            write!(f, "{:+07}", self.year)?;
        }
        match self.date {
            CalendarDate::Calendar { month, day } => write!(f, "-{month:02}-{day:02}")?,
            CalendarDate::Week { week, weekday } => write!(f, "-W{week:02}-{weekday}")?,
            CalendarDate::Ordinal { day } => write!(f, "-{day:03}")?,
        }
        if let Some(time) = &self.time {
            write!(f, "T{:02}:{:02}", time.hour, time.minute)?;
            if let Some(second) = time.second {
                write!(f, ":{second:02}")?;
            }
            if let Some(fraction) = time.fraction {
                write!(f, ".{:03}", (fraction.round() as u32).min(999))?;
            }
        }
        match self.offset {
            None => Ok(()),
            Some(UtcOffset::Zulu) => f.write_str("Z"),
            Some(UtcOffset::Offset {
                sign,
                hours,
                minutes,
                seconds,
            }) => {
                let sign = match sign {
                    OffsetSign::Plus => '+',
                    OffsetSign::Minus => '-',
                };
                write!(f, "{sign}{hours:02}")?;
                if let Some(minutes) = minutes {
                    write!(f, ":{minutes:02}")?;
                }
                if let Some(seconds) = seconds {
                    write!(f, ":{seconds:02}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for DateParts {
    /// Canonical form, reading offset-less literals as UTC. Dates beyond
    /// chrono's range fall back to their parsed fields.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_iso_string(true) {
            Ok(iso) => f.write_str(&iso),
            Err(_) => self.write_fields(f),
        }
    }
}
