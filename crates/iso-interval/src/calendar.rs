//! Proleptic Gregorian helpers: leap years, ordinal days, ISO weeks, and
//! field-level calendar arithmetic in UTC or local time.
//!
//! # Functions
//!
//! - [`last_iso_week_of_year`] — 52 or 53
//! - [`iso_week_one_monday`] — Monday 00:00 UTC of ISO week 1
//! - [`iso_week_number`] — ISO week-numbering year, week and weekday of an instant
//! - [`iso_week_string`] — an instant rendered as `YYYY-Www-DThh:mm:ss.sssZ`

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::Serialize;

use crate::error::{Construct, IsoError, Result};

// ── Year and month lengths ──────────────────────────────────────────────────

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Days in `month` (1-12) of `year`, 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

pub(crate) fn is_valid_date(year: i32, month: u32, day: u32) -> bool {
    day >= 1 && day <= days_in_month(year, month)
}

/// Ordinal day of year (1-366) for a valid calendar date.
pub fn day_of_year(year: i32, month: u32, day: u32) -> u32 {
    (1..month).map(|m| days_in_month(year, m)).sum::<u32>() + day
}

// ── ISO weeks ───────────────────────────────────────────────────────────────

/// An instant's position in the ISO week-numbering calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IsoWeek {
    /// ISO week-numbering year, which differs from the calendar year around New Year.
    pub year: i32,
    /// Week 1-53.
    pub week: u32,
    /// ISO weekday, 1 = Monday through 7 = Sunday.
    pub weekday: u32,
}

fn iso_weekday(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

pub(crate) fn week_one_monday_date(year: i32) -> Option<NaiveDate> {
    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4)?;
    jan4.checked_sub_signed(TimeDelta::try_days(i64::from(iso_weekday(jan4)) - 1)?)
}

/// Number of ISO weeks in `year`.
///
/// A year has 53 weeks when December 31st falls on Thursday or later and
/// the distance between this year's and next year's week-one Mondays is
/// 53 weeks. Years outside the supported calendar range report 52.
///
/// # Examples
///
/// ```
/// use iso_interval::calendar::last_iso_week_of_year;
///
/// assert_eq!(last_iso_week_of_year(2020), 53);
/// assert_eq!(last_iso_week_of_year(2019), 52);
/// ```
pub fn last_iso_week_of_year(year: i32) -> u32 {
    let Some(dec31) = NaiveDate::from_ymd_opt(year, 12, 31) else {
        return 52;
    };
    if iso_weekday(dec31) < 4 {
        return 52;
    }
    match (
        week_one_monday_date(year),
        year.checked_add(1).and_then(week_one_monday_date),
    ) {
        (Some(this_year), Some(next_year)) if (next_year - this_year).num_days() > 52 * 7 => 53,
        _ => 52,
    }
}

/// Monday of ISO week 1 at midnight UTC.
///
/// # Errors
///
/// Returns [`IsoError::OutOfRange`] for years chrono cannot represent.
pub fn iso_week_one_monday(year: i32) -> Result<DateTime<Utc>> {
    week_one_monday_date(year)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or(IsoError::OutOfRange(Construct::Date))
}

/// Calendar date of an ISO week date, `None` outside chrono's range.
pub(crate) fn date_from_week(year: i32, week: u32, weekday: u32) -> Option<NaiveDate> {
    let offset = (i64::from(week) - 1) * 7 + i64::from(weekday) - 1;
    week_one_monday_date(year)?.checked_add_signed(TimeDelta::try_days(offset)?)
}

pub(crate) fn date_from_ordinal(year: i32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_yo_opt(year, day)
}

/// ISO week-numbering year, week and weekday of `instant` in UTC.
pub fn iso_week_number(instant: DateTime<Utc>) -> IsoWeek {
    let mut year = instant.year();
    let weekday = iso_weekday(instant.date_naive());
    let doy = instant.ordinal() as i32;

    let mut week = (10 + doy - weekday as i32).div_euclid(7);
    if week < 1 {
        year -= 1;
        week = last_iso_week_of_year(year) as i32;
    } else if week == 53 && last_iso_week_of_year(year) == 52 {
        year += 1;
        week = 1;
    }

    IsoWeek {
        year,
        week: week as u32,
        weekday,
    }
}

/// `instant` as an ISO week date with UTC time, e.g. `2024-W05-3T12:00:00.000Z`.
pub fn iso_week_string(instant: DateTime<Utc>) -> String {
    let IsoWeek {
        year,
        week,
        weekday,
    } = iso_week_number(instant);
    format!(
        "{year}-W{week:02}-{weekday}T{}",
        instant.format("%H:%M:%S%.3fZ")
    )
}

/// Canonical millisecond-precision UTC rendering.
///
/// Years outside 0-9999 use the expanded `±YYYYYY` form.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    let year = instant.year();
    let year = if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else if year < 0 {
        format!("-{:06}", year.unsigned_abs())
    } else {
        format!("+{year:06}")
    };
    format!("{year}-{}", instant.format("%m-%dT%H:%M:%S%.3fZ"))
}

// ── Calendar field arithmetic ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CalendarField {
    Year,
    Month,
    Day,
}

/// Wall-clock view of an instant with overflowing field setters.
///
/// Setting a field keeps the time of day and normalizes out-of-range
/// values, so month 12 rolls into January of the next year and day 0 is
/// the last day of the previous month.
pub(crate) trait CalendarView {
    fn wall_clock(&self, at: DateTime<Utc>) -> NaiveDateTime;

    fn resolve(&self, wall_clock: NaiveDateTime) -> Option<DateTime<Utc>>;

    fn get(&self, at: DateTime<Utc>, field: CalendarField) -> i64 {
        let n = self.wall_clock(at);
        match field {
            CalendarField::Year => i64::from(n.year()),
            CalendarField::Month => i64::from(n.month0()),
            CalendarField::Day => i64::from(n.day()),
        }
    }

    fn set(&self, at: DateTime<Utc>, field: CalendarField, value: i64) -> Option<DateTime<Utc>> {
        let n = self.wall_clock(at);
        let (mut year, mut month0, mut day) = (
            i64::from(n.year()),
            i64::from(n.month0()),
            i64::from(n.day()),
        );
        match field {
            CalendarField::Year => year = value,
            CalendarField::Month => month0 = value,
            CalendarField::Day => day = value,
        }
        let date = compose(year, month0, day)?;
        self.resolve(date.and_time(n.time()))
    }

    /// Move `field` by `amount`, e.g. one month forward.
    fn add(&self, at: DateTime<Utc>, field: CalendarField, amount: i64) -> Option<DateTime<Utc>> {
        let current = self.get(at, field);
        self.set(at, field, current.checked_add(amount)?)
    }
}

fn compose(year: i64, month0: i64, day: i64) -> Option<NaiveDate> {
    let year = year.checked_add(month0.div_euclid(12))?;
    let month = month0.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?;
    first.checked_add_signed(TimeDelta::try_days(day.checked_sub(1)?)?)
}

pub(crate) struct UtcCalendar;

impl CalendarView for UtcCalendar {
    fn wall_clock(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc()
    }

    fn resolve(&self, wall_clock: NaiveDateTime) -> Option<DateTime<Utc>> {
        Some(wall_clock.and_utc())
    }
}

pub(crate) struct LocalCalendar;

impl CalendarView for LocalCalendar {
    fn wall_clock(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&Local).naive_local()
    }

    /// Ambiguous wall clocks pick the earlier instant; wall clocks inside a
    /// gap move forward an hour.
    fn resolve(&self, wall_clock: NaiveDateTime) -> Option<DateTime<Utc>> {
        let local = Local.from_local_datetime(&wall_clock).earliest().or_else(|| {
            let shifted = wall_clock.checked_add_signed(TimeDelta::try_hours(1)?)?;
            Local.from_local_datetime(&shifted).earliest()
        })?;
        Some(local.with_timezone(&Utc))
    }
}

pub(crate) fn calendar_view(use_utc: bool) -> &'static dyn CalendarView {
    if use_utc {
        &UtcCalendar
    } else {
        &LocalCalendar
    }
}
