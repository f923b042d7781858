//! Day-offset calendar arithmetic.
//!
//! Every date in the record model is an `i32` day offset from the fixed
//! epoch 0001-01-01 (day 0), proleptic Gregorian. Raw date strings never
//! survive past parsing; the offset is what gets compared, stored, and
//! shipped in the encoded row format.
//!
//! Years before [`FIRST_LEAP_YEAR`] never count as leap years in the
//! day-count arithmetic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Years below this value are never treated as leap years.
pub const FIRST_LEAP_YEAR: i32 = 4;

/// Cumulative days before the first of each month in a non-leap year.
const MONTH_PREFIX: [i32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

const DAYS_PER_MONTH: [i32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Returns true when `year` contributes 366 days.
pub fn is_leap_year(year: i32) -> bool {
    year >= FIRST_LEAP_YEAR && year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in the given calendar year.
pub fn days_in_year(year: i32) -> i32 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Number of days in the given month (1-12).
pub fn days_in_month(year: i32, month: u32) -> i32 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_PER_MONTH[(month - 1) as usize]
    }
}

/// Leap years fully elapsed before January 1 of `year`.
fn leap_years_before(year: i32) -> i32 {
    let y = year - 1;
    if y < FIRST_LEAP_YEAR {
        0
    } else {
        y / 4 - y / 100 + y / 400
    }
}

/// Day offset of the given calendar date. The caller guarantees a legal
/// year/month/day combination; [`parse_date`] is the checked entry point.
pub fn from_ymd(year: i32, month: u32, day: u32) -> i32 {
    let mut days = (year - 1) * 365 + leap_years_before(year);
    days += MONTH_PREFIX[(month - 1) as usize];
    if month > 2 && is_leap_year(year) {
        days += 1;
    }
    days + day as i32 - 1
}

/// Inverse of [`from_ymd`].
pub fn to_ymd(days: i32) -> (i32, u32, u32) {
    let mut year = days / 366 + 1;
    while from_ymd(year + 1, 1, 1) <= days {
        year += 1;
    }
    let mut remainder = days - from_ymd(year, 1, 1);
    let mut month = 1u32;
    while remainder >= days_in_month(year, month) {
        remainder -= days_in_month(year, month);
        month += 1;
    }
    (year, month, (remainder + 1) as u32)
}

/// Renders a day offset as the fixed 8-digit `YYYYMMDD` form used by every
/// human-readable export.
pub fn format_date(days: i32) -> String {
    let (year, month, day) = to_ymd(days);
    format!("{year:04}{month:02}{day:02}")
}

/// Legal calendar range for parsed dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    pub min: i32,
    pub max: i32,
}

impl DateBounds {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, days: i32) -> bool {
        days >= self.min && days <= self.max
    }
}

impl Default for DateBounds {
    fn default() -> Self {
        Self {
            min: from_ymd(1850, 1, 1),
            max: from_ymd(2999, 12, 31),
        }
    }
}

/// Day/month/year ordering of a raw date string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    DayMonthYear,
    MonthDayYear,
    YearMonthDay,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::DayMonthYear => "dd-mm-yyyy",
            DateFormat::MonthDayYear => "mm-dd-yyyy",
            DateFormat::YearMonthDay => "yyyy-mm-dd",
        }
    }

    /// Detects the ordering of a raw date string, returning `None` when the
    /// string is ambiguous (e.g. `01-02-2003` fits both day-first and
    /// month-first). The 8-digit compact form is always year-first.
    pub fn detect(raw: &str) -> Option<DateFormat> {
        let trimmed = raw.trim();
        if is_compact(trimmed) {
            return Some(DateFormat::YearMonthDay);
        }
        let parts = split_components(trimmed)?;
        if parts[0].len() == 4 {
            return Some(DateFormat::YearMonthDay);
        }
        if parts[2].len() != 4 {
            return None;
        }
        let first: u32 = parts[0].parse().ok()?;
        let second: u32 = parts[1].parse().ok()?;
        match (first > 12, second > 12) {
            (true, false) => Some(DateFormat::DayMonthYear),
            (false, true) => Some(DateFormat::MonthDayYear),
            _ => None,
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dmy" | "dd-mm-yyyy" => Ok(DateFormat::DayMonthYear),
            "mdy" | "mm-dd-yyyy" => Ok(DateFormat::MonthDayYear),
            "ymd" | "yyyy-mm-dd" => Ok(DateFormat::YearMonthDay),
            _ => Err(format!("Unknown date format: {s}")),
        }
    }
}

fn is_compact(value: &str) -> bool {
    value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())
}

fn split_components(value: &str) -> Option<[&str; 3]> {
    let mut parts = value.split(['-', '/', '.']);
    let a = parts.next()?;
    let b = parts.next()?;
    let c = parts.next()?;
    if parts.next().is_some() || a.is_empty() || b.is_empty() || c.is_empty() {
        return None;
    }
    if !is_digits(a) || !is_digits(b) || !is_digits(c) {
        return None;
    }
    Some([a, b, c])
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a raw date string into a day offset, checking calendar legality
/// and the configured bounds. The compact 8-digit form parses year-first
/// regardless of `format`.
pub fn parse_date(raw: &str, format: DateFormat, bounds: DateBounds) -> Result<i32> {
    let trimmed = raw.trim();
    let (year, month, day) = if is_compact(trimmed) {
        let year = trimmed[0..4].parse::<i32>().map_err(|_| invalid(raw, "bad year"))?;
        let month = trimmed[4..6].parse::<u32>().map_err(|_| invalid(raw, "bad month"))?;
        let day = trimmed[6..8].parse::<u32>().map_err(|_| invalid(raw, "bad day"))?;
        (year, month, day)
    } else {
        let parts =
            split_components(trimmed).ok_or_else(|| invalid(raw, "not a three-part date"))?;
        let (y, m, d) = match format {
            DateFormat::DayMonthYear => (parts[2], parts[1], parts[0]),
            DateFormat::MonthDayYear => (parts[2], parts[0], parts[1]),
            DateFormat::YearMonthDay => (parts[0], parts[1], parts[2]),
        };
        let year = y.parse::<i32>().map_err(|_| invalid(raw, "bad year"))?;
        let month = m.parse::<u32>().map_err(|_| invalid(raw, "bad month"))?;
        let day = d.parse::<u32>().map_err(|_| invalid(raw, "bad day"))?;
        (year, month, day)
    };

    if !(1..=9999).contains(&year) {
        return Err(invalid(raw, "year out of range"));
    }
    if !(1..=12).contains(&month) {
        return Err(invalid(raw, "month out of range"));
    }
    if day == 0 || day as i32 > days_in_month(year, month) {
        return Err(invalid(raw, "day out of range"));
    }
    let days = from_ymd(year, month, day);
    if !bounds.contains(days) {
        return Err(ModelError::DateOutOfBounds(trimmed.to_string()));
    }
    Ok(days)
}

fn invalid(raw: &str, reason: &str) -> ModelError {
    ModelError::InvalidDate {
        raw: raw.trim().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_offsets_agree_with_chrono() {
        // chrono's day 1 of the common era is 0001-01-01; our epoch makes
        // that day 0.
        for &(y, m, d) in &[
            (1, 1, 1),
            (1944, 12, 1),
            (2000, 2, 29),
            (2009, 12, 1),
            (2100, 3, 1),
            (1970, 1, 1),
        ] {
            let expected = chrono::NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .signed_duration_since(chrono::NaiveDate::from_ymd_opt(1, 1, 1).unwrap())
                .num_days();
            assert_eq!(from_ymd(y, m, d) as i64, expected, "{y}-{m}-{d}");
        }
    }

    #[test]
    fn ymd_round_trip() {
        for days in [0, 1, 364, 365, 100_000, 700_000, 730_000] {
            let (y, m, d) = to_ymd(days);
            assert_eq!(from_ymd(y, m, d), days);
        }
    }

    #[test]
    fn leap_rules() {
        assert!(is_leap_year(4));
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2016));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2015));
        assert!(!is_leap_year(3));
        assert_eq!(days_in_month(2016, 2), 29);
        assert_eq!(days_in_month(2015, 2), 28);
    }

    #[test]
    fn format_is_eight_digits() {
        assert_eq!(format_date(from_ymd(2009, 12, 1)), "20091201");
        assert_eq!(format_date(from_ymd(850, 1, 9)), "08500109");
    }

    #[test]
    fn detect_orderings() {
        assert_eq!(DateFormat::detect("2008-12-31"), Some(DateFormat::YearMonthDay));
        assert_eq!(DateFormat::detect("20081231"), Some(DateFormat::YearMonthDay));
        assert_eq!(DateFormat::detect("31-12-2008"), Some(DateFormat::DayMonthYear));
        assert_eq!(DateFormat::detect("12/31/2008"), Some(DateFormat::MonthDayYear));
        // Both components could be a day or a month.
        assert_eq!(DateFormat::detect("01-02-2003"), None);
        assert_eq!(DateFormat::detect("garbage"), None);
    }

    #[test]
    fn parse_respects_format() {
        let bounds = DateBounds::default();
        let dmy = parse_date("01-02-2003", DateFormat::DayMonthYear, bounds).unwrap();
        let mdy = parse_date("01-02-2003", DateFormat::MonthDayYear, bounds).unwrap();
        assert_eq!(dmy, from_ymd(2003, 2, 1));
        assert_eq!(mdy, from_ymd(2003, 1, 2));
        assert_eq!(
            parse_date("20030201", DateFormat::DayMonthYear, bounds).unwrap(),
            from_ymd(2003, 2, 1)
        );
    }

    #[test]
    fn parse_rejects_illegal_dates() {
        let bounds = DateBounds::default();
        assert!(parse_date("31-02-2003", DateFormat::DayMonthYear, bounds).is_err());
        assert!(parse_date("2003-13-01", DateFormat::YearMonthDay, bounds).is_err());
        assert!(parse_date("29-02-2015", DateFormat::DayMonthYear, bounds).is_err());
        assert!(parse_date("29-02-2016", DateFormat::DayMonthYear, bounds).is_ok());
        assert!(parse_date("01-01-1700", DateFormat::DayMonthYear, bounds).is_err());
        assert!(parse_date("", DateFormat::DayMonthYear, bounds).is_err());
    }
}
