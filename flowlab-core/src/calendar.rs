//! Calendar conversion into the canonical (Gregorian) date.
//!
//! Exchange data and user input arrive either as Gregorian `YYYY-MM-DD` or as
//! Jalali (Solar Hijri) `YYYY-MM-DD`. Every table is indexed by the Gregorian
//! `NaiveDate` produced here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Date used for raw rows whose date is missing or unparseable (Gregorian 1350-01-01).
pub const SENTINEL_GREGORIAN: (i32, u32, u32) = (1350, 1, 1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("invalid date '{input}' ({calendar} calendar)")]
    InvalidDate {
        input: String,
        calendar: CalendarSystem,
    },

    #[error("unknown calendar system '{0}' (expected 'gregorian' or 'jalali')")]
    UnknownCalendar(String),
}

/// Which calendar a date string is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CalendarSystem {
    #[default]
    Gregorian,
    Jalali,
}

impl fmt::Display for CalendarSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarSystem::Gregorian => f.write_str("gregorian"),
            CalendarSystem::Jalali => f.write_str("jalali"),
        }
    }
}

impl FromStr for CalendarSystem {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gregorian" | "g" => Ok(CalendarSystem::Gregorian),
            "jalali" | "shamsi" | "j" => Ok(CalendarSystem::Jalali),
            other => Err(CalendarError::UnknownCalendar(other.to_string())),
        }
    }
}

/// Convert a `YYYY-MM-DD` string in the given calendar into the canonical date.
///
/// A trailing time component (`2021-03-21 00:00:00`, `2021-03-21T00:00:00`) is
/// ignored, which is how timestamps come back from raw exports.
pub fn to_canonical(input: &str, calendar: CalendarSystem) -> Result<NaiveDate, CalendarError> {
    let invalid = || CalendarError::InvalidDate {
        input: input.to_string(),
        calendar,
    };

    let date_part = input
        .trim()
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or_default();
    let (y, m, d) = split_ymd(date_part).ok_or_else(invalid)?;

    match calendar {
        CalendarSystem::Gregorian => NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid),
        CalendarSystem::Jalali => jalali_to_gregorian(y, m, d).ok_or_else(invalid),
    }
}

/// The sentinel date as a canonical date.
pub fn sentinel_date() -> NaiveDate {
    let (y, m, d) = SENTINEL_GREGORIAN;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn split_ymd(s: &str) -> Option<(i32, u32, u32)> {
    let mut parts = s.split(['-', '/']);
    let y = parts.next()?.parse::<i32>().ok()?;
    let m = parts.next()?.parse::<u32>().ok()?;
    let d = parts.next()?.parse::<u32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((y, m, d))
}

/// Convert a Jalali date into the Gregorian `NaiveDate`.
///
/// Uses the 33-year arithmetic cycle, which matches the astronomical calendar
/// for the years exchange data covers. Returns `None` for out-of-range parts.
pub fn jalali_to_gregorian(jy: i32, jm: u32, jd: u32) -> Option<NaiveDate> {
    if !(1..=3000).contains(&jy) || !(1..=12).contains(&jm) || jd == 0 {
        return None;
    }
    if jd > jalali_month_length(jy, jm) {
        return None;
    }
    let days = jalali_day_number(jy, jm, jd);
    NaiveDate::from_num_days_from_ce_opt(days - 365)
}

/// Whether `jy` is a Jalali leap year (Esfand has 30 days).
pub fn is_jalali_leap(jy: i32) -> bool {
    jalali_day_number(jy + 1, 1, 1) - jalali_day_number(jy, 1, 1) == 366
}

fn jalali_month_length(jy: i32, jm: u32) -> u32 {
    match jm {
        1..=6 => 31,
        7..=11 => 30,
        _ if is_jalali_leap(jy) => 30,
        _ => 29,
    }
}

/// Days since the proleptic Gregorian year 0, shifted so that subtracting 365
/// gives chrono's days-from-CE.
fn jalali_day_number(jy: i32, jm: u32, jd: u32) -> i32 {
    let y = jy + 1595;
    let mut days = -355_668 + 365 * y + (y / 33) * 8 + ((y % 33) + 3) / 4 + jd as i32;
    days += if jm < 7 {
        (jm as i32 - 1) * 31
    } else {
        (jm as i32 - 7) * 30 + 186
    };
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn jalali_new_year_maps_to_march() {
        assert_eq!(jalali_to_gregorian(1400, 1, 1), Some(ymd(2021, 3, 21)));
        assert_eq!(jalali_to_gregorian(1402, 7, 1), Some(ymd(2023, 9, 23)));
    }

    #[test]
    fn esfand_30_only_in_leap_years() {
        assert!(is_jalali_leap(1399));
        assert!(is_jalali_leap(1403));
        assert!(!is_jalali_leap(1400));
        assert_eq!(jalali_to_gregorian(1399, 12, 30), Some(ymd(2021, 3, 20)));
        assert_eq!(jalali_to_gregorian(1400, 12, 30), None);
    }

    #[test]
    fn sentinel_is_gregorian_1350() {
        assert_eq!(sentinel_date(), ymd(1350, 1, 1));
        // Earlier than any Jalali session date.
        assert!(sentinel_date() < jalali_to_gregorian(1300, 1, 1).unwrap());
    }

    #[test]
    fn to_canonical_both_calendars() {
        assert_eq!(
            to_canonical("2021-03-21", CalendarSystem::Gregorian).unwrap(),
            ymd(2021, 3, 21)
        );
        assert_eq!(
            to_canonical("1400-01-01", CalendarSystem::Jalali).unwrap(),
            ymd(2021, 3, 21)
        );
        assert_eq!(
            to_canonical("1400/01/01", CalendarSystem::Jalali).unwrap(),
            ymd(2021, 3, 21)
        );
    }

    #[test]
    fn to_canonical_ignores_time_suffix() {
        assert_eq!(
            to_canonical("2021-03-21 00:00:00", CalendarSystem::Gregorian).unwrap(),
            ymd(2021, 3, 21)
        );
        assert_eq!(
            to_canonical("2021-03-21T00:00:00", CalendarSystem::Gregorian).unwrap(),
            ymd(2021, 3, 21)
        );
    }

    #[test]
    fn to_canonical_rejects_garbage() {
        for bad in ["", "nan", "2021-13-01", "2021-02-30", "1400-07-31", "1-2-3-4"] {
            let err = to_canonical(bad, CalendarSystem::Gregorian)
                .and_then(|_| to_canonical(bad, CalendarSystem::Jalali));
            assert!(
                matches!(err, Err(CalendarError::InvalidDate { .. })),
                "expected InvalidDate for {bad:?}"
            );
        }
    }

    #[test]
    fn calendar_from_str() {
        assert_eq!("Jalali".parse::<CalendarSystem>().unwrap(), CalendarSystem::Jalali);
        assert_eq!("gregorian".parse::<CalendarSystem>().unwrap(), CalendarSystem::Gregorian);
        assert!("lunar".parse::<CalendarSystem>().is_err());
    }
}
