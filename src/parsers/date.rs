//! "Smart" dates and datetimes.
//!
//! Accepted forms:
//! - ISO literals: `2025-01-10`, `2025-01-10T08:30:00`, `2025-01-10 08:30`
//! - `<n> <unit> (after|before) <date>` with unit in minute, hour, day, week, month, year
//!   (plural allowed); the anchor text is parsed by the same rules
//! - `first <weekday>[, <weekday>...] (after|before) <date>`
//! - datetimes only: a trailing `at HH:MM[:SS]` replaces the time of day
//!
//! Month and year steps are calendar-aware and clamp to the last day of the target month.
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::parsers::MAX_DEPTH;

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s+([a-z]+)\s+(after|before)\s+(.+?)\s*$").expect("valid regex")
});

static FIRST_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*first\s+(.+?)\s+(after|before)\s+(.+?)\s*$").expect("valid regex")
});

static AT_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*\S)\s+at\s+(\d{1,2}:\d{2}(?::\d{2})?)\s*$").expect("valid regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Absolute `YYYY-MM-DD`.
pub fn date_literal(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Absolute datetime; a bare date means midnight.
pub fn datetime_literal(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS.iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| date_literal(s).map(|d| d.and_time(NaiveTime::MIN)))
}

pub fn smartdate(s: &str) -> Result<NaiveDate, ParseError> {
    smart(s, "date", 0).map(|dt| dt.date())
}

pub fn smartdatetime(s: &str) -> Result<NaiveDateTime, ParseError> {
    if let Some(caps) = AT_TIME.captures(s) {
        let time = parse_time(&caps[2])?;
        return smart(&caps[1], "datetime", 0).map(|dt| dt.date().and_time(time));
    }
    smart(s, "datetime", 0)
}

fn smart(s: &str, target: &str, depth: usize) -> Result<NaiveDateTime, ParseError> {
    if let Some(dt) = datetime_literal(s) {
        return Ok(dt);
    }
    if depth >= MAX_DEPTH {
        return Err(ParseError::invalid(format!("{target} expression nested too deeply")));
    }
    if let Some(caps) = FIRST_WEEKDAY.captures(s) {
        let days = parse_weekdays(&caps[1])?;
        let forward = caps[2].eq_ignore_ascii_case("after");
        let anchor = smart(&caps[3], target, depth + 1)?;
        return first_weekday(anchor, &days, forward);
    }
    if let Some(caps) = RELATIVE.captures(s) {
        // digits only, so the magnitude is never negative
        let magnitude = caps[1].parse::<u32>()
            .map_err(|_| ParseError::invalid(format!("magnitude {:?} is out of range", &caps[1])))?;
        let unit = Unit::parse(&caps[2])?;
        let signed = if caps[3].eq_ignore_ascii_case("after") { i64::from(magnitude) } else { -i64::from(magnitude) };
        let anchor = smart(&caps[4], target, depth + 1)?;
        return unit.shift(anchor, signed);
    }
    Err(ParseError::invalid(format!("cannot parse {:?} as a {target}", s.trim())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(s: &str) -> Result<Self, ParseError> {
        let lower = s.to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "minute" => Ok(Unit::Minute),
            "hour" => Ok(Unit::Hour),
            "day" => Ok(Unit::Day),
            "week" => Ok(Unit::Week),
            "month" => Ok(Unit::Month),
            "year" => Ok(Unit::Year),
            _ => Err(ParseError::invalid(format!("unknown unit {s:?}"))),
        }
    }

    fn shift(self, anchor: NaiveDateTime, n: i64) -> Result<NaiveDateTime, ParseError> {
        let out_of_range = || ParseError::OutOfRange(n as f64);
        match self {
            Unit::Minute | Unit::Hour | Unit::Day | Unit::Week => {
                let delta = match self {
                    Unit::Minute => TimeDelta::try_minutes(n),
                    Unit::Hour => TimeDelta::try_hours(n),
                    Unit::Day => TimeDelta::try_days(n),
                    _ => TimeDelta::try_weeks(n),
                };
                delta.and_then(|d| anchor.checked_add_signed(d)).ok_or_else(out_of_range)
            }
            Unit::Month | Unit::Year => {
                let months = if self == Unit::Year { n.checked_mul(12) } else { Some(n) }
                    .ok_or_else(out_of_range)?;
                let count = u32::try_from(months.unsigned_abs()).map_err(|_| out_of_range())?;
                let shifted = if months >= 0 {
                    anchor.checked_add_months(Months::new(count))
                } else {
                    anchor.checked_sub_months(Months::new(count))
                };
                shifted.ok_or_else(out_of_range)
            }
        }
    }
}

fn parse_weekdays(list: &str) -> Result<Vec<Weekday>, ParseError> {
    let days = list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty() && !w.eq_ignore_ascii_case("or"))
        .map(|w| w.parse::<Weekday>().map_err(|_| ParseError::invalid(format!("invalid day of week {w:?}"))))
        .collect::<Result<Vec<_>, _>>()?;
    if days.is_empty() {
        return Err(ParseError::invalid("expected at least one day of week"));
    }
    Ok(days)
}

/// Nearest listed weekday strictly after (or before) the anchor.
fn first_weekday(anchor: NaiveDateTime, days: &[Weekday], forward: bool) -> Result<NaiveDateTime, ParseError> {
    let step = TimeDelta::days(if forward { 1 } else { -1 });
    let mut cursor = anchor;
    for _ in 0..7 {
        cursor = cursor.checked_add_signed(step).ok_or(ParseError::OutOfRange(0.0))?;
        if days.contains(&cursor.weekday()) {
            return Ok(cursor);
        }
    }
    Err(ParseError::invalid("no matching day of week"))
}

fn parse_time(s: &str) -> Result<NaiveTime, ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| ParseError::invalid(format!("invalid time of day {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dt(y: i32, m: u32, day: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        d(y, m, day).and_hms_opt(h, min, s).unwrap()
    }

    #[rstest]
    #[case("2021-10-05", d(2021, 10, 5))]
    #[case("2021-10-05 23:59:10", d(2021, 10, 5))]
    #[case("3 days before 2021-10-05", d(2021, 10, 2))]
    #[case("3 days after 2021-10-05", d(2021, 10, 8))]
    #[case("7 days after 2025-01-10", d(2025, 1, 17))]
    #[case("1 day after 2025-01-07", d(2025, 1, 8))]
    #[case("2 weeks after 2025-01-01", d(2025, 1, 15))]
    #[case("1 month after 2025-01-31", d(2025, 2, 28))]
    #[case("1 month after 2024-01-31", d(2024, 2, 29))]
    #[case("1 year after 2024-02-29", d(2025, 2, 28))]
    #[case("2 months before 2025-05-31", d(2025, 3, 31))]
    #[case("3 days before 2021-10-05 23:59:00", d(2021, 10, 2))]
    #[case("1 day after 2 days after 2025-01-01", d(2025, 1, 4))]
    #[case("first monday before 2021-09-17", d(2021, 9, 13))]
    #[case("first monday after 2021-09-10", d(2021, 9, 13))]
    #[case("first monday, friday after 2021-09-14", d(2021, 9, 17))]
    #[case("First Monday or Friday after 2021-09-14", d(2021, 9, 17))]
    #[case("first monday before 2021-09-14 23:59:00", d(2021, 9, 13))]
    fn smartdate_cases(#[case] src: &str, #[case] expected: NaiveDate) {
        assert_eq!(smartdate(src), Ok(expected));
    }

    #[rstest]
    #[case("2021-10-05", dt(2021, 10, 5, 0, 0, 0))]
    #[case("2021-10-05 23:59:10", dt(2021, 10, 5, 23, 59, 10))]
    #[case("2021-10-05T23:59", dt(2021, 10, 5, 23, 59, 0))]
    #[case("2021-10-05 23:59:10 at 22:00:00", dt(2021, 10, 5, 22, 0, 0))]
    #[case("3 days before 2021-10-05 23:59:15", dt(2021, 10, 2, 23, 59, 15))]
    #[case("3 days before 2021-10-05 23:59:15 at 22:00", dt(2021, 10, 2, 22, 0, 0))]
    #[case("3 hours before 2021-10-05 23:59:15", dt(2021, 10, 5, 20, 59, 15))]
    #[case("3 hours after 2021-10-05 23:59:15", dt(2021, 10, 6, 2, 59, 15))]
    #[case("90 minutes after 2021-10-05 23:00", dt(2021, 10, 6, 0, 30, 0))]
    #[case("first monday after 2021-09-14 23:59:00 at 22:00:00", dt(2021, 9, 20, 22, 0, 0))]
    fn smartdatetime_cases(#[case] src: &str, #[case] expected: NaiveDateTime) {
        assert_eq!(smartdatetime(src), Ok(expected));
    }

    #[rstest]
    #[case("3 fortnights after 2025-01-01")]
    #[case("1.5 days after 2025-01-01")]
    #[case("three days after 2025-01-01")]
    #[case("1 day after tomorrow")]
    #[case("2025-13-01")]
    #[case("first someday after 2025-01-01")]
    #[case("")]
    #[case("-9223372036854775808 days before 2025-01-01")]
    #[case("-3 days after 2025-01-01")]
    #[case("99999999999 days after 2025-01-01")]
    #[case("300000 years after 2025-01-01")]
    fn smartdate_rejects(#[case] src: &str) {
        assert!(smartdate(src).is_err(), "{src:?}");
    }

    #[test]
    fn nesting_is_bounded() {
        let shallow = format!("{}2025-01-01", "1 day after ".repeat(100));
        assert_eq!(smartdate(&shallow), Ok(d(2025, 4, 11)));
        let deep = format!("{}2025-01-01", "1 day after ".repeat(1_000));
        match smartdate(&deep) {
            Err(ParseError::Invalid(message)) => assert!(message.contains("nested too deeply"), "{message}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn literals() {
        assert_eq!(date_literal(" 2025-01-10 "), Some(d(2025, 1, 10)));
        assert_eq!(date_literal("2025-01-10T00:00:00"), None);
        assert_eq!(datetime_literal("2025-01-10T08:30:00.250"), d(2025, 1, 10).and_hms_milli_opt(8, 30, 0, 250));
    }
}
