//! Five-field cron expressions.
//!
//! `minute hour day-of-month month day-of-week`, each field one of `*`, a
//! literal, a comma list, a range `a-b`, or a step `*/n` / `a-b/n`. Day of week
//! runs 0-6 from Sunday, 7 is accepted as Sunday. Day of month and day of week
//! must both match.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike};

use crate::{Error, Result};

/// Days searched by [`CronSchedule::next_after`] before giving up.
const MAX_SEARCH_DAYS: u32 = 366 * 5;

#[derive(Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
};
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
};

/// A parsed schedule. Each field is a bitmask of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let parse = |text: &str, spec: FieldSpec| {
            parse_field(text, spec).map_err(|reason| invalid(expression, reason))
        };

        let mut days_of_week = parse(fields[4], DAY_OF_WEEK)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes: parse(fields[0], MINUTE)?,
            hours: parse(fields[1], HOUR)?,
            days_of_month: parse(fields[2], DAY_OF_MONTH)?,
            months: parse(fields[3], MONTH)?,
            days_of_week,
        })
    }

    /// Whether the minute containing `time` matches, in `time`'s own timezone.
    pub fn matches<Z: TimeZone>(&self, time: &DateTime<Z>) -> bool {
        self.matches_naive(&time.naive_local())
    }

    pub fn matches_naive(&self, time: &NaiveDateTime) -> bool {
        self.matches_date(time.date())
            && bit(self.hours, time.hour())
            && bit(self.minutes, time.minute())
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        bit(self.months, date.month())
            && bit(self.days_of_month, date.day())
            && bit(self.days_of_week, date.weekday().num_days_from_sunday())
    }

    /// First matching minute strictly after `after`, in `after`'s timezone.
    ///
    /// Local times skipped by a DST transition never match. Returns `None` when
    /// nothing matches within five years.
    pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
        let tz = after.timezone();
        let start = after
            .naive_local()
            .with_second(0)?
            .with_nanosecond(0)?
            .checked_add_signed(TimeDelta::minutes(1))?;

        let mut day = start.date();
        for _ in 0..MAX_SEARCH_DAYS {
            if self.matches_date(day) {
                for hour in (0..24).filter(|h| bit(self.hours, *h)) {
                    for minute in (0..60).filter(|m| bit(self.minutes, *m)) {
                        let candidate = day.and_hms_opt(hour, minute, 0)?;
                        if candidate < start {
                            continue;
                        }
                        if let Some(found) = tz.from_local_datetime(&candidate).earliest() {
                            return Some(found);
                        }
                    }
                }
            }
            day = day.succ_opt()?;
        }
        None
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn bit(mask: u64, value: u32) -> bool {
    value < 64 && mask & (1 << value) != 0
}

fn invalid(expression: &str, reason: String) -> Error {
    Error::validation(format!("invalid cron expression [{expression}]: {reason}"))
}

fn parse_value(text: &str, spec: FieldSpec) -> std::result::Result<u32, String> {
    let value: u32 = text
        .parse()
        .map_err(|_| format!("{} value `{text}` is not a number", spec.name))?;
    if value < spec.min || value > spec.max {
        return Err(format!(
            "{} value {value} out of range {}-{}",
            spec.name, spec.min, spec.max
        ));
    }
    Ok(value)
}

fn parse_field(text: &str, spec: FieldSpec) -> std::result::Result<u64, String> {
    let mut mask = 0u64;

    for part in text.split(',') {
        if part.is_empty() {
            return Err(format!("empty list item in {} field `{text}`", spec.name));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("{} step `{step}` is not a number", spec.name))?;
                if step == 0 {
                    return Err(format!("{} step cannot be zero", spec.name));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            let (a, b) = (parse_value(a, spec)?, parse_value(b, spec)?);
            if a > b {
                return Err(format!("{} range {a}-{b} is reversed", spec.name));
            }
            (a, b)
        } else {
            let value = parse_value(range, spec)?;
            // `a/n` runs from `a` to the end of the field
            if step.is_some() { (value, spec.max) } else { (value, value) }
        };

        let step = step.unwrap_or(1) as usize;
        for value in (start..=end).step_by(step) {
            mask |= 1 << value;
        }
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate, Utc};
    use chrono_tz::Tz;
    use rstest::rstest;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn matching_minutes(expression: &str) -> Vec<u32> {
        let schedule = CronSchedule::parse(expression).unwrap();
        (0..60)
            .filter(|m| schedule.matches_naive(&at(2024, 3, 9, 10, *m)))
            .collect()
    }

    #[test]
    fn test_nine_am_daily() {
        let schedule = CronSchedule::parse("0 9 * * *").unwrap();
        for day in 1..=28 {
            for month in [1, 6, 12] {
                for hour in 0..24 {
                    for minute in 0..60 {
                        let expected = hour == 9 && minute == 0;
                        assert_eq!(
                            schedule.matches_naive(&at(2023, month, day, hour, minute)),
                            expected,
                            "{month}/{day} {hour}:{minute}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_every_fifteen_minutes() {
        assert_eq!(matching_minutes("*/15 * * * *"), vec![0, 15, 30, 45]);
    }

    #[rstest]
    #[case("5,10,50 * * * *", vec![5, 10, 50])]
    #[case("10-13 * * * *", vec![10, 11, 12, 13])]
    #[case("10-30/10 * * * *", vec![10, 20, 30])]
    #[case("50/4 * * * *", vec![50, 54, 58])]
    #[case("0-4,*/20 * * * *", vec![0, 1, 2, 3, 4, 20, 40])]
    #[case("* * * * *", (0..60).collect())]
    fn test_minute_forms(#[case] expression: &str, #[case] expected: Vec<u32>) {
        assert_eq!(matching_minutes(expression), expected);
    }

    #[rstest]
    // 2024-03-09 is a Saturday
    #[case("0 10 * * 6", true)]
    #[case("0 10 * * 0", false)]
    #[case("0 10 * * 1-5", false)]
    #[case("0 10 9 3 *", true)]
    #[case("0 10 9 4 *", false)]
    // both day fields must match
    #[case("0 10 9 * 1", false)]
    #[case("0 10 9 * 6", true)]
    fn test_day_fields(#[case] expression: &str, #[case] expected: bool) {
        let schedule = CronSchedule::parse(expression).unwrap();
        assert_eq!(schedule.matches_naive(&at(2024, 3, 9, 10, 0)), expected);
    }

    #[test]
    fn test_seven_is_sunday() {
        let schedule = CronSchedule::parse("0 0 * * 7").unwrap();
        // 2024-03-10 is a Sunday
        assert!(schedule.matches_naive(&at(2024, 3, 10, 0, 0)));
        assert!(!schedule.matches_naive(&at(2024, 3, 11, 0, 0)));
    }

    #[rstest]
    #[case("")]
    #[case("* * * *")]
    #[case("* * * * * *")]
    #[case("60 * * * *")]
    #[case("* 24 * * *")]
    #[case("* * 0 * *")]
    #[case("* * 32 * *")]
    #[case("* * * 13 *")]
    #[case("* * * * 8")]
    #[case("*/0 * * * *")]
    #[case("5-1 * * * *")]
    #[case("1,,2 * * * *")]
    #[case("a * * * *")]
    #[case("@daily")]
    fn test_rejects_malformed(#[case] expression: &str) {
        let err = CronSchedule::parse(expression).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_matches_in_timezone() {
        let schedule = CronSchedule::parse("0 9 * * *").unwrap();
        let utc = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let berlin: Tz = "Europe/Berlin".parse().unwrap();

        assert!(!schedule.matches(&utc));
        assert!(schedule.matches(&utc.with_timezone(&berlin)));
    }

    #[test]
    fn test_next_after() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 10, 7, 42).unwrap();
        assert_eq!(
            schedule.next_after(&now),
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 10, 15, 0).unwrap())
        );

        // strictly after, even when `after` itself matches
        let on_the_minute = Utc.with_ymd_and_hms(2024, 3, 9, 10, 15, 0).unwrap();
        assert_eq!(
            schedule.next_after(&on_the_minute),
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 10, 30, 0).unwrap())
        );

        let daily = CronSchedule::parse("0 9 * * *").unwrap();
        assert_eq!(
            daily.next_after(&now),
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap())
        );

        let leap = CronSchedule::parse("0 0 29 2 *").unwrap();
        assert_eq!(
            leap.next_after(&now),
            Some(Utc.with_ymd_and_hms(2028, 2, 29, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_next_after_skips_dst_gap() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let schedule = CronSchedule::parse("30 2 * * *").unwrap();
        let berlin: Tz = "Europe/Berlin".parse().unwrap();
        let before = berlin.with_ymd_and_hms(2024, 3, 30, 12, 0, 0).unwrap();
        let next = schedule.next_after(&before).unwrap();
        assert_eq!(next.naive_local(), at(2024, 4, 1, 2, 30));
    }

    #[test]
    fn test_impossible_date_gives_none() {
        let schedule = CronSchedule::parse("0 0 31 2 *").unwrap();
        assert!(schedule.next_after(&Local::now()).is_none());
    }

    #[test]
    fn test_display_normalizes_whitespace() {
        let schedule = CronSchedule::parse("  0   9 * *  1-5 ").unwrap();
        assert_eq!(schedule.to_string(), "0 9 * * 1-5");
    }
}
