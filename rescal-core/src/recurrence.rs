//! Recurrence descriptors and occurrence expansion.
//!
//! Descriptors keep the stored layout (type code, interval, day mask, end
//! date, count, exception dates). Expansion goes through an iCalendar RRULE
//! so the rrule crate does the calendar arithmetic.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{RescalError, RescalResult};

/// How a recurring event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    /// Same day of the month (e.g. every 9th)
    MonthlyDate,
    /// Same weekday position in the month (e.g. every second Tuesday)
    MonthlyWeekday,
    YearlyDate,
    /// Same day of the year (e.g. day 100)
    YearlyDay,
    /// Same weekday position in the same month (e.g. fourth Thursday of November)
    YearlyWeekday,
}

impl RecurrenceKind {
    /// Stored code for non-recurring events.
    pub const NONE_CODE: i64 = 0;

    pub fn code(self) -> i64 {
        match self {
            RecurrenceKind::Daily => 1,
            RecurrenceKind::Weekly => 2,
            RecurrenceKind::MonthlyDate => 3,
            RecurrenceKind::MonthlyWeekday => 4,
            RecurrenceKind::YearlyDate => 5,
            RecurrenceKind::YearlyDay => 6,
            RecurrenceKind::YearlyWeekday => 7,
        }
    }

    /// Map a stored code back to a kind. `Ok(None)` means "does not recur".
    pub fn from_code(code: i64) -> RescalResult<Option<Self>> {
        let kind = match code {
            0 => return Ok(None),
            1 => RecurrenceKind::Daily,
            2 => RecurrenceKind::Weekly,
            3 => RecurrenceKind::MonthlyDate,
            4 => RecurrenceKind::MonthlyWeekday,
            5 => RecurrenceKind::YearlyDate,
            6 => RecurrenceKind::YearlyDay,
            7 => RecurrenceKind::YearlyWeekday,
            other => {
                return Err(RescalError::Serialization(format!(
                    "Unknown recurrence type {}",
                    other
                )));
            }
        };
        Ok(Some(kind))
    }

    fn freq(self) -> &'static str {
        match self {
            RecurrenceKind::Daily => "DAILY",
            RecurrenceKind::Weekly => "WEEKLY",
            RecurrenceKind::MonthlyDate | RecurrenceKind::MonthlyWeekday => "MONTHLY",
            RecurrenceKind::YearlyDate
            | RecurrenceKind::YearlyDay
            | RecurrenceKind::YearlyWeekday => "YEARLY",
        }
    }
}

impl FromStr for RecurrenceKind {
    type Err = RescalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "daily" => Ok(RecurrenceKind::Daily),
            "weekly" => Ok(RecurrenceKind::Weekly),
            "monthly" | "monthly-date" => Ok(RecurrenceKind::MonthlyDate),
            "monthly-weekday" => Ok(RecurrenceKind::MonthlyWeekday),
            "yearly" | "yearly-date" => Ok(RecurrenceKind::YearlyDate),
            "yearly-day" => Ok(RecurrenceKind::YearlyDay),
            "yearly-weekday" => Ok(RecurrenceKind::YearlyWeekday),
            other => Err(RescalError::Validation(format!(
                "Unknown recurrence '{}'",
                other
            ))),
        }
    }
}

const ALL_DAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Day-of-week bitmask: Sunday = 1, Monday = 2, ... Saturday = 64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weekdays(u8);

impl Weekdays {
    pub const SUNDAY: Weekdays = Weekdays(1);
    pub const MONDAY: Weekdays = Weekdays(2);
    pub const TUESDAY: Weekdays = Weekdays(4);
    pub const WEDNESDAY: Weekdays = Weekdays(8);
    pub const THURSDAY: Weekdays = Weekdays(16);
    pub const FRIDAY: Weekdays = Weekdays(32);
    pub const SATURDAY: Weekdays = Weekdays(64);

    pub fn from_bits(bits: u8) -> Self {
        Weekdays(bits & 0x7f)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        ALL_DAYS.into_iter().filter(move |d| self.contains(*d))
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_sunday()
    }
}

impl std::ops::BitOr for Weekdays {
    type Output = Weekdays;

    fn bitor(self, rhs: Weekdays) -> Weekdays {
        Weekdays(self.0 | rhs.0)
    }
}

fn ics_day(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// 1-based position of the date's weekday within its month.
fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

fn ics_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Recurrence descriptor attached to a master event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub kind: RecurrenceKind,
    /// Repeat every `interval` units of `kind`
    pub interval: u32,
    /// Weekly recurrences only; empty means "the start's weekday"
    #[serde(default)]
    pub days: Weekdays,
    /// Number of occurrences; takes precedence over `until`
    pub count: Option<u32>,
    /// Last instant an occurrence may start
    pub until: Option<DateTime<Utc>>,
    /// Dates whose occurrence is skipped
    #[serde(default)]
    pub exceptions: Vec<NaiveDate>,
}

impl Recurrence {
    pub fn new(kind: RecurrenceKind) -> Self {
        Recurrence {
            kind,
            interval: 1,
            days: Weekdays::default(),
            count: None,
            until: None,
            exceptions: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_days(mut self, days: Weekdays) -> Self {
        self.days = days;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn add_exception(&mut self, date: NaiveDate) {
        if !self.exceptions.contains(&date) {
            self.exceptions.push(date);
        }
    }

    /// True when the series cannot produce any occurrence at all.
    fn is_void(&self, dtstart: DateTime<Utc>) -> bool {
        self.count == Some(0)
            || (self.count.is_none() && self.until.is_some_and(|until| until < dtstart))
    }

    fn rrule_line(&self, dtstart: DateTime<Utc>) -> String {
        let date = dtstart.date_naive();
        let mut parts = vec![
            format!("FREQ={}", self.kind.freq()),
            format!("INTERVAL={}", self.interval.max(1)),
        ];

        match self.kind {
            RecurrenceKind::Weekly if !self.days.is_empty() => {
                let days: Vec<&str> = self.days.iter().map(ics_day).collect();
                parts.push(format!("BYDAY={}", days.join(",")));
            }
            RecurrenceKind::MonthlyWeekday => {
                parts.push(format!(
                    "BYDAY={}{}",
                    week_of_month(date),
                    ics_day(date.weekday())
                ));
            }
            RecurrenceKind::YearlyDay => {
                parts.push(format!("BYYEARDAY={}", date.ordinal()));
            }
            RecurrenceKind::YearlyWeekday => {
                parts.push(format!("BYMONTH={}", date.month()));
                parts.push(format!(
                    "BYDAY={}{}",
                    week_of_month(date),
                    ics_day(date.weekday())
                ));
            }
            _ => {}
        }

        // RRULE forbids COUNT and UNTIL together
        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        } else if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", ics_utc(until)));
        }

        format!("RRULE:{}", parts.join(";"))
    }

    /// Render the descriptor as an iCalendar rule set anchored at `dtstart`.
    pub fn to_ics(&self, dtstart: DateTime<Utc>) -> String {
        let mut lines = vec![format!("DTSTART:{}", ics_utc(dtstart)), self.rrule_line(dtstart)];

        // Exceptions are whole days; the skipped instance starts at the master's time of day
        for exception in &self.exceptions {
            let instant = exception.and_time(dtstart.time()).and_utc();
            lines.push(format!("EXDATE:{}", ics_utc(instant)));
        }

        lines.join("\n")
    }

    fn rule_set(&self, dtstart: DateTime<Utc>) -> RescalResult<RRuleSet> {
        self.to_ics(dtstart)
            .parse()
            .map_err(|e| RescalError::Recurrence(format!("Failed to parse recurrence rule: {}", e)))
    }

    /// First occurrence starting on or after `after`, if the series produces one.
    pub fn next_occurrence(
        &self,
        dtstart: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> RescalResult<Option<DateTime<Utc>>> {
        if self.is_void(dtstart) {
            return Ok(None);
        }

        let tz = rrule::Tz::UTC;
        let window_start = (after - Duration::seconds(1)).with_timezone(&tz);
        let result = self.rule_set(dtstart)?.after(window_start).all(2);

        Ok(result
            .dates
            .iter()
            .map(|d| d.with_timezone(&Utc))
            .find(|d| *d >= after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse_kind_names() {
        assert_eq!("weekly".parse::<RecurrenceKind>().unwrap(), RecurrenceKind::Weekly);
        assert_eq!("Monthly_Weekday".parse::<RecurrenceKind>().unwrap(), RecurrenceKind::MonthlyWeekday);
        assert_eq!("yearly".parse::<RecurrenceKind>().unwrap(), RecurrenceKind::YearlyDate);
        assert!("fortnightly".parse::<RecurrenceKind>().is_err());
    }

    #[test]
    fn test_weekly_next_occurrence_from_before_start() {
        let rule = Recurrence::new(RecurrenceKind::Weekly);
        let start = at(2024, 1, 8, 9, 0);

        let next = rule.next_occurrence(start, at(2024, 1, 1, 0, 0)).unwrap();
        assert_eq!(next, Some(start));

        let next = rule.next_occurrence(start, at(2024, 1, 8, 9, 1)).unwrap();
        assert_eq!(next, Some(at(2024, 1, 15, 9, 0)));
    }

    #[test]
    fn test_next_occurrence_is_inclusive() {
        let rule = Recurrence::new(RecurrenceKind::Daily);
        let start = at(2024, 3, 1, 12, 0);

        let next = rule.next_occurrence(start, at(2024, 3, 4, 12, 0)).unwrap();
        assert_eq!(next, Some(at(2024, 3, 4, 12, 0)));
    }

    #[test]
    fn test_exception_date_is_skipped() {
        let mut rule = Recurrence::new(RecurrenceKind::Weekly);
        rule.add_exception(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        let start = at(2024, 1, 8, 9, 0);

        let next = rule.next_occurrence(start, at(2024, 1, 1, 0, 0)).unwrap();
        assert_eq!(next, Some(at(2024, 1, 15, 9, 0)));
    }

    #[test]
    fn test_count_exhausted_series_has_no_next() {
        let rule = Recurrence::new(RecurrenceKind::Weekly).with_count(2);
        let start = at(2023, 12, 4, 9, 0);

        assert_eq!(
            rule.next_occurrence(start, at(2023, 12, 5, 0, 0)).unwrap(),
            Some(at(2023, 12, 11, 9, 0))
        );
        assert_eq!(rule.next_occurrence(start, at(2024, 1, 1, 0, 0)).unwrap(), None);
    }

    #[test]
    fn test_until_before_start_is_void() {
        let rule = Recurrence::new(RecurrenceKind::Daily).with_until(at(2023, 1, 1, 0, 0));
        let start = at(2024, 1, 1, 9, 0);

        assert_eq!(rule.next_occurrence(start, at(2023, 6, 1, 0, 0)).unwrap(), None);
    }

    #[test]
    fn test_daily_interval() {
        let rule = Recurrence::new(RecurrenceKind::Daily).with_interval(3);
        let start = at(2024, 1, 1, 10, 0);

        let next = rule.next_occurrence(start, at(2024, 1, 5, 0, 0)).unwrap();
        assert_eq!(next, Some(at(2024, 1, 7, 10, 0)));
    }

    #[test]
    fn test_weekly_day_mask() {
        let rule = Recurrence::new(RecurrenceKind::Weekly)
            .with_days(Weekdays::MONDAY | Weekdays::WEDNESDAY);
        let start = at(2024, 1, 8, 9, 0);

        let next = rule.next_occurrence(start, at(2024, 1, 9, 0, 0)).unwrap();
        assert_eq!(next, Some(at(2024, 1, 10, 9, 0)));
    }

    #[test]
    fn test_monthly_weekday_keeps_position() {
        // 2024-01-09 is the second Tuesday of January
        let rule = Recurrence::new(RecurrenceKind::MonthlyWeekday);
        let start = at(2024, 1, 9, 14, 0);

        let next = rule.next_occurrence(start, at(2024, 1, 10, 0, 0)).unwrap();
        assert_eq!(next, Some(at(2024, 2, 13, 14, 0)));
    }

    #[test]
    fn test_kind_codes_roundtrip() {
        for code in 1..=7 {
            let kind = RecurrenceKind::from_code(code).unwrap().unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(RecurrenceKind::from_code(0).unwrap(), None);
        assert!(RecurrenceKind::from_code(42).is_err());
    }

    #[test]
    fn test_weekday_mask_bits() {
        let days = Weekdays::SUNDAY | Weekdays::SATURDAY;
        assert_eq!(days.bits(), 65);
        assert!(days.contains(Weekday::Sun));
        assert!(!days.contains(Weekday::Mon));
        assert_eq!(days.iter().collect::<Vec<_>>(), vec![Weekday::Sun, Weekday::Sat]);
    }
}
