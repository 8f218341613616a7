//! Date range for listing events.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::{RescalError, RescalResult};

/// Days listed when no end is given.
pub const DEFAULT_LIST_DAYS: i64 = 30;

/// Listing window. `from = None` means unbounded in the past.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: DateTime<Utc>,
}

impl Default for DateRange {
    /// Default range: today through DEFAULT_LIST_DAYS from now
    fn default() -> Self {
        let today = Utc::now().date_naive();
        DateRange {
            from: Some(start_of_day(today)),
            to: end_of_day(today + Duration::days(DEFAULT_LIST_DAYS)),
        }
    }
}

impl DateRange {
    /// Parse command line bounds.
    /// - `from`: "start" for unbounded, or a date; defaults to today
    /// - `to`: a date; defaults to DEFAULT_LIST_DAYS after `from`
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> RescalResult<Self> {
        let default = DateRange::default();

        let from_dt = match from {
            Some("start") => None,
            Some(s) => Some(parse_date_start(s)?),
            None => default.from,
        };

        let to_dt = match (to, from_dt) {
            (Some(s), _) => parse_date_end(s)?,
            (None, Some(f)) if from.is_some() => {
                end_of_day(f.date_naive() + Duration::days(DEFAULT_LIST_DAYS))
            }
            _ => default.to,
        };

        if from_dt.is_some_and(|f| f > to_dt) {
            return Err(RescalError::Validation(
                "Range start is after range end".into(),
            ));
        }

        Ok(DateRange {
            from: from_dt,
            to: to_dt,
        })
    }

    /// `YYYYMMDDYYYYMMDD` signature of the range, as used by the AJAX client.
    pub fn signature(&self) -> String {
        let from = self
            .from
            .map(|f| f.format("%Y%m%d").to_string())
            .unwrap_or_default();
        format!("{}{}", from, self.to.format("%Y%m%d"))
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    date.and_time(last_second).and_utc()
}

/// Parse a day (`YYYY-MM-DD` or `YYYYMMDD`) or an RFC 3339 instant.
fn parse_date_or_instant(s: &str) -> RescalResult<Result<NaiveDate, DateTime<Utc>>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Ok(date));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Ok(Ok(date));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Err(dt.with_timezone(&Utc)));
    }
    Err(RescalError::Validation(format!(
        "Invalid date '{}'. Expected YYYY-MM-DD, YYYYMMDD or RFC 3339",
        s
    )))
}

/// Parse a range start; bare dates mean the start of that day (UTC).
pub fn parse_date_start(s: &str) -> RescalResult<DateTime<Utc>> {
    Ok(match parse_date_or_instant(s)? {
        Ok(date) => start_of_day(date),
        Err(instant) => instant,
    })
}

/// Parse a range end; bare dates mean the last second of that day (UTC).
pub fn parse_date_end(s: &str) -> RescalResult<DateTime<Utc>> {
    Ok(match parse_date_or_instant(s)? {
        Ok(date) => end_of_day(date),
        Err(instant) => instant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bare_dates_cover_whole_days() {
        let range = DateRange::from_args(Some("2024-01-01"), Some("20240131")).unwrap();
        assert_eq!(range.from, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(range.to, Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
        assert_eq!(range.signature(), "2024010120240131");
    }

    #[test]
    fn test_unbounded_start() {
        let range = DateRange::from_args(Some("start"), Some("2024-01-31")).unwrap();
        assert!(range.from.is_none());
    }

    #[test]
    fn test_end_defaults_relative_to_start() {
        let range = DateRange::from_args(Some("2024-01-01"), None).unwrap();
        assert_eq!(range.to, Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_rfc3339_instants_pass_through() {
        let start = parse_date_start("2024-01-08T09:00:00+01:00").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_rejects_inverted_and_malformed() {
        assert!(DateRange::from_args(Some("2024-02-01"), Some("2024-01-01")).is_err());
        assert!(DateRange::from_args(Some("next week"), None).is_err());
    }
}
