//! Calendar event types.
//!
//! An `Event` lives in exactly one calendar. The same meeting may exist in
//! several calendars (the organizer's copy and one copy per booked resource);
//! those copies share a UID but each has its own backend identifier.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RescalError, RescalResult};
use crate::recurrence::Recurrence;

/// A calendar event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Backend identifier, unique within the calendar (None until first save)
    pub id: Option<String>,
    /// Globally unique identifier shared by all copies of the event
    pub uid: Option<String>,
    /// Owning calendar
    pub calendar: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub private: bool,
    pub status: EventStatus,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub recurrence: Option<Recurrence>,

    // Meeting data
    pub attendees: Vec<Attendee>,
    /// Ids of the resources booked for this event
    pub resources: Vec<i64>,

    // Alarms
    /// Minutes before the start to alert
    pub alarm: Option<i64>,
    pub alarm_methods: Vec<String>,

    pub creator: Option<String>,
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,

    /// Whether this instance was loaded from or written to the backend
    #[serde(skip)]
    pub(crate) stored: bool,
}

impl Event {
    pub fn new(
        calendar: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Event {
            id: None,
            uid: None,
            calendar: calendar.into(),
            title: title.into(),
            description: None,
            location: None,
            private: false,
            status: EventStatus::Confirmed,
            start: truncate_subsec(start),
            end: truncate_subsec(end),
            all_day: false,
            recurrence: None,
            attendees: Vec::new(),
            resources: Vec::new(),
            alarm: None,
            alarm_methods: Vec::new(),
            creator: None,
            modified: None,
            tags: Vec::new(),
            stored: false,
        }
    }

    /// An unsaved template starting at the current hour.
    pub fn blank(calendar: impl Into<String>) -> Self {
        let now = Utc::now();
        let start = now
            .with_minute(0)
            .and_then(|dt| dt.with_second(0))
            .unwrap_or(now);
        Event::new(calendar, "", start, start + Duration::hours(1))
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn has_resource(&self, resource_id: i64) -> bool {
        self.resources.contains(&resource_id)
    }

    pub fn add_resource(&mut self, resource_id: i64) {
        if !self.has_resource(resource_id) {
            self.resources.push(resource_id);
        }
    }

    /// Returns true if the resource was attached.
    pub fn remove_resource(&mut self, resource_id: i64) -> bool {
        let before = self.resources.len();
        self.resources.retain(|id| *id != resource_id);
        self.resources.len() != before
    }

    /// Move the event to another day, keeping its time of day and duration.
    pub fn move_to_date(&mut self, date: NaiveDate) {
        let duration = self.duration();
        self.start = date.and_time(self.start.time()).and_utc();
        self.end = self.start + duration;
    }

    /// Check the invariants a row must satisfy before it is written.
    pub fn validate(&self) -> RescalResult<()> {
        if self.calendar.is_empty() {
            return Err(RescalError::Validation("Event has no calendar".into()));
        }
        if self.end < self.start {
            return Err(RescalError::Validation(format!(
                "Event '{}' ends before it starts",
                self.title
            )));
        }
        if let Some(recurrence) = &self.recurrence
            && recurrence.count.is_some()
            && recurrence.until.is_some()
        {
            return Err(RescalError::Validation(format!(
                "Event '{}' repeats until a date and for a count; pick one",
                self.title
            )));
        }
        Ok(())
    }
}

/// Stored timestamps have second precision.
pub(crate) fn truncate_subsec(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// An event attendee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    pub name: Option<String>,
    #[serde(default)]
    pub attendance: Attendance,
    #[serde(default)]
    pub response: ParticipationStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attendance {
    #[default]
    Required,
    Optional,
    NonParticipant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    None,
    Tentative,
    Confirmed,
    Cancelled,
    Free,
}

impl EventStatus {
    pub fn code(self) -> i64 {
        match self {
            EventStatus::None => 0,
            EventStatus::Tentative => 1,
            EventStatus::Confirmed => 2,
            EventStatus::Cancelled => 3,
            EventStatus::Free => 4,
        }
    }

    pub fn from_code(code: i64) -> RescalResult<Self> {
        match code {
            0 => Ok(EventStatus::None),
            1 => Ok(EventStatus::Tentative),
            2 => Ok(EventStatus::Confirmed),
            3 => Ok(EventStatus::Cancelled),
            4 => Ok(EventStatus::Free),
            other => Err(RescalError::Serialization(format!(
                "Unknown event status {}",
                other
            ))),
        }
    }
}

impl FromStr for EventStatus {
    type Err = RescalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(EventStatus::None),
            "tentative" => Ok(EventStatus::Tentative),
            "confirmed" => Ok(EventStatus::Confirmed),
            "cancelled" | "canceled" => Ok(EventStatus::Cancelled),
            "free" => Ok(EventStatus::Free),
            other => Err(RescalError::Validation(format!("Unknown status '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::recurrence::RecurrenceKind;

    fn standup() -> Event {
        Event::new(
            "team",
            "Standup",
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_move_to_date_keeps_time_and_duration() {
        let mut event = standup();
        event.move_to_date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

        assert_eq!(event.start, Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_resource_attachment() {
        let mut event = standup();
        event.add_resource(7);
        event.add_resource(7);
        assert_eq!(event.resources, vec![7]);

        assert!(event.remove_resource(7));
        assert!(!event.remove_resource(7));
        assert!(event.resources.is_empty());
    }

    #[test]
    fn test_validate_rejects_inverted_interval() {
        let mut event = standup();
        event.end = event.start - Duration::minutes(1);
        assert!(matches!(event.validate(), Err(RescalError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_count_with_until() {
        let mut event = standup();
        event.recurrence = Some(
            Recurrence::new(RecurrenceKind::Daily)
                .with_count(10)
                .with_until(event.start + Duration::days(2)),
        );
        assert!(matches!(event.validate(), Err(RescalError::Validation(_))));

        event.recurrence = Some(Recurrence::new(RecurrenceKind::Daily).with_count(10));
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_times_keep_whole_seconds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 42).unwrap() + Duration::milliseconds(750);
        let event = Event::new("team", "Standup", start, start + Duration::minutes(30));
        assert_eq!(event.start, Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 42).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2024, 1, 8, 9, 30, 42).unwrap());
    }

    #[test]
    fn test_blank_event_is_unsaved() {
        let event = Event::blank("team");
        assert!(!event.is_stored());
        assert!(event.id.is_none());
        assert_eq!(event.duration(), Duration::hours(1));
    }

    #[test]
    fn test_status_codes() {
        for code in 0..=4 {
            assert_eq!(EventStatus::from_code(code).unwrap().code(), code);
        }
        assert!(EventStatus::from_code(9).is_err());
        assert_eq!("Canceled".parse::<EventStatus>().unwrap(), EventStatus::Cancelled);
        assert!("maybe".parse::<EventStatus>().is_err());
    }
}
