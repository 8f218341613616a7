//! Row layouts of the event and resource tables.

use chrono::NaiveDate;
use sqlx::FromRow;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

use crate::db::{from_db_time, to_db_time};
use crate::error::{RescalError, RescalResult};
use crate::event::{Event, EventStatus};
use crate::recurrence::{Recurrence, RecurrenceKind, Weekdays};
use crate::resource::{Resource, ResourceKind, ResponseType};

pub(crate) const EVENT_COLUMNS: &str = "event_id, event_uid, calendar_id, event_creator_id, \
     event_title, event_description, event_location, event_private, event_status, \
     event_attendees, event_resources, event_start, event_end, event_allday, event_alarm, \
     event_alarm_methods, event_modified, event_recurtype, event_recurinterval, \
     event_recurdays, event_recurenddate, event_recurcount, event_exceptions";

/// Columns written on every save, in `EventProperties::bind` order.
pub(crate) const PROPERTY_COLUMNS: [&str; 20] = [
    "event_creator_id",
    "event_title",
    "event_description",
    "event_location",
    "event_private",
    "event_status",
    "event_attendees",
    "event_resources",
    "event_start",
    "event_end",
    "event_allday",
    "event_alarm",
    "event_alarm_methods",
    "event_modified",
    "event_recurtype",
    "event_recurinterval",
    "event_recurdays",
    "event_recurenddate",
    "event_recurcount",
    "event_exceptions",
];

pub(crate) const RESOURCE_COLUMNS: &str = "resource_id, resource_name, resource_calendar, \
     resource_category, resource_description, resource_response_type, resource_type, \
     resource_members";

#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub event_id: String,
    pub event_uid: Option<String>,
    pub calendar_id: String,
    pub event_creator_id: Option<String>,
    pub event_title: String,
    pub event_description: Option<String>,
    pub event_location: Option<String>,
    pub event_private: bool,
    pub event_status: i64,
    pub event_attendees: Option<String>,
    pub event_resources: Option<String>,
    pub event_start: String,
    pub event_end: String,
    pub event_allday: bool,
    pub event_alarm: Option<i64>,
    pub event_alarm_methods: Option<String>,
    pub event_modified: Option<String>,
    pub event_recurtype: i64,
    pub event_recurinterval: Option<i64>,
    pub event_recurdays: Option<i64>,
    pub event_recurenddate: Option<String>,
    pub event_recurcount: Option<i64>,
    pub event_exceptions: Option<String>,
}

fn json_list<T: serde::de::DeserializeOwned>(value: Option<&str>) -> RescalResult<Vec<T>> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(serde_json::from_str(s)?),
        _ => Ok(Vec::new()),
    }
}

fn json_or_null<T: serde::Serialize>(values: &[T]) -> RescalResult<Option<String>> {
    if values.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(values)?))
    }
}

/// Exception dates are stored as comma separated `YYYYMMDD`.
fn exceptions_from_db(value: Option<&str>) -> RescalResult<Vec<NaiveDate>> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| {
                RescalError::Serialization(format!("Invalid exception date '{}': {}", s, e))
            })
        })
        .collect()
}

fn exceptions_to_db(dates: &[NaiveDate]) -> Option<String> {
    if dates.is_empty() {
        return None;
    }
    let joined: Vec<String> = dates.iter().map(|d| d.format("%Y%m%d").to_string()).collect();
    Some(joined.join(","))
}

impl EventRow {
    pub fn into_event(self) -> RescalResult<Event> {
        let count = self.event_recurcount.and_then(|c| u32::try_from(c).ok());
        // Older rows may carry both; the count wins
        let until = match count {
            Some(_) => None,
            None => self
                .event_recurenddate
                .as_deref()
                .map(from_db_time)
                .transpose()?,
        };

        let recurrence = match RecurrenceKind::from_code(self.event_recurtype)? {
            None => None,
            Some(kind) => Some(Recurrence {
                kind,
                interval: self
                    .event_recurinterval
                    .and_then(|i| u32::try_from(i).ok())
                    .unwrap_or(1)
                    .max(1),
                days: Weekdays::from_bits(
                    self.event_recurdays
                        .and_then(|d| u8::try_from(d).ok())
                        .unwrap_or_default(),
                ),
                count,
                until,
                exceptions: exceptions_from_db(self.event_exceptions.as_deref())?,
            }),
        };

        Ok(Event {
            id: Some(self.event_id),
            uid: self.event_uid.filter(|uid| !uid.is_empty()),
            calendar: self.calendar_id,
            title: self.event_title,
            description: self.event_description,
            location: self.event_location,
            private: self.event_private,
            status: EventStatus::from_code(self.event_status)?,
            start: from_db_time(&self.event_start)?,
            end: from_db_time(&self.event_end)?,
            all_day: self.event_allday,
            recurrence,
            attendees: json_list(self.event_attendees.as_deref())?,
            resources: json_list(self.event_resources.as_deref())?,
            alarm: self.event_alarm,
            alarm_methods: json_list(self.event_alarm_methods.as_deref())?,
            creator: self.event_creator_id,
            modified: self.event_modified.as_deref().map(from_db_time).transpose()?,
            tags: Vec::new(),
            stored: true,
        })
    }
}

/// Owned column values of an event, ready to bind.
pub(crate) struct EventProperties {
    creator: Option<String>,
    title: String,
    description: Option<String>,
    location: Option<String>,
    private: bool,
    status: i64,
    attendees: Option<String>,
    resources: Option<String>,
    start: String,
    end: String,
    all_day: bool,
    alarm: Option<i64>,
    alarm_methods: Option<String>,
    modified: Option<String>,
    recur_type: i64,
    recur_interval: Option<i64>,
    recur_days: Option<i64>,
    recur_end: Option<String>,
    recur_count: Option<i64>,
    exceptions: Option<String>,
}

impl EventProperties {
    pub fn from_event(event: &Event) -> RescalResult<Self> {
        let recurrence = event.recurrence.as_ref();

        Ok(EventProperties {
            creator: event.creator.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            private: event.private,
            status: event.status.code(),
            attendees: json_or_null(&event.attendees)?,
            resources: json_or_null(&event.resources)?,
            start: to_db_time(event.start),
            end: to_db_time(event.end),
            all_day: event.all_day,
            alarm: event.alarm,
            alarm_methods: json_or_null(&event.alarm_methods)?,
            modified: event.modified.map(to_db_time),
            recur_type: recurrence
                .map(|r| r.kind.code())
                .unwrap_or(RecurrenceKind::NONE_CODE),
            recur_interval: recurrence.map(|r| i64::from(r.interval.max(1))),
            recur_days: recurrence.map(|r| i64::from(r.days.bits())),
            recur_end: recurrence
                .filter(|r| r.count.is_none())
                .and_then(|r| r.until)
                .map(to_db_time),
            recur_count: recurrence.and_then(|r| r.count).map(i64::from),
            exceptions: recurrence.and_then(|r| exceptions_to_db(&r.exceptions)),
        })
    }

    /// Bind every property in PROPERTY_COLUMNS order.
    pub fn bind<'q>(
        self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.creator)
            .bind(self.title)
            .bind(self.description)
            .bind(self.location)
            .bind(self.private)
            .bind(self.status)
            .bind(self.attendees)
            .bind(self.resources)
            .bind(self.start)
            .bind(self.end)
            .bind(self.all_day)
            .bind(self.alarm)
            .bind(self.alarm_methods)
            .bind(self.modified)
            .bind(self.recur_type)
            .bind(self.recur_interval)
            .bind(self.recur_days)
            .bind(self.recur_end)
            .bind(self.recur_count)
            .bind(self.exceptions)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ResourceRow {
    pub resource_id: i64,
    pub resource_name: String,
    pub resource_calendar: String,
    pub resource_category: Option<String>,
    pub resource_description: Option<String>,
    pub resource_response_type: i64,
    pub resource_type: String,
    pub resource_members: Option<String>,
}

impl ResourceRow {
    pub fn into_resource(self) -> RescalResult<Resource> {
        let kind = match self.resource_type.as_str() {
            "Single" => ResourceKind::Single,
            "Group" => ResourceKind::Group {
                members: json_list(self.resource_members.as_deref())?,
            },
            other => {
                return Err(RescalError::Serialization(format!(
                    "Unknown resource type '{}'",
                    other
                )));
            }
        };

        Ok(Resource {
            id: Some(self.resource_id),
            name: self.resource_name,
            calendar: self.resource_calendar,
            category: self.resource_category,
            description: self.resource_description,
            response_type: ResponseType::from_code(self.resource_response_type)?,
            kind,
        })
    }
}

/// Members column value of a resource.
pub(crate) fn resource_members(resource: &Resource) -> RescalResult<Option<String>> {
    json_or_null(resource.members())
}
