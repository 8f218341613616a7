//! Core of rescal: calendar events and bookable resources on SQL storage.
//!
//! - [`store::EventStore`] lists, fetches, saves and deletes events of a calendar
//! - [`store::ResourceStore`] manages resources and their backing calendars
//! - [`services`] holds the history, tagging, notification and permission seams

pub mod config;
pub mod date_range;
pub mod db;
pub mod error;
pub mod event;
pub mod recurrence;
pub mod resource;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{RescalError, RescalResult};
pub use event::{Attendance, Attendee, Event, EventStatus, ParticipationStatus};
pub use recurrence::{Recurrence, RecurrenceKind, Weekdays};
pub use resource::{Resource, ResourceField, ResourceFilter, ResourceKind, ResponseType};
pub use sqlx::SqlitePool;
