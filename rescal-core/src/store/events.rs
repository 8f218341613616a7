//! Event storage for one calendar at a time.
//!
//! An `EventStore` is meant to live for one request or command. Every event
//! it reads is memoized by (calendar, identifier) for its whole lifetime, so
//! repeated lookups hand back the same shared instance.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::resources::ResourceStore;
use super::row::{EVENT_COLUMNS, EventProperties, EventRow, PROPERTY_COLUMNS};
use crate::db::to_db_time;
use crate::error::{RescalError, RescalResult};
use crate::event::{Event, EventStatus, truncate_subsec};
use crate::resource::{Resource, ResourceKind};
use crate::services::{HistoryAction, NotificationAction, Services, history_key};

/// Extra predicates for [`EventStore::list_events`], ANDed together.
#[derive(Debug, Clone, PartialEq)]
pub enum EventCondition {
    Creator(String),
    Status(EventStatus),
    TitleContains(String),
    Private(bool),
}

impl EventCondition {
    fn push_to(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            EventCondition::Creator(creator) => {
                query.push("event_creator_id = ").push_bind(creator.clone());
            }
            EventCondition::Status(status) => {
                query.push("event_status = ").push_bind(status.code());
            }
            EventCondition::TitleContains(text) => {
                query
                    .push("event_title LIKE ")
                    .push_bind(format!("%{}%", text));
            }
            EventCondition::Private(private) => {
                query.push("event_private = ").push_bind(*private);
            }
        }
    }
}

/// Collision-resistant backend identifier (128 random bits, hex).
fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn generate_uid() -> String {
    Uuid::new_v4().to_string()
}

pub struct EventStore {
    pool: SqlitePool,
    services: Services,
    /// Calendar the single-calendar operations act on
    calendar: String,
    cache: HashMap<(String, String), Arc<Event>>,
}

impl EventStore {
    pub fn new(pool: SqlitePool, services: Services, calendar: impl Into<String>) -> Self {
        EventStore {
            pool,
            services,
            calendar: calendar.into(),
            cache: HashMap::new(),
        }
    }

    /// Switch to another calendar. The cache is kept.
    pub fn open(&mut self, calendar: impl Into<String>) {
        self.calendar = calendar.into();
    }

    pub fn calendar(&self) -> &str {
        &self.calendar
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    // LISTING:

    /// Events of the open calendar that occur within [start, end], as UID -> identifier.
    ///
    /// `start = None` leaves the window unbounded in the past.
    pub async fn list_events(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
        conditions: &[EventCondition],
    ) -> RescalResult<BTreeMap<String, String>> {
        let calendar = self.calendar.clone();
        self.list_in(&calendar, start, end, conditions).await
    }

    async fn list_in(
        &mut self,
        calendar: &str,
        start: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
        conditions: &[EventCondition],
    ) -> RescalResult<BTreeMap<String, String>> {
        let start_text = start.map(to_db_time);
        let end_text = to_db_time(end);

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM rescal_events WHERE calendar_id = ",
            EVENT_COLUMNS
        ));
        query.push_bind(calendar.to_string());

        for condition in conditions {
            query.push(" AND ");
            condition.push_to(&mut query);
        }

        // Single events overlapping the window
        query.push(" AND ((event_recurtype = 0");
        if let Some(start_text) = &start_text {
            query.push(" AND event_end >= ").push_bind(start_text.clone());
        }
        query.push(" AND event_start <= ").push_bind(end_text.clone());

        // Series that started by the end of the window and had not ended before it.
        // A count bounds the series ahead of any end date.
        query
            .push(") OR (event_recurtype <> 0 AND event_start <= ")
            .push_bind(end_text);
        if let Some(start_text) = start_text {
            query
                .push(
                    " AND (event_recurenddate IS NULL OR event_recurcount IS NOT NULL \
                     OR event_recurenddate >= ",
                )
                .push_bind(start_text)
                .push(")");
        }
        query.push("))");

        tracing::debug!(calendar, sql = query.sql(), "listing events");

        let rows: Vec<EventRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut events = BTreeMap::new();
        for mut row in rows {
            if row.event_uid.as_deref().is_none_or(str::is_empty) {
                let uid = generate_uid();
                self.backfill_uid(&row.calendar_id, &row.event_id, &uid).await;
                row.event_uid = Some(uid);
            }

            let event = self.cache_row(row).await?;
            if !occurs_within(&event, start, end) {
                continue;
            }
            if let (Some(uid), Some(id)) = (&event.uid, &event.id) {
                events.insert(uid.clone(), id.clone());
            }
        }

        Ok(events)
    }

    /// Persist a UID synthesized for a legacy row. Failure only costs the repair.
    async fn backfill_uid(&self, calendar: &str, id: &str, uid: &str) {
        let result =
            sqlx::query("UPDATE rescal_events SET event_uid = ? WHERE event_id = ? AND calendar_id = ?")
                .bind(uid)
                .bind(id)
                .bind(calendar)
                .execute(&self.pool)
                .await;

        match result {
            Ok(_) => tracing::debug!(calendar, event_id = id, uid, "backfilled event uid"),
            Err(e) => {
                tracing::warn!(calendar, event_id = id, error = %e, "failed to persist backfilled uid")
            }
        }
    }

    // LOOKUP:

    /// Fetch an event of the open calendar. No identifier yields a blank, unsaved event.
    pub async fn get_event(&mut self, id: Option<&str>) -> RescalResult<Arc<Event>> {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            return Ok(Arc::new(Event::blank(self.calendar.clone())));
        };

        let key = (self.calendar.clone(), id.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let sql = format!(
            "SELECT {} FROM rescal_events WHERE event_id = ? AND calendar_id = ?",
            EVENT_COLUMNS
        );
        tracing::debug!(calendar = %self.calendar, event_id = id, "fetching event");

        let row: Option<EventRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&self.calendar)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.cache_row(row).await,
            None => Err(RescalError::NotFound(format!(
                "Event '{}' in calendar '{}'",
                id, self.calendar
            ))),
        }
    }

    /// Identifier of the event with `uid` in `calendar`, if any.
    pub async fn exists(&self, uid: &str, calendar: &str) -> RescalResult<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(
            "SELECT event_id FROM rescal_events WHERE event_uid = ? AND calendar_id = ?",
        )
        .bind(uid)
        .bind(calendar)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// The most relevant copy of `uid`: one in a calendar the principal owns,
    /// else one the principal can read, else the first found.
    pub async fn get_by_uid(
        &mut self,
        uid: &str,
        calendars: Option<&[String]>,
    ) -> RescalResult<Arc<Event>> {
        let events = self.fetch_by_uid(uid, calendars).await?;
        let permissions = self.services.permissions.clone();

        let owned = permissions.owned_calendars().await?;
        if let Some(event) = events.iter().find(|e| owned.contains(&e.calendar)) {
            return Ok(event.clone());
        }

        let readable = permissions.readable_calendars().await?;
        if let Some(event) = events.iter().find(|e| readable.contains(&e.calendar)) {
            return Ok(event.clone());
        }

        events
            .into_iter()
            .next()
            .ok_or_else(|| RescalError::NotFound(uid.to_string()))
    }

    /// Every copy of `uid`, in scan order.
    pub async fn get_all_by_uid(
        &mut self,
        uid: &str,
        calendars: Option<&[String]>,
    ) -> RescalResult<Vec<Arc<Event>>> {
        self.fetch_by_uid(uid, calendars).await
    }

    async fn fetch_by_uid(
        &mut self,
        uid: &str,
        calendars: Option<&[String]>,
    ) -> RescalResult<Vec<Arc<Event>>> {
        if calendars.is_some_and(|c| c.is_empty()) {
            return Err(RescalError::Validation("No calendars to search".into()));
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM rescal_events WHERE event_uid = ",
            EVENT_COLUMNS
        ));
        query.push_bind(uid.to_string());

        if let Some(calendars) = calendars {
            query.push(" AND calendar_id IN (");
            let mut separated = query.separated(", ");
            for calendar in calendars {
                separated.push_bind(calendar.clone());
            }
            separated.push_unseparated(")");
        }

        tracing::debug!(uid, sql = query.sql(), "fetching events by uid");

        let rows: Vec<EventRow> = query.build_query_as().fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Err(RescalError::NotFound(uid.to_string()));
        }

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(self.cache_row(row).await?);
        }
        Ok(events)
    }

    /// Start of the next occurrence of an event of the open calendar on or after `after`.
    pub async fn next_recurrence(
        &mut self,
        id: &str,
        after: DateTime<Utc>,
    ) -> RescalResult<Option<DateTime<Utc>>> {
        let event = self.get_event(Some(id)).await?;
        match &event.recurrence {
            Some(recurrence) => recurrence.next_occurrence(event.start, after),
            None => Ok((event.start >= after).then_some(event.start)),
        }
    }

    /// Convert a row, keeping an instance already handed out for the same key.
    async fn cache_row(&mut self, row: EventRow) -> RescalResult<Arc<Event>> {
        let key = (row.calendar_id.clone(), row.event_id.clone());
        if let Some(cached) = self.cache.get(&key)
            && cached.uid.is_some()
        {
            return Ok(cached.clone());
        }

        let mut event = row.into_event()?;
        event.tags = self.load_tags(event.uid.as_deref()).await;

        let event = Arc::new(event);
        self.cache.insert(key, event.clone());
        Ok(event)
    }

    async fn load_tags(&self, uid: Option<&str>) -> Vec<String> {
        let Some(uid) = uid else {
            return Vec::new();
        };
        match self.services.tagger.tags(uid).await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(uid, error = %e, "failed to load tags");
                Vec::new()
            }
        }
    }

    // WRITES:

    /// Insert or update `event`, returning its identifier.
    ///
    /// New events get an identifier and UID when they have none. An unsaved
    /// event whose UID already exists in its calendar updates that row.
    pub async fn save_event(&mut self, event: &mut Event) -> RescalResult<String> {
        if event.calendar.is_empty() {
            event.calendar = self.calendar.clone();
        }
        event.validate()?;

        if !event.stored
            && let Some(uid) = event.uid.as_deref()
            && let Some(id) = self.exists(uid, &event.calendar).await?
        {
            event.id = Some(id);
            event.stored = true;
        }

        event.modified = Some(truncate_subsec(Utc::now()));

        let id = if event.stored {
            self.update_row(event).await?
        } else {
            self.insert_row(event).await?
        };

        self.cache
            .insert((event.calendar.clone(), id.clone()), Arc::new(event.clone()));
        Ok(id)
    }

    async fn update_row(&mut self, event: &mut Event) -> RescalResult<String> {
        let id = event
            .id
            .clone()
            .ok_or_else(|| RescalError::Validation("Stored event has no identifier".into()))?;

        let stored: Option<Option<String>> = sqlx::query_scalar(
            "SELECT event_uid FROM rescal_events WHERE event_id = ? AND calendar_id = ?",
        )
        .bind(&id)
        .bind(&event.calendar)
        .fetch_optional(&self.pool)
        .await?;
        let Some(stored) = stored else {
            return Err(RescalError::NotFound(format!(
                "Event '{}' in calendar '{}'",
                id, event.calendar
            )));
        };

        // A stored UID never changes; legacy rows without one get one now
        let given = event.uid.as_deref().filter(|uid| !uid.is_empty());
        let uid = match (stored.filter(|uid| !uid.is_empty()), given) {
            (Some(stored), Some(given)) if stored != given => {
                return Err(RescalError::Validation(format!(
                    "Event '{}' already has UID '{}'",
                    id, stored
                )));
            }
            (Some(stored), _) => stored,
            (None, Some(given)) => given.to_string(),
            (None, None) => generate_uid(),
        };
        event.uid = Some(uid.clone());

        let assignments: Vec<String> = PROPERTY_COLUMNS
            .iter()
            .map(|column| format!("{} = ?", column))
            .collect();
        let sql = format!(
            "UPDATE rescal_events SET event_uid = ?, {} WHERE event_id = ? AND calendar_id = ?",
            assignments.join(", ")
        );
        tracing::debug!(calendar = %event.calendar, event_id = %id, "updating event");

        let query = sqlx::query(&sql).bind(uid.clone());
        let result = EventProperties::from_event(event)?
            .bind(query)
            .bind(id.clone())
            .bind(event.calendar.clone())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RescalError::NotFound(format!(
                "Event '{}' in calendar '{}'",
                id, event.calendar
            )));
        }

        self.log_history(&event.calendar, &uid, HistoryAction::Modify).await;
        if let Err(e) = self.services.tagger.replace_tags(&uid, &event.tags).await {
            tracing::warn!(uid, error = %e, "failed to replace tags");
        }
        self.send_notification(event, NotificationAction::Edit).await;

        Ok(id)
    }

    async fn insert_row(&mut self, event: &mut Event) -> RescalResult<String> {
        if event.id.as_deref().is_none_or(str::is_empty) {
            event.id = Some(generate_id());
        }
        if event.uid.as_deref().is_none_or(str::is_empty) {
            event.uid = Some(generate_uid());
        }
        let id = event.id.clone().unwrap_or_default();
        let uid = event.uid.clone().unwrap_or_default();

        let placeholders = vec!["?"; PROPERTY_COLUMNS.len()].join(", ");
        let sql = format!(
            "INSERT INTO rescal_events (event_id, event_uid, {}, calendar_id) VALUES (?, ?, {}, ?)",
            PROPERTY_COLUMNS.join(", "),
            placeholders
        );
        tracing::debug!(calendar = %event.calendar, event_id = %id, uid, "inserting event");

        let query = sqlx::query(&sql).bind(id.clone()).bind(uid.clone());
        EventProperties::from_event(event)?
            .bind(query)
            .bind(event.calendar.clone())
            .execute(&self.pool)
            .await?;
        event.stored = true;

        self.log_history(&event.calendar, &uid, HistoryAction::Add).await;
        if let Err(e) = self.services.tagger.tag(&uid, &event.tags).await {
            tracing::warn!(uid, error = %e, "failed to tag event");
        }
        self.send_notification(event, NotificationAction::Add).await;

        Ok(id)
    }

    /// Delete an event of the open calendar.
    ///
    /// When the open calendar backs a resource, every other copy of the event
    /// first loses its reference to that resource.
    pub async fn delete_event(&mut self, id: &str, silent: bool) -> RescalResult<()> {
        let target = self.get_event(Some(id)).await?;
        let calendar = target.calendar.clone();

        if let Some(uid) = target.uid.as_deref() {
            let resources = ResourceStore::new(self.pool.clone());
            match resources.resource_id_by_calendar(&calendar).await {
                Ok(resource_id) => {
                    self.detach_resource(uid, resource_id, &calendar, id).await?
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(calendar, event_id = id, "deleting event");
        sqlx::query("DELETE FROM rescal_events WHERE event_id = ? AND calendar_id = ?")
            .bind(id)
            .bind(&calendar)
            .execute(&self.pool)
            .await?;
        self.cache.remove(&(calendar.clone(), id.to_string()));

        if let Some(uid) = target.uid.as_deref() {
            self.log_history(&calendar, uid, HistoryAction::Delete).await;
        }
        if !silent {
            self.send_notification(&target, NotificationAction::Delete).await;
        }

        Ok(())
    }

    /// Drop `resource_id` from every copy of `uid` except the one being deleted.
    async fn detach_resource(
        &mut self,
        uid: &str,
        resource_id: i64,
        calendar: &str,
        id: &str,
    ) -> RescalResult<()> {
        let copies = match self.fetch_by_uid(uid, None).await {
            Ok(copies) => copies,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        for copy in copies {
            if copy.calendar == calendar && copy.id.as_deref() == Some(id) {
                continue;
            }
            if !copy.has_resource(resource_id) {
                continue;
            }

            let mut updated = Event::clone(&copy);
            updated.remove_resource(resource_id);
            tracing::debug!(
                uid,
                resource_id,
                calendar = %updated.calendar,
                "detaching resource from event copy"
            );
            self.save_event(&mut updated).await?;
        }

        Ok(())
    }

    /// Book `resource` for `event`.
    ///
    /// The event records the resource and is saved; a copy with the same UID
    /// is saved into the resource's calendar. Groups book their first member
    /// that is free for the event's interval. Returns the booked resource id.
    pub async fn attach_resource(
        &mut self,
        event: &mut Event,
        resource: &Resource,
    ) -> RescalResult<i64> {
        let target = match &resource.kind {
            ResourceKind::Single => resource.clone(),
            ResourceKind::Group { members } => self.free_member(members, event).await?,
        };
        let resource_id = target
            .id
            .ok_or_else(|| RescalError::Validation(format!("Resource '{}' is not saved", target.name)))?;

        event.add_resource(resource_id);
        self.save_event(event).await?;

        let uid = event
            .uid
            .clone()
            .ok_or_else(|| RescalError::Validation("Saved event has no UID".into()))?;

        let mut copy = event.clone();
        copy.calendar = target.calendar.clone();
        copy.id = self.exists(&uid, &target.calendar).await?;
        copy.stored = copy.id.is_some();
        self.save_event(&mut copy).await?;

        Ok(resource_id)
    }

    async fn free_member(&mut self, members: &[i64], event: &Event) -> RescalResult<Resource> {
        let resources = ResourceStore::new(self.pool.clone());

        // Back-to-back bookings do not conflict
        let (start, end) = if event.duration() > Duration::seconds(2) {
            (event.start + Duration::seconds(1), event.end - Duration::seconds(1))
        } else {
            (event.start, event.end)
        };

        for member_id in members {
            let member = resources.get_resource(*member_id).await?;
            if member.is_group() {
                continue;
            }

            let busy = self.list_in(&member.calendar, Some(start), end, &[]).await?;
            let conflict = busy
                .keys()
                .any(|uid| Some(uid.as_str()) != event.uid.as_deref());
            if !conflict {
                return Ok(member);
            }
        }

        Err(RescalError::Validation(
            "No member of the resource group is free at that time".into(),
        ))
    }

    // SIDE EFFECTS:

    async fn log_history(&self, calendar: &str, uid: &str, action: HistoryAction) {
        let key = history_key(calendar, uid);
        if let Err(e) = self.services.history.log(&key, action).await {
            tracing::warn!(object = %key, %action, error = %e, "failed to log history");
        }
    }

    async fn send_notification(&self, event: &Event, action: NotificationAction) {
        if let Err(e) = self.services.notifier.notify(event, action).await {
            tracing::warn!(
                calendar = %event.calendar,
                uid = event.uid.as_deref().unwrap_or_default(),
                %action,
                error = %e,
                "failed to send notification"
            );
        }
    }
}

/// Whether an event (already known to overlap the window by its stored
/// columns) really occurs within it.
fn occurs_within(event: &Event, start: Option<DateTime<Utc>>, end: DateTime<Utc>) -> bool {
    let Some(recurrence) = &event.recurrence else {
        return true;
    };

    match recurrence.next_occurrence(event.start, start.unwrap_or(event.start)) {
        Ok(next) => next.is_some_and(|next| next <= end),
        Err(e) => {
            tracing::warn!(
                calendar = %event.calendar,
                uid = event.uid.as_deref().unwrap_or_default(),
                error = %e,
                "skipping event with unusable recurrence"
            );
            false
        }
    }
}
