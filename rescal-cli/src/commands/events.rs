use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use owo_colors::OwoColorize;
use rescal_core::date_range::{DateRange, parse_date_end};
use rescal_core::event::{Event, EventStatus};
use rescal_core::recurrence::{Recurrence, RecurrenceKind};
use rescal_core::store::EventCondition;

use crate::context::Context;
use crate::render::{Render, render_details};

/// Arguments of `rescal events new`.
pub struct Draft {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub repeat: Option<String>,
    pub interval: Option<u32>,
    pub count: Option<u32>,
    pub until: Option<String>,
    pub tags: Vec<String>,
}

pub fn conditions(
    creator: Option<String>,
    status: Option<String>,
    title: Option<String>,
) -> Result<Vec<EventCondition>> {
    let mut conditions = Vec::new();
    if let Some(creator) = creator {
        conditions.push(EventCondition::Creator(creator));
    }
    if let Some(status) = status {
        conditions.push(EventCondition::Status(status.parse::<EventStatus>()?));
    }
    if let Some(title) = title {
        conditions.push(EventCondition::TitleContains(title));
    }
    Ok(conditions)
}

pub async fn list(
    ctx: &Context,
    calendar: Option<String>,
    range: DateRange,
    conditions: Vec<EventCondition>,
) -> Result<()> {
    let mut store = ctx.event_store(calendar);
    let listed = store.list_events(range.from, range.to, &conditions).await?;

    println!("{}", format!("📅 {}", store.calendar()).bold());

    if listed.is_empty() {
        println!("   {}", "No events".dimmed());
        return Ok(());
    }

    let mut events = Vec::with_capacity(listed.len());
    for id in listed.values() {
        events.push(store.get_event(Some(id)).await?);
    }
    events.sort_by_key(|event| event.start);

    for event in &events {
        println!("   {}", event.render());
    }

    Ok(())
}

pub async fn show(ctx: &Context, calendar: Option<String>, id: &str, json: bool) -> Result<()> {
    let mut store = ctx.event_store(calendar);
    let event = store.get_event(Some(id)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*event)?);
    } else {
        println!("{}", render_details(&event));
    }

    Ok(())
}

pub async fn find(
    ctx: &Context,
    uid: &str,
    all: bool,
    calendars: Option<Vec<String>>,
    json: bool,
) -> Result<()> {
    let mut store = ctx.event_store(None);

    let events = if all {
        store.get_all_by_uid(uid, calendars.as_deref()).await?
    } else {
        vec![store.get_by_uid(uid, calendars.as_deref()).await?]
    };

    for event in &events {
        if json {
            println!("{}", serde_json::to_string_pretty(&**event)?);
        } else {
            println!("{}", render_details(event));
        }
    }

    Ok(())
}

pub async fn new(ctx: &Context, calendar: Option<String>, draft: Draft) -> Result<()> {
    let (start, all_day) = parse_when(&draft.start)?;
    let end = match (&draft.end, &draft.duration) {
        (Some(end), _) => {
            let (end, end_all_day) = parse_when(end)?;
            // An all-day end names the last day of the event
            if end_all_day { end + Duration::days(1) } else { end }
        }
        (None, Some(duration)) => start + parse_duration(duration)?,
        (None, None) => default_end(start, all_day),
    };

    let mut store = ctx.event_store(calendar);
    let mut event = Event::new(store.calendar(), draft.title, start, end);
    event.all_day = all_day;
    event.location = draft.location.filter(|l| !l.is_empty());
    event.creator = Some(ctx.principal().to_string());
    event.tags = draft.tags;

    if let Some(repeat) = &draft.repeat {
        let mut recurrence = Recurrence::new(repeat.parse::<RecurrenceKind>()?)
            .with_interval(draft.interval.unwrap_or(1));
        if let Some(count) = draft.count {
            recurrence = recurrence.with_count(count);
        }
        if let Some(until) = &draft.until {
            recurrence = recurrence.with_until(parse_date_end(until)?);
        }
        event.recurrence = Some(recurrence);
    }

    let id = store.save_event(&mut event).await?;
    println!("{}", format!("  Created: {}", event.title).green());
    println!("  {}", format!("id {}  uid {}", id, event.uid.unwrap_or_default()).dimmed());

    Ok(())
}

pub async fn delete(ctx: &Context, calendar: Option<String>, id: &str, silent: bool) -> Result<()> {
    let mut store = ctx.event_store(calendar);
    let title = store.get_event(Some(id)).await?.title.clone();

    store.delete_event(id, silent).await?;
    println!("{}", format!("  Deleted: {}", title).red());

    Ok(())
}

/// Parse a start or end. Bare dates are all-day (returns true).
fn parse_when(input: &str) -> Result<(DateTime<Utc>, bool)> {
    let input = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok((date.and_time(NaiveTime::MIN).and_utc(), true));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok((dt.with_timezone(&Utc), false));
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Ok((dt.and_utc(), false));
        }
    }

    anyhow::bail!(
        "Could not parse date/time: \"{}\". Use YYYY-MM-DD or YYYY-MM-DDTHH:MM",
        input
    )
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_dur = humantime::parse_duration(input)
        .with_context(|| format!("Could not parse duration: \"{}\"", input))?;
    Duration::from_std(std_dur).context("Duration too large")
}

/// Default end time: +1 hour for timed events, +1 day for all-day events.
fn default_end(start: DateTime<Utc>, all_day: bool) -> DateTime<Utc> {
    if all_day {
        start + Duration::days(1)
    } else {
        start + Duration::hours(1)
    }
}
