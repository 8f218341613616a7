//! Terminal rendering for rescal types.
//!
//! Extension traits adding colored output with owo_colors.

use rescal_core::event::{Event, EventStatus};
use rescal_core::resource::{Resource, ResourceKind};
use rescal_core::services::CalendarInfo;
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

fn render_time(event: &Event) -> String {
    if event.all_day {
        let start = event.start.date_naive();
        let last = (event.end - chrono::Duration::seconds(1)).date_naive();
        if last > start {
            format!("{} - {}", start, last)
        } else {
            start.to_string()
        }
    } else if event.start.date_naive() == event.end.date_naive() {
        format!("{} - {}", event.start.format("%Y-%m-%d %H:%M"), event.end.format("%H:%M"))
    } else {
        format!(
            "{} - {}",
            event.start.format("%Y-%m-%d %H:%M"),
            event.end.format("%Y-%m-%d %H:%M")
        )
    }
}

impl Render for Event {
    fn render(&self) -> String {
        let title = if self.title.is_empty() { "(untitled)" } else { &self.title };
        let title = match self.status {
            EventStatus::Cancelled => title.strikethrough().to_string(),
            EventStatus::Tentative => title.italic().to_string(),
            _ => title.to_string(),
        };

        let mut line = format!("{} {}", title, render_time(self).dimmed());
        if let Some(recurrence) = &self.recurrence {
            line.push_str(&format!(" {}", format!("(repeats {:?})", recurrence.kind).cyan()));
        }
        if let Some(uid) = &self.uid {
            line.push_str(&format!(" {}", uid.dimmed()));
        }
        line
    }
}

/// Multi-line view of a single event.
pub fn render_details(event: &Event) -> String {
    let mut lines = vec![event.title.bold().to_string()];
    let mut field = |name: &str, value: String| {
        lines.push(format!("  {:<12}{}", format!("{}:", name).dimmed(), value));
    };

    field("When", render_time(event));
    field("Calendar", event.calendar.clone());
    field("Id", event.id.clone().unwrap_or_default());
    field("UID", event.uid.clone().unwrap_or_default());
    field("Status", format!("{:?}", event.status));
    if let Some(location) = &event.location {
        field("Where", location.clone());
    }
    if let Some(recurrence) = &event.recurrence {
        let mut rule = format!("{:?} every {}", recurrence.kind, recurrence.interval);
        if let Some(count) = recurrence.count {
            rule.push_str(&format!(", {} times", count));
        } else if let Some(until) = recurrence.until {
            rule.push_str(&format!(", until {}", until.date_naive()));
        }
        field("Repeats", rule);
    }
    if !event.resources.is_empty() {
        let ids: Vec<String> = event.resources.iter().map(|id| id.to_string()).collect();
        field("Resources", ids.join(", "));
    }
    if !event.tags.is_empty() {
        field("Tags", event.tags.join(", "));
    }
    if let Some(description) = &event.description {
        field("Notes", description.clone());
    }

    lines.join("\n")
}

impl Render for Resource {
    fn render(&self) -> String {
        let id = self.id.map(|id| format!("#{}", id)).unwrap_or_default();
        let kind = match &self.kind {
            ResourceKind::Single => String::new(),
            ResourceKind::Group { members } => {
                let ids: Vec<String> = members.iter().map(|m| format!("#{}", m)).collect();
                format!(" group of {}", ids.join(", "))
            }
        };
        let category = self
            .category
            .as_ref()
            .map(|c| format!(" [{}]", c))
            .unwrap_or_default();

        format!(
            "{} {}{}{} {}",
            id.dimmed(),
            self.name.bold(),
            category.cyan(),
            kind.yellow(),
            self.calendar.dimmed()
        )
    }
}

pub trait CalendarRender {
    fn render_for(&self, owned: bool) -> String;
}

impl CalendarRender for CalendarInfo {
    fn render_for(&self, owned: bool) -> String {
        let name = self.name.as_deref().unwrap_or(&self.id);
        if owned {
            format!("{} {}", name.bold(), self.id.dimmed())
        } else {
            format!("{} {} {}", name, self.id.dimmed(), format!("(shared by {})", self.owner).dimmed())
        }
    }
}
