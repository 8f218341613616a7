//! Collaborators the stores depend on.
//!
//! History, tagging, notification and permission lookups live outside the
//! stores and are injected through [`Services`]. SQL-backed defaults are
//! provided for the bundled binaries.

mod history;
mod notifier;
mod permissions;
mod tagger;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::RescalResult;
use crate::event::Event;

pub use history::SqlHistory;
pub use notifier::LogNotifier;
pub use permissions::{CalendarInfo, SqlPermissions};
pub use tagger::SqlTagger;

/// Namespace prefix of history object ids.
pub const HISTORY_NAMESPACE: &str = "rescal";

/// History object id for an event copy: `rescal:<calendar>:<uid>`.
pub fn history_key(calendar: &str, uid: &str) -> String {
    format!("{}:{}:{}", HISTORY_NAMESPACE, calendar, uid)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Add,
    Modify,
    Delete,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            HistoryAction::Add => "add",
            HistoryAction::Modify => "modify",
            HistoryAction::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Add,
    Edit,
    Delete,
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            NotificationAction::Add => "add",
            NotificationAction::Edit => "edit",
            NotificationAction::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Audit log of changes.
#[async_trait]
pub trait History: Send + Sync {
    async fn log(&self, object_id: &str, action: HistoryAction) -> RescalResult<()>;
}

/// Tags, keyed by event UID.
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag(&self, uid: &str, tags: &[String]) -> RescalResult<()>;

    /// Replace the whole tag set of `uid`.
    async fn replace_tags(&self, uid: &str, tags: &[String]) -> RescalResult<()>;

    async fn tags(&self, uid: &str) -> RescalResult<Vec<String>>;
}

/// Tells interested users about event changes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event, action: NotificationAction) -> RescalResult<()>;
}

/// Calendar access of the current principal.
#[async_trait]
pub trait Permissions: Send + Sync {
    fn principal(&self) -> &str;

    async fn owned_calendars(&self) -> RescalResult<HashSet<String>>;

    async fn readable_calendars(&self) -> RescalResult<HashSet<String>>;
}

/// Collaborator bundle handed to the stores.
#[derive(Clone)]
pub struct Services {
    pub history: Arc<dyn History>,
    pub tagger: Arc<dyn Tagger>,
    pub notifier: Arc<dyn Notifier>,
    pub permissions: Arc<dyn Permissions>,
}

impl Services {
    /// Default services backed by the rescal database, acting as `principal`.
    pub fn sql(pool: &SqlitePool, principal: &str) -> Self {
        Services {
            history: Arc::new(SqlHistory::new(pool.clone(), principal)),
            tagger: Arc::new(SqlTagger::new(pool.clone())),
            notifier: Arc::new(LogNotifier),
            permissions: Arc::new(SqlPermissions::new(pool.clone(), principal)),
        }
    }
}
