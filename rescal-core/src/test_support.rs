//! Recording collaborators for store tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::connect_in_memory;
use crate::error::{RescalError, RescalResult};
use crate::event::Event;
use crate::services::{
    History, HistoryAction, NotificationAction, Notifier, Permissions, Services, SqlPermissions,
    SqlTagger, Tagger,
};

#[derive(Default)]
pub struct RecordingHistory {
    pub entries: Mutex<Vec<(String, HistoryAction)>>,
}

#[async_trait]
impl History for RecordingHistory {
    async fn log(&self, object_id: &str, action: HistoryAction) -> RescalResult<()> {
        self.entries.lock().unwrap().push((object_id.to_string(), action));
        Ok(())
    }
}

impl RecordingHistory {
    pub fn actions(&self) -> Vec<(String, HistoryAction)> {
        self.entries.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, NotificationAction)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &Event, action: NotificationAction) -> RescalResult<()> {
        let key = format!("{}:{}", event.calendar, event.uid.as_deref().unwrap_or_default());
        self.sent.lock().unwrap().push((key, action));
        Ok(())
    }
}

impl RecordingNotifier {
    pub fn actions(&self) -> Vec<NotificationAction> {
        self.sent.lock().unwrap().iter().map(|(_, a)| *a).collect()
    }
}

/// Collaborators that always fail.
pub struct Broken;

#[async_trait]
impl History for Broken {
    async fn log(&self, _object_id: &str, _action: HistoryAction) -> RescalResult<()> {
        Err(RescalError::Config("history offline".into()))
    }
}

#[async_trait]
impl Tagger for Broken {
    async fn tag(&self, _uid: &str, _tags: &[String]) -> RescalResult<()> {
        Err(RescalError::Config("tagger offline".into()))
    }

    async fn replace_tags(&self, _uid: &str, _tags: &[String]) -> RescalResult<()> {
        Err(RescalError::Config("tagger offline".into()))
    }

    async fn tags(&self, _uid: &str) -> RescalResult<Vec<String>> {
        Err(RescalError::Config("tagger offline".into()))
    }
}

#[async_trait]
impl Notifier for Broken {
    async fn notify(&self, _event: &Event, _action: NotificationAction) -> RescalResult<()> {
        Err(RescalError::Notification("mail server unreachable".into()))
    }
}

#[async_trait]
impl Permissions for Broken {
    fn principal(&self) -> &str {
        "nobody"
    }

    async fn owned_calendars(&self) -> RescalResult<HashSet<String>> {
        Err(RescalError::Config("directory offline".into()))
    }

    async fn readable_calendars(&self) -> RescalResult<HashSet<String>> {
        Err(RescalError::Config("directory offline".into()))
    }
}

/// An in-memory database plus services acting as `principal`, with
/// history and notifications recorded for inspection.
pub struct Fixture {
    pub pool: SqlitePool,
    pub history: Arc<RecordingHistory>,
    pub notifier: Arc<RecordingNotifier>,
    pub services: Services,
}

impl Fixture {
    pub async fn new(principal: &str) -> Self {
        let pool = connect_in_memory().await.unwrap();
        let history = Arc::new(RecordingHistory::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services {
            history: history.clone(),
            tagger: Arc::new(SqlTagger::new(pool.clone())),
            notifier: notifier.clone(),
            permissions: Arc::new(SqlPermissions::new(pool.clone(), principal)),
        };
        Fixture {
            pool,
            history,
            notifier,
            services,
        }
    }

    pub fn permissions(&self, principal: &str) -> SqlPermissions {
        SqlPermissions::new(self.pool.clone(), principal)
    }
}
