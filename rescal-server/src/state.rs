use std::path::PathBuf;
use std::sync::Arc;

use rescal_core::SqlitePool;
use rescal_core::config::RescalConfig;
use rescal_core::services::{Services, SqlPermissions};
use rescal_core::store::EventStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    config: Arc<RescalConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: RescalConfig) -> Self {
        AppState {
            pool,
            config: Arc::new(config),
        }
    }

    pub fn principal(&self) -> &str {
        &self.config.principal
    }

    /// A fresh store per request; its cache lives as long as the request.
    pub fn event_store(&self, calendar: &str) -> EventStore {
        EventStore::new(
            self.pool.clone(),
            Services::sql(&self.pool, self.principal()),
            calendar,
        )
    }

    pub fn permissions(&self) -> SqlPermissions {
        SqlPermissions::new(self.pool.clone(), self.principal())
    }

    pub fn chunk_dir(&self) -> Option<PathBuf> {
        self.config.chunk_dir()
    }
}
