//! Shared state of one CLI invocation.

use anyhow::Result;
use rescal_core::SqlitePool;
use rescal_core::config::RescalConfig;
use rescal_core::db;
use rescal_core::services::{Services, SqlPermissions};
use rescal_core::store::{EventStore, ResourceStore};

pub struct Context {
    pub config: RescalConfig,
    pub pool: SqlitePool,
}

impl Context {
    pub async fn connect(config: RescalConfig) -> Result<Self> {
        let pool = db::connect(&config.database_url()).await?;
        Ok(Context { config, pool })
    }

    pub fn principal(&self) -> &str {
        &self.config.principal
    }

    pub fn permissions(&self) -> SqlPermissions {
        SqlPermissions::new(self.pool.clone(), self.principal())
    }

    /// Event store on `calendar`, or on the principal's own calendar.
    pub fn event_store(&self, calendar: Option<String>) -> EventStore {
        let calendar = calendar.unwrap_or_else(|| self.principal().to_string());
        EventStore::new(
            self.pool.clone(),
            Services::sql(&self.pool, self.principal()),
            calendar,
        )
    }

    pub fn resource_store(&self) -> ResourceStore {
        ResourceStore::new(self.pool.clone())
    }
}
