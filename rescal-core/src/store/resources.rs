//! Resource records.

use std::collections::BTreeMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::row::{RESOURCE_COLUMNS, ResourceRow, resource_members};
use crate::error::{RescalError, RescalResult};
use crate::resource::{Resource, ResourceFilter};

pub struct ResourceStore {
    pool: SqlitePool,
}

impl ResourceStore {
    pub fn new(pool: SqlitePool) -> Self {
        ResourceStore { pool }
    }

    /// Insert or update `resource`, returning its id.
    ///
    /// A resource without a calendar gets a fresh one on insert.
    pub async fn save(&self, resource: &mut Resource) -> RescalResult<i64> {
        if resource.name.trim().is_empty() {
            return Err(RescalError::Validation("Resource has no name".into()));
        }
        if resource.calendar.is_empty() {
            resource.calendar = Uuid::new_v4().simple().to_string();
        }
        let members = resource_members(resource)?;

        let result = match resource.id {
            Some(id) => {
                tracing::debug!(resource_id = id, name = %resource.name, "updating resource");
                sqlx::query(
                    "UPDATE rescal_resources SET resource_name = ?, resource_calendar = ?, \
                     resource_category = ?, resource_description = ?, resource_response_type = ?, \
                     resource_type = ?, resource_members = ? WHERE resource_id = ?",
                )
                .bind(&resource.name)
                .bind(&resource.calendar)
                .bind(&resource.category)
                .bind(&resource.description)
                .bind(resource.response_type.code())
                .bind(resource.kind.discriminator())
                .bind(members)
                .bind(id)
                .execute(&self.pool)
                .await
            }
            None => {
                tracing::debug!(name = %resource.name, calendar = %resource.calendar, "inserting resource");
                sqlx::query(
                    "INSERT INTO rescal_resources (resource_name, resource_calendar, \
                     resource_category, resource_description, resource_response_type, \
                     resource_type, resource_members) VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&resource.name)
                .bind(&resource.calendar)
                .bind(&resource.category)
                .bind(&resource.description)
                .bind(resource.response_type.code())
                .bind(resource.kind.discriminator())
                .bind(members)
                .execute(&self.pool)
                .await
            }
        };

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(RescalError::Validation(format!(
                    "Calendar '{}' already backs another resource",
                    resource.calendar
                )));
            }
            Err(e) => return Err(e.into()),
        };

        match resource.id {
            Some(id) if result.rows_affected() == 0 => {
                Err(RescalError::NotFound(format!("Resource {}", id)))
            }
            Some(id) => Ok(id),
            None => {
                let id = result.last_insert_rowid();
                resource.id = Some(id);
                Ok(id)
            }
        }
    }

    pub async fn get_resource(&self, id: i64) -> RescalResult<Resource> {
        let sql = format!(
            "SELECT {} FROM rescal_resources WHERE resource_id = ?",
            RESOURCE_COLUMNS
        );
        let row: Option<ResourceRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RescalError::NotFound(format!("Resource {}", id)))?
            .into_resource()
    }

    /// Id of the resource backed by `calendar`.
    pub async fn resource_id_by_calendar(&self, calendar: &str) -> RescalResult<i64> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT resource_id FROM rescal_resources WHERE resource_calendar = ?")
                .bind(calendar)
                .fetch_optional(&self.pool)
                .await?;

        id.ok_or_else(|| RescalError::NotFound(format!("No resource for calendar '{}'", calendar)))
    }

    /// Resources matching every clause of `filter`, keyed by id.
    pub async fn list_resources(
        &self,
        filter: &ResourceFilter,
    ) -> RescalResult<BTreeMap<i64, Resource>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM rescal_resources", RESOURCE_COLUMNS));

        for (i, (field, value)) in filter.clauses().iter().enumerate() {
            query.push(if i == 0 { " WHERE " } else { " AND " });
            query.push(field.column()).push(" = ").push_bind(value.clone());
        }

        tracing::debug!(sql = query.sql(), "listing resources");

        let rows: Vec<ResourceRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| row.into_resource().map(|r| (r.id.unwrap_or_default(), r)))
            .collect()
    }

    /// Remove `resource` together with every event in its calendar.
    pub async fn delete(&self, resource: &Resource) -> RescalResult<()> {
        let id = resource
            .id
            .ok_or_else(|| RescalError::Validation("Resource has not been saved".into()))?;

        let mut tx = self.pool.begin().await?;

        let events = sqlx::query("DELETE FROM rescal_events WHERE calendar_id = ?")
            .bind(&resource.calendar)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM rescal_resources WHERE resource_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            resource_id = id,
            calendar = %resource.calendar,
            events = events.rows_affected(),
            "deleted resource"
        );
        Ok(())
    }
}
