//! Calendar listing endpoint

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/calendars", get(list_calendars))
}

/// Calendar info returned by API
#[derive(Serialize)]
pub struct CalendarEntry {
    /// `internal|<id>`, as accepted by the AJAX actions
    pub cal: String,
    pub name: String,
    pub owner: String,
    pub owned: bool,
}

/// GET /calendars - List the calendars the principal can read
async fn list_calendars(
    State(state): State<AppState>,
) -> Result<Json<Vec<CalendarEntry>>, AppError> {
    let principal = state.principal().to_string();

    let calendars: Vec<CalendarEntry> = state
        .permissions()
        .calendars()
        .await?
        .into_iter()
        .map(|cal| CalendarEntry {
            cal: format!("internal|{}", cal.id),
            name: cal.name.unwrap_or_else(|| cal.id.clone()),
            owned: cal.owner == principal,
            owner: cal.owner,
        })
        .collect();

    Ok(Json(calendars))
}
