//! AJAX action dispatch for the calendar web UI.
//!
//! Every action answers `{"response": <value>, "msgs": [...]}`. Failures never
//! surface as HTTP errors; they become messages next to a fallback response.

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    routing::get,
};
use rescal_core::date_range::{DateRange, parse_date_end, parse_date_start};
use rescal_core::event::Event;
use rescal_core::store::EventStore;
use rescal_core::{RescalError, RescalResult};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ajax/{action}", get(dispatch).post(dispatch))
}

/// Request variables shared by all actions.
#[derive(Debug, Default, Deserialize)]
pub struct AjaxParams {
    /// `<driver>|<calendar>`
    pub cal: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub view: Option<String>,
    pub id: Option<String>,
    /// JSON object of attributes to change
    pub att: Option<String>,
    pub chunk: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AjaxResponse {
    pub response: Value,
    pub msgs: Vec<Message>,
}

#[derive(Serialize)]
struct ListEventsResult {
    cal: String,
    view: Option<String>,
    sig: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    events: BTreeMap<String, String>,
}

const ERROR: &str = "rescal.error";

/// Text shown to the user for a failed action.
fn user_message(error: &RescalError) -> String {
    match error {
        RescalError::NotFound(_) => "The requested event was not found.".to_string(),
        RescalError::PermissionDenied(_) => "Permission Denied".to_string(),
        RescalError::Validation(msg) => msg.clone(),
        RescalError::Recurrence(_) | RescalError::Serialization(_) => error.to_string(),
        _ => {
            tracing::error!(error = %error, "ajax action failed");
            "An internal error occurred.".to_string()
        }
    }
}

/// GET|POST /ajax/{action}
async fn dispatch(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Form(params): Form<AjaxParams>,
) -> Json<AjaxResponse> {
    tracing::debug!(action, cal = params.cal.as_deref(), "ajax request");

    let (result, fallback) = match action.as_str() {
        "ListEvents" => (list_events(&state, &params).await, Value::Bool(true)),
        "GetEvent" => (get_event(&state, &params).await, Value::Bool(true)),
        "UpdateEvent" => (update_event(&state, &params).await, Value::Bool(false)),
        "SaveCalPref" => (Ok(Value::Bool(true)), Value::Bool(true)),
        "ChunkContent" => (chunk_content(&state, &params).await, Value::Bool(false)),
        other => {
            tracing::debug!(action = other, "unknown ajax action");
            (Ok(Value::Bool(false)), Value::Bool(false))
        }
    };

    let mut msgs = Vec::new();
    let response = match result {
        Ok(value) => value,
        Err(e) => {
            msgs.push(Message {
                message: user_message(&e),
                kind: ERROR,
            });
            fallback
        }
    };

    Json(AjaxResponse { response, msgs })
}

/// Resolve `cal` to a store, checking read access for internal calendars.
async fn open_calendar(state: &AppState, cal: Option<&str>) -> RescalResult<EventStore> {
    let cal = cal
        .filter(|c| !c.is_empty())
        .ok_or_else(|| RescalError::Validation("No calendar given".into()))?;
    let (driver, calendar) = cal
        .split_once('|')
        .ok_or_else(|| RescalError::Validation(format!("Malformed calendar '{}'", cal)))?;

    match driver {
        "internal" => {
            let store = state.event_store(calendar);
            let readable = store.services().permissions.readable_calendars().await?;
            if !readable.contains(calendar) {
                return Err(RescalError::PermissionDenied(format!(
                    "{} cannot read '{}'",
                    state.principal(),
                    calendar
                )));
            }
            Ok(store)
        }
        "external" | "remote" | "holiday" => Err(RescalError::Validation(format!(
            "Calendars of type '{}' are not supported",
            driver
        ))),
        other => Err(RescalError::Validation(format!(
            "Unknown calendar type '{}'",
            other
        ))),
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> RescalResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RescalError::Validation(format!("Missing parameter '{}'", name)))
}

async fn list_events(state: &AppState, params: &AjaxParams) -> RescalResult<Value> {
    let range = DateRange {
        from: Some(parse_date_start(required(&params.start, "start")?)?),
        to: parse_date_end(required(&params.end, "end")?)?,
    };
    let cal = required(&params.cal, "cal")?;

    let mut store = open_calendar(state, Some(cal)).await?;
    let events = store.list_events(range.from, range.to, &[]).await?;

    let result = ListEventsResult {
        cal: cal.to_string(),
        view: params.view.clone(),
        sig: range.signature(),
        events,
    };
    Ok(serde_json::to_value(result)?)
}

async fn get_event(state: &AppState, params: &AjaxParams) -> RescalResult<Value> {
    let mut store = open_calendar(state, params.cal.as_deref()).await?;
    let id = required(&params.id, "id")?;

    let event = store.get_event(Some(id)).await?;
    Ok(json!({ "event": &*event }))
}

async fn update_event(state: &AppState, params: &AjaxParams) -> RescalResult<Value> {
    let mut store = open_calendar(state, params.cal.as_deref()).await?;
    let id = required(&params.id, "id")?;
    let mut event = Event::clone(&*store.get_event(Some(id)).await?);

    let attributes: serde_json::Map<String, Value> = match params.att.as_deref() {
        Some(att) if !att.is_empty() => serde_json::from_str(att)
            .map_err(|e| RescalError::Validation(format!("Invalid attributes: {}", e)))?,
        _ => serde_json::Map::new(),
    };

    for (attribute, value) in &attributes {
        match attribute.as_str() {
            "start_date" => {
                let date = value.as_str().ok_or_else(|| {
                    RescalError::Validation("start_date must be a string".into())
                })?;
                event.move_to_date(parse_date_start(date)?.date_naive());
            }
            other => tracing::debug!(attribute = other, "ignoring event attribute"),
        }
    }

    let id = store.save_event(&mut event).await?;
    Ok(Value::String(id))
}

async fn chunk_content(state: &AppState, params: &AjaxParams) -> RescalResult<Value> {
    // Only the final path component is honored
    let Some(name) = params
        .chunk
        .as_deref()
        .and_then(|c| FsPath::new(c).file_name())
        .and_then(|c| c.to_str())
        .filter(|c| !c.is_empty())
    else {
        return Ok(Value::Bool(false));
    };

    let dir = state
        .chunk_dir()
        .ok_or_else(|| RescalError::Config("No chunk directory configured".into()))?;

    match tokio::fs::read_to_string(dir.join(format!("{}.html", name))).await {
        Ok(chunk) => Ok(json!({ "chunk": chunk })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RescalError::Validation(
            format!("Unknown chunk '{}'", name),
        )),
        Err(e) => Err(e.into()),
    }
}
