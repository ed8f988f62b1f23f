use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub open_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct EventView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub open_at: DateTime<Utc>,
    pub total_seats: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ServerTime {
    pub server_time: DateTime<Utc>,
    pub timestamp_ms: i64,
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<Json<EventView>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest {
            code: "missing_title",
            trace_id: None,
            message: Some("title must not be empty".into()),
        });
    }

    let id = Uuid::new_v4();
    query("INSERT INTO events (id, title, description, open_at) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(payload.open_at)
        .execute(&state.db)
        .await
        .map_err(|err| ApiError::internal(err, None))?;

    let event = query_as::<_, EventView>(
        "SELECT id, title, description, open_at, total_seats, created_at FROM events WHERE id = $1",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::internal(err, None))?;

    tracing::info!(event_id = %id, open_at = %payload.open_at, "event created");
    Ok(Json(event))
}

pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let events = query_as::<_, EventView>(
        "SELECT id, title, description, open_at, total_seats, created_at FROM events ORDER BY open_at ASC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::internal(err, None))?;
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventView>, ApiError> {
    let event = query_as::<_, EventView>(
        "SELECT id, title, description, open_at, total_seats, created_at FROM events WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::internal(err, None))?;

    event
        .map(Json)
        .ok_or(ApiError::NotFound { code: "event_not_found", trace_id: None })
}

/// Clients sync their open-time countdown against this rather than local
/// clocks.
pub async fn server_time() -> Json<ServerTime> {
    let now = Utc::now();
    Json(ServerTime { server_time: now, timestamp_ms: now.timestamp_millis() })
}
