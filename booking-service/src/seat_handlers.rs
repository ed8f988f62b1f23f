use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::Json;
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as};
use uuid::Uuid;

use crate::AppState;

/// Compact per-event seat listing, shaped for the seat-map poll loop.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SlimSeat {
    pub id: Uuid,
    #[serde(rename = "no")]
    pub seat_no: String,
    #[serde(rename = "st")]
    pub status: String,
}

/// Short-TTL cache over the seat listing; the map is polled hard while a
/// sale is open and staleness of a second is acceptable.
pub struct SeatCache {
    ttl: Duration,
    inner: Mutex<HashMap<Uuid, (Vec<SlimSeat>, Instant)>>,
}

impl SeatCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, inner: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, event_id: Uuid) -> Option<Vec<SlimSeat>> {
        let cache = self.inner.lock().unwrap();
        cache
            .get(&event_id)
            .filter(|(_, cached_at)| cached_at.elapsed() < self.ttl)
            .map(|(seats, _)| seats.clone())
    }

    pub fn put(&self, event_id: Uuid, seats: Vec<SlimSeat>) {
        let mut cache = self.inner.lock().unwrap();
        cache.insert(event_id, (seats, Instant::now()));
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBulkSeatsRequest {
    pub event_id: Uuid,
    pub row_count: i32,
    pub seats_per_row: i32,
}

#[derive(Debug, Serialize)]
pub struct CreateBulkSeatsResponse {
    pub created: i64,
}

pub async fn list_seats_by_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<SlimSeat>>, ApiError> {
    if let Some(seats) = state.seat_cache.get(event_id) {
        return Ok(Json(seats));
    }

    let seats = query_as::<_, SlimSeat>(
        "SELECT id, seat_no, status FROM seats WHERE event_id = $1 ORDER BY seat_no ASC",
    )
    .bind(event_id)
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::internal(err, None))?;

    state.seat_cache.put(event_id, seats.clone());
    Ok(Json(seats))
}

/// Seed an event's seat grid: rows A.. as letters, columns 1..seats_per_row.
pub async fn create_bulk_seats(
    State(state): State<AppState>,
    Json(payload): Json<CreateBulkSeatsRequest>,
) -> Result<Json<CreateBulkSeatsResponse>, ApiError> {
    if !(1..=26).contains(&payload.row_count) || !(1..=500).contains(&payload.seats_per_row) {
        return Err(ApiError::BadRequest {
            code: "invalid_seat_grid",
            trace_id: None,
            message: Some("row_count must be 1..=26 and seats_per_row 1..=500".into()),
        });
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|err| ApiError::internal(err, None))?;

    let event = query("SELECT id FROM events WHERE id = $1")
        .bind(payload.event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| ApiError::internal(err, None))?;
    if event.is_none() {
        return Err(ApiError::NotFound { code: "event_not_found", trace_id: None });
    }

    let mut created: i64 = 0;
    for row in 0..payload.row_count {
        let row_char = char::from(b'A' + row as u8);
        for col in 1..=payload.seats_per_row {
            query(
                "INSERT INTO seats (id, event_id, seat_no, status) VALUES ($1, $2, $3, 'AVAILABLE')",
            )
            .bind(Uuid::new_v4())
            .bind(payload.event_id)
            .bind(format!("{row_char}{col}"))
            .execute(&mut *tx)
            .await
            .map_err(|err| ApiError::internal(err, None))?;
            created += 1;
        }
    }

    query("UPDATE events SET total_seats = total_seats + $1, updated_at = now() WHERE id = $2")
        .bind(created)
        .bind(payload.event_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| ApiError::internal(err, None))?;

    tx.commit().await.map_err(|err| ApiError::internal(err, None))?;

    tracing::info!(event_id = %payload.event_id, created, "seat grid created");
    Ok(Json(CreateBulkSeatsResponse { created }))
}
