use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use common_auth::CallerIdentityExtractor;
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, Row};
use uuid::Uuid;

use crate::gates;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HoldSeatRequest {
    pub event_id: Option<Uuid>,
    pub seat_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HoldSeatResponse {
    pub message: &'static str,
    pub reservation_id: Uuid,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReservationView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub seat_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MyReservationRow {
    pub id: Uuid,
    pub seat_id: Uuid,
    pub seat_no: String,
    pub event_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
}

/// Grant the caller a provisional, time-bounded exclusive claim on one seat.
///
/// The seat row is locked for the duration of the transaction only; window
/// exclusivity afterwards rests on the HELD status plus expired_at, which
/// confirm checks and the sweeper reclaims.
pub async fn hold_seat(
    State(state): State<AppState>,
    CallerIdentityExtractor(caller): CallerIdentityExtractor,
    Json(payload): Json<HoldSeatRequest>,
) -> Result<Json<HoldSeatResponse>, ApiError> {
    let trace_id = caller.trace_id;
    let event_id = payload.event_id.ok_or(ApiError::BadRequest {
        code: "missing_event_id",
        trace_id,
        message: Some("event_id is required".into()),
    })?;

    gates::require_open(&state.db, &state.open_cache, event_id, trace_id).await?;
    gates::require_admission(&state.admission, event_id, caller.user_id, trace_id)?;

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|err| ApiError::internal(err, trace_id))?;

    let seat = query("SELECT status FROM seats WHERE id = $1 FOR UPDATE")
        .bind(payload.seat_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| ApiError::internal(err, trace_id))?;

    let Some(seat) = seat else {
        return Err(ApiError::NotFound { code: "seat_not_found", trace_id });
    };

    let status: String = seat.get("status");
    if status != "AVAILABLE" {
        return Err(ApiError::Conflict {
            code: "seat_already_selected",
            trace_id,
            message: Some("Seat is already selected".into()),
        });
    }

    let reservation_id = Uuid::new_v4();
    let expired_at = Utc::now() + state.hold_ttl;

    query(
        "INSERT INTO reservations (id, user_id, seat_id, status, expired_at) VALUES ($1, $2, $3, 'PENDING', $4)",
    )
    .bind(reservation_id)
    .bind(caller.user_id)
    .bind(payload.seat_id)
    .bind(expired_at)
    .execute(&mut *tx)
    .await
    .map_err(|err| ApiError::internal(err, trace_id))?;

    query("UPDATE seats SET status = 'HELD' WHERE id = $1")
        .bind(payload.seat_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| ApiError::internal(err, trace_id))?;

    tx.commit().await.map_err(|err| ApiError::internal(err, trace_id))?;

    tracing::debug!(
        seat_id = %payload.seat_id,
        user_id = %caller.user_id,
        reservation_id = %reservation_id,
        "seat held"
    );

    Ok(Json(HoldSeatResponse {
        message: "Seat held; confirm before the hold expires",
        reservation_id,
        expired_at,
    }))
}

/// Finalize a pending hold into a permanent booking before its deadline.
pub async fn confirm_reservation(
    State(state): State<AppState>,
    CallerIdentityExtractor(caller): CallerIdentityExtractor,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationView>, ApiError> {
    let trace_id = caller.trace_id;

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|err| ApiError::internal(err, trace_id))?;

    let row = query(
        "SELECT id, user_id, seat_id, status, created_at, expired_at FROM reservations WHERE id = $1 FOR UPDATE",
    )
    .bind(reservation_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|err| ApiError::internal(err, trace_id))?;

    let Some(row) = row else {
        return Err(ApiError::NotFound { code: "reservation_not_found", trace_id });
    };

    let owner: Uuid = row.get("user_id");
    if owner != caller.user_id {
        return Err(ApiError::Forbidden {
            code: "not_your_reservation",
            trace_id,
            message: Some("Only the holder may confirm a reservation".into()),
        });
    }

    let status: String = row.get("status");
    if status == "CONFIRMED" {
        return Err(ApiError::bad_request("already_confirmed", trace_id));
    }

    let expired_at: Option<DateTime<Utc>> = row.get("expired_at");
    if let Some(expired_at) = expired_at {
        if Utc::now() > expired_at {
            return Err(ApiError::BadRequest {
                code: "hold_expired",
                trace_id,
                message: Some("Hold expired; reserve the seat again".into()),
            });
        }
    }

    let seat_id: Uuid = row.get("seat_id");

    // Lock the seat row as well before mutating the pair.
    query("SELECT id FROM seats WHERE id = $1 FOR UPDATE")
        .bind(seat_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| ApiError::internal(err, trace_id))?;

    query("UPDATE reservations SET status = 'CONFIRMED' WHERE id = $1")
        .bind(reservation_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| ApiError::internal(err, trace_id))?;

    query("UPDATE seats SET status = 'BOOKED' WHERE id = $1")
        .bind(seat_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| ApiError::internal(err, trace_id))?;

    tx.commit().await.map_err(|err| ApiError::internal(err, trace_id))?;

    tracing::info!(reservation_id = %reservation_id, seat_id = %seat_id, "reservation confirmed");

    Ok(Json(ReservationView {
        id: reservation_id,
        user_id: owner,
        seat_id,
        status: "CONFIRMED".into(),
        created_at: row.get("created_at"),
        expired_at,
    }))
}

pub async fn list_my_reservations(
    State(state): State<AppState>,
    CallerIdentityExtractor(caller): CallerIdentityExtractor,
) -> Result<Json<Vec<MyReservationRow>>, ApiError> {
    let rows = query_as::<_, MyReservationRow>(
        "SELECT r.id, r.seat_id, s.seat_no, s.event_id, r.status, r.created_at, r.expired_at \
         FROM reservations r JOIN seats s ON s.id = r.seat_id \
         WHERE r.user_id = $1 ORDER BY r.created_at DESC",
    )
    .bind(caller.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::internal(err, caller.trace_id))?;

    Ok(Json(rows))
}
