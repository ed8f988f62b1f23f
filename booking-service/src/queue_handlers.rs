use axum::extract::{Query, State};
use axum::Json;
use common_auth::CallerIdentityExtractor;
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admission::RankInfo;
use crate::gates;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub event_id: Option<Uuid>,
}

fn required_event_id(event_id: Option<Uuid>, trace_id: Option<Uuid>) -> Result<Uuid, ApiError> {
    event_id.ok_or(ApiError::BadRequest {
        code: "missing_event_id",
        trace_id,
        message: Some("event_id is required".into()),
    })
}

/// Join the event's wait queue. A member that is already waiting moves to the
/// back of the line.
pub async fn enter_queue(
    State(state): State<AppState>,
    CallerIdentityExtractor(caller): CallerIdentityExtractor,
    Json(payload): Json<QueueRequest>,
) -> Result<Json<RankInfo>, ApiError> {
    let event_id = required_event_id(payload.event_id, caller.trace_id)?;
    gates::require_open(&state.db, &state.open_cache, event_id, caller.trace_id).await?;

    let info = state.admission.enter(event_id, caller.user_id);
    tracing::debug!(event_id = %event_id, user_id = %caller.user_id, rank = info.rank, "entered wait queue");
    Ok(Json(info))
}

/// Remove the caller's wait entry and active lease. The two deletions are
/// independent mutations; leftovers from a crash in between self-heal (the
/// wait entry is re-promoted or re-left, the lease expires by TTL).
pub async fn leave_queue(
    State(state): State<AppState>,
    CallerIdentityExtractor(caller): CallerIdentityExtractor,
    Json(payload): Json<QueueRequest>,
) -> Result<Json<LeaveResponse>, ApiError> {
    let event_id = required_event_id(payload.event_id, caller.trace_id)?;
    state.admission.leave(event_id, caller.user_id);
    Ok(Json(LeaveResponse { message: "left queue" }))
}

pub async fn queue_status(
    State(state): State<AppState>,
    CallerIdentityExtractor(caller): CallerIdentityExtractor,
    Query(query): Query<StatusQuery>,
) -> Result<Json<RankInfo>, ApiError> {
    let event_id = required_event_id(query.event_id, caller.trace_id)?;
    Ok(Json(state.admission.rank(event_id, caller.user_id)))
}
