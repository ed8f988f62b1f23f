use common_http_errors::ApiError;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

#[test]
fn bad_request_variant() {
    let err = ApiError::BadRequest { code: "missing_event_id", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_event_id");
}

#[test]
fn unauthorized_variant() {
    let err = ApiError::Unauthorized { code: "admission_expired", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "admission_expired");
}

#[test]
fn forbidden_variant() {
    let err = ApiError::Forbidden { code: "not_your_reservation", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "not_your_reservation");
}

#[test]
fn conflict_variant() {
    let err = ApiError::Conflict { code: "seat_already_selected", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "seat_already_selected");
}

#[test]
fn not_found_variant() {
    let err = ApiError::NotFound { code: "seat_not_found", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "seat_not_found");
}

#[test]
fn internal_variant() {
    let trace = Some(Uuid::new_v4());
    let err = ApiError::Internal { trace_id: trace, message: Some("boom".into()) };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "internal_error");
}

#[tokio::test]
async fn not_yet_open_carries_open_at() {
    let open_at = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
    let err = ApiError::NotYetOpen { open_at, trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "not_yet_open");

    let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "not_yet_open");
    assert_eq!(body["open_at"], serde_json::json!(open_at));
}
