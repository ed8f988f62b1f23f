use axum::http::StatusCode;
use booking_service::{build_router, jobs};
use chrono::{Duration as ChronoDuration, Utc};
use tower::ServiceExt;
use uuid::Uuid;

mod test_utils;
use test_utils::{body_json, get_as, lazy_app_state, post_json};

#[tokio::test]
async fn fifo_promotion_across_one_tick() {
    let mut state = lazy_app_state();
    state.admission_batch_size = 2;
    let event = Uuid::new_v4();
    state.open_cache.put(event, Utc::now() - ChronoDuration::hours(1));
    let app = build_router(state.clone());

    let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for u in &users {
        let resp = app
            .clone()
            .oneshot(post_json("/queue/enter", *u, serde_json::json!({ "event_id": event })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let promoted = jobs::promote_admissions(&state);
    assert_eq!(promoted, 2);

    let status_uri = format!("/queue/status?event_id={event}");
    let first = body_json(app.clone().oneshot(get_as(&status_uri, users[0])).await.unwrap()).await;
    assert_eq!(first["status"], "ACTIVE");
    assert_eq!(first["rank"], 0);

    let second = body_json(app.clone().oneshot(get_as(&status_uri, users[1])).await.unwrap()).await;
    assert_eq!(second["status"], "ACTIVE");

    let third = body_json(app.clone().oneshot(get_as(&status_uri, users[2])).await.unwrap()).await;
    assert_eq!(third["status"], "WAITING");
    assert_eq!(third["rank"], 1);
}

#[tokio::test]
async fn reentering_moves_to_the_back_of_the_line() {
    let state = lazy_app_state();
    let event = Uuid::new_v4();
    state.open_cache.put(event, Utc::now() - ChronoDuration::hours(1));
    let app = build_router(state.clone());

    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    for u in [u1, u2] {
        app.clone()
            .oneshot(post_json("/queue/enter", u, serde_json::json!({ "event_id": event })))
            .await
            .unwrap();
    }

    // u1 re-enters and loses the front spot.
    let resp = app
        .clone()
        .oneshot(post_json("/queue/enter", u1, serde_json::json!({ "event_id": event })))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["status"], "WAITING");
    assert_eq!(body["rank"], 2);

    let status_uri = format!("/queue/status?event_id={event}");
    let front = body_json(app.clone().oneshot(get_as(&status_uri, u2)).await.unwrap()).await;
    assert_eq!(front["rank"], 1);
}

#[tokio::test]
async fn leave_is_idempotent_over_http() {
    let state = lazy_app_state();
    let event = Uuid::new_v4();
    state.open_cache.put(event, Utc::now() - ChronoDuration::hours(1));
    let app = build_router(state.clone());

    let user = Uuid::new_v4();
    app.clone()
        .oneshot(post_json("/queue/enter", user, serde_json::json!({ "event_id": event })))
        .await
        .unwrap();

    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(post_json("/queue/leave", user, serde_json::json!({ "event_id": event })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let status_uri = format!("/queue/status?event_id={event}");
    let body = body_json(app.clone().oneshot(get_as(&status_uri, user)).await.unwrap()).await;
    assert_eq!(body["status"], "NOT_IN_QUEUE");
    assert_eq!(body["rank"], -1);
}

#[tokio::test]
async fn enter_is_blocked_before_open_time() {
    let state = lazy_app_state();
    let event = Uuid::new_v4();
    let open_at = Utc::now() + ChronoDuration::hours(1);
    state.open_cache.put(event, open_at);
    let app = build_router(state.clone());

    let resp = app
        .oneshot(post_json("/queue/enter", Uuid::new_v4(), serde_json::json!({ "event_id": event })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "not_yet_open");

    let body = body_json(resp).await;
    assert_eq!(body["code"], "not_yet_open");
    assert_eq!(body["open_at"], serde_json::json!(open_at));
}

#[tokio::test]
async fn enter_requires_event_id() {
    let state = lazy_app_state();
    let app = build_router(state);

    let resp = app
        .oneshot(post_json("/queue/enter", Uuid::new_v4(), serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_event_id");
}

#[tokio::test]
async fn queue_status_requires_identity() {
    let state = lazy_app_state();
    let app = build_router(state);

    let req = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/queue/status?event_id={}", Uuid::new_v4()))
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_identity");
}
