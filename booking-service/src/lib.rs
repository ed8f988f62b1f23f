pub mod admission;
pub mod gates;
pub mod queue_handlers;
pub mod event_handlers;
pub mod seat_handlers;
pub mod reservation_handlers;
pub mod jobs;

pub use crate::admission::{AdmissionQueue, QueueState, RankInfo};
pub use crate::gates::OpenTimeCache;
pub use crate::seat_handlers::SeatCache;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::routing::{get, post};
use axum::{body::Body, middleware, Router};
use common_observability::BookingMetrics;
use prometheus::{Encoder, TextEncoder};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub const DEFAULT_ADMISSION_BATCH_SIZE: usize = 10;
pub const DEFAULT_ADMISSION_TICK_SECS: u64 = 1;
pub const DEFAULT_LEASE_TTL_SECS: u64 = 300;
pub const DEFAULT_HOLD_TTL_SECS: i64 = 120; // 2 minutes
pub const DEFAULT_EXPIRY_SWEEP_SECS: u64 = 60;
pub const DEFAULT_OPEN_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_SEAT_CACHE_TTL_SECS: u64 = 1;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub admission: Arc<AdmissionQueue>,
    pub open_cache: Arc<OpenTimeCache>,
    pub seat_cache: Arc<SeatCache>,
    pub hold_ttl: chrono::Duration,
    pub admission_batch_size: usize,
    pub admission_tick: Duration,
    pub reservation_expiry_sweep: Duration,
    pub metrics: Arc<BookingMetrics>,
}

impl AppState {
    /// State with default knobs; tests override fields as needed.
    pub fn with_defaults(db: PgPool) -> Self {
        Self {
            db,
            admission: Arc::new(AdmissionQueue::new(Duration::from_secs(DEFAULT_LEASE_TTL_SECS))),
            open_cache: Arc::new(OpenTimeCache::new(Duration::from_secs(DEFAULT_OPEN_CACHE_TTL_SECS))),
            seat_cache: Arc::new(SeatCache::new(Duration::from_secs(DEFAULT_SEAT_CACHE_TTL_SECS))),
            hold_ttl: chrono::Duration::seconds(DEFAULT_HOLD_TTL_SECS),
            admission_batch_size: DEFAULT_ADMISSION_BATCH_SIZE,
            admission_tick: Duration::from_secs(DEFAULT_ADMISSION_TICK_SECS),
            reservation_expiry_sweep: Duration::from_secs(DEFAULT_EXPIRY_SWEEP_SECS),
            metrics: Arc::new(BookingMetrics::new()),
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8_lossy(&buf).to_string(),
    )
}

async fn error_metrics_mw(
    State(metrics): State<Arc<BookingMetrics>>,
    req: axum::http::Request<Body>,
    next: middleware::Next,
) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics
            .http_errors_total
            .with_label_values(&["booking-service", code, status.as_str()])
            .inc();
    }
    resp
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins = [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:5173",
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-trace-id"),
        ]);

    let metrics = state.metrics.clone();
    Router::new()
        .route("/healthz", get(health))
        .route("/queue/enter", post(queue_handlers::enter_queue))
        .route("/queue/leave", post(queue_handlers::leave_queue))
        .route("/queue/status", get(queue_handlers::queue_status))
        .route("/events", post(event_handlers::create_event).get(event_handlers::list_events))
        .route("/events/time", get(event_handlers::server_time))
        .route("/events/:event_id", get(event_handlers::get_event))
        .route("/seats/bulk", post(seat_handlers::create_bulk_seats))
        .route("/seats/event/:event_id", get(seat_handlers::list_seats_by_event))
        .route(
            "/reservations",
            get(reservation_handlers::list_my_reservations),
        )
        .route("/reservations/hold", post(reservation_handlers::hold_seat))
        .route(
            "/reservations/:reservation_id/confirm",
            post(reservation_handlers::confirm_reservation),
        )
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .layer(middleware::from_fn_with_state(metrics, error_metrics_mw))
        .layer(cors)
}
