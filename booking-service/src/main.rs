use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use sqlx::PgPool;
use tokio::net::TcpListener;

use booking_service::{
    build_router, jobs, AdmissionQueue, AppState, OpenTimeCache, SeatCache,
    DEFAULT_ADMISSION_BATCH_SIZE, DEFAULT_ADMISSION_TICK_SECS, DEFAULT_EXPIRY_SWEEP_SECS,
    DEFAULT_HOLD_TTL_SECS, DEFAULT_LEASE_TTL_SECS, DEFAULT_OPEN_CACHE_TTL_SECS,
    DEFAULT_SEAT_CACHE_TTL_SECS,
};
use common_observability::BookingMetrics;

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        env::var(name)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_pool = PgPool::connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let admission_batch_size = env::var("ADMISSION_BATCH_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_ADMISSION_BATCH_SIZE);
    let admission_tick = env_secs("ADMISSION_TICK_SECS", DEFAULT_ADMISSION_TICK_SECS);
    let lease_ttl = env_secs("ADMISSION_LEASE_TTL_SECS", DEFAULT_LEASE_TTL_SECS);
    let hold_ttl_secs = env::var("HOLD_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(DEFAULT_HOLD_TTL_SECS);
    let reservation_expiry_sweep =
        env_secs("RESERVATION_EXPIRY_SWEEP_SECS", DEFAULT_EXPIRY_SWEEP_SECS);
    let open_cache_ttl = env_secs("OPEN_TIME_CACHE_TTL_SECS", DEFAULT_OPEN_CACHE_TTL_SECS);
    let seat_cache_ttl = env_secs("SEAT_CACHE_TTL_SECS", DEFAULT_SEAT_CACHE_TTL_SECS);

    let state = AppState {
        db: db_pool,
        admission: Arc::new(AdmissionQueue::new(lease_ttl)),
        open_cache: Arc::new(OpenTimeCache::new(open_cache_ttl)),
        seat_cache: Arc::new(SeatCache::new(seat_cache_ttl)),
        hold_ttl: chrono::Duration::seconds(hold_ttl_secs),
        admission_batch_size,
        admission_tick,
        reservation_expiry_sweep,
        metrics: Arc::new(BookingMetrics::new()),
    };

    let app = build_router(state.clone());

    jobs::spawn_admission_scheduler(state.clone());
    jobs::spawn_expiry_sweeper(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8090);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));
    tracing::info!(%addr, "starting booking-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
