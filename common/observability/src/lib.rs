use prometheus::{Histogram, IntCounter, IntCounterVec, IntGaugeVec, Registry};

#[derive(Clone)]
pub struct BookingMetrics {
    pub registry: Registry,
    pub admissions_promoted: IntCounter,
    pub reservations_expired: IntCounter,
    pub queue_depth: IntGaugeVec,
    pub promote_duration_seconds: Histogram,
    pub sweeper_duration_seconds: Histogram,
    pub http_errors_total: IntCounterVec,
}

impl BookingMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let admissions_promoted = IntCounter::new(
            "admissions_promoted_total",
            "Wait-queue members promoted to an active admission lease",
        ).unwrap();
        let reservations_expired = IntCounter::new(
            "reservations_expired_total",
            "Expired seat holds reclaimed by the sweeper",
        ).unwrap();
        let queue_depth = IntGaugeVec::new(
            prometheus::Opts::new(
                "admission_queue_depth",
                "Waiting members per event at the last scheduler tick",
            ),
            &["event_id"],
        ).unwrap();
        let promote_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "admission_promote_duration_seconds",
                "Duration of one admission scheduler tick",
            ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5]),
        ).unwrap();
        let sweeper_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "reservation_sweeper_duration_seconds",
                "Duration of a reservation expiration sweep",
            ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        ).unwrap();
        let http_errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)",
            ),
            &["service", "code", "status"],
        ).unwrap();
        let _ = registry.register(Box::new(admissions_promoted.clone()));
        let _ = registry.register(Box::new(reservations_expired.clone()));
        let _ = registry.register(Box::new(queue_depth.clone()));
        let _ = registry.register(Box::new(promote_duration_seconds.clone()));
        let _ = registry.register(Box::new(sweeper_duration_seconds.clone()));
        let _ = registry.register(Box::new(http_errors_total.clone()));
        BookingMetrics {
            registry,
            admissions_promoted,
            reservations_expired,
            queue_depth,
            promote_duration_seconds,
            sweeper_duration_seconds,
            http_errors_total,
        }
    }
}

impl Default for BookingMetrics {
    fn default() -> Self { Self::new() }
}
