//! Request-time gates for booking endpoints.
//!
//! Handlers call these at the top, in order: open-time gate, then admission
//! gate. Both operate on the extracted caller identity and the event id the
//! request names; neither has side effects beyond cache population.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::admission::AdmissionQueue;

/// Cache of authoritative event open times. Concurrent misses may reload and
/// repopulate redundantly; the value is immutable so that is benign.
pub struct OpenTimeCache {
    ttl: Duration,
    inner: Mutex<HashMap<Uuid, (DateTime<Utc>, Instant)>>,
}

impl OpenTimeCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, inner: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, event_id: Uuid) -> Option<DateTime<Utc>> {
        let cache = self.inner.lock().unwrap();
        cache
            .get(&event_id)
            .filter(|(_, cached_at)| cached_at.elapsed() < self.ttl)
            .map(|(open_at, _)| *open_at)
    }

    pub fn put(&self, event_id: Uuid, open_at: DateTime<Utc>) {
        let mut cache = self.inner.lock().unwrap();
        cache.insert(event_id, (open_at, Instant::now()));
    }
}

fn check_open(now: DateTime<Utc>, open_at: DateTime<Utc>, trace_id: Option<Uuid>) -> ApiResult<()> {
    if now < open_at {
        return Err(ApiError::NotYetOpen { open_at, trace_id });
    }
    Ok(())
}

/// Open-time gate: passes once wall-clock now has reached the event's open
/// instant. The open time is read through the cache, falling back to the
/// events row (missing event fails NotFound).
pub async fn require_open(
    db: &PgPool,
    cache: &OpenTimeCache,
    event_id: Uuid,
    trace_id: Option<Uuid>,
) -> ApiResult<()> {
    let open_at = match cache.get(event_id) {
        Some(open_at) => open_at,
        None => {
            let open_at = sqlx::query_scalar::<_, DateTime<Utc>>(
                "SELECT open_at FROM events WHERE id = $1",
            )
            .bind(event_id)
            .fetch_optional(db)
            .await
            .map_err(|err| ApiError::internal(err, trace_id))?
            .ok_or(ApiError::NotFound { code: "event_not_found", trace_id })?;
            cache.put(event_id, open_at);
            open_at
        }
    };
    check_open(Utc::now(), open_at, trace_id)
}

/// Admission gate: the caller must hold an unexpired active lease for the
/// event. There is no renewal path; a rejected caller re-enters the queue.
pub fn require_admission(
    admission: &AdmissionQueue,
    event_id: Uuid,
    user_id: Uuid,
    trace_id: Option<Uuid>,
) -> ApiResult<()> {
    if !admission.has_active_lease(event_id, user_id) {
        return Err(ApiError::Unauthorized {
            code: "admission_expired",
            trace_id,
            message: Some("Admission lease expired or invalid; re-enter the queue".into()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn check_open_blocks_before_open_instant() {
        let open_at = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let before = open_at - chrono::Duration::seconds(1);
        let err = check_open(before, open_at, None).unwrap_err();
        match err {
            ApiError::NotYetOpen { open_at: reported, .. } => assert_eq!(reported, open_at),
            other => panic!("expected NotYetOpen, got {other:?}"),
        }
    }

    #[test]
    fn check_open_passes_at_and_after_open_instant() {
        let open_at = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        assert!(check_open(open_at, open_at, None).is_ok());
        assert!(check_open(open_at + chrono::Duration::hours(1), open_at, None).is_ok());
    }

    #[test]
    fn open_time_cache_expires_entries() {
        let cache = OpenTimeCache::new(Duration::from_millis(20));
        let event = Uuid::new_v4();
        let open_at = Utc::now();
        cache.put(event, open_at);
        assert_eq!(cache.get(event), Some(open_at));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(event), None);
    }

    #[test]
    fn admission_gate_requires_a_lease() {
        let admission = AdmissionQueue::new(Duration::from_secs(300));
        let (event, user) = (Uuid::new_v4(), Uuid::new_v4());

        let err = require_admission(&admission, event, user, None).unwrap_err();
        match err {
            ApiError::Unauthorized { code, .. } => assert_eq!(code, "admission_expired"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }

        admission.enter(event, user);
        assert!(require_admission(&admission, event, user, None).is_err());

        admission.promote_batch(event, 1);
        assert!(require_admission(&admission, event, user, None).is_ok());
    }
}
