//! Periodic jobs: the admission scheduler and the hold-expiry sweeper.
//!
//! Each runs on its own timer, isolated from live traffic and from the
//! other; a failed tick is logged and skipped, never fatal. Both assume a
//! single active service instance (there is no leader election).

use sqlx::Row;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::AppState;

pub fn spawn_admission_scheduler(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(state.admission_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let start = std::time::Instant::now();
            let promoted = promote_admissions(&state);
            state
                .metrics
                .promote_duration_seconds
                .observe(start.elapsed().as_secs_f64());
            if promoted > 0 {
                tracing::debug!(promoted, "admission tick promoted waiting members");
            }
        }
    });
}

/// One scheduler tick: purge stale leases, then promote up to the batch size
/// from the front of every non-empty wait queue.
pub fn promote_admissions(state: &AppState) -> usize {
    let purged = state.admission.purge_expired_leases();
    if purged > 0 {
        tracing::debug!(purged, "dropped expired admission leases");
    }

    let mut total = 0;
    for event_id in state.admission.active_event_ids() {
        let promoted = state
            .admission
            .promote_batch(event_id, state.admission_batch_size);
        total += promoted.len();
        state
            .metrics
            .queue_depth
            .with_label_values(&[&event_id.to_string()])
            .set(state.admission.waiting_len(event_id) as i64);
    }
    if total > 0 {
        state.metrics.admissions_promoted.inc_by(total as u64);
    }
    total
}

pub fn spawn_expiry_sweeper(state: AppState) {
    tokio::spawn(async move {
        let sweep_interval = state.reservation_expiry_sweep;
        loop {
            tokio::time::sleep(sweep_interval).await;
            let start = std::time::Instant::now();
            match reap_expired_holds(&state).await {
                Ok(0) => {}
                Ok(reaped) => tracing::info!(reaped, "expired holds reclaimed"),
                Err(err) => tracing::error!(?err, "Reservation sweeper error"),
            }
            state
                .metrics
                .sweeper_duration_seconds
                .observe(start.elapsed().as_secs_f64());
        }
    });
}

/// One sweep: inside a single transaction, lock every PENDING reservation
/// past its deadline together with its seat, release the seats, and cancel
/// the reservations. The batch commits once; any error rolls the whole sweep
/// back and the next tick retries it.
pub async fn reap_expired_holds(state: &AppState) -> anyhow::Result<u64> {
    let mut tx = state.db.begin().await?;

    let rows = sqlx::query(
        "SELECT r.id, r.seat_id FROM reservations r \
         JOIN seats s ON s.id = r.seat_id \
         WHERE r.status = 'PENDING' AND r.expired_at < now() \
         FOR UPDATE OF r, s",
    )
    .fetch_all(&mut *tx)
    .await?;

    if rows.is_empty() {
        tx.commit().await?;
        return Ok(0);
    }

    for row in &rows {
        let reservation_id: Uuid = row.get("id");
        let seat_id: Uuid = row.get("seat_id");

        sqlx::query("UPDATE seats SET status = 'AVAILABLE' WHERE id = $1")
            .bind(seat_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE reservations SET status = 'CANCELLED' WHERE id = $1")
            .bind(reservation_id)
            .execute(&mut *tx)
            .await?;

        tracing::debug!(reservation_id = %reservation_id, seat_id = %seat_id, "expired hold released");
    }

    tx.commit().await?;

    let reaped = rows.len() as u64;
    state.metrics.reservations_expired.inc_by(reaped);
    Ok(reaped)
}
