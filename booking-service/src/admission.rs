//! In-process admission store: per-event wait queues plus short-lived active
//! leases. This is the sole arbiter for admission order and lease validity.
//!
//! Wait entries are ordered by a monotonic key assigned at insertion;
//! re-entering assigns a fresh key, which moves the member to the back of the
//! line. Leases carry a fixed TTL and expire lazily; only the scheduler tick
//! creates them.
//!
//! All operations take one short, non-async critical section on the store
//! mutex. Running a single instance of the service, this gives the same
//! atomicity the original deployment bought from its key-value store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueState {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "WAITING")]
    Waiting,
    #[serde(rename = "NOT_IN_QUEUE")]
    NotInQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankInfo {
    pub status: QueueState,
    pub rank: i64,
}

impl RankInfo {
    fn active() -> Self { Self { status: QueueState::Active, rank: 0 } }
    fn waiting(position: usize) -> Self { Self { status: QueueState::Waiting, rank: position as i64 + 1 } }
    fn absent() -> Self { Self { status: QueueState::NotInQueue, rank: -1 } }
}

#[derive(Default)]
struct EventQueue {
    by_key: BTreeMap<u64, Uuid>,
    by_user: HashMap<Uuid, u64>,
}

impl EventQueue {
    fn position_of(&self, key: u64) -> usize {
        self.by_key.range(..key).count()
    }
}

struct AdmissionState {
    next_key: u64,
    waiting: HashMap<Uuid, EventQueue>,
    leases: HashMap<(Uuid, Uuid), Instant>,
}

pub struct AdmissionQueue {
    lease_ttl: Duration,
    inner: Mutex<AdmissionState>,
}

impl AdmissionQueue {
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            lease_ttl,
            inner: Mutex::new(AdmissionState {
                next_key: 0,
                waiting: HashMap::new(),
                leases: HashMap::new(),
            }),
        }
    }

    /// Insert or re-insert a member into an event's wait queue. A member that
    /// is already waiting gets a fresh order key and moves to the back.
    pub fn enter(&self, event_id: Uuid, user_id: Uuid) -> RankInfo {
        let mut state = self.inner.lock().unwrap();
        let key = state.next_key;
        state.next_key += 1;
        let queue = state.waiting.entry(event_id).or_default();
        if let Some(old_key) = queue.by_user.remove(&user_id) {
            queue.by_key.remove(&old_key);
        }
        queue.by_key.insert(key, user_id);
        queue.by_user.insert(user_id, key);
        RankInfo::waiting(queue.position_of(key))
    }

    /// Remove the member's wait entry and active lease. The two deletions are
    /// independent; either may already be gone. Idempotent.
    pub fn leave(&self, event_id: Uuid, user_id: Uuid) {
        let mut state = self.inner.lock().unwrap();
        if let Some(queue) = state.waiting.get_mut(&event_id) {
            if let Some(key) = queue.by_user.remove(&user_id) {
                queue.by_key.remove(&key);
            }
            if queue.by_key.is_empty() {
                state.waiting.remove(&event_id);
            }
        }
        state.leases.remove(&(event_id, user_id));
    }

    /// Report the member's standing: an unexpired lease wins, then the wait
    /// queue position, then absence.
    pub fn rank(&self, event_id: Uuid, user_id: Uuid) -> RankInfo {
        let now = Instant::now();
        let mut state = self.inner.lock().unwrap();
        match state.leases.get(&(event_id, user_id)).copied() {
            Some(expires_at) if expires_at > now => return RankInfo::active(),
            Some(_) => {
                state.leases.remove(&(event_id, user_id));
            }
            None => {}
        }
        if let Some(queue) = state.waiting.get(&event_id) {
            if let Some(key) = queue.by_user.get(&user_id) {
                return RankInfo::waiting(queue.position_of(*key));
            }
        }
        RankInfo::absent()
    }

    /// Lease presence check used by the admission gate. Never extends the
    /// TTL; the lease is a hard session bound, not a sliding window.
    pub fn has_active_lease(&self, event_id: Uuid, user_id: Uuid) -> bool {
        let now = Instant::now();
        let state = self.inner.lock().unwrap();
        state
            .leases
            .get(&(event_id, user_id))
            .is_some_and(|expires_at| *expires_at > now)
    }

    /// Pop up to `count` members from the front of an event's wait queue and
    /// grant each an active lease. Pop and grant happen under one lock
    /// acquisition, so a partially promoted batch is not observable.
    pub fn promote_batch(&self, event_id: Uuid, count: usize) -> Vec<Uuid> {
        let expires_at = Instant::now() + self.lease_ttl;
        let mut state = self.inner.lock().unwrap();
        let mut promoted = Vec::new();
        if let Some(queue) = state.waiting.get_mut(&event_id) {
            while promoted.len() < count {
                let Some((_, user_id)) = queue.by_key.pop_first() else { break };
                queue.by_user.remove(&user_id);
                promoted.push(user_id);
            }
            if queue.by_key.is_empty() {
                state.waiting.remove(&event_id);
            }
        }
        for user_id in &promoted {
            state.leases.insert((event_id, *user_id), expires_at);
        }
        promoted
    }

    /// Events that currently have a non-empty wait queue.
    pub fn active_event_ids(&self) -> Vec<Uuid> {
        let state = self.inner.lock().unwrap();
        state
            .waiting
            .iter()
            .filter(|(_, q)| !q.by_key.is_empty())
            .map(|(event_id, _)| *event_id)
            .collect()
    }

    pub fn waiting_len(&self, event_id: Uuid) -> usize {
        let state = self.inner.lock().unwrap();
        state.waiting.get(&event_id).map_or(0, |q| q.by_key.len())
    }

    /// Drop leases past their TTL. Called from the scheduler tick; readers
    /// also purge lazily, so this only bounds the map size.
    pub fn purge_expired_leases(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.lock().unwrap();
        let before = state.leases.len();
        state.leases.retain(|_, expires_at| *expires_at > now);
        before - state.leases.len()
    }
}
