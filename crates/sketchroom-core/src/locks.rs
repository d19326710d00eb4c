//! Per-room mutual exclusion.
//!
//! Every read-modify-write of a room or its canvas runs while holding the
//! room's lock, so mutations of one room apply in arrival order and the
//! broadcast that follows a mutation is sent before the next one starts.
//! A room's entry lives only while some task holds or awaits its lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Guard held for the duration of one room mutation.
pub struct RoomGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    room_id: String,
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone of the Arc, so a count of one is the map's.
        self.locks
            .remove_if(&self.room_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl std::fmt::Debug for RoomGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomGuard")
            .field("room_id", &self.room_id)
            .finish()
    }
}

#[derive(Default)]
pub struct RoomLocks {
    locks: Arc<LockMap>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `room_id`. Waiters are served FIFO.
    pub async fn acquire(&self, room_id: &str) -> RoomGuard {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self
            .locks
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        RoomGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
            room_id: room_id.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
