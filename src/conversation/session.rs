use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::state::{DialogueState, Session};

/// In-memory sessions keyed by user id, plus a per-user lock so events of one
/// user are handled one at a time.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<i64, Session>,
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session, or a fresh idle one.
    pub fn get(&self, user_id: i64) -> Session {
        self.sessions.get(&user_id).map(|s| s.clone()).unwrap_or_default()
    }

    pub fn state(&self, user_id: i64) -> DialogueState {
        self.sessions.get(&user_id).map(|s| s.state).unwrap_or_default()
    }

    /// Stores the session; an idle session is dropped instead of kept.
    pub fn set(&self, user_id: i64, session: Session) {
        if session.state == DialogueState::Idle {
            self.sessions.remove(&user_id);
        } else {
            self.sessions.insert(user_id, session);
        }
    }

    pub fn clear(&self, user_id: i64) {
        self.sessions.remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Waits until no other event of this user is in flight.
    pub async fn lock_user(&self, user_id: i64) -> UserGuard<'_> {
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        UserGuard {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            user_id,
        }
    }

    /// Number of users with a lock currently held or awaited.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

/// Holds a user's lock; the last holder removes the lock entry on drop.
#[derive(Debug)]
pub struct UserGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<i64, Arc<Mutex<()>>>,
    user_id: i64,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // only the map's own reference left: nobody holds or waits for it
        self.locks.remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
