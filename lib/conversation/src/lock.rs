//! Per-user serialization.
//!
//! Every state-changing operation for a user runs while holding that user's
//! lock, so two messages from the same user never interleave their
//! read-context/append-turn sequences. Different users never contend.

use parley_core::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes keyed by user.
///
/// Entries exist only while some task holds or waits on a user's lock.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one user's state.
///
/// Dropping the guard releases the lock and forgets the user once no other
/// task is waiting.
#[derive(Debug)]
pub struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.map();
        if locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

impl UserLocks {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<UserId, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for exclusive access to the user's state.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn lock(&self, user_id: UserId) -> UserGuard<'_> {
        let lock = Arc::clone(self.map().entry(user_id).or_default());
        let guard = lock.lock_owned().await;
        UserGuard {
            locks: self,
            user_id,
            guard: Some(guard),
        }
    }

    /// Returns the number of users currently holding or awaiting a lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// Returns whether no user is locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
