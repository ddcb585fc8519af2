//! Per-photo async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub type PhotoLockGuard = OwnedMutexGuard<()>;

/// Keyed mutex serializing mutations of one photo id within this process.
///
/// Entries are weak; a lock disappears once no caller holds or waits on it.
#[derive(Default)]
pub struct PhotoLocks {
    locks: Mutex<HashMap<i64, Weak<AsyncMutex<()>>>>,
}

impl PhotoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, photo_id: i64) -> PhotoLockGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(&photo_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(photo_id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Number of ids currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
