//! A keyed mutex serializing project-level bootstrap (spec.md §4.2).
//!
//! Reentrancy is not required and not provided. This protects only project
//! bootstrap; it does not serialize builds of the same project, which is
//! `JobQueue`'s job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ProjectLock {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ProjectLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `project`, creating it on first use. The map
    /// mutex is held only long enough to fetch-or-insert the per-project
    /// lock, never across the bootstrap I/O the caller performs while
    /// holding the returned guard. `tokio::sync::Mutex::lock_owned` gives us
    /// a guard that owns its `Arc`, so no unsafe lifetime games are needed
    /// to hand a lock out of this map.
    pub async fn lock(&self, project: &str) -> OwnedMutexGuard<()> {
        let per_project = {
            let mut locks = self.locks.lock().expect("project lock map poisoned");
            locks
                .entry(project.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        per_project.lock_owned().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn serializes_same_project() {
        let lock = Arc::new(ProjectLock::new());
        let counter = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let counter = counter.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                let _guard = lock.lock("alpha").await;
                let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_projects_are_independent() {
        let lock = ProjectLock::new();
        let _a = lock.lock("alpha").await;
        let _b = lock.lock("beta").await;
    }
}
