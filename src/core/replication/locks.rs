// src/core/replication/locks.rs

//! Per-dataset-GUID locking: "per-dataset operations are
//! serialized by a lock keyed by dataset `guid`; parent/child locks are
//! acquired parent-first to avoid deadlock."

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct DatasetLockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DatasetLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, guid: &str) -> Arc<Mutex<()>> {
        self.locks.entry(guid.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquires locks for a parent-first-ordered list of dataset paths,
    /// keyed by the caller-supplied `(path, guid)` pairs. Sorting by path
    /// depth (fewer `/` separators first) gives parent-before-child order
    /// without needing the tree structure explicitly.
    pub async fn acquire_parent_first(&self, mut datasets: Vec<(String, String)>) -> Vec<OwnedMutexGuard<()>> {
        datasets.sort_by_key(|(path, _)| path.matches('/').count());
        let mut guards = Vec::with_capacity(datasets.len());
        for (_, guid) in datasets {
            let lock = self.lock_for(&guid);
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    pub async fn acquire_one(&self, guid: &str) -> OwnedMutexGuard<()> {
        self.lock_for(guid).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parent_first_ordering_sorts_by_path_depth() {
        let table = DatasetLockTable::new();
        let datasets = vec![
            ("tank/db/child".to_string(), "g2".to_string()),
            ("tank/db".to_string(), "g1".to_string()),
        ];
        // Just exercises the acquire path; ordering is asserted by construction above.
        let guards = table.acquire_parent_first(datasets).await;
        assert_eq!(guards.len(), 2);
    }
}
