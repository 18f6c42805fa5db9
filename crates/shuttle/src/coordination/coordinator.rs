//! The coordination store: locks, worker sets and batch counters.
//!
//! Everything here is less durable than the database. Losing it mid-import
//! leaves entities `loading` until an operator clears their workers.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::batch::{BatchCallback, BatchOutcome, BatchState, BatchStatus};
use crate::error::CoordinatorError;

pub trait WorkCoordinator: Send + Sync {
    /// Acquires `name` for `ttl`. Returns false while another holder's lock
    /// is unexpired.
    fn try_lock(&self, name: &str, ttl: Duration) -> Result<bool, CoordinatorError>;

    fn unlock(&self, name: &str) -> Result<(), CoordinatorError>;

    /// Adds `jid` to the set under `key`, returning the set size.
    fn add_worker(&self, key: &str, jid: &str) -> Result<usize, CoordinatorError>;

    /// Removes `jid` from the set under `key`, returning the remaining size.
    fn remove_worker(&self, key: &str, jid: &str) -> Result<usize, CoordinatorError>;

    fn workers(&self, key: &str) -> Result<Vec<String>, CoordinatorError>;

    /// Empties the set, returning how many jids were dropped.
    fn clear_workers(&self, key: &str) -> Result<usize, CoordinatorError>;

    fn create_batch(
        &self,
        description: &str,
        callback: BatchCallback,
    ) -> Result<String, CoordinatorError>;

    /// Counts one more pending job against the batch.
    fn batch_add_job(&self, bid: &str) -> Result<(), CoordinatorError>;

    /// Closes the batch to new top-level jobs.
    fn seal_batch(&self, bid: &str) -> Result<BatchOutcome, CoordinatorError>;

    /// Records the terminal result of one job of the batch.
    fn batch_job_finished(&self, bid: &str, success: bool)
        -> Result<BatchOutcome, CoordinatorError>;

    fn batch_status(&self, bid: &str) -> Result<Option<BatchStatus>, CoordinatorError>;
}

/// In-process coordinator. Each map entry is guarded by its shard lock, so
/// batch decrement-and-check is atomic per batch.
#[derive(Default)]
pub struct MemoryCoordinator {
    locks: DashMap<String, Instant>,
    worker_sets: DashMap<String, BTreeSet<String>>,
    batches: DashMap<String, BatchState>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkCoordinator for MemoryCoordinator {
    fn try_lock(&self, name: &str, ttl: Duration) -> Result<bool, CoordinatorError> {
        let now = Instant::now();
        match self.locks.entry(name.to_string()) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    Ok(false)
                } else {
                    held.insert(now + ttl);
                    Ok(true)
                }
            }
            Entry::Vacant(free) => {
                free.insert(now + ttl);
                Ok(true)
            }
        }
    }

    fn unlock(&self, name: &str) -> Result<(), CoordinatorError> {
        self.locks.remove(name);
        Ok(())
    }

    fn add_worker(&self, key: &str, jid: &str) -> Result<usize, CoordinatorError> {
        let mut set = self.worker_sets.entry(key.to_string()).or_default();
        set.insert(jid.to_string());
        Ok(set.len())
    }

    fn remove_worker(&self, key: &str, jid: &str) -> Result<usize, CoordinatorError> {
        let remaining = match self.worker_sets.get_mut(key) {
            Some(mut set) => {
                set.remove(jid);
                set.len()
            }
            None => 0,
        };
        if remaining == 0 {
            self.worker_sets.remove_if(key, |_, set| set.is_empty());
        }
        Ok(remaining)
    }

    fn workers(&self, key: &str) -> Result<Vec<String>, CoordinatorError> {
        Ok(self
            .worker_sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn clear_workers(&self, key: &str) -> Result<usize, CoordinatorError> {
        Ok(self
            .worker_sets
            .remove(key)
            .map(|(_, set)| set.len())
            .unwrap_or(0))
    }

    fn create_batch(
        &self,
        description: &str,
        callback: BatchCallback,
    ) -> Result<String, CoordinatorError> {
        let bid = uuid::Uuid::new_v4().to_string();
        self.batches
            .insert(bid.clone(), BatchState::new(description, callback));
        Ok(bid)
    }

    fn batch_add_job(&self, bid: &str) -> Result<(), CoordinatorError> {
        let mut batch = self
            .batches
            .get_mut(bid)
            .ok_or_else(|| CoordinatorError::UnknownBatch(bid.to_string()))?;
        if batch.complete {
            return Err(CoordinatorError::BatchCompleted(bid.to_string()));
        }
        batch.total += 1;
        batch.pending += 1;
        Ok(())
    }

    fn seal_batch(&self, bid: &str) -> Result<BatchOutcome, CoordinatorError> {
        let mut batch = self
            .batches
            .get_mut(bid)
            .ok_or_else(|| CoordinatorError::UnknownBatch(bid.to_string()))?;
        batch.sealed = true;
        Ok(batch.check_completion(bid))
    }

    fn batch_job_finished(
        &self,
        bid: &str,
        success: bool,
    ) -> Result<BatchOutcome, CoordinatorError> {
        let mut batch = self
            .batches
            .get_mut(bid)
            .ok_or_else(|| CoordinatorError::UnknownBatch(bid.to_string()))?;
        batch.pending = batch.pending.saturating_sub(1);
        if !success {
            batch.failures += 1;
        }
        Ok(batch.check_completion(bid))
    }

    fn batch_status(&self, bid: &str) -> Result<Option<BatchStatus>, CoordinatorError> {
        Ok(self.batches.get(bid).map(|batch| batch.status(bid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn callback() -> BatchCallback {
        BatchCallback::new("ImportFinisher", serde_json::json!({ "container_id": 1 }))
    }

    #[test]
    fn test_lock_is_exclusive_until_released() {
        let coordinator = MemoryCoordinator::new();
        let ttl = Duration::from_secs(60);
        assert!(coordinator.try_lock("Job:{}", ttl).unwrap());
        assert!(!coordinator.try_lock("Job:{}", ttl).unwrap());
        assert!(coordinator.try_lock("Other:{}", ttl).unwrap());

        coordinator.unlock("Job:{}").unwrap();
        assert!(coordinator.try_lock("Job:{}", ttl).unwrap());
    }

    #[test]
    fn test_expired_lock_is_reacquirable() {
        let coordinator = MemoryCoordinator::new();
        assert!(coordinator.try_lock("Job:{}", Duration::ZERO).unwrap());
        assert!(coordinator
            .try_lock("Job:{}", Duration::from_secs(60))
            .unwrap());
    }

    #[test]
    fn test_worker_set_is_a_set() {
        let coordinator = MemoryCoordinator::new();
        assert_eq!(coordinator.add_worker("loading:Commit:1", "j1").unwrap(), 1);
        assert_eq!(coordinator.add_worker("loading:Commit:1", "j1").unwrap(), 1);
        assert_eq!(coordinator.add_worker("loading:Commit:1", "j2").unwrap(), 2);
        assert_eq!(coordinator.remove_worker("loading:Commit:1", "j1").unwrap(), 1);
        assert_eq!(coordinator.workers("loading:Commit:1").unwrap(), vec!["j2"]);
        assert_eq!(coordinator.remove_worker("loading:Commit:1", "j2").unwrap(), 0);
        assert_eq!(coordinator.remove_worker("loading:Commit:1", "j2").unwrap(), 0);
        assert!(coordinator.workers("loading:Commit:1").unwrap().is_empty());
    }

    #[test]
    fn test_clear_workers() {
        let coordinator = MemoryCoordinator::new();
        coordinator.add_worker("loading:Article:3", "a").unwrap();
        coordinator.add_worker("loading:Article:3", "b").unwrap();
        assert_eq!(coordinator.clear_workers("loading:Article:3").unwrap(), 2);
        assert_eq!(coordinator.clear_workers("loading:Article:3").unwrap(), 0);
    }

    #[test]
    fn test_empty_batch_completes_on_seal() {
        let coordinator = MemoryCoordinator::new();
        let bid = coordinator.create_batch("empty", callback()).unwrap();
        match coordinator.seal_batch(&bid).unwrap() {
            BatchOutcome::Completed(status) => {
                assert!(status.succeeded());
                assert_eq!(status.total, 0);
            }
            BatchOutcome::Pending => panic!("empty batch should complete on seal"),
        }
    }

    #[test]
    fn test_batch_waits_for_seal() {
        let coordinator = MemoryCoordinator::new();
        let bid = coordinator.create_batch("import", callback()).unwrap();
        coordinator.batch_add_job(&bid).unwrap();
        assert_eq!(
            coordinator.batch_job_finished(&bid, true).unwrap(),
            BatchOutcome::Pending
        );
        assert!(matches!(
            coordinator.seal_batch(&bid).unwrap(),
            BatchOutcome::Completed(_)
        ));
        assert_eq!(
            coordinator.batch_add_job(&bid),
            Err(CoordinatorError::BatchCompleted(bid.clone()))
        );
    }

    #[test]
    fn test_failures_are_counted() {
        let coordinator = MemoryCoordinator::new();
        let bid = coordinator.create_batch("import", callback()).unwrap();
        coordinator.batch_add_job(&bid).unwrap();
        coordinator.batch_add_job(&bid).unwrap();
        coordinator.seal_batch(&bid).unwrap();
        coordinator.batch_job_finished(&bid, false).unwrap();
        let BatchOutcome::Completed(status) = coordinator.batch_job_finished(&bid, true).unwrap()
        else {
            panic!("batch should be complete");
        };
        assert_eq!(status.failures, 1);
        assert!(!status.succeeded());
    }

    #[test]
    fn test_unknown_batch() {
        let coordinator = MemoryCoordinator::new();
        assert_eq!(
            coordinator.seal_batch("nope"),
            Err(CoordinatorError::UnknownBatch("nope".to_string()))
        );
        assert!(coordinator.batch_status("nope").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_completion_fires_once() {
        let coordinator = Arc::new(MemoryCoordinator::new());
        let bid = coordinator.create_batch("fan-out", callback()).unwrap();
        let jobs = 64;
        for _ in 0..jobs {
            coordinator.batch_add_job(&bid).unwrap();
        }
        coordinator.seal_batch(&bid).unwrap();

        let completions = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..jobs)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let completions = Arc::clone(&completions);
                let bid = bid.clone();
                thread::spawn(move || {
                    if let BatchOutcome::Completed(_) =
                        coordinator.batch_job_finished(&bid, true).unwrap()
                    {
                        completions.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }
}
