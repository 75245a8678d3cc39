use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per requirement id. Entries are dropped once nobody holds
/// or waits on them.
#[derive(Debug, Default)]
pub struct RequirementLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl RequirementLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: Uuid) -> RequirementLockGuard<'_> {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = mutex.lock_owned().await;
        RequirementLockGuard {
            locks: self,
            id,
            guard: Some(guard),
        }
    }

    /// Number of requirements with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct RequirementLockGuard<'a> {
    locks: &'a RequirementLocks,
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RequirementLockGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count below only sees waiters.
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn serializes_same_requirement() {
        let locks = Arc::new(RequirementLocks::new());
        let in_critical = Arc::new(AtomicUsize::new(0));
        let id = Uuid::new_v4();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let in_critical = in_critical.clone();
                tokio::spawn(async move {
                    let _guard = locks.acquire(id).await;
                    assert_eq!(in_critical.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_critical.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_requirements_do_not_block() {
        let locks = RequirementLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(Uuid::new_v4())).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
