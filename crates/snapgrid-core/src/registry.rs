//! Pending operation registry
//!
//! Tracks which keys have an in-flight unit of work and owns the bounded
//! worker pool that runs it:
//! - At most one entry per key (`try_start` is a single critical section)
//! - Cooperative cancellation through a per-entry flag
//! - Completion only removes the entry still owned by the finishing task
//!
//! The map lock is held for map mutation only, never across the work.

use crate::error::PoolError;
use crate::types::TaskId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

/// Shared cancellation flag polled by a running task
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create unset flag
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handed to the work submitted by `try_start`
#[derive(Debug, Clone)]
pub struct TaskTicket {
    id: TaskId,
    cancel: CancellationFlag,
}

impl TaskTicket {
    pub(crate) fn issue() -> Self {
        Self {
            id: TaskId::new(),
            cancel: CancellationFlag::new(),
        }
    }

    /// Task identity used for `complete_and_remove`
    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Flag set by `cancel_and_remove` / `cancel_all`
    #[inline]
    #[must_use]
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }
}

/// Bounded pool of tokio tasks
///
/// Work is spawned immediately but waits for one of `capacity` permits
/// before it runs.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Create pool on the current tokio runtime
    ///
    /// # Errors
    /// - `PoolError::NoRuntime` outside a runtime
    /// - `PoolError::ZeroCapacity` for `capacity == 0`
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        let handle = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        Self::with_handle(handle, capacity)
    }

    /// Create pool on an explicit runtime
    ///
    /// # Errors
    /// `PoolError::ZeroCapacity` for `capacity == 0`
    pub fn with_handle(handle: Handle, capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            handle,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Queue work; it starts once a permit is free
    pub fn submit<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            // The semaphore is never closed; `ok()` only avoids a panic path.
            let _permit = permits.acquire_owned().await.ok();
            work.await;
        });
    }

    /// Maximum concurrent work items
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Entries created by `try_start`
    pub started: u64,
    /// `try_start` calls refused because the key was busy
    pub duplicates: u64,
    /// Entries removed by cancellation
    pub cancelled: u64,
    /// Entries removed by their own task's completion
    pub completed: u64,
    /// Completions that found their entry already gone or replaced
    pub stale_completions: u64,
}

#[derive(Debug)]
struct Entry {
    task_id: TaskId,
    cancel: CancellationFlag,
}

#[derive(Debug)]
struct State<K> {
    entries: HashMap<K, Entry>,
    stats: RegistryStats,
}

#[derive(Debug)]
struct Inner<K> {
    state: Mutex<State<K>>,
    pool: WorkerPool,
}

/// In-flight work keyed by `K`
#[derive(Debug)]
pub struct PendingOperations<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for PendingOperations<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> PendingOperations<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// Create registry owning `pool`
    #[must_use]
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    stats: RegistryStats::default(),
                }),
                pool,
            }),
        }
    }

    /// Start work for `key` unless it already has an entry
    ///
    /// Returns `true` if an entry was created and `work` submitted. On
    /// `false` the existing entry is left untouched and `work` is dropped
    /// without being called.
    pub fn try_start<F, Fut>(&self, key: K, work: F) -> bool
    where
        F: FnOnce(TaskTicket) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = {
            let mut state = self.inner.state.lock();
            if state.entries.contains_key(&key) {
                state.stats.duplicates += 1;
                tracing::debug!(?key, "duplicate start refused");
                return false;
            }

            let ticket = TaskTicket::issue();
            state.entries.insert(
                key.clone(),
                Entry {
                    task_id: ticket.id,
                    cancel: ticket.cancel.clone(),
                },
            );
            state.stats.started += 1;
            ticket
        };

        tracing::debug!(?key, task = %ticket.id, "operation started");
        self.inner.pool.submit(work(ticket));
        true
    }

    /// Cancel and forget the entry for `key`, if any
    pub fn cancel_and_remove(&self, key: &K) -> bool {
        let mut state = self.inner.state.lock();
        match state.entries.remove(key) {
            Some(entry) => {
                entry.cancel.cancel();
                state.stats.cancelled += 1;
                tracing::debug!(?key, task = %entry.task_id, "operation cancelled");
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `key` if `task_id` still owns it
    ///
    /// Called from the finishing task. A key already removed by
    /// cancellation, or re-claimed by a newer task, is left alone.
    pub fn complete_and_remove(&self, key: &K, task_id: TaskId) -> bool {
        let mut state = self.inner.state.lock();
        let owned = state
            .entries
            .get(key)
            .is_some_and(|entry| entry.task_id == task_id);

        if owned {
            state.entries.remove(key);
            state.stats.completed += 1;
        } else {
            state.stats.stale_completions += 1;
            tracing::debug!(?key, task = %task_id, "stale completion ignored");
        }
        owned
    }

    /// Cancel every entry and clear the registry
    pub fn cancel_all(&self) -> usize {
        let mut state = self.inner.state.lock();
        let count = state.entries.len();
        for (_, entry) in state.entries.drain() {
            entry.cancel.cancel();
        }
        state.stats.cancelled += count as u64;
        if count > 0 {
            tracing::debug!(count, "all operations cancelled");
        }
        count
    }

    /// Whether `key` has an entry
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.state.lock().entries.contains_key(key)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    /// Get registry statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.inner.state.lock().stats
    }

    /// The worker pool running submitted work
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use tokio::sync::{oneshot, Notify};

    fn registry(capacity: usize) -> PendingOperations<usize> {
        PendingOperations::new(WorkerPool::new(capacity).unwrap())
    }

    #[test]
    fn pool_requires_runtime() {
        assert_eq!(WorkerPool::new(1).unwrap_err(), PoolError::NoRuntime);
    }

    #[tokio::test]
    async fn pool_rejects_zero_capacity() {
        assert_eq!(WorkerPool::new(0).unwrap_err(), PoolError::ZeroCapacity);
    }

    #[tokio::test]
    async fn try_start_runs_work() {
        let registry = registry(2);
        let (tx, rx) = oneshot::channel();

        let started = registry.try_start(7, |ticket| async move {
            let _ = tx.send(ticket.id());
        });

        assert!(started);
        let task_id = rx.await.unwrap();
        assert!(registry.contains(&7));
        assert!(registry.complete_and_remove(&7, task_id));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_start_refused() {
        let registry = registry(2);
        let release = Arc::new(Notify::new());

        let hold = Arc::clone(&release);
        assert!(registry.try_start(1, |_| async move { hold.notified().await }));

        let mut called = false;
        let second = registry.try_start(1, |_| {
            called = true;
            async {}
        });

        assert!(!second);
        assert!(!called);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().duplicates, 1);
        release.notify_one();
    }

    #[tokio::test]
    async fn cancel_sets_flag_and_removes() {
        let registry = registry(1);
        let (tx, rx) = oneshot::channel();
        let release = Arc::new(Notify::new());

        let hold = Arc::clone(&release);
        registry.try_start(3, |ticket| async move {
            hold.notified().await;
            let _ = tx.send(ticket.cancellation().is_cancelled());
        });

        assert!(registry.cancel_and_remove(&3));
        assert!(!registry.contains(&3));
        release.notify_one();
        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn cancel_absent_is_noop() {
        let registry = registry(1);
        assert!(!registry.cancel_and_remove(&42));
        assert_eq!(registry.stats().cancelled, 0);
    }

    #[tokio::test]
    async fn stale_completion_does_not_remove_replacement() {
        let registry = registry(2);
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();

        registry.try_start(5, |ticket| async move {
            let _ = first_tx.send(ticket.id());
        });
        let first = first_rx.await.unwrap();

        registry.cancel_and_remove(&5);
        registry.try_start(5, |ticket| async move {
            let _ = second_tx.send(ticket.id());
        });
        let second = second_rx.await.unwrap();

        assert!(!registry.complete_and_remove(&5, first));
        assert!(registry.contains(&5));
        assert!(registry.complete_and_remove(&5, second));
        assert!(!registry.complete_and_remove(&5, second));
        assert_eq!(registry.stats().stale_completions, 2);
    }

    #[tokio::test]
    async fn cancel_all_clears_everything() {
        let registry = registry(4);
        let release = Arc::new(Notify::new());
        for key in 0..4 {
            let hold = Arc::clone(&release);
            registry.try_start(key, |_| async move { hold.notified().await });
        }

        assert_eq!(registry.cancel_all(), 4);
        assert!(registry.is_empty());
        assert_eq!(registry.stats().cancelled, 4);
        release.notify_waiters();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_try_start_single_winner() {
        let registry = registry(4);
        let release = Arc::new(Notify::new());
        let threads = 16;
        let barrier = Barrier::new(threads);

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let registry = registry.clone();
                    let release = Arc::clone(&release);
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        registry.try_start(0, |_| async move { release.notified().await })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });

        assert_eq!(winners, 1);
        assert_eq!(registry.stats().duplicates, (threads - 1) as u64);
        release.notify_waiters();
    }
}
