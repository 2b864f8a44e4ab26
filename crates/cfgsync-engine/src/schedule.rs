//! Scheduling primitives
//!
//! - [`TaskScheduler`]: named delayed tasks; scheduling under a pending name
//!   supersedes the earlier request, so a burst collapses into one execution
//!   after the window elapses.
//! - [`SerializedScopes`]: named mutual-exclusion scopes; work under the same
//!   name runs one at a time, work under different names interleaves freely.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::task::JoinHandle;
use tracing::trace;

/// Named, time-windowed task coalescer
#[derive(Debug)]
pub struct TaskScheduler {
    /// Latest generation scheduled per name
    pending: Arc<DashMap<String, u64>>,
    next_generation: AtomicU64,
    /// Tasks spawned and not yet finished, superseded ones included
    active: Arc<watch::Sender<usize>>,
}

/// Decrements the active count when a scheduled task ends
struct ActiveTask(Arc<watch::Sender<usize>>);

impl Drop for ActiveTask {
    fn drop(&mut self) {
        self.0.send_modify(|active| *active -= 1);
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
            active: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` unless another task is scheduled under the
    /// same name before then. The returned handle completes either way.
    pub fn schedule<F, Fut>(&self, name: impl Into<String>, delay: Duration, task: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.insert(name.clone(), generation);
        let pending = Arc::clone(&self.pending);
        self.active.send_modify(|active| *active += 1);
        let active = ActiveTask(Arc::clone(&self.active));

        tokio::spawn(async move {
            let _active = active;
            tokio::time::sleep(delay).await;
            if pending
                .remove_if(&name, |_, latest| *latest == generation)
                .is_some()
            {
                task().await;
            } else {
                trace!(task = %name, "Scheduled task superseded");
            }
        })
    }

    /// Whether a task is waiting under `name`
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Whether every scheduled task has finished
    pub fn is_idle(&self) -> bool {
        *self.active.borrow() == 0
    }

    /// Wait until every scheduled task has finished, including tasks
    /// scheduled by the ones still running
    pub async fn idle(&self) {
        let mut active = self.active.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = active.wait_for(|count| *count == 0).await;
    }
}

/// Named mutual-exclusion scopes
#[derive(Debug, Default, Clone)]
pub struct SerializedScopes {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Holds a scope until dropped
#[derive(Debug)]
pub struct ScopeGuard {
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SerializedScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the scope `name`, waiting for any current holder to leave
    pub async fn lock(&self, name: impl Into<String>) -> ScopeGuard {
        let name = name.into();
        let mutex = self
            .locks
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        ScopeGuard {
            name,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Run `work` inside the scope `name`
    pub async fn run<Fut, T>(&self, name: impl Into<String>, work: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let _scope = self.lock(name).await;
        work.await
    }

    /// Number of scopes currently held or awaited
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

impl ScopeGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or awaits the scope
        self.locks
            .remove_if(&self.name, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
