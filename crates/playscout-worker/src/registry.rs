//! Background task registry
//!
//! Every unit of work the orchestrator starts (an analysis run or a retry
//! waiter) is registered here on spawn and removes itself when it finishes,
//! whatever the outcome. `drain` cancels what is still running and waits for it.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A unit of background work. It receives its cancellation token and should
/// observe it at its suspension points.
pub type UnitOfWork = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, ()> + Send>;

#[async_trait]
pub trait BackgroundTasks: Send + Sync {
    /// Start `work` concurrently and track it until it finishes.
    /// Returns false when the registry no longer accepts work.
    fn spawn(&self, label: &str, work: UnitOfWork) -> bool;

    /// Units still running.
    fn count(&self) -> usize;

    /// Stop accepting work, cancel every running unit and wait for all of them to settle.
    async fn drain(&self);
}

struct Entry {
    label: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Removes its entry when the unit's future completes, panics or is dropped.
struct Deregister {
    inner: Weak<Inner>,
    id: u64,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.entries().remove(&self.id);
        }
    }
}

/// Tokio-backed [`BackgroundTasks`].
#[derive(Clone, Default)]
pub struct BackgroundTaskRegistry {
    inner: Arc<Inner>,
}

impl BackgroundTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels of the units still running.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .inner
            .entries()
            .values()
            .map(|entry| entry.label.clone())
            .collect();
        labels.sort();
        labels
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackgroundTasks for BackgroundTaskRegistry {
    fn spawn(&self, label: &str, work: UnitOfWork) -> bool {
        let mut entries = self.inner.entries();
        if self.is_closed() {
            tracing::warn!(task = %label, "Background task registry is draining, work not started");
            return false;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let future = work(token.clone());
        let inner = Arc::downgrade(&self.inner);

        // The entry is inserted before this lock is released, so a unit that
        // finishes immediately still finds it to remove.
        let handle = tokio::spawn(async move {
            let _deregister = Deregister { inner, id };
            future.await;
        });

        entries.insert(
            id,
            Entry {
                label: label.to_string(),
                token,
                handle,
            },
        );
        tracing::debug!(task = %label, task_id = id, running = entries.len(), "Background task spawned");
        true
    }

    fn count(&self) -> usize {
        self.inner.entries().len()
    }

    async fn drain(&self) {
        let entries: Vec<Entry> = {
            let mut entries = self.inner.entries();
            self.inner.closed.store(true, Ordering::SeqCst);
            entries.drain().map(|(_, entry)| entry).collect()
        };

        tracing::info!(count = entries.len(), "Draining background tasks");

        for entry in &entries {
            entry.token.cancel();
        }

        for entry in entries {
            match entry.handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(task = %entry.label, "Background task aborted");
                }
                Err(e) => {
                    tracing::error!(task = %entry.label, error = %e, "Background task panicked");
                }
            }
        }

        tracing::info!("Background tasks drained");
    }
}
