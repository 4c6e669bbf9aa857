//! Bounded-concurrency async store queue, grounded on `queued_async_storage`
//! in the original agent: items are enqueued and processed by a worker
//! respecting a concurrency cap, rather than blocking the caller on the
//! actual upload/write.
//!
//! Each queued task carries its own `on_finished(ok)` callback and
//! `is_cancelled` poll (spec §3 Upload task, §4.7): the worker checks
//! cancellation before pulling a task and again right before starting the
//! store, so a cancelled item is never written. Every enqueue allocates a
//! fresh task, so there is no ABA between a cancelled item and a later one
//! queued for the same logical slot.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::error::{AgentError, Result};

use super::item::Item;

const DEFAULT_MAX_CONCURRENT: usize = 2;

type OnFinished = Box<dyn FnOnce(bool) + Send>;
type IsCancelled = Arc<dyn Fn() -> bool + Send + Sync>;

struct QueueTask {
    item: Item,
    on_finished: OnFinished,
    is_cancelled: IsCancelled,
}

/// Runs `store` for queued items with at most `max_concurrent` in flight at
/// once. `store` returning `Err` counts the item as failed; it is not
/// retried by the queue itself (retry policy for uploads lives in the
/// timeline synchronizer, component C8).
pub struct QueuedAsyncStorage {
    queue: Arc<Mutex<VecDeque<QueueTask>>>,
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl QueuedAsyncStorage {
    pub fn spawn<F, Fut>(max_concurrent: usize, store: F) -> QueuedAsyncStorage
    where
        F: Fn(Item) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let max_concurrent = if max_concurrent == 0 { DEFAULT_MAX_CONCURRENT } else { max_concurrent };
        let queue: Arc<Mutex<VecDeque<QueueTask>>> = Arc::new(Mutex::new(VecDeque::new()));
        let notify = Arc::new(Notify::new());
        let closed = Arc::new(AtomicBool::new(false));
        let processed = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let store = Arc::new(store);

        let worker_queue = queue.clone();
        let worker_notify = notify.clone();
        let worker_closed = closed.clone();
        let worker_processed = processed.clone();
        let worker_failed = failed.clone();
        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(max_concurrent));
            loop {
                let task = worker_queue.lock().pop_front();
                let Some(task) = task else {
                    if worker_closed.load(Ordering::SeqCst) {
                        return;
                    }
                    worker_notify.notified().await;
                    continue;
                };

                if (task.is_cancelled)() {
                    (task.on_finished)(false);
                    continue;
                }

                let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                let store = store.clone();
                let processed = worker_processed.clone();
                let failed = worker_failed.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let QueueTask { item, on_finished, is_cancelled } = task;
                    if is_cancelled() {
                        on_finished(false);
                        return;
                    }
                    match store(item).await {
                        Ok(()) => {
                            processed.fetch_add(1, Ordering::Relaxed);
                            on_finished(true);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(error = %e, "async storage item failed");
                            on_finished(false);
                        }
                    }
                });
            }
        });

        QueuedAsyncStorage { queue, notify, closed, processed, failed }
    }

    /// Enqueue `item` for storage with its own completion/cancellation
    /// hooks. Returns immediately; `on_finished` fires exactly once.
    pub fn store_async(
        &self,
        item: Item,
        on_finished: impl FnOnce(bool) + Send + 'static,
        is_cancelled: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AgentError::Storage("async storage queue is closed".into()));
        }
        self.queue.lock().push_back(QueueTask {
            item,
            on_finished: Box::new(on_finished),
            is_cancelled: Arc::new(is_cancelled),
        });
        self.notify.notify_one();
        Ok(())
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Drain the queue: stop accepting new items, and run `on_finished(false)`
    /// for every task still waiting (not yet picked up by the worker).
    /// In-flight tasks are left to finish on their own (spec §4.7).
    pub fn finit(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<QueueTask> = self.queue.lock().drain(..).collect();
        for task in drained {
            (task.on_finished)(false);
        }
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::item::Period;
    use crate::wire::enums::{MediaType, UploadCategory};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn item() -> Item {
        Item::new(
            Period::new(chrono::Utc::now(), chrono::Utc::now() + chrono::Duration::seconds(1)),
            "main",
            UploadCategory::Record,
            MediaType::Mp4,
        )
    }

    fn never_cancelled() -> impl Fn() -> bool + Send + Sync + 'static {
        || false
    }

    #[tokio::test]
    async fn processes_enqueued_items() {
        let queue = QueuedAsyncStorage::spawn(2, |_item| async { Ok(()) });
        let finished = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let f = finished.clone();
            queue
                .store_async(item(), move |ok| { if ok { f.fetch_add(1, Ordering::SeqCst); } }, never_cancelled())
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.processed_count(), 2);
        assert_eq!(queue.failed_count(), 0);
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn respects_concurrency_cap() {
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let c1 = concurrent.clone();
        let m1 = max_seen.clone();
        let queue = QueuedAsyncStorage::spawn(1, move |_item| {
            let c = c1.clone();
            let m = m1.clone();
            async move {
                let now = c.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                c.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });
        for _ in 0..4 {
            queue.store_async(item(), |_ok| {}, never_cancelled()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(queue.processed_count(), 4);
    }

    #[tokio::test]
    async fn failed_store_is_counted_not_retried() {
        let queue = QueuedAsyncStorage::spawn(1, |_item| async {
            Err(crate::error::AgentError::Storage("boom".into()))
        });
        let finished_false = Arc::new(AtomicBool::new(false));
        let f = finished_false.clone();
        queue.store_async(item(), move |ok| f.store(!ok, Ordering::SeqCst), never_cancelled()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(queue.failed_count(), 1);
        assert_eq!(queue.processed_count(), 0);
        assert!(finished_false.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_item_never_runs_store() {
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        let queue = QueuedAsyncStorage::spawn(1, move |_item| {
            let r = r.clone();
            async move {
                r.store(true, Ordering::SeqCst);
                Ok(())
            }
        });
        queue.store_async(item(), |ok| assert!(!ok), || true).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finit_drains_queued_but_not_started_items() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let gate_store = gate.clone();
        let queue = QueuedAsyncStorage::spawn(1, move |_item| {
            let gate = gate_store.clone();
            async move {
                gate.notified().await;
                Ok(())
            }
        });
        // first task occupies the only worker slot, blocked on `gate`.
        queue.store_async(item(), |_ok| {}, never_cancelled()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let drained_false = Arc::new(AtomicBool::new(false));
        let d = drained_false.clone();
        queue.store_async(item(), move |ok| d.store(!ok, Ordering::SeqCst), never_cancelled()).unwrap();

        queue.finit();
        assert!(drained_false.load(Ordering::SeqCst));
        assert!(queue.store_async(item(), |_| {}, never_cancelled()).is_err());
        gate.notify_one();
    }
}
