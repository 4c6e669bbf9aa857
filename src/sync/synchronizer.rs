//! Timeline synchronizer (component C8, spec §4.8): maps local recorded
//! segments into remote upload slots, with category-specific concurrency
//! pools, capped-exponential retry, a lateness-drop policy, and cooperative
//! cancellation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::storage::{Item, Period, TimedStorage};
use crate::transport::HttpClient;
use crate::wire::enums::{SyncStatus, UploadCategory};

use super::slot::{is_wholly_covered, RemoteSlotProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncHandle(Uuid);

pub type StatusCallback = Arc<dyn Fn(SyncStatus, Option<i32>) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct TimelineSyncConfig {
    pub max_concurrent_video_uploads: usize,
    pub max_concurrent_snapshot_uploads: usize,
    pub max_queue_lateness: Duration,
    pub retry_initial: Duration,
    pub retry_max: Duration,
}

impl Default for TimelineSyncConfig {
    fn default() -> Self {
        TimelineSyncConfig {
            max_concurrent_video_uploads: 2,
            max_concurrent_snapshot_uploads: 4,
            max_queue_lateness: Duration::from_secs(300),
            retry_initial: Duration::from_millis(500),
            retry_max: Duration::from_secs(30),
        }
    }
}

struct Window {
    begin: DateTime<Utc>,
    /// `None` means event-driven and still open; the worker polls for new
    /// segments until `sync_on_event_stop` pins an end.
    end: Option<DateTime<Utc>>,
}

struct RequestState {
    stream_id: String,
    category: UploadCategory,
    window: Mutex<Window>,
    cancelled: Arc<AtomicBool>,
    finished: AtomicBool,
    status_cb: StatusCallback,
}

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct TimelineSynchronizer {
    local: Arc<dyn TimedStorage>,
    slots: Arc<dyn RemoteSlotProvider>,
    http: HttpClient,
    config: TimelineSyncConfig,
    video_pool: Arc<Semaphore>,
    snapshot_pool: Arc<Semaphore>,
    requests: Mutex<HashMap<Uuid, Arc<RequestState>>>,
}

impl TimelineSynchronizer {
    pub fn new(
        local: Arc<dyn TimedStorage>,
        slots: Arc<dyn RemoteSlotProvider>,
        http: HttpClient,
        config: TimelineSyncConfig,
    ) -> Arc<Self> {
        Arc::new(TimelineSynchronizer {
            video_pool: Arc::new(Semaphore::new(config.max_concurrent_video_uploads)),
            snapshot_pool: Arc::new(Semaphore::new(config.max_concurrent_snapshot_uploads)),
            local,
            slots,
            http,
            config,
            requests: Mutex::new(HashMap::new()),
        })
    }

    fn pool_for(&self, category: UploadCategory) -> Arc<Semaphore> {
        match category {
            UploadCategory::Snapshot => self.snapshot_pool.clone(),
            _ => self.video_pool.clone(),
        }
    }

    /// Start synchronizing `stream_id`/`category` over `[begin, end]`.
    /// `end = None` runs in event-driven mode: open-ended until
    /// [`TimelineSynchronizer::stop_event`] pins a final bound.
    pub fn sync(
        self: &Arc<Self>,
        stream_id: impl Into<String>,
        category: UploadCategory,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        status_cb: StatusCallback,
    ) -> SyncHandle {
        let id = Uuid::new_v4();
        let state = Arc::new(RequestState {
            stream_id: stream_id.into(),
            category,
            window: Mutex::new(Window { begin, end }),
            cancelled: Arc::new(AtomicBool::new(false)),
            finished: AtomicBool::new(false),
            status_cb,
        });
        self.requests.lock().insert(id, state.clone());

        let this = self.clone();
        tokio::spawn(async move {
            this.run_request(id, state).await;
        });

        SyncHandle(id)
    }

    /// `t - pre_record` start of an event-triggered sync.
    pub fn sync_on_event_start(
        self: &Arc<Self>,
        stream_id: impl Into<String>,
        category: UploadCategory,
        t: DateTime<Utc>,
        pre_record: Duration,
        status_cb: StatusCallback,
    ) -> SyncHandle {
        self.sync(stream_id, category, t - chrono::Duration::from_std(pre_record).unwrap_or_default(), None, status_cb)
    }

    /// Extend the window to `t + post_record` and let it run to completion.
    pub fn sync_on_event_stop(&self, handle: SyncHandle, t: DateTime<Utc>, post_record: Duration) {
        if let Some(state) = self.requests.lock().get(&handle.0).cloned() {
            if state.finished.load(Ordering::SeqCst) {
                return;
            }
            state.window.lock().end = Some(t + chrono::Duration::from_std(post_record).unwrap_or_default());
        }
    }

    /// A continuation tick for an ongoing event; never re-arms a finished
    /// request.
    pub fn sync_on_event_continue(&self, handle: SyncHandle, t: DateTime<Utc>) {
        if let Some(state) = self.requests.lock().get(&handle.0).cloned() {
            if state.finished.load(Ordering::SeqCst) {
                return;
            }
            let mut window = state.window.lock();
            if let Some(end) = window.end {
                if t > end {
                    window.end = Some(t);
                }
            }
        }
    }

    pub fn cancel(&self, handle: SyncHandle) {
        if let Some(state) = self.requests.lock().get(&handle.0) {
            state.cancelled.store(true, Ordering::SeqCst);
        }
    }

    async fn run_request(self: Arc<Self>, id: Uuid, state: Arc<RequestState>) {
        let mut done: HashSet<Period> = HashSet::new();
        let pool = self.pool_for(state.category);

        loop {
            if state.cancelled.load(Ordering::SeqCst) {
                (state.status_cb)(SyncStatus::Canceled, None);
                break;
            }

            let (begin, end) = {
                let w = state.window.lock();
                (w.begin, w.end.unwrap_or_else(Utc::now))
            };

            let segments = match self.local.list(begin, end).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(error = %e, "timeline synchronizer: local list failed");
                    (state.status_cb)(SyncStatus::Error, None);
                    break;
                }
            };

            let total = segments.len().max(1);
            let mut had_error = false;

            for (idx, item) in segments.into_iter().enumerate() {
                if done.contains(&item.period) {
                    continue;
                }
                if state.cancelled.load(Ordering::SeqCst) {
                    break;
                }

                let coverage = self.slots.coverage(&state.stream_id, state.category, item.period).await.unwrap_or_default();
                if is_wholly_covered(item.period, &coverage) {
                    done.insert(item.period);
                    continue;
                }

                // The lateness clock starts here, at discovery, not once a
                // concurrency permit is free -- a busy pool must not let an
                // item wait past its own deadline unnoticed.
                let discovered_at = Utc::now();
                let permit = match tokio::time::timeout(self.config.max_queue_lateness, pool.clone().acquire_owned()).await {
                    Ok(acquired) => acquired.expect("pool semaphore not closed"),
                    Err(_) => {
                        tracing::warn!(stream_id = %state.stream_id, "segment dropped: exceeded max queue lateness waiting for an upload slot");
                        done.insert(item.period);
                        had_error = true;
                        continue;
                    }
                };
                let outcome = self.transfer_with_retry(&state, item, discovered_at).await;
                drop(permit);

                match outcome {
                    Ok(period) => {
                        done.insert(period);
                        let progress = ((idx + 1) * 100 / total) as i32;
                        (state.status_cb)(SyncStatus::Pending, Some(progress));
                    }
                    Err(TransferOutcome::TooManyRequests) => {
                        (state.status_cb)(SyncStatus::TooManyRequests, None);
                        had_error = true;
                    }
                    Err(TransferOutcome::Fatal) => {
                        had_error = true;
                    }
                }
            }

            let window_is_closed = state.window.lock().end.is_some();
            let nothing_left = window_is_closed
                && self
                    .local
                    .list(begin, state.window.lock().end.unwrap())
                    .await
                    .map(|items| items.iter().all(|i| done.contains(&i.period)))
                    .unwrap_or(true);

            if state.cancelled.load(Ordering::SeqCst) {
                (state.status_cb)(SyncStatus::Canceled, None);
                break;
            }

            if window_is_closed && nothing_left {
                (state.status_cb)(if had_error { SyncStatus::Error } else { SyncStatus::Done }, Some(100));
                break;
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        state.finished.store(true, Ordering::SeqCst);
        self.requests.lock().remove(&id);
    }

    async fn transfer_with_retry(&self, state: &RequestState, item: Item, discovered_at: DateTime<Utc>) -> Result<Period, TransferOutcome> {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.retry_initial,
            max_interval: self.config.retry_max,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        loop {
            if state.cancelled.load(Ordering::SeqCst) {
                return Err(TransferOutcome::Fatal);
            }

            if Utc::now().signed_duration_since(discovered_at).to_std().unwrap_or_default() > self.config.max_queue_lateness {
                tracing::warn!(stream_id = %state.stream_id, "segment dropped: exceeded max queue lateness");
                return Err(TransferOutcome::Fatal);
            }

            match self.transfer_once(state, &item).await {
                Ok(()) => return Ok(item.period),
                Err(TransferOutcome::Fatal) => return Err(TransferOutcome::Fatal),
                Err(TransferOutcome::TooManyRequests) => {
                    let delay = backoff.next_backoff().unwrap_or(self.config.retry_max);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn transfer_once(&self, state: &RequestState, item: &Item) -> std::result::Result<(), TransferOutcome> {
        let mut loaded = item.clone();
        self.local.load(&mut loaded).await.map_err(|_| TransferOutcome::Fatal)?;

        let size = loaded.data.len() as u64;
        let slot = self
            .slots
            .request_slot(&state.stream_id, state.category, item.period, size)
            .await
            .map_err(|_| TransferOutcome::TooManyRequests)?;

        self.http.put_checked(&slot.url, &slot.headers, loaded.data).await.map_err(|e| {
            if e.is_fatal() {
                TransferOutcome::Fatal
            } else {
                TransferOutcome::TooManyRequests
            }
        })?;

        self.slots.confirm(state.category, &slot.url).await.map_err(|_| TransferOutcome::TooManyRequests)?;
        Ok(())
    }
}

enum TransferOutcome {
    Fatal,
    TooManyRequests,
}
