//! Timed-callback scheduler used for ack timeouts and the event continuation
//! ticker (spec §4.4). Handles are stable: canceling twice, or canceling from
//! inside the callback itself, is a no-op rather than a panic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// A simple per-handle delayed-task scheduler backed by `tokio::spawn` +
/// `tokio::time::sleep`. Cancellation is cooperative: the scheduled task
/// checks `cancelled` right before running the callback.
#[derive(Clone, Default)]
pub struct TimerWheel {
    cancelled: Arc<Mutex<std::collections::HashSet<TimerHandle>>>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` to run after `delay`. Returns a handle that can be
    /// passed to [`TimerWheel::cancel`] any time before it fires.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = TimerHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        let cancelled = self.cancelled.clone();
        let task_handle = handle;
        let join: JoinHandle<()> = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let fire = {
                let mut set = cancelled.lock();
                !set.remove(&task_handle)
            };
            if fire {
                callback();
            }
        });
        // the task owns cancellation detection; join handle itself is not needed
        // by callers, dropping it lets the task keep running detached.
        drop(join);
        handle
    }

    /// Cancel a previously scheduled callback. Idempotent: canceling an
    /// already-fired or already-cancelled handle is a no-op.
    pub fn cancel(&self, handle: TimerHandle) {
        self.cancelled.lock().insert(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn fires_after_delay() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        wheel.schedule(Duration::from_millis(10), move || {
            fired2.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_before_fire_suppresses_callback() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let handle = wheel.schedule(Duration::from_millis(30), move || {
            fired2.store(true, Ordering::SeqCst);
        });
        wheel.cancel(handle);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn double_cancel_is_not_an_error() {
        let wheel = TimerWheel::new();
        let handle = wheel.schedule(Duration::from_secs(5), || {});
        wheel.cancel(handle);
        wheel.cancel(handle);
    }
}
