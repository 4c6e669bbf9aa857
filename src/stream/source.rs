//! Media source abstraction (spec §4.6). A concrete camera/media backend
//! implements this; the stream manager only ever talks to the trait.

/// One physical or logical media source (an RTSP/ONVIF feed, a demo
/// generator, ...). Methods mirror the operations the stream manager drives:
/// starting/stopping the underlying capture, a live-view sink, and local
/// recording, independently of each other.
pub trait MediaSource: Send + Sync {
    fn cloud_name(&self) -> &str;

    /// Start the underlying capture. Idempotent from the caller's
    /// perspective: the manager only calls this when it believes the source
    /// isn't already running.
    fn start(&self) -> bool;
    fn stop(&self);

    /// Start/stop pushing frames to a live-view sink at `url`.
    fn start_sink(&self, url: &str) -> bool;
    fn stop_sink(&self);

    fn start_record(&self) -> bool;
    fn stop_record(&self);

    /// Whether local recording needs the capture source running (false for
    /// sources that record independently of the live pipeline).
    fn record_needs_source(&self) -> bool {
        true
    }
}

/// In-process media source used by the reference agent binary and tests: it
/// does not touch any real device, just tracks call counts.
pub struct DemoSource {
    name: String,
    started: std::sync::atomic::AtomicBool,
}

impl DemoSource {
    pub fn new(name: impl Into<String>) -> Self {
        DemoSource {
            name: name.into(),
            started: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl MediaSource for DemoSource {
    fn cloud_name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> bool {
        self.started.store(true, std::sync::atomic::Ordering::SeqCst);
        true
    }

    fn stop(&self) {
        self.started.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    fn start_sink(&self, _url: &str) -> bool {
        true
    }

    fn stop_sink(&self) {}

    fn start_record(&self) -> bool {
        true
    }

    fn stop_record(&self) {}
}
