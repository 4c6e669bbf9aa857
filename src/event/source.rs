//! Event stream producer abstraction (spec §4.5, ambient stack addition):
//! the façade polls each configured [`EventSource`] on its own task and
//! forwards what it yields into [`super::manager::EventManager::report`],
//! mirroring how [`crate::stream::MediaSource`] decouples the stream manager
//! from any concrete capture backend.

use async_trait::async_trait;

use crate::wire::payloads::EventConfigWire;

/// One occurrence yielded by an [`EventSource`]: either a one-shot trigger
/// or a stateful start/stop edge, depending on how the event is configured
/// in `set_cam_events`.
pub struct EventOccurrence {
    pub event: String,
    pub custom_name: Option<String>,
    pub occurring: bool,
    pub meta: Option<serde_json::Value>,
}

impl EventOccurrence {
    pub fn new(event: impl Into<String>, occurring: bool) -> Self {
        EventOccurrence {
            event: event.into(),
            custom_name: None,
            occurring,
            meta: None,
        }
    }
}

/// A producer of local event occurrences (motion detector, tamper sensor,
/// ...). `next` is polled in a loop by its own task; returning `None`
/// retires the source.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &str;

    async fn next(&self) -> Option<EventOccurrence>;

    /// The `(event_type, custom_name)` configs this source owns and the
    /// manager should attribute to it when a cloud push arrives (spec
    /// §4.5: "split it by event source"). A source that owns nothing
    /// (e.g. a pure occurrence relay with no configuration surface of its
    /// own) returns an empty vec; those event keys are then managed
    /// centrally instead.
    fn get_events(&self) -> Vec<EventConfigWire> {
        Vec::new()
    }

    /// Accept a cloud-pushed subset of this source's own configs. `caps`
    /// must stay stable across calls (spec §4.5); returning `false` keeps
    /// the source's prior behavior, though the cloud-facing config the
    /// manager echoes back still reflects the push.
    fn set_events(&self, _configs: Vec<EventConfigWire>) -> bool {
        true
    }
}

/// In-process source used by the reference agent binary and tests: emits
/// nothing on its own, only what's pushed onto it, useful for driving the
/// façade from a demo/CLI loop.
pub struct ManualEventSource {
    name: String,
    rx: tokio::sync::Mutex<tokio::sync::mpsc::Receiver<EventOccurrence>>,
}

impl ManualEventSource {
    pub fn new(name: impl Into<String>) -> (Self, tokio::sync::mpsc::Sender<EventOccurrence>) {
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        (
            ManualEventSource {
                name: name.into(),
                rx: tokio::sync::Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl EventSource for ManualEventSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&self) -> Option<EventOccurrence> {
        self.rx.lock().await.recv().await
    }
}
