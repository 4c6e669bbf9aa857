//! Event manager (component C5, spec §4.4/§4.5).
//!
//! Aggregates configured event sources, merges cloud-pushed config
//! (`set_cam_events`), and fans local occurrences out to each event's
//! [`EventStateMachine`]. Also wires each stateful/snapshot-capable event's
//! transitions into the stream manager, the timeline synchronizer, and
//! [`crate::agent::AgentCallback::get_snapshot`], per the recording/snapshot
//! coupling described in spec §4.5:
//!
//! - `started(t)` for an event with `stream ∧ caps.stream`: adds
//!   `RecordingMode::LOCAL_BY_EVENT` to the event's target stream and opens a
//!   synchronizer window from `t - period`.
//! - `stopped(t)`: closes the window at `t + period` and removes the
//!   recording mode.
//! - every `ongoing(t)` tick (stateful) or the single `triggered(t)`
//!   (stateless) with `snapshot ∧ caps.snapshot`: captures and enqueues a
//!   snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::agent::callback::AgentCallback;
use crate::error::{AgentError, Result};
use crate::protocol::ProtocolHandle;
use crate::storage::{Item, Period, QueuedAsyncStorage};
use crate::stream::{RecordingMode, StreamManager};
use crate::sync::{SyncHandle, TimelineSynchronizer};
use crate::transport::TimerWheel;
use crate::wire::enums::{MediaType, UploadCategory};
use crate::wire::payloads::EventConfigWire;

use super::source::EventSource;
use super::state_machine::{EventHooks, EventStateMachine};

use crate::config::RecordingDefaults;

/// Owns every configured event's state machine, keyed by event name (or
/// `event:custom_name` for custom events, which may repeat with distinct
/// names).
pub struct EventManager {
    protocol: ProtocolHandle,
    timers: TimerWheel,
    streams: Arc<StreamManager>,
    sync: Arc<TimelineSynchronizer>,
    callback: Arc<dyn AgentCallback>,
    snapshots: Option<Arc<QueuedAsyncStorage>>,
    continuation_snapshot_enabled: bool,
    recording: RecordingDefaults,
    /// The event sources this manager was built with, plus a static
    /// `event key -> source index` map built once from each source's
    /// `get_events()` at construction (spec §4.5: "split it by event
    /// source"). Keys no source declared are managed centrally.
    sources: Vec<Arc<dyn EventSource>>,
    ownership: HashMap<String, usize>,
    machines: RwLock<HashMap<String, Arc<EventStateMachine>>>,
    /// The configs actually driving `machines` — only updated for a
    /// source's keys when that source's `set_events` accepts the push.
    active: RwLock<HashMap<String, EventConfigWire>>,
    /// What the cloud last pushed, verbatim; always echoed back by
    /// `current_config()` regardless of whether an owning source accepted
    /// it (spec §4.5: "the manager retains the cloud-acknowledged view").
    cloud_view: RwLock<HashMap<String, EventConfigWire>>,
    sync_handles: Arc<Mutex<HashMap<String, SyncHandle>>>,
}

fn key(config: &EventConfigWire) -> String {
    match &config.custom_name {
        Some(name) => format!("{}:{name}", config.event),
        None => config.event.clone(),
    }
}

impl EventManager {
    pub fn new(
        protocol: ProtocolHandle,
        timers: TimerWheel,
        streams: Arc<StreamManager>,
        sync: Arc<TimelineSynchronizer>,
        callback: Arc<dyn AgentCallback>,
        snapshots: Option<Arc<QueuedAsyncStorage>>,
        continuation_snapshot_enabled: bool,
        recording: RecordingDefaults,
        sources: Vec<Arc<dyn EventSource>>,
    ) -> Self {
        let mut ownership = HashMap::new();
        for (idx, source) in sources.iter().enumerate() {
            for cfg in source.get_events() {
                ownership.insert(key(&cfg), idx);
            }
        }

        EventManager {
            protocol,
            timers,
            streams,
            sync,
            callback,
            snapshots,
            continuation_snapshot_enabled,
            recording,
            sources,
            ownership,
            machines: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
            cloud_view: RwLock::new(HashMap::new()),
            sync_handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Apply a `set_cam_events` push from the cloud: split the active
    /// subset by owning source and let each source accept or reject its
    /// own slice (spec §4.5). A source rejecting its slice keeps running
    /// its prior config untouched; the cloud-facing view is updated
    /// regardless, so a later `get_cam_events` still echoes the push.
    /// Configs with `active=false`, and keys dropped entirely from the
    /// push, are torn down (their state machine force-stops via `Drop`)
    /// unless they belong to a source that just rejected the change.
    pub fn apply_config(&self, configs: Vec<EventConfigWire>) {
        *self.cloud_view.write() = configs.iter().map(|c| (key(c), c.clone())).collect();

        let mut incoming_by_owner: HashMap<Option<usize>, Vec<EventConfigWire>> = HashMap::new();
        for cfg in configs.into_iter().filter(|c| c.active) {
            let owner = self.ownership.get(&key(&cfg)).copied();
            incoming_by_owner.entry(owner).or_default().push(cfg);
        }

        let mut machines = self.machines.write();
        let mut active = self.active.write();

        let mut owners: std::collections::HashSet<Option<usize>> = incoming_by_owner.keys().copied().collect();
        for k in active.keys() {
            owners.insert(self.ownership.get(k).copied());
        }

        for owner in owners {
            let subset = incoming_by_owner.remove(&owner).unwrap_or_default();
            let accepted = match owner {
                Some(idx) => self.sources[idx].set_events(subset.clone()),
                None => true,
            };
            if !accepted {
                let source_name = owner.and_then(|i| self.sources.get(i)).map(|s| s.name()).unwrap_or("<unowned>");
                tracing::warn!(source = source_name, "event source rejected pushed config, keeping prior behavior");
                continue;
            }

            let subset_keys: std::collections::HashSet<String> = subset.iter().map(key).collect();
            let stale: Vec<String> = active
                .iter()
                .filter(|(k, _)| self.ownership.get(*k).copied() == owner && !subset_keys.contains(*k))
                .map(|(k, _)| k.clone())
                .collect();
            for k in stale {
                active.remove(&k);
                machines.remove(&k);
            }

            for config in subset {
                let k = key(&config);
                let needs_rebuild = active.get(&k) != Some(&config);
                if needs_rebuild {
                    let hooks = self.build_hooks(&config, k.clone());
                    let machine = EventStateMachine::new(&config, self.protocol.clone(), self.timers.clone(), hooks);
                    machines.insert(k.clone(), Arc::new(machine));
                    active.insert(k, config);
                }
            }
        }
    }

    /// Current cloud-acknowledged configuration, for `cam_events_conf`
    /// replies — always mirrors the last `set_cam_events` push, independent
    /// of whether an owning source accepted it.
    pub fn current_config(&self) -> Vec<EventConfigWire> {
        self.cloud_view.read().values().cloned().collect()
    }

    fn machine_for(&self, event: &str, custom_name: Option<&str>) -> Option<Arc<EventStateMachine>> {
        let k = match custom_name {
            Some(name) => format!("{event}:{name}"),
            None => event.to_string(),
        };
        self.machines.read().get(&k).cloned()
    }

    /// Report a local occurrence of `event` (e.g. a motion-detection hit).
    /// Dispatches to `trigger` or `start`/`stop` depending on the event's
    /// configured statefulness.
    pub async fn report(
        &self,
        event: &str,
        custom_name: Option<&str>,
        occurring: bool,
        meta: Option<serde_json::Value>,
    ) -> Result<()> {
        let machine = self
            .machine_for(event, custom_name)
            .ok_or_else(|| AgentError::InvalidPayload {
                cmd: "cam_trigger_event".into(),
                reason: format!("event '{event}' is not configured/active"),
            })?;

        if machine.is_stateful() {
            if occurring {
                machine.start(meta).await
            } else {
                machine.stop(meta).await
            }
        } else {
            machine.trigger(meta).await
        }
    }

    /// Build the started/stopped/payload hooks for `config`, or `None` if it
    /// needs neither recording nor a snapshot (a plain wire-only event).
    fn build_hooks(&self, config: &EventConfigWire, key: String) -> Option<EventHooks> {
        let wants_recording = config.stream && config.caps.stream;
        let wants_snapshot = config.snapshot && config.caps.snapshot;
        if !wants_recording && !wants_snapshot {
            return None;
        }

        let pre_margin = Duration::from_secs(config.period.unwrap_or(self.recording.preroll_secs) as u64);
        let post_margin = Duration::from_secs(config.period.unwrap_or(self.recording.postroll_secs) as u64);
        let stream_id = self.streams.by_event_stream();

        let on_started: Arc<dyn Fn(DateTime<Utc>) + Send + Sync> = match (wants_recording, &stream_id) {
            (true, Some(stream_id)) => {
                let streams = self.streams.clone();
                let sync = self.sync.clone();
                let handles = self.sync_handles.clone();
                let stream_id = stream_id.clone();
                let key = key.clone();
                Arc::new(move |t: DateTime<Utc>| {
                    if let Err(e) = streams.start_recording(&stream_id, RecordingMode::LOCAL_BY_EVENT) {
                        tracing::warn!(error = %e, stream_id, "event-driven recording failed to start");
                        return;
                    }
                    let key = key.clone();
                    let handles = handles.clone();
                    let status_cb: crate::sync::synchronizer::StatusCallback = Arc::new(|status, progress| {
                        tracing::debug!(?status, progress, "event recording sync progress");
                    });
                    let handle = sync.sync_on_event_start(stream_id.clone(), UploadCategory::Record, t, pre_margin, status_cb);
                    handles.lock().insert(key, handle);
                })
            }
            _ => Arc::new(|_t| {}),
        };

        let on_stopped: Arc<dyn Fn(DateTime<Utc>) + Send + Sync> = match (wants_recording, &stream_id) {
            (true, Some(stream_id)) => {
                let streams = self.streams.clone();
                let sync = self.sync.clone();
                let handles = self.sync_handles.clone();
                let stream_id = stream_id.clone();
                let key = key.clone();
                Arc::new(move |t: DateTime<Utc>| {
                    if let Some(handle) = handles.lock().remove(&key) {
                        sync.sync_on_event_stop(handle, t, post_margin);
                    }
                    streams.stop_recording(&stream_id, RecordingMode::LOCAL_BY_EVENT);
                })
            }
            _ => Arc::new(|_t| {}),
        };

        let on_payload: Arc<dyn Fn(DateTime<Utc>, bool) + Send + Sync> = if wants_snapshot {
            let callback = self.callback.clone();
            let snapshots = self.snapshots.clone();
            let stream_id = stream_id.clone().unwrap_or_default();
            let continuation_snapshot_enabled = self.continuation_snapshot_enabled;
            Arc::new(move |t: DateTime<Utc>, is_continuation: bool| {
                if is_continuation && !continuation_snapshot_enabled {
                    return;
                }
                let callback = callback.clone();
                let snapshots = snapshots.clone();
                let stream_id = stream_id.clone();
                tokio::spawn(async move {
                    let bytes = match callback.get_snapshot(&stream_id).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::warn!(error = %e, stream_id, "event snapshot capture failed");
                            return;
                        }
                    };
                    let Some(snapshots) = snapshots else {
                        tracing::debug!(stream_id, "no snapshot storage configured, dropping capture");
                        return;
                    };
                    let period = Period::new(t, t + chrono::Duration::milliseconds(1));
                    let mut item = Item::new(period, stream_id, UploadCategory::Snapshot, MediaType::Jpg);
                    item.data = bytes;
                    if let Err(e) = snapshots.store_async(item, |_ok| {}, || false) {
                        tracing::warn!(error = %e, "failed to enqueue event snapshot");
                    }
                });
            })
        } else {
            Arc::new(|_t, _is_continuation| {})
        };

        Some(EventHooks { on_started, on_stopped, on_payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::callback::NullCallback;
    use crate::sync::TimelineSyncConfig;
    use crate::wire::payloads::EventCapsWire;

    fn config(event: &str, stateful: bool) -> EventConfigWire {
        EventConfigWire {
            event: event.to_string(),
            custom_name: None,
            active: true,
            snapshot: false,
            period: None,
            stream: false,
            caps: EventCapsWire {
                stateful,
                stream: false,
                snapshot: false,
                trigger: true,
                periodic: false,
                state_emulation_report_delay: 5,
            },
        }
    }

    fn test_manager() -> EventManager {
        test_manager_with_sources(Vec::new())
    }

    fn test_manager_with_sources(sources: Vec<Arc<dyn EventSource>>) -> EventManager {
        use crate::config::*;
        let cfg = AgentConfig {
            device: DeviceConfig {
                uuid: "u".into(),
                brand: "b".into(),
                model: "m".into(),
                sn: "s".into(),
                version: "1".into(),
                device_type: "camera".into(),
            },
            cloud: CloudConfig {
                control_url: "wss://127.0.0.1:1/ws".parse().unwrap(),
                vendor: "v".into(),
                access_token: AccessTokenConfig::Static { token: "t".into() },
                tz: "UTC".into(),
                raw_messaging: false,
            },
            transport: TransportConfig::default(),
            recording: RecordingDefaults::default(),
            upload: UploadConfig::default(),
            streams: vec![],
        };
        let (protocol, _inbound, _task) =
            crate::protocol::spawn(cfg, crate::protocol::EngineOptions::default());
        let streams = Arc::new(StreamManager::new(vec![]));
        let local = Arc::new(crate::storage::InMemoryStorage::new());
        let slots = Arc::new(NullSlotProvider);
        let http = crate::transport::HttpClient::new(&crate::config::TransportConfig::default()).unwrap();
        let sync = TimelineSynchronizer::new(local, slots, http, TimelineSyncConfig::default());
        EventManager::new(
            protocol,
            TimerWheel::new(),
            streams,
            sync,
            Arc::new(NullCallback),
            None,
            true,
            RecordingDefaults::default(),
            sources,
        )
    }

    /// A source owning a single event key whose `set_events` can be made
    /// to reject a push, to exercise the rejection half of `apply_config`.
    struct PickySource {
        accept: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl EventSource for PickySource {
        fn name(&self) -> &str {
            "picky"
        }

        async fn next(&self) -> Option<crate::event::source::EventOccurrence> {
            std::future::pending().await
        }

        fn get_events(&self) -> Vec<EventConfigWire> {
            vec![config("tampering", false)]
        }

        fn set_events(&self, _configs: Vec<EventConfigWire>) -> bool {
            self.accept.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    struct NullSlotProvider;

    #[async_trait::async_trait]
    impl crate::sync::RemoteSlotProvider for NullSlotProvider {
        async fn coverage(&self, _stream_id: &str, _category: UploadCategory, _period: Period) -> Result<Vec<Period>> {
            Ok(Vec::new())
        }
        async fn request_slot(
            &self,
            _stream_id: &str,
            _category: UploadCategory,
            _period: Period,
            _size_bytes: u64,
        ) -> Result<crate::sync::UploadSlot> {
            Err(AgentError::NotSupported)
        }
        async fn confirm(&self, _category: UploadCategory, _url: &url::Url) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn reporting_unconfigured_event_is_an_error() {
        let mgr = test_manager();
        let err = mgr.report("motion", None, true, None).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn apply_config_then_report_succeeds() {
        let mgr = test_manager();
        mgr.apply_config(vec![config("motion", true)]);
        mgr.report("motion", None, true, None).await.unwrap();
        mgr.report("motion", None, false, None).await.unwrap();
    }

    #[tokio::test]
    async fn dropping_event_from_config_removes_its_machine() {
        let mgr = test_manager();
        mgr.apply_config(vec![config("motion", false)]);
        mgr.apply_config(vec![config("tampering", false)]);
        let err = mgr.report("motion", None, true, None).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidPayload { .. }));
        mgr.report("tampering", None, true, None).await.unwrap();
    }

    #[tokio::test]
    async fn rejecting_source_keeps_prior_config_but_cloud_view_still_echoes_push() {
        let picky = Arc::new(PickySource { accept: std::sync::atomic::AtomicBool::new(true) });
        let mgr = test_manager_with_sources(vec![picky.clone() as Arc<dyn EventSource>]);

        mgr.apply_config(vec![config("tampering", false)]);
        mgr.report("tampering", None, true, None).await.unwrap();

        picky.accept.store(false, std::sync::atomic::Ordering::SeqCst);
        let mut rejected = config("tampering", false);
        rejected.snapshot = true;
        mgr.apply_config(vec![rejected.clone()]);

        // the source refused the new config, so the old machine (built from
        // the non-snapshot config) is still the one driving reports.
        mgr.report("tampering", None, true, None).await.unwrap();

        // but the cloud-facing view reflects what was actually pushed.
        let echoed = mgr.current_config();
        assert_eq!(echoed.len(), 1);
        assert!(echoed[0].snapshot);
    }
}
