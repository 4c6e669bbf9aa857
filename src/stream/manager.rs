//! Stream manager (component C6, spec §4.6), grounded on the original
//! agent's `stream_manager`: reference-counted live sinks, a recording
//! bitset per stream, lazy source start/stop, and the conservative
//! stop-ordering resolved for Open Question #1 (stop recording, then drain
//! live sinks, then check whether the source can be stopped).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{AgentError, Result};

use super::flags::RecordingMode;
use super::source::MediaSource;

#[derive(Default)]
struct StreamStatus {
    recording_mode: RecordingMode,
    recording_started: bool,
    live_sinks: u32,
    live_url: Option<String>,
    source_started: bool,
}

pub struct StreamManager {
    sources: Vec<Arc<dyn MediaSource>>,
    status: Mutex<HashMap<String, StreamStatus>>,
    recording_stream: Mutex<Option<String>>,
    live_stream: Mutex<Option<String>>,
    by_event_stream: Mutex<Option<String>>,
}

impl StreamManager {
    pub fn new(sources: Vec<Arc<dyn MediaSource>>) -> Self {
        let mut status = HashMap::new();
        let mut default_stream = None;
        for s in &sources {
            status.insert(s.cloud_name().to_string(), StreamStatus::default());
            if default_stream.is_none() {
                default_stream = Some(s.cloud_name().to_string());
            }
        }
        if sources.is_empty() {
            tracing::warn!("no media sources configured, stream manager is idle");
        }
        StreamManager {
            sources,
            status: Mutex::new(status),
            recording_stream: Mutex::new(default_stream.clone()),
            live_stream: Mutex::new(default_stream.clone()),
            by_event_stream: Mutex::new(default_stream),
        }
    }

    pub fn lookup(&self, stream_id: &str) -> Option<Arc<dyn MediaSource>> {
        self.sources.iter().find(|s| s.cloud_name() == stream_id).cloned()
    }

    pub fn stream_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.cloud_name().to_string()).collect()
    }

    /// Begin serving live view for `stream_id` at `url`. Reference-counted:
    /// a second concurrent viewer doesn't restart the sink, just bumps the
    /// count.
    pub fn start_live(&self, stream_id: &str, url: &str) -> Result<bool> {
        let source = self.lookup(stream_id).ok_or_else(|| AgentError::StreamNotFound(stream_id.to_string()))?;
        let mut status = self.status.lock();
        let entry = status.entry(stream_id.to_string()).or_default();

        if !entry.source_started {
            entry.source_started = source.start();
            if !entry.source_started {
                tracing::error!(stream_id, "unable to start media source for live");
                return Ok(false);
            }
        }

        let result = if entry.live_sinks == 0 {
            let ok = source.start_sink(url);
            if ok {
                entry.live_url = Some(url.to_string());
                *self.live_stream.lock() = Some(stream_id.to_string());
            }
            ok
        } else {
            true
        };

        if result {
            entry.live_sinks += 1;
        }
        Ok(result)
    }

    /// Release one live viewer. Returns `true` once the last viewer has
    /// dropped off (sink fully stopped).
    pub fn stop_live(&self, stream_id: &str) -> bool {
        let mut status = self.status.lock();
        let Some(entry) = status.get_mut(stream_id) else {
            return true;
        };
        if entry.live_sinks > 0 {
            entry.live_sinks -= 1;
            if entry.live_sinks == 0 {
                if let Some(source) = self.lookup(stream_id) {
                    source.stop_sink();
                }
                tracing::info!(stream_id, "live stopped, no sinks remain");
            }
        }
        entry.live_sinks == 0
    }

    /// Stop the underlying capture for `stream_id` unless something still
    /// needs it: live sinks, or recording that needs the live source.
    pub fn check_stop_media_source(&self, stream_id: &str) -> bool {
        let Some(source) = self.lookup(stream_id) else {
            return false;
        };
        let mut status = self.status.lock();
        let Some(entry) = status.get_mut(stream_id) else {
            return false;
        };

        let recording_needs_it = !entry.recording_mode.is_empty() && source.record_needs_source();

        if entry.live_sinks == 0 && !recording_needs_it && entry.source_started {
            tracing::debug!(stream_id, "no media consumers left, stopping source");
            entry.source_started = false;
            source.stop();
            true
        } else {
            false
        }
    }

    /// Start (or add a recording mode to) `stream_id`.
    pub fn start_recording(&self, stream_id: &str, mode: RecordingMode) -> Result<bool> {
        let source = self.lookup(stream_id).ok_or_else(|| AgentError::StreamNotFound(stream_id.to_string()))?;
        let mut status = self.status.lock();
        let entry = status.entry(stream_id.to_string()).or_default();

        if entry.recording_mode.is_empty() && !entry.recording_started {
            if !entry.source_started && source.record_needs_source() {
                entry.source_started = source.start();
                if !entry.source_started {
                    tracing::error!(stream_id, "unable to start media source for recording");
                    return Ok(false);
                }
            }
            entry.recording_started = source.start_record();
        }
        entry.recording_mode |= mode;
        *self.recording_stream.lock() = Some(stream_id.to_string());
        Ok(entry.recording_started)
    }

    /// Remove `mode` from `stream_id`'s recording bitset; only actually
    /// stops recording once no mode remains.
    pub fn stop_recording(&self, stream_id: &str, mode: RecordingMode) -> bool {
        let Some(source) = self.lookup(stream_id) else {
            return false;
        };
        let mut status = self.status.lock();
        let Some(entry) = status.get_mut(stream_id) else {
            return false;
        };

        if entry.recording_mode.intersects(mode) && entry.recording_started {
            entry.recording_mode -= mode;
            if entry.recording_mode.is_empty() {
                source.stop_record();
                entry.recording_started = false;
                if self.recording_stream.lock().as_deref() == Some(stream_id) {
                    *self.recording_stream.lock() = None;
                }
            }
        }
        !entry.recording_started
    }

    pub fn set_stream_for_by_event(&self, stream_id: &str) {
        if self.lookup(stream_id).is_some() {
            *self.by_event_stream.lock() = Some(stream_id.to_string());
        }
    }

    pub fn by_event_stream(&self) -> Option<String> {
        self.by_event_stream.lock().clone()
    }

    /// Tear everything down in the conservative order resolved for Open
    /// Question #1: stop recording first, then drain every live sink, then
    /// check whether each source can finally be stopped.
    pub fn stop_all_streams(&self) {
        let recording_stream = self.recording_stream.lock().clone();
        if let Some(stream_id) = recording_stream {
            let mode = self.status.lock().get(&stream_id).map(|s| s.recording_mode).unwrap_or(RecordingMode::NONE);
            self.stop_recording(&stream_id, mode);
        }

        for stream_id in self.stream_ids() {
            while !self.stop_live(&stream_id) {}
            self.check_stop_media_source(&stream_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::source::DemoSource;

    fn manager() -> StreamManager {
        StreamManager::new(vec![Arc::new(DemoSource::new("main")), Arc::new(DemoSource::new("sub"))])
    }

    #[test]
    fn unknown_stream_is_an_error() {
        let mgr = manager();
        assert!(mgr.start_live("nope", "rtsp://x").is_err());
    }

    #[test]
    fn concurrent_live_viewers_share_one_sink_start() {
        let mgr = manager();
        assert!(mgr.start_live("main", "rtsp://a").unwrap());
        assert!(mgr.start_live("main", "rtsp://a").unwrap());
        // second viewer drops first...
        assert!(!mgr.stop_live("main"));
        // ...then the last one actually stops the sink.
        assert!(mgr.stop_live("main"));
    }

    #[test]
    fn source_stays_up_while_recording_needs_it() {
        let mgr = manager();
        mgr.start_live("main", "rtsp://a").unwrap();
        mgr.start_recording("main", RecordingMode::LOCAL).unwrap();
        mgr.stop_live("main");
        assert!(!mgr.check_stop_media_source("main"));
        mgr.stop_recording("main", RecordingMode::LOCAL);
        assert!(mgr.check_stop_media_source("main"));
    }

    #[test]
    fn recording_alone_starts_the_source_when_it_needs_one() {
        let mgr = manager();
        mgr.start_recording("main", RecordingMode::LOCAL).unwrap();
        assert!(!mgr.check_stop_media_source("main"));
        mgr.stop_recording("main", RecordingMode::LOCAL);
        assert!(mgr.check_stop_media_source("main"));
    }

    #[test]
    fn recording_modes_are_independent_until_both_clear() {
        let mgr = manager();
        mgr.start_recording("main", RecordingMode::LOCAL).unwrap();
        mgr.start_recording("main", RecordingMode::LOCAL_BY_EVENT).unwrap();
        assert!(!mgr.stop_recording("main", RecordingMode::LOCAL));
        assert!(mgr.stop_recording("main", RecordingMode::LOCAL_BY_EVENT));
    }

    #[test]
    fn stop_all_streams_drains_in_conservative_order() {
        let mgr = manager();
        mgr.start_live("main", "rtsp://a").unwrap();
        mgr.start_recording("main", RecordingMode::LOCAL).unwrap();
        mgr.stop_all_streams();
        assert!(mgr.check_stop_media_source("main") == false);
    }
}
