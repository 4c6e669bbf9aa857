//! Embedder callback interface (component C9, spec §4.9).
//!
//! A single flat trait rather than a class hierarchy (spec §9 redesign
//! note): every hook has a default body. Notification hooks (`on_bye`,
//! `on_registered`, the raw-message connect/disconnect pair) default to a
//! no-op; every get/set/action hook defaults to `Err(AgentError::NotSupported)`,
//! which the façade turns into `done{NOT_SUPPORTED}` on the wire without the
//! embedder having to implement a method it doesn't care about.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AgentError, Result};
use crate::wire::enums::ByeReason;
use crate::wire::payloads::{
    CamAudioConf, CamPtz, CamPtzConf, CamPtzPreset, CamStatus, CamVideoConf, MotionDetectionConf,
    AudioDetectionConf, OsdConf, SetAudioDetection, SetMotionDetection, StreamCaps, StreamConfig,
    TimelineSegmentWire, WifiNetworkWire,
};

#[async_trait]
pub trait AgentCallback: Send + Sync {
    /// The control channel went down for a terminal reason; `reason.recovery()`
    /// tells the embedder whether the session is gone for good.
    async fn on_bye(&self, _reason: ByeReason) {}

    /// A new (or resumed) session id was assigned; already persisted by the
    /// time this fires.
    async fn on_registered(&self, _sid: String) {}

    /// A raw passthrough message arrived for `client_id`. Returning `Ok(data)`
    /// replies with that data; `Err` replies `done{NOT_SUPPORTED|CM_ERROR}`.
    async fn on_raw_msg(&self, _client_id: &str, _data: &str) -> Result<String> {
        Err(AgentError::NotSupported)
    }

    async fn on_raw_msg_client_connected(&self, _client_id: &str) {}
    async fn on_raw_msg_client_disconnected(&self, _client_id: &str) {}

    /// Produce the device's log as a single blob; the façade pushes it out
    /// through a direct-upload slot (`file_meta` category).
    async fn get_log(&self) -> Result<Vec<u8>> {
        Err(AgentError::NotSupported)
    }

    async fn get_cam_status(&self) -> Result<CamStatus> {
        Err(AgentError::NotSupported)
    }

    /// Capture a still for `stream_id`. Invoked by the event manager when a
    /// stateful event ticks or a stateless one triggers with `caps.snapshot
    /// ∧ cfg.snapshot` set (spec §4.5).
    async fn get_snapshot(&self, _stream_id: &str) -> Result<Vec<u8>> {
        Err(AgentError::NotSupported)
    }

    async fn get_stream_caps(&self, _stream_id: &str) -> Result<StreamCaps> {
        Err(AgentError::NotSupported)
    }
    async fn get_stream_config(&self, _stream_id: &str) -> Result<StreamConfig> {
        Err(AgentError::NotSupported)
    }
    async fn set_stream_config(&self, _config: StreamConfig) -> Result<()> {
        Err(AgentError::NotSupported)
    }

    async fn get_motion_detection(&self) -> Result<MotionDetectionConf> {
        Err(AgentError::NotSupported)
    }
    async fn set_motion_detection(&self, _conf: SetMotionDetection) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    async fn get_audio_detection(&self) -> Result<AudioDetectionConf> {
        Err(AgentError::NotSupported)
    }
    async fn set_audio_detection(&self, _conf: SetAudioDetection) -> Result<()> {
        Err(AgentError::NotSupported)
    }

    async fn get_cam_video_conf(&self) -> Result<CamVideoConf> {
        Err(AgentError::NotSupported)
    }
    async fn set_cam_video_conf(&self, _conf: CamVideoConf) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    async fn get_cam_audio_conf(&self) -> Result<CamAudioConf> {
        Err(AgentError::NotSupported)
    }
    async fn set_cam_audio_conf(&self, _conf: CamAudioConf) -> Result<()> {
        Err(AgentError::NotSupported)
    }

    async fn get_ptz_conf(&self) -> Result<CamPtzConf> {
        Err(AgentError::NotSupported)
    }
    async fn cam_ptz(&self, _cmd: CamPtz) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    /// `Ok(Some(preset_id))` when `operation` created a preset and the
    /// façade owes the cloud a `cam_ptz_preset_created` follow-up.
    async fn cam_ptz_preset(&self, _cmd: CamPtzPreset) -> Result<Option<String>> {
        Err(AgentError::NotSupported)
    }

    async fn get_osd_conf(&self) -> Result<OsdConf> {
        Err(AgentError::NotSupported)
    }
    async fn set_osd_conf(&self, _conf: OsdConf) -> Result<()> {
        Err(AgentError::NotSupported)
    }

    async fn start_backward(&self, _url: Option<String>) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    async fn stop_backward(&self, _url: Option<String>) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    async fn play_audio_file(&self, _url: &str) -> Result<()> {
        Err(AgentError::NotSupported)
    }

    async fn list_wifi(&self) -> Result<Vec<WifiNetworkWire>> {
        Err(AgentError::NotSupported)
    }
    async fn set_current_wifi(&self, _ssid: &str, _password: Option<&str>) -> Result<()> {
        Err(AgentError::NotSupported)
    }

    async fn upgrade_firmware(&self, _url: &str) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    async fn update_preview(&self, _url: &str) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    async fn set_cam_parameter(&self, _name: &str, _value: serde_json::Value) -> Result<()> {
        Err(AgentError::NotSupported)
    }
    async fn report_problem(&self, _description: &str, _meta: Option<serde_json::Value>) -> Result<()> {
        Err(AgentError::NotSupported)
    }

    async fn get_memorycard_timeline(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<TimelineSegmentWire>> {
        Err(AgentError::NotSupported)
    }
    async fn memorycard_recording(&self, _stream_id: &str, _enabled: bool) -> Result<()> {
        Err(AgentError::NotSupported)
    }
}

/// A callback that supports nothing; used where an embedder only cares about
/// media/events and has no device-parameter surface to expose.
pub struct NullCallback;

#[async_trait]
impl AgentCallback for NullCallback {}
