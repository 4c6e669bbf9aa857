//! Payload structs for every registered command (spec §3, §6).
//!
//! Optional wire fields use `Option<T>` (the "unset sentinel" redesign from
//! spec §9): the encoder omits `None` via `skip_serializing_if`, the decoder
//! leaves missing fields as `None`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::enums::{ByeReason, DoneStatus, MediaType, StreamReason, SyncStatus, UploadCategory};

fn is_false(b: &bool) -> bool {
    !*b
}

// ───────────────────────────── session / registration ─────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Register {
    pub ver: String,
    pub tz: String,
    pub vendor: String,
    pub pwd: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prev_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reg_token: Option<String>,
    #[serde(default)]
    pub media_protocols: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hello {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ca: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upload_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub media_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamRegister {
    pub uuid: String,
    pub brand: String,
    pub model: String,
    pub sn: String,
    pub version: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub raw_messaging: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamHello {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bye {
    pub reason: ByeReason,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub retry: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Done {
    pub status: DoneStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configure {
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

// ───────────────────────────── status ──────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCamStatus {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamStatus {
    pub online: bool,
    pub streaming: bool,
    pub activity: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memorycard: Option<MemorycardInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorycardInfo {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub free_bytes: Option<u64>,
}

// ───────────────────────────── streams ─────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSupportedStreams {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportedStreamsConfig {
    pub streams: Vec<StreamDescriptorWire>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDescriptorWire {
    pub cloud_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_es: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_es: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetStreamCaps {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_es: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_es: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamCaps {
    pub stream_id: String,
    #[serde(default)]
    pub codecs: Vec<String>,
    #[serde(default)]
    pub resolutions: Vec<String>,
    #[serde(default)]
    pub bitrates: Vec<u32>,
    #[serde(default)]
    pub fps: Vec<u32>,
    #[serde(default)]
    pub gop: Vec<u32>,
    #[serde(default)]
    pub quality: Vec<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub vbr: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetStreamConfig {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_es: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_es: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamConfig {
    pub stream_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gop: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quality: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub vbr: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStart {
    pub reason: StreamReason,
    pub stream_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub publish_session_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub storage_direct_recording: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStop {
    pub reason: StreamReason,
    pub stream_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetStreamByEvent {
    pub stream_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetStreamByEvent {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamByEventConf {
    pub stream_id: String,
}

// ───────────────────────────── events ───────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub custom_name: Option<String>,
    pub time: String,
    /// one of `started`, `ongoing`, `stopped`, `triggered`
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCamEvents {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamEventsConf {
    pub events: Vec<EventConfigWire>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetCamEvents {
    pub events: Vec<EventConfigWire>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventConfigWire {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub custom_name: Option<String>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub snapshot: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub period: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stream: bool,
    pub caps: EventCapsWire,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventCapsWire {
    #[serde(default, skip_serializing_if = "is_false")]
    pub stateful: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub snapshot: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub trigger: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub periodic: bool,
    /// seconds, bounded <= 10 per spec §4.4
    #[serde(default)]
    pub state_emulation_report_delay: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamTriggerEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub meta: Option<serde_json::Value>,
}

// ───────────────────────────── motion / audio detection ────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetMotionDetection {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotionDetectionConf {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sensitivity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub map: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetMotionDetection {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sensitivity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub map: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetAudioDetection {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioDetectionConf {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sensitivity: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetAudioDetection {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sensitivity: Option<i32>,
}

// ───────────────────────────── video / audio input config ─────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCamVideoConf {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamVideoConf {
    #[serde(default, skip_serializing_if = "is_false")]
    pub flip: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub mirror: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub brightness: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub contrast: Option<i32>,
}

pub type SetCamVideoConf = CamVideoConf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCamAudioConf {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamAudioConf {
    #[serde(default, skip_serializing_if = "is_false")]
    pub mic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub spkr: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume: Option<i32>,
}

pub type SetCamAudioConf = CamAudioConf;

// ───────────────────────────── PTZ ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPtzConf {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamPtzConf {
    #[serde(default, skip_serializing_if = "is_false")]
    pub pan: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub tilt: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub zoom: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub presets: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamPtz {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamPtzPreset {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub preset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamPtzPresetCreated {
    pub preset_id: String,
}

// ───────────────────────────── OSD ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetOsdConf {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsdConf {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<String>,
}

pub type SetOsdConf = OsdConf;

// ───────────────────────────── backward audio / playback ──────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackwardStart {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackwardStop {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioFilePlay {
    pub url: String,
}

// ───────────────────────────── wifi ─────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamListWifi {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamWifiList {
    pub networks: Vec<WifiNetworkWire>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiNetworkWire {
    pub ssid: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signal: Option<i32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub secure: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamSetCurrentWifi {
    pub ssid: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>,
}

// ───────────────────────────── uploads ──────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDirectUploadUrl {
    pub category: UploadCategory,
    pub stream_id: String,
    pub file_time: String,
    pub duration_ms: i64,
    pub size: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectUploadUrl {
    pub category: UploadCategory,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expire: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmDirectUpload {
    pub category: UploadCategory,
    pub url: String,
}

// ───────────────────────────── raw passthrough ──────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    pub client_id: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessageClientConnected {
    pub client_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessageClientDisconnected {
    pub client_id: String,
}

// ───────────────────────────── misc device ops ──────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamGetLog {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamUpgradeFirmware {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamUpdatePreview {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetCamParameter {
    pub name: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportProblem {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub meta: Option<serde_json::Value>,
}

// ───────────────────────────── memory-card timeline ─────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCamMemorycardTimeline {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamMemorycardTimeline {
    pub segments: Vec<TimelineSegmentWire>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineSegmentWire {
    pub begin: String,
    pub end: String,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamMemorycardSynchronize {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamMemorycardSynchronizeStatus {
    pub request_id: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub progress: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamMemorycardSynchronizeCancel {
    pub request_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamMemorycardRecording {
    pub stream_id: String,
    pub enabled: bool,
}
