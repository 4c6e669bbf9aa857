//! Agent configuration (spec §3, §7).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AgentError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Device identity presented during `cam_register`.
    pub device: DeviceConfig,
    /// Cloud endpoint and connection parameters.
    pub cloud: CloudConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub recording: RecordingDefaults,
    #[serde(default)]
    pub upload: UploadConfig,
    /// Streams this device advertises, in cloud-facing order.
    #[serde(default)]
    pub streams: Vec<DemoStreamConfig>,
}

/// Identity fields sent in `cam_register` (spec §6).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceConfig {
    pub uuid: String,
    pub brand: String,
    pub model: String,
    pub sn: String,
    pub version: String,
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,
}

fn default_device_type() -> String {
    "camera".to_string()
}

/// Cloud endpoint and account credentials used by the `register` handshake.
#[derive(Debug, Deserialize, Clone)]
pub struct CloudConfig {
    pub control_url: Url,
    pub vendor: String,
    pub access_token: AccessTokenConfig,
    #[serde(default = "default_timezone")]
    pub tz: String,
    /// `cam_register.raw_messaging`: whether this device accepts
    /// `raw_message` passthrough commands at all (spec §4.3, §4.9).
    #[serde(default)]
    pub raw_messaging: bool,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Defaults used when an event's own config is silent (spec §3: "preroll/
/// postroll defaults ... stateful-event reporting interval").
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingDefaults {
    #[serde(default = "default_preroll_secs")]
    pub preroll_secs: u32,
    #[serde(default = "default_postroll_secs")]
    pub postroll_secs: u32,
    #[serde(default = "default_state_emulation_report_delay_secs")]
    pub default_state_emulation_report_delay_secs: u32,
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            preroll_secs: default_preroll_secs(),
            postroll_secs: default_postroll_secs(),
            default_state_emulation_report_delay_secs: default_state_emulation_report_delay_secs(),
        }
    }
}

fn default_preroll_secs() -> u32 {
    5
}
fn default_postroll_secs() -> u32 {
    5
}
fn default_state_emulation_report_delay_secs() -> u32 {
    5
}

/// Upload pipeline knobs feeding the timeline synchronizer (spec §3: "max
/// concurrent uploads, video-upload queue lateness cap").
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_concurrent_video_uploads")]
    pub max_concurrent_video_uploads: usize,
    #[serde(default = "default_max_concurrent_snapshot_uploads")]
    pub max_concurrent_snapshot_uploads: usize,
    #[serde(default = "default_max_video_uploads_queue_lateness_secs")]
    pub max_video_uploads_queue_lateness_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_video_uploads: default_max_concurrent_video_uploads(),
            max_concurrent_snapshot_uploads: default_max_concurrent_snapshot_uploads(),
            max_video_uploads_queue_lateness_secs: default_max_video_uploads_queue_lateness_secs(),
        }
    }
}

fn default_max_concurrent_video_uploads() -> usize {
    2
}
fn default_max_concurrent_snapshot_uploads() -> usize {
    4
}
fn default_max_video_uploads_queue_lateness_secs() -> u64 {
    300
}

/// The credential presented as `pwd` in `register`. A static token read from
/// config, or one refreshed from an auth endpoint ahead of connecting.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessTokenConfig {
    Static { token: String },
    Refreshed { auth_url: Url, client_id: String, client_secret: String },
}

/// Transport-level knobs: proxying and reconnect backoff bounds.
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default)]
    pub socks_proxy: Option<Url>,
    #[serde(default = "default_reconnect_initial_secs")]
    pub reconnect_initial_secs: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
    /// Whether a stateful event's continuation ticks (`ongoing`) may trigger
    /// a snapshot capture, in addition to the one-shot `triggered`/`started`
    /// payload (spec §4.5: "the continuation snapshot policy is gated by a
    /// global flag").
    #[serde(default = "default_true")]
    pub continuation_snapshot_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socks_proxy: None,
            reconnect_initial_secs: default_reconnect_initial_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
            ack_timeout_secs: default_ack_timeout_secs(),
            continuation_snapshot_enabled: true,
        }
    }
}

fn default_reconnect_initial_secs() -> u64 {
    1
}
fn default_reconnect_max_secs() -> u64 {
    60
}
fn default_ack_timeout_secs() -> u64 {
    10
}

impl TransportConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

/// A demo media source declared in config, used by the reference agent
/// binary to drive the stream manager without a real camera attached.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DemoStreamConfig {
    pub cloud_name: String,
    #[serde(default)]
    pub video_es: Option<String>,
    #[serde(default)]
    pub audio_es: Option<String>,
}

impl AgentConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("cannot read config file: {e}")))?;
        let config: AgentConfig = toml::from_str(&content)
            .map_err(|e| AgentError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.device.uuid.is_empty() {
            return Err(AgentError::Config("device.uuid must not be empty".into()));
        }
        if self.cloud.vendor.is_empty() {
            return Err(AgentError::Config("cloud.vendor must not be empty".into()));
        }
        if self.transport.reconnect_initial_secs == 0 {
            return Err(AgentError::Config(
                "transport.reconnect_initial_secs must be > 0".into(),
            ));
        }
        if self.transport.reconnect_max_secs < self.transport.reconnect_initial_secs {
            return Err(AgentError::Config(
                "transport.reconnect_max_secs must be >= reconnect_initial_secs".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
        [device]
        uuid = "cam-0001"
        brand = "Acme"
        model = "X100"
        sn = "SN123"
        version = "1.0.0"

        [cloud]
        control_url = "wss://cloud.example.com/ws"
        vendor = "acme"

        [cloud.access_token]
        kind = "static"
        token = "secret-token"
        "#
    }

    #[test]
    fn loads_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();
        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.device.uuid, "cam-0001");
        assert_eq!(config.transport.ack_timeout_secs, 10);
    }

    #[test]
    fn rejects_empty_uuid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bad = sample_toml().replace("cam-0001", "");
        file.write_all(bad.as_bytes()).unwrap();
        let err = AgentConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
