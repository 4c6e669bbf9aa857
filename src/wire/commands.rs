//! The closed command enumeration (spec §3 Command envelope, §6).
//!
//! Every registered command name maps to exactly one payload struct in
//! [`super::payloads`]. `Command` is the tagged union of all of them;
//! [`Command::name`] is the wire `cmd` string used for dispatch.

use serde_json::Value;

use crate::error::{AgentError, Result};

use super::payloads::*;

macro_rules! command_enum {
    ( $( $variant:ident($ty:ty) => $wire:literal ),+ $(,)? ) => {
        #[derive(Debug, Clone)]
        pub enum Command {
            $( $variant($ty), )+
        }

        impl Command {
            pub fn name(&self) -> &'static str {
                match self {
                    $( Command::$variant(_) => $wire, )+
                }
            }

            /// Decode a payload for `cmd` out of the flat envelope object.
            /// Returns `Err(UnknownCommand)` if `cmd` is not registered.
            pub fn from_value(cmd: &str, value: &Value) -> Result<Command> {
                match cmd {
                    $( $wire => {
                        let payload: $ty = serde_json::from_value(value.clone())
                            .map_err(|e| AgentError::InvalidPayload {
                                cmd: cmd.to_string(),
                                reason: e.to_string(),
                            })?;
                        Ok(Command::$variant(payload))
                    } )+
                    other => Err(AgentError::UnknownCommand(other.to_string())),
                }
            }

            /// Merge this command's payload fields into `map` (flat envelope encode).
            pub fn merge_into(&self, map: &mut serde_json::Map<String, Value>) -> Result<()> {
                let v = match self {
                    $( Command::$variant(p) => serde_json::to_value(p)?, )+
                };
                if let Value::Object(obj) = v {
                    map.extend(obj);
                }
                Ok(())
            }
        }

        /// `true` if `cmd` is a registered wire command name.
        pub fn is_registered(cmd: &str) -> bool {
            matches!(cmd, $( $wire )|+)
        }
    };
}

command_enum! {
    Register(Register) => "register",
    Hello(Hello) => "hello",
    CamRegister(CamRegister) => "cam_register",
    CamHello(CamHello) => "cam_hello",
    Bye(Bye) => "bye",
    Configure(Configure) => "configure",
    Done(Done) => "done",

    GetCamStatus(GetCamStatus) => "get_cam_status",
    CamStatus(CamStatus) => "cam_status",

    GetSupportedStreams(GetSupportedStreams) => "get_supported_streams",
    SupportedStreamsConfig(SupportedStreamsConfig) => "supported_streams",
    GetStreamCaps(GetStreamCaps) => "get_stream_caps",
    StreamCaps(StreamCaps) => "stream_caps",
    GetStreamConfig(GetStreamConfig) => "get_stream_config",
    StreamConfig(StreamConfig) => "stream_config",
    SetStreamConfig(StreamConfig) => "set_stream_config",
    StreamStart(StreamStart) => "stream_start",
    StreamStop(StreamStop) => "stream_stop",
    SetStreamByEvent(SetStreamByEvent) => "set_stream_by_event",
    GetStreamByEvent(GetStreamByEvent) => "get_stream_by_event",
    StreamByEventConf(StreamByEventConf) => "stream_by_event_conf",

    CamEvent(CamEvent) => "cam_event",
    GetCamEvents(GetCamEvents) => "get_cam_events",
    CamEventsConf(CamEventsConf) => "cam_events_conf",
    SetCamEvents(SetCamEvents) => "set_cam_events",
    CamTriggerEvent(CamTriggerEvent) => "cam_trigger_event",

    GetMotionDetection(GetMotionDetection) => "get_motion_detection",
    MotionDetectionConf(MotionDetectionConf) => "motion_detection_conf",
    SetMotionDetection(SetMotionDetection) => "set_motion_detection",
    GetAudioDetection(GetAudioDetection) => "get_audio_detection",
    AudioDetectionConf(AudioDetectionConf) => "audio_detection_conf",
    SetAudioDetection(SetAudioDetection) => "set_audio_detection",

    GetCamVideoConf(GetCamVideoConf) => "get_cam_video_conf",
    CamVideoConf(CamVideoConf) => "cam_video_conf",
    SetCamVideoConf(CamVideoConf) => "set_cam_video_conf",
    GetCamAudioConf(GetCamAudioConf) => "get_cam_audio_conf",
    CamAudioConf(CamAudioConf) => "cam_audio_conf",
    SetCamAudioConf(CamAudioConf) => "set_cam_audio_conf",

    GetPtzConf(GetPtzConf) => "get_ptz_conf",
    CamPtzConf(CamPtzConf) => "cam_ptz_conf",
    CamPtz(CamPtz) => "cam_ptz",
    CamPtzPreset(CamPtzPreset) => "cam_ptz_preset",
    CamPtzPresetCreated(CamPtzPresetCreated) => "cam_ptz_preset_created",

    GetOsdConf(GetOsdConf) => "get_osd_conf",
    OsdConf(OsdConf) => "osd_conf",
    SetOsdConf(OsdConf) => "set_osd_conf",

    BackwardStart(BackwardStart) => "backward_start",
    BackwardStop(BackwardStop) => "backward_stop",
    AudioFilePlay(AudioFilePlay) => "audio_file_play",

    CamListWifi(CamListWifi) => "cam_list_wifi",
    CamWifiList(CamWifiList) => "cam_wifi_list",
    CamSetCurrentWifi(CamSetCurrentWifi) => "cam_set_current_wifi",

    GetDirectUploadUrl(GetDirectUploadUrl) => "get_direct_upload_url",
    DirectUploadUrl(DirectUploadUrl) => "direct_upload_url",
    ConfirmDirectUpload(ConfirmDirectUpload) => "confirm_direct_upload",

    RawMessage(RawMessage) => "raw_message",
    RawMessageClientConnected(RawMessageClientConnected) => "raw_message_client_connected",
    RawMessageClientDisconnected(RawMessageClientDisconnected) => "raw_message_client_disconnected",

    CamGetLog(CamGetLog) => "cam_get_log",
    CamUpgradeFirmware(CamUpgradeFirmware) => "cam_upgrade_firmware",
    CamUpdatePreview(CamUpdatePreview) => "cam_update_preview",
    SetCamParameter(SetCamParameter) => "set_cam_parameter",
    ReportProblem(ReportProblem) => "report_problem",

    GetCamMemorycardTimeline(GetCamMemorycardTimeline) => "get_cam_memorycard_timeline",
    CamMemorycardTimeline(CamMemorycardTimeline) => "cam_memorycard_timeline",
    CamMemorycardSynchronize(CamMemorycardSynchronize) => "cam_memorycard_synchronize",
    CamMemorycardSynchronizeStatus(CamMemorycardSynchronizeStatus) => "cam_memorycard_synchronize_status",
    CamMemorycardSynchronizeCancel(CamMemorycardSynchronizeCancel) => "cam_memorycard_synchronize_cancel",
    CamMemorycardRecording(CamMemorycardRecording) => "cam_memorycard_recording",
}
