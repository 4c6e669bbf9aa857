//! The `Agent` façade (component C9, spec §4.9): owns every other
//! component and is the only thing an embedder talks to directly.
//!
//! `create` wires C1-C8 together; `start` spawns the inbound dispatch loop
//! plus one task per configured [`EventSource`]; `stop` tears everything
//! down in the order spec §5 calls for: close the control channel with
//! `bye{SHUTDOWN}`, cancel outstanding memory-card syncs, drain the snapshot
//! queue, and stop every stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::event::{EventManager, EventSource};
use crate::protocol::{self, EngineOptions, ProtocolHandle};
use crate::protocol::persisted::PersistedState;
use crate::storage::{QueuedAsyncStorage, TimedStorage};
use crate::stream::{MediaSource, RecordingMode, StreamManager};
use crate::sync::{RemoteSlotProvider, SyncHandle, TimelineSyncConfig, TimelineSynchronizer};
use crate::transport::HttpClient;
use crate::wire::commands::Command;
use crate::wire::enums::{ByeReason, DoneStatus, StreamReason, SyncStatus, UploadCategory};
use crate::wire::header::Header;
use crate::wire::payloads::*;
use crate::wire::Message;

use super::callback::AgentCallback;
use super::slot_provider::ProtocolSlotProvider;

/// Everything the façade needs to build the rest of the stack. Kept as a
/// struct rather than a long `create` argument list, matching how
/// `EngineOptions` bundles the protocol layer's equivalent knobs.
pub struct AgentDeps {
    pub media_sources: Vec<Arc<dyn MediaSource>>,
    pub event_sources: Vec<Arc<dyn EventSource>>,
    pub local_storage: Arc<dyn TimedStorage>,
    pub persisted: Arc<dyn PersistedState>,
}

pub struct Agent {
    config: AgentConfig,
    protocol: ProtocolHandle,
    streams: Arc<StreamManager>,
    events: Arc<EventManager>,
    sync: Arc<TimelineSynchronizer>,
    callback: Arc<dyn AgentCallback>,
    slots: Arc<ProtocolSlotProvider>,
    http: HttpClient,
    event_sources: Vec<Arc<dyn EventSource>>,
    inbound: Mutex<Option<mpsc::Receiver<Message>>>,
    memorycard_syncs: Mutex<HashMap<String, SyncHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    engine_task: Mutex<Option<JoinHandle<()>>>,
}

impl Agent {
    /// Build every component and run the handshake's connection attempt in
    /// the background; returns as soon as the protocol engine has been
    /// spawned, without waiting for it to actually reach `OPERATIONAL`.
    pub fn create(config: AgentConfig, callback: Arc<dyn AgentCallback>, deps: AgentDeps) -> Result<Arc<Agent>> {
        let streams = Arc::new(StreamManager::new(deps.media_sources));

        let options = EngineOptions {
            state: deps.persisted,
            on_registered: None,
            on_bye: None,
        };
        let (protocol, inbound, engine_task) = protocol::spawn(config.clone(), options);

        let http = HttpClient::new(&config.transport)?;
        let slots = Arc::new(ProtocolSlotProvider::new(protocol.clone()));
        let sync = TimelineSynchronizer::new(
            deps.local_storage.clone(),
            slots.clone() as Arc<dyn RemoteSlotProvider>,
            http.clone(),
            TimelineSyncConfig {
                max_concurrent_video_uploads: config.upload.max_concurrent_video_uploads,
                max_concurrent_snapshot_uploads: config.upload.max_concurrent_snapshot_uploads,
                max_queue_lateness: std::time::Duration::from_secs(config.upload.max_video_uploads_queue_lateness_secs),
                ..TimelineSyncConfig::default()
            },
        );

        let snapshot_storage = {
            let backing = deps.local_storage.clone();
            Some(Arc::new(QueuedAsyncStorage::spawn(2, move |item| {
                let backing = backing.clone();
                async move { backing.store(&item).await }
            })))
        };

        let events = Arc::new(EventManager::new(
            protocol.clone(),
            crate::transport::TimerWheel::new(),
            streams.clone(),
            sync.clone(),
            callback.clone(),
            snapshot_storage,
            config.transport.continuation_snapshot_enabled,
            config.recording.clone(),
            deps.event_sources.clone(),
        ));

        Ok(Arc::new(Agent {
            config,
            protocol,
            streams,
            events,
            sync,
            callback,
            slots,
            http,
            event_sources: deps.event_sources,
            inbound: Mutex::new(Some(inbound)),
            memorycard_syncs: Mutex::new(HashMap::new()),
            tasks: Mutex::new(vec![engine_task]),
            engine_task: Mutex::new(None),
        }))
    }

    pub fn streams(&self) -> &Arc<StreamManager> {
        &self.streams
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// Start the inbound dispatch loop and one poll task per configured
    /// event source. Only callable once; a second call is a no-op.
    pub fn start(self: &Arc<Self>) {
        let Some(inbound) = self.inbound.lock().take() else {
            tracing::warn!("agent already started");
            return;
        };

        let this = self.clone();
        let dispatch = tokio::spawn(async move {
            this.run_dispatch(inbound).await;
        });
        self.tasks.lock().push(dispatch);

        for source in self.event_sources.clone() {
            let this = self.clone();
            let handle = tokio::spawn(async move {
                this.run_event_source(source).await;
            });
            self.tasks.lock().push(handle);
        }
    }

    async fn run_event_source(self: Arc<Self>, source: Arc<dyn EventSource>) {
        loop {
            let Some(occurrence) = source.next().await else {
                tracing::info!(source = source.name(), "event source retired");
                return;
            };
            if let Err(e) = self
                .events
                .report(
                    &occurrence.event,
                    occurrence.custom_name.as_deref(),
                    occurrence.occurring,
                    occurrence.meta,
                )
                .await
            {
                tracing::warn!(error = %e, event = occurrence.event, "failed to report local event occurrence");
            }
        }
    }

    async fn run_dispatch(self: Arc<Self>, mut inbound: mpsc::Receiver<Message>) {
        while let Some(msg) = inbound.recv().await {
            self.handle_inbound(msg).await;
        }
        tracing::info!("inbound dispatch loop stopped, control channel closed");
    }

    /// Close the control channel and tear down every component, in the
    /// order spec §5 calls for.
    pub async fn stop(&self) {
        let _ = self
            .protocol
            .send(Command::Bye(Bye {
                reason: ByeReason::Shutdown,
                retry: None,
            }))
            .await;
        self.protocol.shutdown().await;

        for (_, handle) in self.memorycard_syncs.lock().drain() {
            self.sync.cancel(handle);
        }

        self.streams.stop_all_streams();

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if let Some(task) = self.engine_task.lock().take() {
            task.abort();
        }
    }

    async fn handle_inbound(&self, msg: Message) {
        let header = msg.header.clone();
        match msg.command {
            Command::GetCamStatus(_) => self.reply_cam_status(&header).await,
            Command::GetSupportedStreams(req) => self.reply_supported_streams(&header, req).await,
            Command::GetStreamCaps(req) => self.reply_stream_caps(&header, req).await,
            Command::GetStreamConfig(req) => self.reply_stream_config(&header, req).await,
            Command::SetStreamConfig(conf) => {
                self.reply_done(&header, "set_stream_config", self.callback.set_stream_config(conf).await).await
            }
            Command::StreamStart(req) => self.handle_stream_start(&header, req).await,
            Command::StreamStop(req) => self.handle_stream_stop(&header, req).await,
            Command::SetStreamByEvent(req) => {
                self.streams.set_stream_for_by_event(&req.stream_id);
                self.send_reply(&header, "set_stream_by_event", Command::Done(Done { status: DoneStatus::Ok })).await;
            }
            Command::GetStreamByEvent(_) => {
                let stream_id = self.streams.by_event_stream().unwrap_or_default();
                self.send_reply(&header, "get_stream_by_event", Command::StreamByEventConf(StreamByEventConf { stream_id }))
                    .await;
            }

            Command::GetCamEvents(_) => {
                self.send_reply(
                    &header,
                    "get_cam_events",
                    Command::CamEventsConf(CamEventsConf { events: self.events.current_config() }),
                )
                .await;
            }
            Command::SetCamEvents(req) => {
                self.events.apply_config(req.events);
                self.send_reply(&header, "set_cam_events", Command::Done(Done { status: DoneStatus::Ok })).await;
            }
            Command::CamTriggerEvent(req) => {
                let result = self.events.report(&req.event, None, true, req.meta).await;
                self.reply_done(&header, "cam_trigger_event", result).await;
            }

            Command::GetMotionDetection(_) => {
                self.reply_with(&header, "get_motion_detection", self.callback.get_motion_detection().await, |c| {
                    Command::MotionDetectionConf(c)
                })
                .await
            }
            Command::SetMotionDetection(conf) => {
                self.reply_done(&header, "set_motion_detection", self.callback.set_motion_detection(conf).await).await
            }
            Command::GetAudioDetection(_) => {
                self.reply_with(&header, "get_audio_detection", self.callback.get_audio_detection().await, |c| {
                    Command::AudioDetectionConf(c)
                })
                .await
            }
            Command::SetAudioDetection(conf) => {
                self.reply_done(&header, "set_audio_detection", self.callback.set_audio_detection(conf).await).await
            }

            Command::GetCamVideoConf(_) => {
                self.reply_with(&header, "get_cam_video_conf", self.callback.get_cam_video_conf().await, |c| {
                    Command::CamVideoConf(c)
                })
                .await
            }
            Command::SetCamVideoConf(conf) => {
                self.reply_done(&header, "set_cam_video_conf", self.callback.set_cam_video_conf(conf).await).await
            }
            Command::GetCamAudioConf(_) => {
                self.reply_with(&header, "get_cam_audio_conf", self.callback.get_cam_audio_conf().await, |c| {
                    Command::CamAudioConf(c)
                })
                .await
            }
            Command::SetCamAudioConf(conf) => {
                self.reply_done(&header, "set_cam_audio_conf", self.callback.set_cam_audio_conf(conf).await).await
            }

            Command::GetPtzConf(_) => {
                self.reply_with(&header, "get_ptz_conf", self.callback.get_ptz_conf().await, |c| Command::CamPtzConf(c)).await
            }
            Command::CamPtz(cmd) => self.reply_done(&header, "cam_ptz", self.callback.cam_ptz(cmd).await).await,
            Command::CamPtzPreset(cmd) => self.handle_ptz_preset(&header, cmd).await,

            Command::GetOsdConf(_) => {
                self.reply_with(&header, "get_osd_conf", self.callback.get_osd_conf().await, |c| Command::OsdConf(c)).await
            }
            Command::SetOsdConf(conf) => self.reply_done(&header, "set_osd_conf", self.callback.set_osd_conf(conf).await).await,

            Command::BackwardStart(req) => {
                self.reply_done(&header, "backward_start", self.callback.start_backward(req.url).await).await
            }
            Command::BackwardStop(req) => {
                self.reply_done(&header, "backward_stop", self.callback.stop_backward(req.url).await).await
            }
            Command::AudioFilePlay(req) => {
                self.reply_done(&header, "audio_file_play", self.callback.play_audio_file(&req.url).await).await
            }

            Command::CamListWifi(_) => {
                self.reply_with(&header, "cam_list_wifi", self.callback.list_wifi().await, |networks| {
                    Command::CamWifiList(CamWifiList { networks })
                })
                .await
            }
            Command::CamSetCurrentWifi(req) => {
                let result = self.callback.set_current_wifi(&req.ssid, req.password.as_deref()).await;
                self.reply_done(&header, "cam_set_current_wifi", result).await;
            }

            Command::RawMessage(req) => self.handle_raw_message(&header, req).await,
            Command::RawMessageClientConnected(req) => self.callback.on_raw_msg_client_connected(&req.client_id).await,
            Command::RawMessageClientDisconnected(req) => {
                self.callback.on_raw_msg_client_disconnected(&req.client_id).await
            }

            Command::CamGetLog(_) => self.handle_get_log(&header).await,
            Command::CamUpgradeFirmware(req) => {
                self.reply_done(&header, "cam_upgrade_firmware", self.callback.upgrade_firmware(&req.url).await).await
            }
            Command::CamUpdatePreview(req) => {
                self.reply_done(&header, "cam_update_preview", self.callback.update_preview(&req.url).await).await
            }
            Command::SetCamParameter(req) => {
                let result = self.callback.set_cam_parameter(&req.name, req.value).await;
                self.reply_done(&header, "set_cam_parameter", result).await;
            }
            Command::ReportProblem(req) => {
                let result = self.callback.report_problem(&req.description, req.meta).await;
                self.reply_done(&header, "report_problem", result).await;
            }

            Command::GetCamMemorycardTimeline(req) => self.handle_memorycard_timeline(&header, req).await,
            Command::CamMemorycardSynchronize(req) => self.handle_memorycard_synchronize(&header, req).await,
            Command::CamMemorycardSynchronizeCancel(req) => {
                if let Some(handle) = self.memorycard_syncs.lock().remove(&req.request_id) {
                    self.sync.cancel(handle);
                }
                self.send_reply(&header, "cam_memorycard_synchronize_cancel", Command::Done(Done { status: DoneStatus::Ok }))
                    .await;
            }
            Command::CamMemorycardRecording(req) => self.handle_memorycard_recording(&header, req).await,

            Command::Configure(_) => {
                // no generic configuration hook; cloud-pushed ad-hoc
                // parameters are not modeled on this wire.
                self.send_reply(&header, "configure", Command::Done(Done { status: DoneStatus::NotSupported })).await;
            }

            other => {
                tracing::debug!(cmd = other.name(), "ignoring inbound command with no dispatch handler");
            }
        }
    }

    // ── reply helpers ───────────────────────────────────────────────────

    async fn send_reply(&self, in_reply_to: &Header, orig_cmd_name: &'static str, command: Command) {
        if let Err(e) = self.protocol.send_reply(in_reply_to, orig_cmd_name, command).await {
            tracing::warn!(error = %e, cmd = orig_cmd_name, "failed to send reply");
        }
    }

    async fn reply_done(&self, header: &Header, orig_cmd_name: &'static str, result: Result<()>) {
        let status = match result {
            Ok(()) => DoneStatus::Ok,
            Err(e) => done_status_for(&e),
        };
        self.send_reply(header, orig_cmd_name, Command::Done(Done { status })).await;
    }

    async fn reply_with<T>(&self, header: &Header, orig_cmd_name: &'static str, result: Result<T>, to_command: impl FnOnce(T) -> Command) {
        match result {
            Ok(value) => self.send_reply(header, orig_cmd_name, to_command(value)).await,
            Err(e) => {
                self.send_reply(header, orig_cmd_name, Command::Done(Done { status: done_status_for(&e) })).await
            }
        }
    }

    async fn reply_cam_status(&self, header: &Header) {
        self.reply_with(header, "get_cam_status", self.callback.get_cam_status().await, Command::CamStatus).await
    }

    async fn reply_supported_streams(&self, header: &Header, _req: GetSupportedStreams) {
        let streams = self
            .config
            .streams
            .iter()
            .map(|s| StreamDescriptorWire {
                cloud_name: s.cloud_name.clone(),
                video_es: s.video_es.clone(),
                audio_es: s.audio_es.clone(),
            })
            .collect();
        self.send_reply(header, "get_supported_streams", Command::SupportedStreamsConfig(SupportedStreamsConfig { streams }))
            .await;
    }

    /// `video_es`/`audio_es` name the target stream ids (absent = all,
    /// present-and-empty = none); one reply is sent per matched stream,
    /// sharing `header`'s `refid`.
    fn target_stream_ids(&self, video_es: &Option<Vec<String>>, audio_es: &Option<Vec<String>>) -> Vec<String> {
        match video_es.as_ref().or(audio_es.as_ref()) {
            Some(ids) => ids.clone(),
            None => self.streams.stream_ids(),
        }
    }

    async fn reply_stream_caps(&self, header: &Header, req: GetStreamCaps) {
        for stream_id in self.target_stream_ids(&req.video_es, &req.audio_es) {
            match self.callback.get_stream_caps(&stream_id).await {
                Ok(caps) => self.send_reply(header, "get_stream_caps", Command::StreamCaps(caps)).await,
                Err(e) => tracing::warn!(error = %e, stream_id, "get_stream_caps callback failed"),
            }
        }
    }

    async fn reply_stream_config(&self, header: &Header, req: GetStreamConfig) {
        for stream_id in self.target_stream_ids(&req.video_es, &req.audio_es) {
            match self.callback.get_stream_config(&stream_id).await {
                Ok(conf) => self.send_reply(header, "get_stream_config", Command::StreamConfig(conf)).await,
                Err(e) => tracing::warn!(error = %e, stream_id, "get_stream_config callback failed"),
            }
        }
    }

    async fn handle_stream_start(&self, header: &Header, req: StreamStart) {
        let result = match req.reason {
            StreamReason::Live => {
                let url = format!("session:{}", req.stream_id);
                self.streams.start_live(&req.stream_id, &url).map(|_| ())
            }
            StreamReason::Record => self.streams.start_recording(&req.stream_id, RecordingMode::LOCAL).map(|_| ()),
            StreamReason::RecordByEvent => {
                self.streams.start_recording(&req.stream_id, RecordingMode::LOCAL_BY_EVENT).map(|_| ())
            }
            StreamReason::Invalid => Err(AgentError::InvalidPayload {
                cmd: "stream_start".into(),
                reason: "unrecognised reason".into(),
            }),
        };
        self.reply_done(header, "stream_start", result).await;
    }

    async fn handle_stream_stop(&self, header: &Header, req: StreamStop) {
        let result: Result<()> = match req.reason {
            StreamReason::Live => {
                self.streams.stop_live(&req.stream_id);
                Ok(())
            }
            StreamReason::Record => {
                self.streams.stop_recording(&req.stream_id, RecordingMode::LOCAL);
                Ok(())
            }
            StreamReason::RecordByEvent => {
                self.streams.stop_recording(&req.stream_id, RecordingMode::LOCAL_BY_EVENT);
                Ok(())
            }
            StreamReason::Invalid => Err(AgentError::InvalidPayload {
                cmd: "stream_stop".into(),
                reason: "unrecognised reason".into(),
            }),
        };
        self.streams.check_stop_media_source(&req.stream_id);
        self.reply_done(header, "stream_stop", result).await;
    }

    async fn handle_ptz_preset(&self, header: &Header, cmd: CamPtzPreset) {
        match self.callback.cam_ptz_preset(cmd).await {
            Ok(Some(preset_id)) => {
                self.send_reply(header, "cam_ptz_preset", Command::Done(Done { status: DoneStatus::Ok })).await;
                // the cloud expects the new preset id as its own follow-up
                // message, not folded into the ack (spec §6 supplement).
                if let Err(e) = self.protocol.send(Command::CamPtzPresetCreated(CamPtzPresetCreated { preset_id })).await {
                    tracing::warn!(error = %e, "failed to announce created ptz preset");
                }
            }
            Ok(None) => self.send_reply(header, "cam_ptz_preset", Command::Done(Done { status: DoneStatus::Ok })).await,
            Err(e) => {
                self.send_reply(header, "cam_ptz_preset", Command::Done(Done { status: done_status_for(&e) })).await
            }
        }
    }

    async fn handle_raw_message(&self, header: &Header, req: RawMessage) {
        match self.callback.on_raw_msg(&req.client_id, &req.data).await {
            Ok(data) => {
                self.send_reply(header, "raw_message", Command::RawMessage(RawMessage { client_id: req.client_id, data }))
                    .await
            }
            Err(e) => self.send_reply(header, "raw_message", Command::Done(Done { status: done_status_for(&e) })).await,
        }
    }

    async fn handle_get_log(&self, header: &Header) {
        let bytes = match self.callback.get_log().await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.send_reply(header, "cam_get_log", Command::Done(Done { status: done_status_for(&e) })).await;
                return;
            }
        };

        let now = chrono::Utc::now();
        let period = crate::storage::Period::new(now, now + chrono::Duration::seconds(1));
        let result = self.push_direct_upload(UploadCategory::FileMeta, "device", period, bytes).await;
        self.reply_done(header, "cam_get_log", result).await;
    }

    async fn push_direct_upload(
        &self,
        category: UploadCategory,
        stream_id: &str,
        period: crate::storage::Period,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let slot = self.slots.request_slot(stream_id, category, period, bytes.len() as u64).await?;
        self.http.put(&slot.url, &slot.headers, bytes).await?;
        self.slots.confirm(category, &slot.url).await
    }

    async fn handle_memorycard_timeline(&self, header: &Header, req: GetCamMemorycardTimeline) {
        let start = match crate::time::parse(&req.start) {
            Ok(t) => t,
            Err(e) => {
                self.send_reply(header, "get_cam_memorycard_timeline", Command::Done(Done { status: done_status_for(&e) }))
                    .await;
                return;
            }
        };
        let end = match crate::time::parse(&req.end) {
            Ok(t) => t,
            Err(e) => {
                self.send_reply(header, "get_cam_memorycard_timeline", Command::Done(Done { status: done_status_for(&e) }))
                    .await;
                return;
            }
        };
        self.reply_with(
            header,
            "get_cam_memorycard_timeline",
            self.callback.get_memorycard_timeline(start, end).await,
            |segments| Command::CamMemorycardTimeline(CamMemorycardTimeline { segments }),
        )
        .await;
    }

    async fn handle_memorycard_synchronize(&self, header: &Header, req: CamMemorycardSynchronize) {
        let start = match crate::time::parse(&req.start) {
            Ok(t) => t,
            Err(e) => {
                self.send_reply(header, "cam_memorycard_synchronize", Command::Done(Done { status: done_status_for(&e) }))
                    .await;
                return;
            }
        };
        let end = match crate::time::parse(&req.end) {
            Ok(t) => t,
            Err(e) => {
                self.send_reply(header, "cam_memorycard_synchronize", Command::Done(Done { status: done_status_for(&e) }))
                    .await;
                return;
            }
        };

        let request_id = Uuid::new_v4().to_string();
        let stream_id = self.streams.by_event_stream().unwrap_or_default();
        let protocol = self.protocol.clone();
        let request_id_for_status = request_id.clone();
        let status_cb: crate::sync::synchronizer::StatusCallback = Arc::new(move |status: SyncStatus, progress| {
            let protocol = protocol.clone();
            let request_id = request_id_for_status.clone();
            tokio::spawn(async move {
                let _ = protocol
                    .send(Command::CamMemorycardSynchronizeStatus(CamMemorycardSynchronizeStatus {
                        request_id,
                        status,
                        progress,
                    }))
                    .await;
            });
        });

        let handle = self.sync.sync(stream_id, UploadCategory::Record, start, Some(end), status_cb);
        self.memorycard_syncs.lock().insert(request_id.clone(), handle);
        self.send_reply(
            header,
            "cam_memorycard_synchronize",
            Command::Done(Done { status: DoneStatus::Ok }),
        )
        .await;
    }

    async fn handle_memorycard_recording(&self, header: &Header, req: CamMemorycardRecording) {
        let result = if req.enabled {
            self.streams.start_recording(&req.stream_id, RecordingMode::LOCAL).map(|_| ())
        } else {
            self.streams.stop_recording(&req.stream_id, RecordingMode::LOCAL);
            Ok(())
        };
        self.reply_done(header, "cam_memorycard_recording", result).await;
    }
}

fn done_status_for(e: &AgentError) -> DoneStatus {
    match e {
        AgentError::NotSupported => DoneStatus::NotSupported,
        AgentError::InvalidPayload { .. } => DoneStatus::InvalidParam,
        AgentError::StreamNotFound(_) => DoneStatus::InvalidParam,
        _ => DoneStatus::SystemError,
    }
}
