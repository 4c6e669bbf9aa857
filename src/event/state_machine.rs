//! Per-event state machine (component C4, spec §4.4).
//!
//! A stateless event (`caps.stateful == false`) only ever emits `triggered`.
//! A stateful event moves `started → ongoing* → stopped`, with a
//! continuation "kick" timer re-emitting `ongoing` every
//! `state_emulation_report_delay` seconds (bounded to 10s) while the
//! underlying condition persists, so a dropped `stopped` frame doesn't wedge
//! the cloud side in `started` forever. Transitions are serialized under a
//! per-event lock; if the machine is dropped while active it force-emits
//! `stopped` on a best-effort basis.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::Result;
use crate::protocol::ProtocolHandle;
use crate::transport::{TimerHandle, TimerWheel};
use crate::wire::commands::Command;
use crate::wire::payloads::{CamEvent, EventConfigWire};

const MAX_KICK_DELAY_SECS: u32 = 10;

/// Side effects an owning [`super::manager::EventManager`] wires in at
/// construction time, fired right after the corresponding wire transition is
/// sent (spec §4.5): `on_started`/`on_stopped` drive the event's recording
/// window through the timeline synchronizer, `on_payload` drives a snapshot
/// capture. Any hook a given event's config doesn't need is a no-op closure
/// rather than `None`, so the call sites below don't need to special-case it.
#[derive(Clone)]
pub struct EventHooks {
    pub on_started: Arc<dyn Fn(DateTime<Utc>) + Send + Sync>,
    pub on_stopped: Arc<dyn Fn(DateTime<Utc>) + Send + Sync>,
    /// `is_continuation` is `false` for a stateless `triggered` payload and
    /// `true` for a stateful `ongoing` tick, so the manager can apply the
    /// continuation-tick snapshot policy (spec §4.5) to the latter only.
    pub on_payload: Arc<dyn Fn(DateTime<Utc>, bool) + Send + Sync>,
}

struct Inner {
    active: bool,
    kick: Option<TimerHandle>,
}

/// Drives one configured event's wire state. Cheap to clone: all state lives
/// behind the shared lock.
#[derive(Clone)]
pub struct EventStateMachine {
    event: String,
    custom_name: Option<String>,
    stateful: bool,
    kick_delay: Duration,
    protocol: ProtocolHandle,
    timers: TimerWheel,
    hooks: Option<EventHooks>,
    inner: Arc<Mutex<Inner>>,
}

impl EventStateMachine {
    pub fn new(
        config: &EventConfigWire,
        protocol: ProtocolHandle,
        timers: TimerWheel,
        hooks: Option<EventHooks>,
    ) -> Self {
        let delay_secs = config.caps.state_emulation_report_delay.min(MAX_KICK_DELAY_SECS).max(1);
        EventStateMachine {
            event: config.event.clone(),
            custom_name: config.custom_name.clone(),
            stateful: config.caps.stateful,
            kick_delay: Duration::from_secs(delay_secs as u64),
            protocol,
            timers,
            hooks,
            inner: Arc::new(Mutex::new(Inner { active: false, kick: None })),
        }
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    /// Emit a one-shot `triggered` frame. Valid for stateless events only;
    /// calling it on a stateful event is a caller bug but still emits the
    /// frame rather than silently dropping it, matching the wire's own
    /// tolerance for unexpected-but-well-formed input.
    pub async fn trigger(&self, meta: Option<serde_json::Value>) -> Result<()> {
        let now = chrono::Utc::now();
        self.emit(now, "triggered", meta).await?;
        if let Some(hooks) = &self.hooks {
            (hooks.on_payload)(now, false);
        }
        Ok(())
    }

    /// Begin a stateful occurrence: emits `started` and arms the
    /// continuation ticker.
    pub async fn start(&self, meta: Option<serde_json::Value>) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.active {
                return Ok(());
            }
            inner.active = true;
        }
        let now = chrono::Utc::now();
        self.emit(now, "started", meta).await?;
        if let Some(hooks) = &self.hooks {
            (hooks.on_started)(now);
        }
        self.arm_kick();
        Ok(())
    }

    /// End a stateful occurrence: cancels the ticker and emits `stopped`.
    pub async fn stop(&self, meta: Option<serde_json::Value>) -> Result<()> {
        let was_active = {
            let mut inner = self.inner.lock();
            let was = inner.active;
            inner.active = false;
            if let Some(handle) = inner.kick.take() {
                self.timers.cancel(handle);
            }
            was
        };
        if !was_active {
            return Ok(());
        }
        let now = chrono::Utc::now();
        self.emit(now, "stopped", meta).await?;
        if let Some(hooks) = &self.hooks {
            (hooks.on_stopped)(now);
        }
        Ok(())
    }

    fn arm_kick(&self) {
        let this = self.clone();
        let handle = self.timers.schedule(self.kick_delay, move || {
            let this = this.clone();
            tokio::spawn(async move {
                this.kick().await;
            });
        });
        self.inner.lock().kick = Some(handle);
    }

    async fn kick(&self) {
        let still_active = {
            let inner = self.inner.lock();
            inner.active
        };
        if !still_active {
            return;
        }
        let now = chrono::Utc::now();
        if self.emit(now, "ongoing", None).await.is_ok() {
            if let Some(hooks) = &self.hooks {
                (hooks.on_payload)(now, true);
            }
            self.arm_kick();
        }
    }

    async fn emit(&self, now: DateTime<Utc>, state: &str, meta: Option<serde_json::Value>) -> Result<()> {
        let command = Command::CamEvent(CamEvent {
            event: self.event.clone(),
            custom_name: self.custom_name.clone(),
            time: crate::time::to_packed(now),
            state: state.to_string(),
            meta,
        });
        self.protocol.send(command).await
    }

    /// Force-stop without waiting for a reply; used from `Drop`.
    fn force_stop_sync(&self) {
        let mut inner = self.inner.lock();
        if !inner.active {
            return;
        }
        inner.active = false;
        if let Some(handle) = inner.kick.take() {
            self.timers.cancel(handle);
        }
        let now = chrono::Utc::now();
        self.protocol.try_send(Command::CamEvent(CamEvent {
            event: self.event.clone(),
            custom_name: self.custom_name.clone(),
            time: crate::time::to_packed(now),
            state: "stopped".to_string(),
            meta: None,
        }));
        if let Some(hooks) = &self.hooks {
            (hooks.on_stopped)(now);
        }
    }
}

impl Drop for EventStateMachine {
    fn drop(&mut self) {
        // Only the last clone (refcount 1 on the shared inner) owns the
        // occurrence; earlier clones dropping is a no-op.
        if Arc::strong_count(&self.inner) == 1 {
            self.force_stop_sync();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::payloads::EventCapsWire;

    fn stateful_config() -> EventConfigWire {
        EventConfigWire {
            event: "motion".to_string(),
            custom_name: None,
            active: true,
            snapshot: false,
            period: None,
            stream: false,
            caps: EventCapsWire {
                stateful: true,
                stream: false,
                snapshot: false,
                trigger: false,
                periodic: false,
                state_emulation_report_delay: 3,
            },
        }
    }

    #[tokio::test]
    async fn start_is_idempotent_while_active() {
        let (protocol, mut inbound, _task) =
            crate::protocol::spawn(test_config(), crate::protocol::EngineOptions::default());
        let machine = EventStateMachine::new(&stateful_config(), protocol, TimerWheel::new(), None);
        machine.start(None).await.unwrap();
        machine.start(None).await.unwrap();
        drop(inbound.try_recv());
    }

    fn test_config() -> crate::config::AgentConfig {
        use crate::config::*;
        AgentConfig {
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
        }
    }
}
