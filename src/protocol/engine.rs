//! Protocol engine (component C3): owns the control-channel connection,
//! drives the handshake, keeps the ack table, and reconnects on recoverable
//! `bye` reasons using a capped exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{AccessTokenConfig, AgentConfig};
use crate::error::{AgentError, Result};
use crate::transport::{Channel, ChannelEvent, TimerWheel};
use crate::wire::commands::Command;
use crate::wire::enums::{ByeReason, ByeRecovery};
use crate::wire::header::Header;
use crate::wire::payloads::{CamRegister, Register};
use crate::wire::Message;

use super::ack::{self, AckTable};
use super::persisted::{InMemoryPersistedState, PersistedState, PREV_SID_KEY};
use super::state::ConnectionState;

/// Callbacks and persisted-state backend a caller can plug into a running
/// engine. Kept decoupled from any higher-level callback trait so the
/// protocol layer never depends on the agent façade.
#[derive(Clone)]
pub struct EngineOptions {
    pub state: Arc<dyn PersistedState>,
    pub on_registered: Option<Arc<dyn Fn(String) + Send + Sync>>,
    pub on_bye: Option<Arc<dyn Fn(ByeReason) + Send + Sync>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            state: Arc::new(InMemoryPersistedState::new()),
            on_registered: None,
            on_bye: None,
        }
    }
}

/// Request sent from the rest of the agent to the protocol engine.
enum EngineCommand {
    Send {
        command: Command,
        ack: Option<oneshot::Sender<(i64, oneshot::Receiver<Message>)>>,
    },
    /// A reply to an inbound command: carries its own header (`refid`/
    /// `orig_cmd` already set via [`Header::reply_to`]) rather than having
    /// one freshly allocated, and is never tracked in the ack table.
    SendReply {
        header: Header,
        command: Command,
    },
    Shutdown,
}

/// Handle used by the rest of the agent to talk to a running [`Engine`].
#[derive(Clone)]
pub struct ProtocolHandle {
    requests: mpsc::Sender<EngineCommand>,
    ack_timeout: Duration,
}

impl ProtocolHandle {
    /// Fire-and-forget send; does not wait for a reply.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.requests
            .send(EngineCommand::Send { command, ack: None })
            .await
            .map_err(|_| AgentError::Transport("protocol engine stopped".into()))
    }

    /// Send and await the correlated reply, or time out per
    /// `transport.ack_timeout_secs`.
    pub async fn call(&self, command: Command) -> Result<Message> {
        let name = command.name();
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(EngineCommand::Send {
                command,
                ack: Some(tx),
            })
            .await
            .map_err(|_| AgentError::Transport("protocol engine stopped".into()))?;
        let (msgid, reply_rx) = rx
            .await
            .map_err(|_| AgentError::Transport("protocol engine stopped before registering ack".into()))?;
        ack::await_reply(reply_rx, name, msgid).await
    }

    /// Reply to an inbound command. Builds the header via
    /// [`Header::reply_to`] rather than allocating a fresh one, and is
    /// fire-and-forget: replies are never acked by the peer.
    pub async fn send_reply(&self, in_reply_to: &Header, orig_cmd_name: &'static str, command: Command) -> Result<()> {
        let header = Header::reply_to(in_reply_to, orig_cmd_name, in_reply_to.cam_id);
        self.requests
            .send(EngineCommand::SendReply { header, command })
            .await
            .map_err(|_| AgentError::Transport("protocol engine stopped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.requests.send(EngineCommand::Shutdown).await;
    }

    /// Non-blocking send, for call sites that can't await (e.g. `Drop`).
    /// Best-effort: silently dropped if the engine's request queue is full
    /// or stopped.
    pub fn try_send(&self, command: Command) {
        let _ = self.requests.try_send(EngineCommand::Send { command, ack: None });
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }
}

/// Spawn the protocol engine. Returns a handle for sending commands, a
/// receiver of inbound commands that were not replies to an outstanding
/// request (for the agent façade to dispatch to event/stream managers), and
/// the engine's background task.
pub fn spawn(config: AgentConfig, options: EngineOptions) -> (ProtocolHandle, mpsc::Receiver<Message>, JoinHandle<()>) {
    let (req_tx, req_rx) = mpsc::channel(64);
    let (inbound_tx, inbound_rx) = mpsc::channel(256);
    let timers = TimerWheel::new();
    let acks = AckTable::new(timers.clone());
    let ack_timeout = config.transport.ack_timeout();

    let handle = ProtocolHandle {
        requests: req_tx,
        ack_timeout,
    };

    let task = tokio::spawn(run(
        config,
        req_rx,
        inbound_tx,
        acks,
        options.state,
        options.on_registered,
        options.on_bye,
    ));

    (handle, inbound_rx, task)
}

async fn run(
    config: AgentConfig,
    mut requests: mpsc::Receiver<EngineCommand>,
    inbound: mpsc::Sender<Message>,
    acks: AckTable,
    persisted: Arc<dyn PersistedState>,
    on_registered: Option<Arc<dyn Fn(String) + Send + Sync>>,
    on_bye: Option<Arc<dyn Fn(ByeReason) + Send + Sync>>,
) {
    let mut state = ConnectionState::Disconnected;
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(config.transport.reconnect_initial_secs),
        max_interval: Duration::from_secs(config.transport.reconnect_max_secs),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };

    'reconnect: loop {
        state = ConnectionState::Connecting;
        tracing::info!(%state, "connecting control channel");

        let channel = match Channel::connect(&config.cloud.control_url).await {
            Ok(c) => {
                backoff.reset();
                c
            }
            Err(e) => {
                let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(config.transport.reconnect_max_secs));
                tracing::warn!(error = %e, delay_secs = delay.as_secs(), "control channel connect failed, retrying");
                tokio::time::sleep(delay).await;
                continue 'reconnect;
            }
        };

        let mut channel = channel;
        state = ConnectionState::Registering;

        let sid = match do_handshake(&mut channel, &config, config.transport.ack_timeout(), &persisted).await {
            Ok(sid) => sid,
            Err(e) => {
                tracing::warn!(error = %e, "handshake failed, reconnecting");
                let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(config.transport.reconnect_max_secs));
                tokio::time::sleep(delay).await;
                continue 'reconnect;
            }
        };

        if let Some(sid) = sid {
            persisted.set(PREV_SID_KEY, sid.clone());
            if let Some(cb) = &on_registered {
                cb(sid);
            }
        }

        state = ConnectionState::Operational;
        tracing::info!(%state, "control channel operational");

        loop {
            tokio::select! {
                req = requests.recv() => {
                    match req {
                        Some(EngineCommand::Send { command, ack }) => {
                            let header = Header::new(None);
                            let msgid = header.msgid;
                            let name = command.name();
                            if let Some(ack_tx) = ack {
                                let rx = acks.register(msgid, name, config.transport.ack_timeout());
                                let _ = ack_tx.send((msgid, rx));
                            }
                            let msg = Message::new(header, command);
                            if let Err(e) = channel.send(msg).await {
                                tracing::warn!(error = %e, "failed to send, reconnecting");
                                break;
                            }
                        }
                        Some(EngineCommand::SendReply { header, command }) => {
                            let msg = Message::new(header, command);
                            if let Err(e) = channel.send(msg).await {
                                tracing::warn!(error = %e, "failed to send reply, reconnecting");
                                break;
                            }
                        }
                        Some(EngineCommand::Shutdown) | None => {
                            state = ConnectionState::Closing;
                            tracing::info!(%state, "protocol engine shutting down");
                            return;
                        }
                    }
                }
                event = channel.recv() => {
                    match event {
                        Some(ChannelEvent::Message(msg)) => {
                            if let Some(refid) = msg.header.refid {
                                if acks.resolve(refid, msg.clone()) {
                                    continue;
                                }
                            }
                            if let Command::Bye(bye) = &msg.command {
                                match bye.reason.recovery() {
                                    ByeRecovery::Recoverable => {
                                        tracing::info!(reason = ?bye.reason, "bye: reconnecting");
                                    }
                                    ByeRecovery::FatalForget => {
                                        tracing::warn!("bye: deleted, forgetting session");
                                        persisted.set(PREV_SID_KEY, String::new());
                                    }
                                    ByeRecovery::FatalReport => {
                                        tracing::error!(reason = ?bye.reason, "bye: fatal");
                                    }
                                }
                                if let Some(cb) = &on_bye {
                                    cb(bye.reason);
                                }
                                acks.clear();
                                break;
                            }
                            if inbound.send(msg).await.is_err() {
                                return;
                            }
                        }
                        Some(ChannelEvent::Malformed(e)) => {
                            tracing::warn!(error = %e, "discarding malformed inbound frame");
                        }
                        Some(ChannelEvent::Closed) | None => {
                            tracing::warn!("control channel closed, reconnecting");
                            break;
                        }
                    }
                }
            }
        }

        acks.clear();
        state = ConnectionState::Disconnected;
        let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(config.transport.reconnect_max_secs));
        tokio::time::sleep(delay).await;
    }
}

/// Run `register`/`hello`/`cam_register`/`cam_hello` over a freshly connected
/// channel. `prev_sid`, if the persisted store has one, is offered so the
/// peer can resume the session without issuing a fresh token (spec §4.3).
/// Returns the new session id from `hello`, if the peer sent one — the
/// caller persists it and fires `on_registered`.
async fn do_handshake(
    channel: &mut Channel,
    config: &AgentConfig,
    timeout: Duration,
    persisted: &Arc<dyn PersistedState>,
) -> Result<Option<String>> {
    let pwd = match &config.cloud.access_token {
        AccessTokenConfig::Static { token } => token.clone(),
        AccessTokenConfig::Refreshed { .. } => {
            return Err(AgentError::Config(
                "refreshed access tokens are not implemented by this engine".into(),
            ))
        }
    };

    let prev_sid = persisted.get(PREV_SID_KEY).filter(|s| !s.is_empty());

    let register_header = Header::new(None);
    let register_msgid = register_header.msgid;
    let register = Message::new(
        register_header,
        Command::Register(Register {
            ver: env!("CARGO_PKG_VERSION").to_string(),
            tz: config.cloud.tz.clone(),
            vendor: config.cloud.vendor.clone(),
            pwd,
            prev_sid,
            reg_token: None,
            media_protocols: vec!["rtsp".to_string()],
        }),
    );
    channel.send(register).await?;
    let reply = wait_for_refid(channel, register_msgid, "register", timeout).await?;
    let hello = match reply.command {
        Command::Hello(h) => h,
        other => {
            return Err(AgentError::InvalidPayload {
                cmd: "register".into(),
                reason: format!("expected hello reply, got {}", other.name()),
            })
        }
    };

    let cam_register_header = Header::new(None);
    let cam_register_msgid = cam_register_header.msgid;
    let cam_register = Message::new(
        cam_register_header,
        Command::CamRegister(CamRegister {
            uuid: config.device.uuid.clone(),
            brand: config.device.brand.clone(),
            model: config.device.model.clone(),
            sn: config.device.sn.clone(),
            version: config.device.version.clone(),
            device_type: config.device.device_type.clone(),
            raw_messaging: config.cloud.raw_messaging,
        }),
    );
    channel.send(cam_register).await?;
    let reply = wait_for_refid(channel, cam_register_msgid, "cam_register", timeout).await?;
    match reply.command {
        Command::CamHello(_) => Ok(hello.sid),
        other => Err(AgentError::InvalidPayload {
            cmd: "cam_register".into(),
            reason: format!("expected cam_hello reply, got {}", other.name()),
        }),
    }
}

/// Pump the channel until a reply with `refid == msgid` arrives, or
/// `timeout` elapses. Used only during the handshake, before the ack table's
/// owning select loop is running.
async fn wait_for_refid(
    channel: &mut Channel,
    msgid: i64,
    cmd_name: &'static str,
    timeout: Duration,
) -> Result<Message> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(AgentError::AckTimeout {
                cmd: cmd_name.to_string(),
                msgid,
            });
        }
        let event = tokio::time::timeout(remaining, channel.recv()).await;
        match event {
            Ok(Some(ChannelEvent::Message(msg))) => {
                if msg.header.refid == Some(msgid) {
                    return Ok(msg);
                }
            }
            Ok(Some(ChannelEvent::Malformed(e))) => {
                tracing::warn!(error = %e, "discarding malformed frame during handshake");
            }
            Ok(Some(ChannelEvent::Closed)) | Ok(None) => {
                return Err(AgentError::Transport("channel closed during handshake".into()));
            }
            Err(_elapsed) => {
                return Err(AgentError::AckTimeout {
                    cmd: cmd_name.to_string(),
                    msgid,
                });
            }
        }
    }
}
