//! Control-channel transport (component C2): a WebSocket connection carrying
//! encoded [`Message`]s, with a background task driving the socket and a
//! handle for sending frames and receiving inbound ones.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::error::{AgentError, Result};
use crate::wire::Message;

const INBOUND_QUEUE_DEPTH: usize = 256;
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Event delivered to the protocol layer as frames arrive or the socket dies.
#[derive(Debug)]
pub enum ChannelEvent {
    Message(Message),
    /// Decoded as JSON fine but didn't parse as an envelope; surfaced rather
    /// than silently dropped so the protocol layer can log it.
    Malformed(AgentError),
    Closed,
}

/// A live control-channel connection. Dropping this closes the socket.
pub struct Channel {
    outbound: mpsc::Sender<Message>,
    inbound: mpsc::Receiver<ChannelEvent>,
    driver: JoinHandle<()>,
}

impl Channel {
    /// Connect to `url` and spawn the driver task.
    pub async fn connect(url: &Url) -> Result<Channel> {
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let (mut ws_write, mut ws_read) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_DEPTH);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ChannelEvent>(INBOUND_QUEUE_DEPTH);

        let driver = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => {
                        let Some(msg) = outgoing else {
                            let _ = ws_write.close().await;
                            break;
                        };
                        match msg.encode() {
                            Ok(text) => {
                                if ws_write.send(WsMessage::Text(text.into())).await.is_err() {
                                    let _ = inbound_tx.send(ChannelEvent::Closed).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "dropping outbound message, failed to encode");
                            }
                        }
                    }
                    incoming = ws_read.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Text(text))) => {
                                let event = match Message::decode(&text) {
                                    Ok(m) => ChannelEvent::Message(m),
                                    Err(e) => ChannelEvent::Malformed(e),
                                };
                                if inbound_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(WsMessage::Binary(bin))) => {
                                let event = match std::str::from_utf8(&bin) {
                                    Ok(text) => match Message::decode(text) {
                                        Ok(m) => ChannelEvent::Message(m),
                                        Err(e) => ChannelEvent::Malformed(e),
                                    },
                                    Err(_) => ChannelEvent::Malformed(AgentError::Transport(
                                        "binary frame is not utf-8".into(),
                                    )),
                                };
                                if inbound_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                            Some(Ok(WsMessage::Close(_))) | None => {
                                let _ = inbound_tx.send(ChannelEvent::Closed).await;
                                break;
                            }
                            Some(Ok(WsMessage::Frame(_))) => {}
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "control channel read error");
                                let _ = inbound_tx.send(ChannelEvent::Closed).await;
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Channel {
            outbound: outbound_tx,
            inbound: inbound_rx,
            driver,
        })
    }

    pub async fn send(&self, message: Message) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| AgentError::Transport("control channel closed".into()))
    }

    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.inbound.recv().await
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
