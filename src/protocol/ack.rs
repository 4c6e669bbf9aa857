//! Ack correlation table: `msgid → (ack_callback, timeout_callback)`
//! (spec §4.1 ordering guarantees), grounded on the request/response oneshot
//! pattern used for JMUX channel-open acks in the pack.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{AgentError, Result};
use crate::transport::{TimerHandle, TimerWheel};
use crate::wire::Message;

struct Pending {
    reply: oneshot::Sender<Message>,
    timer: TimerHandle,
}

/// Tracks in-flight requests awaiting a `done`/reply keyed by `msgid`.
#[derive(Clone)]
pub struct AckTable {
    pending: Arc<Mutex<HashMap<i64, Pending>>>,
    timers: TimerWheel,
}

impl AckTable {
    pub fn new(timers: TimerWheel) -> Self {
        AckTable {
            pending: Arc::new(Mutex::new(HashMap::new())),
            timers,
        }
    }

    /// Register `msgid` as awaiting a reply. If no reply arrives within
    /// `timeout`, the returned receiver resolves to `Err(AckTimeout)`.
    pub fn register(&self, msgid: i64, cmd_name: &'static str, timeout: Duration) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        let pending = self.pending.clone();
        let timer = self.timers.schedule(timeout, move || {
            if let Some(entry) = pending.lock().remove(&msgid) {
                // the receiver may already be dropped by the caller; ignore.
                let _ = entry.reply;
                tracing::debug!(msgid, cmd = cmd_name, "ack wait timed out");
            }
        });
        self.pending.lock().insert(msgid, Pending { reply: tx, timer });
        rx
    }

    /// Resolve a pending request with the reply that just arrived. Returns
    /// `true` if `refid` matched an outstanding request.
    pub fn resolve(&self, refid: i64, message: Message) -> bool {
        let entry = self.pending.lock().remove(&refid);
        match entry {
            Some(pending) => {
                self.timers.cancel(pending.timer);
                let _ = pending.reply.send(message);
                true
            }
            None => false,
        }
    }

    /// Drop all pending requests, failing their waiters, e.g. on disconnect.
    pub fn clear(&self) {
        let mut pending = self.pending.lock();
        for (_, entry) in pending.drain() {
            self.timers.cancel(entry.timer);
            drop(entry.reply);
        }
    }
}

/// Await a registered reply, translating a dropped sender (timeout fired, or
/// table cleared) into [`AgentError::AckTimeout`].
pub async fn await_reply(
    rx: oneshot::Receiver<Message>,
    cmd_name: &'static str,
    msgid: i64,
) -> Result<Message> {
    rx.await.map_err(|_| AgentError::AckTimeout {
        cmd: cmd_name.to_string(),
        msgid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::commands::Command;
    use crate::wire::header::Header;
    use crate::wire::payloads::Done;
    use crate::wire::enums::DoneStatus;

    fn done_message(refid: i64) -> Message {
        let mut header = Header::new(None);
        header.refid = Some(refid);
        Message::new(header, Command::Done(Done { status: DoneStatus::Ok }))
    }

    #[tokio::test]
    async fn resolves_matching_refid() {
        let table = AckTable::new(TimerWheel::new());
        let rx = table.register(7, "register", Duration::from_secs(5));
        assert!(table.resolve(7, done_message(7)));
        let reply = await_reply(rx, "register", 7).await.unwrap();
        match reply.command {
            Command::Done(d) => assert_eq!(d.status, DoneStatus::Ok),
            _ => panic!("expected done"),
        }
    }

    #[tokio::test]
    async fn unmatched_refid_is_ignored() {
        let table = AckTable::new(TimerWheel::new());
        let _rx = table.register(1, "register", Duration::from_secs(5));
        assert!(!table.resolve(999, done_message(999)));
    }

    #[tokio::test]
    async fn times_out_when_no_reply_arrives() {
        let table = AckTable::new(TimerWheel::new());
        let rx = table.register(3, "bye", Duration::from_millis(20));
        let err = await_reply(rx, "bye", 3).await.unwrap_err();
        assert!(matches!(err, AgentError::AckTimeout { msgid: 3, .. }));
    }
}
