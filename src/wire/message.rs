//! Flat envelope encode/decode (spec §3, §4.1).
//!
//! The wire representation is one flat JSON object:
//! `{cmd, msgid, cam_id, refid, orig_cmd} ∪ payload`. We deliberately don't
//! lean on serde's internally-tagged enum derive here: the envelope needs
//! precise, distinguishable failure modes (`InvalidEnvelope` vs
//! `UnknownCommand` vs `InvalidPayload`) that a single derived `Deserialize`
//! can't give us cleanly.

use serde_json::Value;

use crate::error::{AgentError, Result};

use super::commands::Command;
use super::header::Header;

#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub command: Command,
}

impl Message {
    pub fn new(header: Header, command: Command) -> Self {
        Message { header, command }
    }

    /// Encode to the wire's flat JSON object form.
    pub fn encode(&self) -> Result<String> {
        let mut map = serde_json::Map::new();
        map.insert(
            "cmd".to_string(),
            Value::String(self.command.name().to_string()),
        );
        if let Value::Object(h) = serde_json::to_value(&self.header)? {
            map.extend(h);
        }
        self.command.merge_into(&mut map)?;
        Ok(serde_json::to_string(&Value::Object(map))?)
    }

    /// Decode a flat envelope object.
    ///
    /// - missing `cmd` → [`AgentError::InvalidEnvelope`]
    /// - `cmd` not a registered command → [`AgentError::UnknownCommand`]
    /// - payload fields don't match the command's shape → [`AgentError::InvalidPayload`]
    pub fn decode(raw: &str) -> Result<Message> {
        let value: Value = serde_json::from_str(raw)?;
        let obj = value.as_object().ok_or(AgentError::InvalidEnvelope)?;

        let cmd = obj
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or(AgentError::InvalidEnvelope)?;

        let header: Header = serde_json::from_value(value.clone()).map_err(|e| {
            AgentError::InvalidPayload {
                cmd: cmd.to_string(),
                reason: format!("malformed header: {e}"),
            }
        })?;

        let command = Command::from_value(cmd, &value)?;

        Ok(Message { header, command })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::enums::ByeReason;
    use crate::wire::payloads::Bye;

    #[test]
    fn round_trips_command_and_header() {
        let header = Header::new(Some(42));
        let msg = Message::new(
            header.clone(),
            Command::Bye(Bye {
                reason: ByeReason::Reconnect,
                retry: Some(5),
            }),
        );
        let encoded = msg.encode().unwrap();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded.header.cam_id, Some(42));
        match decoded.command {
            Command::Bye(b) => {
                assert_eq!(b.reason, ByeReason::Reconnect);
                assert_eq!(b.retry, Some(5));
            }
            other => panic!("unexpected command decoded: {}", other.name()),
        }
    }

    #[test]
    fn missing_cmd_is_invalid_envelope() {
        let err = Message::decode(r#"{"msgid": 1}"#).unwrap_err();
        assert!(matches!(err, AgentError::InvalidEnvelope));
    }

    #[test]
    fn unregistered_cmd_is_unknown_command() {
        let err = Message::decode(r#"{"cmd": "not_a_real_command", "msgid": 1}"#).unwrap_err();
        assert!(matches!(err, AgentError::UnknownCommand(c) if c == "not_a_real_command"));
    }

    #[test]
    fn reply_to_sets_refid_and_orig_cmd() {
        let register_header = Header::new(None);
        let reply = Header::reply_to(&register_header, "register", Some(7));
        assert_eq!(reply.refid, Some(register_header.msgid));
        assert_eq!(reply.orig_cmd.as_deref(), Some("register"));
        assert_eq!(reply.cam_id, Some(7));
    }

    #[test]
    fn unset_fields_are_omitted_on_encode() {
        let msg = Message::new(
            Header::new(None),
            Command::Bye(Bye {
                reason: ByeReason::Shutdown,
                retry: None,
            }),
        );
        let encoded = msg.encode().unwrap();
        assert!(!encoded.contains("retry"));
        assert!(!encoded.contains("cam_id"));
        assert!(!encoded.contains("refid"));
    }
}
