//! Command envelope header shared by every wire message (spec §3, §6).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Process-wide monotonically increasing message id generator.
static NEXT_MSGID: AtomicI64 = AtomicI64::new(1);

/// Allocate the next outbound `msgid`. Monotonic for the lifetime of the process.
pub fn next_msgid() -> i64 {
    NEXT_MSGID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub msgid: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cam_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub refid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub orig_cmd: Option<String>,
}

impl Header {
    /// Build the header for a reply to `orig`: `refid = orig.msgid`,
    /// `orig_cmd = orig.cmd`, per spec §3 Command envelope invariants.
    pub fn reply_to(orig: &Header, orig_cmd_name: &str, cam_id: Option<i64>) -> Self {
        Header {
            msgid: next_msgid(),
            cam_id,
            refid: Some(orig.msgid),
            orig_cmd: Some(orig_cmd_name.to_string()),
        }
    }

    pub fn new(cam_id: Option<i64>) -> Self {
        Header {
            msgid: next_msgid(),
            cam_id,
            refid: None,
            orig_cmd: None,
        }
    }
}
