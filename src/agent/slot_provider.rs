//! Implements [`RemoteSlotProvider`] over the control channel: `get_direct_upload_url`
//! / `direct_upload_url` / `confirm_direct_upload`, grounded on
//! `direct-upload-storage.h`'s `direct_upload_proto_storage` in the original
//! agent. This is the façade's half of Open Question #2 — the synchronizer
//! calls `confirm` once a transfer succeeds, and this adapter is what turns
//! that into the wire command, not the `TimedStorage` backing the local
//! segments.

use async_trait::async_trait;
use url::Url;

use crate::error::{AgentError, Result};
use crate::protocol::ProtocolHandle;
use crate::storage::Period;
use crate::sync::{RemoteSlotProvider, UploadSlot};
use crate::wire::commands::Command;
use crate::wire::enums::UploadCategory;
use crate::wire::payloads::{ConfirmDirectUpload, GetDirectUploadUrl};

pub struct ProtocolSlotProvider {
    protocol: ProtocolHandle,
}

impl ProtocolSlotProvider {
    pub fn new(protocol: ProtocolHandle) -> Self {
        ProtocolSlotProvider { protocol }
    }
}

#[async_trait]
impl RemoteSlotProvider for ProtocolSlotProvider {
    /// This protocol has no remote-coverage query command; the synchronizer
    /// relies on its own `done`-tracking to avoid re-uploading a segment.
    async fn coverage(&self, _stream_id: &str, _category: UploadCategory, _period: Period) -> Result<Vec<Period>> {
        Ok(Vec::new())
    }

    async fn request_slot(
        &self,
        stream_id: &str,
        category: UploadCategory,
        period: Period,
        size_bytes: u64,
    ) -> Result<UploadSlot> {
        let request = Command::GetDirectUploadUrl(GetDirectUploadUrl {
            category,
            stream_id: stream_id.to_string(),
            file_time: crate::time::to_packed(period.begin),
            duration_ms: period.duration().num_milliseconds(),
            size: size_bytes as i64,
        });
        let reply = self.protocol.call(request).await?;
        let slot = match reply.command {
            Command::DirectUploadUrl(s) => s,
            other => {
                return Err(AgentError::InvalidPayload {
                    cmd: "get_direct_upload_url".into(),
                    reason: format!("expected direct_upload_url reply, got {}", other.name()),
                })
            }
        };
        if slot.status != "OK" {
            return Err(AgentError::Sync(format!("upload slot request denied: {}", slot.status)));
        }
        let url = slot.url.ok_or_else(|| AgentError::InvalidPayload {
            cmd: "direct_upload_url".into(),
            reason: "status OK but no url".into(),
        })?;
        let url: Url = url.parse()?;
        Ok(UploadSlot { url, headers: slot.headers })
    }

    async fn confirm(&self, category: UploadCategory, url: &Url) -> Result<()> {
        self.protocol
            .send(Command::ConfirmDirectUpload(ConfirmDirectUpload {
                category,
                url: url.to_string(),
            }))
            .await
    }
}
