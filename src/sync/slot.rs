//! Remote upload-slot negotiation (spec §4.8 step 2b): wraps the
//! `get_direct_upload_url` / `direct_upload_url` exchange and the coverage
//! query used to skip segments already present remotely.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::storage::Period;
use crate::wire::enums::UploadCategory;

pub struct UploadSlot {
    pub url: Url,
    pub headers: HashMap<String, String>,
}

#[async_trait]
pub trait RemoteSlotProvider: Send + Sync {
    /// Periods already present (or confirmed in flight) remotely for
    /// `stream_id`/`category` that overlap `period` — used to skip segments
    /// wholly covered by the remote side.
    async fn coverage(&self, stream_id: &str, category: UploadCategory, period: Period) -> Result<Vec<Period>>;

    /// Request a pre-signed upload slot for one segment.
    async fn request_slot(
        &self,
        stream_id: &str,
        category: UploadCategory,
        period: Period,
        size_bytes: u64,
    ) -> Result<UploadSlot>;

    /// Tell the cloud the transfer for `url` completed, per Open Question
    /// resolution: the façade (not the storage adapter) calls this once the
    /// synchronizer reports a segment done.
    async fn confirm(&self, category: UploadCategory, url: &Url) -> Result<()>;
}

/// Drop a segment from `coverage` that is wholly contained in it.
pub fn is_wholly_covered(period: Period, coverage: &[Period]) -> bool {
    coverage.iter().any(|c| c.begin <= period.begin && c.end >= period.end)
}
