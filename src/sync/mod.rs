//! Timeline synchronizer (component C8, spec §4.8).

pub mod slot;
pub mod synchronizer;

pub use slot::{is_wholly_covered, RemoteSlotProvider, UploadSlot};
pub use synchronizer::{SyncHandle, TimelineSyncConfig, TimelineSynchronizer};
