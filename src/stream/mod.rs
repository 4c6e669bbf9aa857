//! Stream manager (component C6, spec §4.6).

pub mod flags;
pub mod manager;
pub mod source;

pub use flags::RecordingMode;
pub use manager::StreamManager;
pub use source::{DemoSource, MediaSource};
