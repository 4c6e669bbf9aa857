//! Timed storage abstraction (component C7, spec §4.7).

pub mod item;
pub mod queue;
pub mod timed_storage;

pub use item::{Item, ItemState, Period};
pub use queue::QueuedAsyncStorage;
pub use timed_storage::{InMemoryStorage, TimedStorage};
