//! Control-channel protocol engine (component C3): connection state machine,
//! register/cam_register handshake, ack correlation, and reconnect policy.

pub mod ack;
pub mod engine;
pub mod persisted;
pub mod state;

pub use engine::{spawn, EngineOptions, ProtocolHandle};
pub use persisted::{InMemoryPersistedState, PersistedState};
pub use state::ConnectionState;
