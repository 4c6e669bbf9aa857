//! Agent façade (component C9, spec §4.9): the single entry point an
//! embedder constructs, wiring the wire codec, transport, protocol engine,
//! event manager, stream manager, and timeline synchronizer together behind
//! one `create`/`start`/`stop` lifecycle and an inbound command dispatch
//! loop.

pub mod callback;
pub mod facade;
pub mod slot_provider;

pub use callback::{AgentCallback, NullCallback};
pub use facade::{Agent, AgentDeps};
pub use slot_provider::ProtocolSlotProvider;
