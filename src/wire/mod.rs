//! Wire codec and command registry (spec §3/§4.1, component C1).

pub mod commands;
pub mod enums;
pub mod header;
pub mod message;
pub mod payloads;

pub use commands::Command;
pub use header::Header;
pub use message::Message;
