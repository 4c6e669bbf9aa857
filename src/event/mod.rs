//! Event-state machine and event manager (components C4/C5, spec §4.4/§4.5).

pub mod manager;
pub mod source;
pub mod state_machine;

pub use manager::EventManager;
pub use source::{EventOccurrence, EventSource, ManualEventSource};
pub use state_machine::EventStateMachine;
