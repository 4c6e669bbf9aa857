//! Transport facade (component C2): the control-channel socket, the HTTP
//! client used for direct uploads, and the timed-callback scheduler shared by
//! the protocol and event layers.

pub mod channel;
pub mod http;
pub mod timer;

pub use channel::{Channel, ChannelEvent};
pub use http::HttpClient;
pub use timer::{TimerHandle, TimerWheel};
