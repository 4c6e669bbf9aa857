//! Control-channel connection state machine (spec §4.2/§4.3).

/// `DISCONNECTED → CONNECTING → REGISTERING → AWAIT_HELLO → REGISTERED →
/// OPERATIONAL → CLOSING → DISCONNECTED`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Registering,
    AwaitHello,
    Registered,
    Operational,
    Closing,
}

impl ConnectionState {
    /// Whether a command other than the handshake itself may be sent.
    pub fn is_operational(&self) -> bool {
        matches!(self, ConnectionState::Operational)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Registering => "REGISTERING",
            ConnectionState::AwaitHello => "AWAIT_HELLO",
            ConnectionState::Registered => "REGISTERED",
            ConnectionState::Operational => "OPERATIONAL",
            ConnectionState::Closing => "CLOSING",
        };
        write!(f, "{s}")
    }
}
