//! Crate-wide error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid envelope: missing 'cmd' field")]
    InvalidEnvelope,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid payload for command '{cmd}': {reason}")]
    InvalidPayload { cmd: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("command '{cmd}' (msgid {msgid}) timed out waiting for ack")]
    AckTimeout { cmd: String, msgid: i64 },

    #[error("stream '{0}' not found")]
    StreamNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("sync error: {0}")]
    Sync(String),

    #[error("not supported")]
    NotSupported,
}

pub type Result<T> = std::result::Result<T, AgentError>;
