//! Broker error type.

use thiserror::Error;

/// Result type used across the broker.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors raised by the broker and its collaborators.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn actor: {0}")]
    Spawn(String),

    #[error("Actor {0} is no longer running")]
    ActorStopped(String),

    #[error("Connection engine error: {0}")]
    Engine(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown link: {0}")]
    UnknownLink(crate::LinkId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
