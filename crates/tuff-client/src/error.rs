//! Client error types.

use std::io;

use thiserror::Error;
use tuff_mc::ProtocolError;

/// Errors from connecting, probing or sending.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A protocol-level error from the engine.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The TCP connection could not be established.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialled.
        addr: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The address is not `host:port`.
    #[error("Invalid server address '{0}' (expected host:port)")]
    InvalidAddress(String),

    /// The server answered the status probe with something unusable.
    #[error("Invalid status response: {0}")]
    Status(String),

    /// The status JSON did not parse.
    #[error("Status JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A chat message was rejected before sending.
    #[error("Invalid chat message: {0}")]
    InvalidChat(String),

    /// The operation did not finish in time.
    #[error("Timed out")]
    Timeout,
}

/// Result type alias using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;
