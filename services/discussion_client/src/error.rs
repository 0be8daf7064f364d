//! services/discussion_client/src/error.rs
//!
//! Defines the primary error type for the discussion client.

use crate::config::ConfigError;
use discussion_core::ports::PortError;

/// The primary error type for the `discussion_client` crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The operation needs a connection and `connect()` has not been called
    /// (or `disconnect()` has released it).
    #[error("Not connected to the discussion gateway")]
    NotConnected,

    /// The gateway refused the namespace handshake.
    #[error("Gateway rejected the connection: {0}")]
    Rejected(String),

    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the transport port.
    #[error("Transport Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying WebSocket library.
    #[error("WebSocket Error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An event payload could not be encoded or decoded.
    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Represents a standard Input/Output error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// A convenience type alias for `Result<T, ClientError>`.
pub type ClientResult<T> = Result<T, ClientError>;
