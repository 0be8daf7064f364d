//! crates/discussion_core/src/ports.rs
//!
//! Defines the transport contracts (traits) the discussion client is written against.
//! These traits keep the client independent of a concrete socket library, so the
//! websocket adapter can be swapped for an in-memory one in tests.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all transport port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid gateway endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("The connection has been closed")]
    Closed,
    #[error("The emit queue is full ({0} events pending)")]
    QueueFull(usize),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Connection Options
//=========================================================================================

/// Everything a transport needs to open the discussion connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    /// Base gateway URL, e.g. `http://localhost:3005`.
    pub base_url: String,
    /// Logical channel multiplexed over the gateway connection, e.g. `/threads`.
    pub namespace: String,
    /// Credential cookie forwarded on the handshake.
    pub auth_cookie: Option<String>,
    pub reconnection: bool,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub reconnection_delay_max: Duration,
    /// Jitter applied to each reconnection delay, in `0.0..=1.0`.
    pub randomization_factor: f64,
    pub timeout: Duration,
    /// Emits held while no session is live. Further emits are refused.
    pub emit_queue_capacity: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3005".to_string(),
            namespace: "/threads".to_string(),
            auth_cookie: None,
            reconnection: true,
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1000),
            reconnection_delay_max: Duration::from_millis(5000),
            randomization_factor: 0.5,
            timeout: Duration::from_millis(20000),
            emit_queue_capacity: 256,
        }
    }
}

//=========================================================================================
// Transport Events
//=========================================================================================

/// What a transport reports back while a connection is alive.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The namespace handshake completed (first connect or a reconnect).
    Connected,
    /// A connection attempt failed.
    ConnectError(String),
    /// The connection dropped or was closed.
    Disconnected(String),
    /// A named event arrived from the gateway.
    Message { name: String, payload: Value },
}

/// Receives transport events. Implementations are called from the transport's
/// own task, one event at a time.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: TransportEvent);
}

//=========================================================================================
// Transport Ports (Traits)
//=========================================================================================

/// Opens connections to the discussion gateway.
pub trait GatewayTransport: Send + Sync {
    /// Starts a connection. The call returns immediately; the handshake and all
    /// reconnection attempts happen in the background and are reported to `sink`.
    fn open(
        &self,
        options: &ConnectOptions,
        sink: Arc<dyn EventSink>,
    ) -> PortResult<Arc<dyn GatewayConnection>>;
}

/// A live (or reconnecting) connection to the gateway.
pub trait GatewayConnection: Send + Sync {
    /// Stable identity of this connection object.
    fn id(&self) -> Uuid;

    /// Queues a named event for the gateway. Fire-and-forget.
    ///
    /// Events queue while the transport is between sessions and flush once the
    /// next session is up. Fails with [`PortError::QueueFull`] when
    /// `emit_queue_capacity` events are already waiting, and with
    /// [`PortError::Closed`] once the connection was closed or gave up
    /// reconnecting.
    fn emit(&self, event: &str, payload: Value) -> PortResult<()>;

    /// Asks the transport to close. Idempotent.
    fn close(&self);
}
