//! services/discussion_client/src/adapters/websocket.rs
//!
//! This module contains the gateway transport built on `tokio-tungstenite`.
//! It implements the `GatewayTransport` port from the `core` crate and speaks
//! Socket.IO over the Engine.IO WebSocket transport.

use crate::{
    error::{ClientError, ClientResult},
    socket::{
        backoff::Backoff,
        packet::{EnginePacket, OpenHandshake, SocketPacket},
    },
};
use discussion_core::ports::{
    ConnectOptions, EventSink, GatewayConnection, GatewayTransport, PortError, PortResult,
    TransportEvent,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, error::TrySendError},
    time::Instant,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::COOKIE, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A queued outbound event: name and payload.
type Outbound = (String, Value);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A transport that implements the `GatewayTransport` port over a WebSocket.
///
/// `open` must be called from within a tokio runtime; the connection runs on a
/// task spawned on that runtime.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

/// Builds the Engine.IO WebSocket endpoint for a gateway base URL.
pub fn engine_url(base_url: &str) -> PortResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| PortError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(PortError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| PortError::InvalidEndpoint(format!("cannot use scheme '{}'", scheme)))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    url.set_fragment(None);
    Ok(url)
}

//=========================================================================================
// `GatewayTransport` Trait Implementation
//=========================================================================================

impl GatewayTransport for WebSocketTransport {
    fn open(
        &self,
        options: &ConnectOptions,
        sink: Arc<dyn EventSink>,
    ) -> PortResult<Arc<dyn GatewayConnection>> {
        let url = engine_url(&options.base_url)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PortError::Unexpected(format!("no tokio runtime: {}", e)))?;

        let (outbound_tx, outbound_rx) = mpsc::channel(options.emit_queue_capacity.max(1));
        let token = CancellationToken::new();
        let id = Uuid::new_v4();

        runtime.spawn(connection_loop(
            url,
            options.clone(),
            sink,
            outbound_rx,
            token.clone(),
        ));
        debug!("Spawned gateway connection {}", id);

        Ok(Arc::new(WebSocketConnection {
            id,
            outbound: outbound_tx,
            capacity: options.emit_queue_capacity.max(1),
            token,
        }))
    }
}

/// Handle to a running connection task. Emits queue until the namespace
/// handshake completes.
struct WebSocketConnection {
    id: Uuid,
    outbound: mpsc::Sender<Outbound>,
    capacity: usize,
    token: CancellationToken,
}

impl GatewayConnection for WebSocketConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn emit(&self, event: &str, payload: Value) -> PortResult<()> {
        if self.token.is_cancelled() {
            return Err(PortError::Closed);
        }
        self.outbound
            .try_send((event.to_string(), payload))
            .map_err(|e| match e {
                TrySendError::Full(_) => PortError::QueueFull(self.capacity),
                TrySendError::Closed(_) => PortError::Closed,
            })
    }

    fn close(&self) {
        self.token.cancel();
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

//=========================================================================================
// Connection Task
//=========================================================================================

/// Why a live session ended. The strings match the reasons Socket.IO clients report.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionEnd {
    ClientDisconnect,
    ServerDisconnect,
    PingTimeout,
    TransportClose,
    TransportError(String),
}

impl SessionEnd {
    fn reason(&self) -> String {
        match self {
            SessionEnd::ClientDisconnect => "io client disconnect".to_string(),
            SessionEnd::ServerDisconnect => "io server disconnect".to_string(),
            SessionEnd::PingTimeout => "ping timeout".to_string(),
            SessionEnd::TransportClose => "transport close".to_string(),
            SessionEnd::TransportError(e) => format!("transport error: {}", e),
        }
    }

    /// Deliberate disconnects on either side are final.
    fn should_reconnect(&self) -> bool {
        !matches!(self, SessionEnd::ClientDisconnect | SessionEnd::ServerDisconnect)
    }
}

/// Owns the socket for the lifetime of the connection handle: connects,
/// drives the session, and reconnects with backoff after a drop.
async fn connection_loop(
    url: Url,
    options: ConnectOptions,
    sink: Arc<dyn EventSink>,
    mut outbound: mpsc::Receiver<Outbound>,
    token: CancellationToken,
) {
    let mut backoff = Backoff::from_options(&options);

    loop {
        let attempt = tokio::select! {
            _ = token.cancelled() => break,
            result = tokio::time::timeout(options.timeout, open_session(&url, &options)) => result,
        };

        match attempt {
            Ok(Ok((ws, handshake))) => {
                backoff.reset();
                sink.deliver(TransportEvent::Connected);
                let end = drive_session(
                    ws,
                    &handshake,
                    &options.namespace,
                    sink.as_ref(),
                    &mut outbound,
                    &token,
                )
                .await;
                sink.deliver(TransportEvent::Disconnected(end.reason()));
                if !end.should_reconnect() {
                    break;
                }
            }
            Ok(Err(ClientError::Rejected(message))) => {
                // The gateway refused the namespace; retrying would be refused too.
                warn!("Gateway rejected namespace {}: {}", options.namespace, message);
                sink.deliver(TransportEvent::ConnectError(message));
                break;
            }
            Ok(Err(e)) => sink.deliver(TransportEvent::ConnectError(e.to_string())),
            Err(_) => sink.deliver(TransportEvent::ConnectError("timeout".to_string())),
        }

        if !options.reconnection || token.is_cancelled() {
            break;
        }
        if backoff.attempts() >= options.reconnection_attempts {
            warn!(
                "Giving up on {} after {} reconnection attempts",
                url,
                backoff.attempts()
            );
            sink.deliver(TransportEvent::Disconnected("reconnect failed".to_string()));
            break;
        }

        let delay = backoff.next_delay();
        info!(
            "Reconnecting to {} in {:?} (attempt {})",
            url,
            delay,
            backoff.attempts()
        );
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("Gateway connection loop for {} finished", url);
}

/// Performs the WebSocket upgrade, the Engine.IO open and the namespace connect.
async fn open_session(url: &Url, options: &ConnectOptions) -> ClientResult<(WsStream, OpenHandshake)> {
    let mut request = url.as_str().into_client_request()?;
    if let Some(cookie) = &options.auth_cookie {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| ClientError::Internal(format!("invalid auth cookie: {}", e)))?;
        request.headers_mut().insert(COOKIE, value);
    }
    let (mut ws, _) = connect_async(request).await?;

    let handshake = loop {
        let text = next_text(&mut ws).await?;
        match EnginePacket::decode(&text) {
            Ok(EnginePacket::Open(handshake)) => break handshake,
            Ok(other) => debug!("Ignoring {:?} before open", other),
            Err(e) => return Err(ClientError::Internal(format!("bad open packet: {}", e))),
        }
    };

    let connect = SocketPacket::Connect {
        namespace: options.namespace.clone(),
        data: None,
    };
    send_text(&mut ws, EnginePacket::Message(connect.encode()).encode()).await?;

    loop {
        let text = next_text(&mut ws).await?;
        match EnginePacket::decode(&text) {
            Ok(EnginePacket::Ping(data)) => {
                send_text(&mut ws, EnginePacket::Pong(data).encode()).await?;
            }
            Ok(EnginePacket::Message(inner)) => match SocketPacket::decode(&inner) {
                Ok(SocketPacket::Connect { namespace, .. }) if namespace == options.namespace => {
                    return Ok((ws, handshake));
                }
                Ok(SocketPacket::ConnectError { namespace, message })
                    if namespace == options.namespace =>
                {
                    return Err(ClientError::Rejected(message));
                }
                Ok(other) => debug!("Ignoring {:?} during namespace handshake", other),
                Err(e) => warn!("Dropping malformed packet during handshake: {}", e),
            },
            Ok(EnginePacket::Close) => return Err(PortError::Closed.into()),
            Ok(_) => {}
            Err(e) => warn!("Dropping undecodable frame during handshake: {}", e),
        }
    }
}

async fn next_text(ws: &mut WsStream) -> ClientResult<String> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
            Some(Ok(Message::Close(_))) | None => return Err(PortError::Closed.into()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn send_text(ws: &mut WsStream, frame: String) -> ClientResult<()> {
    ws.send(Message::Text(frame.into())).await?;
    Ok(())
}

/// Pumps one established session until it ends.
async fn drive_session(
    ws: WsStream,
    handshake: &OpenHandshake,
    namespace: &str,
    sink: &dyn EventSink,
    outbound: &mut mpsc::Receiver<Outbound>,
    token: &CancellationToken,
) -> SessionEnd {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let heartbeat = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let mut deadline = Instant::now() + heartbeat;

    loop {
        // Queued emits are flushed before a close request is honoured.
        tokio::select! {
            biased;
            Some((name, payload)) = outbound.recv() => {
                let frame = EnginePacket::Message(SocketPacket::event(namespace, &name, payload).encode()).encode();
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    return SessionEnd::TransportError(e.to_string());
                }
            }
            _ = token.cancelled() => {
                let farewell = SocketPacket::Disconnect { namespace: namespace.to_string() };
                let frame = EnginePacket::Message(farewell.encode()).encode();
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    debug!("Could not send namespace disconnect: {}", e);
                }
                if let Err(e) = ws_tx.send(Message::Close(None)).await {
                    debug!("Could not send close frame: {}", e);
                }
                return SessionEnd::ClientDisconnect;
            }
            _ = tokio::time::sleep_until(deadline) => return SessionEnd::PingTimeout,
            incoming = ws_rx.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::TransportClose,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::TransportError(e.to_string()),
                };
                match handle_frame(text.as_str(), namespace, sink) {
                    FrameAction::Continue => {}
                    FrameAction::Pong(data) => {
                        deadline = Instant::now() + heartbeat;
                        let pong = EnginePacket::Pong(data).encode();
                        if let Err(e) = ws_tx.send(Message::Text(pong.into())).await {
                            return SessionEnd::TransportError(e.to_string());
                        }
                    }
                    FrameAction::End(end) => return end,
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    Continue,
    Pong(String),
    End(SessionEnd),
}

/// Interprets one inbound text frame of an established session.
fn handle_frame(text: &str, namespace: &str, sink: &dyn EventSink) -> FrameAction {
    let packet = match EnginePacket::decode(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Dropping undecodable frame: {}", e);
            return FrameAction::Continue;
        }
    };

    match packet {
        EnginePacket::Ping(data) => FrameAction::Pong(data),
        EnginePacket::Close => FrameAction::End(SessionEnd::TransportClose),
        EnginePacket::Message(inner) => match SocketPacket::decode(&inner) {
            Ok(packet) if packet.namespace() != namespace => {
                debug!("Ignoring packet for namespace {}", packet.namespace());
                FrameAction::Continue
            }
            Ok(SocketPacket::Event { name, payload, .. }) => {
                sink.deliver(TransportEvent::Message { name, payload });
                FrameAction::Continue
            }
            Ok(SocketPacket::Disconnect { .. }) => FrameAction::End(SessionEnd::ServerDisconnect),
            Ok(SocketPacket::ConnectError { message, .. }) => {
                sink.deliver(TransportEvent::ConnectError(message));
                FrameAction::Continue
            }
            Ok(SocketPacket::Connect { .. }) | Ok(SocketPacket::Ack { .. }) => FrameAction::Continue,
            Err(e) => {
                warn!("Dropping malformed packet: {}", e);
                FrameAction::Continue
            }
        },
        EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {
            FrameAction::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TransportEvent>>,
    }

    impl EventSink for RecordingSink {
        fn deliver(&self, event: TransportEvent) {
            self.events.lock().push(event);
        }
    }

    #[test]
    fn engine_url_maps_http_to_ws() {
        let url = engine_url("http://localhost:3005").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3005/socket.io/?EIO=4&transport=websocket");

        let url = engine_url("https://discuss.example.com/ignored#frag").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://discuss.example.com/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn engine_url_rejects_other_schemes() {
        assert!(matches!(engine_url("ftp://x"), Err(PortError::InvalidEndpoint(_))));
        assert!(matches!(engine_url("not a url"), Err(PortError::InvalidEndpoint(_))));
    }

    #[test]
    fn frames_route_events_for_our_namespace_only() {
        let sink = RecordingSink::default();
        let action = handle_frame(r#"42/threads,["delete-post",{"postId":"p1"}]"#, "/threads", &sink);
        assert_eq!(action, FrameAction::Continue);
        let action = handle_frame(r#"42/other,["delete-post",{"postId":"p2"}]"#, "/threads", &sink);
        assert_eq!(action, FrameAction::Continue);

        let events = sink.events.lock();
        assert_eq!(
            *events,
            vec![TransportEvent::Message {
                name: "delete-post".to_string(),
                payload: json!({"postId": "p1"}),
            }]
        );
    }

    #[test]
    fn ping_close_and_server_disconnect() {
        let sink = RecordingSink::default();
        assert_eq!(handle_frame("2", "/threads", &sink), FrameAction::Pong(String::new()));
        assert_eq!(
            handle_frame("1", "/threads", &sink),
            FrameAction::End(SessionEnd::TransportClose)
        );
        let end = match handle_frame("41/threads,", "/threads", &sink) {
            FrameAction::End(end) => end,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(end.reason(), "io server disconnect");
        assert!(!end.should_reconnect());
        assert!(sink.events.lock().is_empty());
    }

    #[test]
    fn garbage_frames_are_dropped() {
        let sink = RecordingSink::default();
        assert_eq!(handle_frame("x", "/threads", &sink), FrameAction::Continue);
        assert_eq!(handle_frame("42/threads,{}", "/threads", &sink), FrameAction::Continue);
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn emits_beyond_queue_capacity_are_refused() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let options = ConnectOptions {
            base_url: format!("http://{}", addr),
            reconnection_delay: Duration::from_secs(60),
            reconnection_delay_max: Duration::from_secs(60),
            emit_queue_capacity: 2,
            ..ConnectOptions::default()
        };
        let connection = WebSocketTransport::new()
            .open(&options, Arc::new(RecordingSink::default()))
            .unwrap();

        connection.emit("join-thread", json!({"threadId": "t1"})).unwrap();
        connection.emit("leave-thread", json!({"threadId": "t1"})).unwrap();
        assert!(matches!(
            connection.emit("join-thread", json!({"threadId": "t2"})),
            Err(PortError::QueueFull(2))
        ));

        connection.close();
        assert!(matches!(
            connection.emit("join-thread", json!({"threadId": "t2"})),
            Err(PortError::Closed)
        ));
    }

    #[test]
    fn dropped_sessions_reconnect() {
        assert!(SessionEnd::PingTimeout.should_reconnect());
        assert!(SessionEnd::TransportClose.should_reconnect());
        assert!(SessionEnd::TransportError("reset".to_string()).should_reconnect());
        assert!(!SessionEnd::ClientDisconnect.should_reconnect());
    }
}
