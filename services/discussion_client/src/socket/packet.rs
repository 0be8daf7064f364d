//! services/discussion_client/src/socket/packet.rs
//!
//! Text codec for the gateway's wire protocol: Socket.IO (v5) packets carried
//! inside Engine.IO (v4) message frames over a WebSocket.
//!
//! Binary attachments are not used by the discussion gateway and are rejected.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type '{0}'")]
    UnknownType(char),
    #[error("unsupported packet: {0}")]
    Unsupported(&'static str),
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("invalid packet body: {0}")]
    Json(#[from] serde_json::Error),
}

//=========================================================================================
// Engine.IO Layer
//=========================================================================================

/// The handshake the server sends in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let body = chars.as_str();
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    /// Encodes the packets a client sends. `Open` is server-only and encodes
    /// as an empty open marker.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

//=========================================================================================
// Socket.IO Layer
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String, data: Option<Value> },
    Disconnect { namespace: String },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        payload: Value,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        data: Value,
    },
    ConnectError { namespace: String, message: String },
}

impl SocketPacket {
    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        SocketPacket::Event {
            namespace: namespace.to_string(),
            ack_id: None,
            name: name.to_string(),
            payload,
        }
    }

    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        if matches!(kind, '5' | '6') {
            return Err(PacketError::Unsupported("binary attachments"));
        }
        let rest = chars.as_str();

        let (namespace, rest) = split_namespace(rest);
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (ack_raw, body) = rest.split_at(digits);
        let ack_id = if ack_raw.is_empty() {
            None
        } else {
            Some(
                ack_raw
                    .parse::<u64>()
                    .map_err(|e| PacketError::Malformed(e.to_string()))?,
            )
        };
        let data: Option<Value> = if body.is_empty() {
            None
        } else {
            Some(serde_json::from_str(body)?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, data }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let (name, payload) = split_event(data)?;
                Ok(SocketPacket::Event {
                    namespace,
                    ack_id,
                    name,
                    payload,
                })
            }
            '3' => Ok(SocketPacket::Ack {
                namespace,
                ack_id: ack_id
                    .ok_or_else(|| PacketError::Malformed("ack without id".to_string()))?,
                data: data.unwrap_or(Value::Null),
            }),
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                message: connect_error_message(data),
            }),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> String {
        let (kind, namespace, ack_id, data) = match self {
            SocketPacket::Connect { namespace, data } => ('0', namespace, None, data.clone()),
            SocketPacket::Disconnect { namespace } => ('1', namespace, None, None),
            SocketPacket::Event {
                namespace,
                ack_id,
                name,
                payload,
            } => (
                '2',
                namespace,
                *ack_id,
                Some(Value::Array(vec![Value::String(name.clone()), payload.clone()])),
            ),
            SocketPacket::Ack {
                namespace,
                ack_id,
                data,
            } => ('3', namespace, Some(*ack_id), Some(data.clone())),
            SocketPacket::ConnectError { namespace, message } => (
                '4',
                namespace,
                None,
                Some(serde_json::json!({ "message": message })),
            ),
        };

        let mut out = String::new();
        out.push(kind);
        if namespace != "/" {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&data.to_string());
        }
        out
    }
}

/// Splits a `/ns,` prefix off a packet body. Packets without one belong to `/`.
fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return ("/".to_string(), rest);
    }
    match rest.find(',') {
        Some(idx) => (rest[..idx].to_string(), &rest[idx + 1..]),
        None => (rest.to_string(), ""),
    }
}

/// Event bodies are `["name", arg, ...]`. Only the first argument is kept;
/// the discussion gateway never sends more than one.
fn split_event(data: Option<Value>) -> Result<(String, Value), PacketError> {
    let Some(Value::Array(mut items)) = data else {
        return Err(PacketError::Malformed("event body is not an array".to_string()));
    };
    if items.is_empty() {
        return Err(PacketError::Malformed("event without a name".to_string()));
    }
    let name = match items.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(PacketError::Malformed(format!(
                "event name is not a string: {}",
                other
            )))
        }
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.swap_remove(0)
    };
    Ok((name, payload))
}

fn connect_error_message(data: Option<Value>) -> String {
    match data {
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connect error")
            .to_string(),
        Some(Value::String(message)) => message,
        _ => "connect error".to_string(),
    }
}
