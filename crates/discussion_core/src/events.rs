//! crates/discussion_core/src/events.rs
//!
//! The named events exchanged with the discussion gateway and their typed payloads.

use crate::domain::{DeletedPost, Post, ThreadUser, ThreadUsers};
use serde::Serialize;
use serde_json::Value;

//=========================================================================================
// Event Names
//=========================================================================================

/// Every event name a caller can subscribe to, lifecycle events included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    NewPost,
    UpdatePost,
    DeletePost,
    ThreadUsers,
    UserJoined,
    Connect,
    ConnectError,
    Disconnect,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::NewPost => "new-post",
            EventKind::UpdatePost => "update-post",
            EventKind::DeletePost => "delete-post",
            EventKind::ThreadUsers => "thread-users",
            EventKind::UserJoined => "user-joined",
            EventKind::Connect => "connect",
            EventKind::ConnectError => "connect_error",
            EventKind::Disconnect => "disconnect",
        }
    }

    /// Maps a gateway event name to its kind. Lifecycle names are reserved by
    /// the transport and are not accepted here.
    pub fn from_message_name(name: &str) -> Option<Self> {
        match name {
            "new-post" => Some(EventKind::NewPost),
            "update-post" => Some(EventKind::UpdatePost),
            "delete-post" => Some(EventKind::DeletePost),
            "thread-users" => Some(EventKind::ThreadUsers),
            "user-joined" => Some(EventKind::UserJoined),
            _ => None,
        }
    }

    /// Whether the event originates from the transport rather than the gateway.
    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            EventKind::Connect | EventKind::ConnectError | EventKind::Disconnect
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

//=========================================================================================
// Inbound Events (Gateway -> Client)
//=========================================================================================

/// A decoded event delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewPost(Post),
    UpdatePost(Post),
    DeletePost(DeletedPost),
    ThreadUsers(ThreadUsers),
    UserJoined(ThreadUser),
    Connected,
    ConnectError { message: String },
    Disconnected { reason: String },
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::NewPost(_) => EventKind::NewPost,
            InboundEvent::UpdatePost(_) => EventKind::UpdatePost,
            InboundEvent::DeletePost(_) => EventKind::DeletePost,
            InboundEvent::ThreadUsers(_) => EventKind::ThreadUsers,
            InboundEvent::UserJoined(_) => EventKind::UserJoined,
            InboundEvent::Connected => EventKind::Connect,
            InboundEvent::ConnectError { .. } => EventKind::ConnectError,
            InboundEvent::Disconnected { .. } => EventKind::Disconnect,
        }
    }

    /// Decodes a named gateway message.
    ///
    /// Returns `Ok(None)` for event names this client does not know about.
    pub fn decode(name: &str, payload: Value) -> Result<Option<Self>, serde_json::Error> {
        let Some(kind) = EventKind::from_message_name(name) else {
            return Ok(None);
        };
        let event = match kind {
            EventKind::NewPost => InboundEvent::NewPost(serde_json::from_value(payload)?),
            EventKind::UpdatePost => InboundEvent::UpdatePost(serde_json::from_value(payload)?),
            EventKind::DeletePost => InboundEvent::DeletePost(serde_json::from_value(payload)?),
            EventKind::ThreadUsers => InboundEvent::ThreadUsers(serde_json::from_value(payload)?),
            EventKind::UserJoined => InboundEvent::UserJoined(serde_json::from_value(payload)?),
            EventKind::Connect | EventKind::ConnectError | EventKind::Disconnect => return Ok(None),
        };
        Ok(Some(event))
    }
}

//=========================================================================================
// Outbound Events (Client -> Gateway)
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinThread {
    pub thread_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveThread {
    pub thread_id: String,
    pub user_id: String,
}

/// Announcements the client sends to the gateway. Neither is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    JoinThread(JoinThread),
    LeaveThread(LeaveThread),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinThread(_) => "join-thread",
            OutboundEvent::LeaveThread(_) => "leave-thread",
        }
    }

    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            OutboundEvent::JoinThread(join) => serde_json::to_value(join),
            OutboundEvent::LeaveThread(leave) => serde_json::to_value(leave),
        }
    }
}
