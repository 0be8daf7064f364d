pub mod domain;
pub mod events;
pub mod ports;
pub mod roster;

pub use domain::{
    DeletedPost, DiscussionType, Post, Reaction, ReactionCounts, ReactionType, Thread,
    ThreadUser, ThreadUsers, ThreadWithPostCount, TypingUser,
};
pub use events::{EventKind, InboundEvent, JoinThread, LeaveThread, OutboundEvent};
pub use ports::{
    ConnectOptions, EventSink, GatewayConnection, GatewayTransport, PortError, PortResult,
    TransportEvent,
};
pub use roster::ThreadRoster;
