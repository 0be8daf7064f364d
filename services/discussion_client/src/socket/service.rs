//! services/discussion_client/src/socket/service.rs
//!
//! The discussion socket service: owns at most one gateway connection, tracks
//! which thread the client has announced itself in, and routes gateway events
//! to caller-registered handlers.

use crate::{
    config::ClientConfig,
    error::{ClientError, ClientResult},
    socket::listeners::{Listener, ListenerRegistry},
};
use discussion_core::{
    domain::{DeletedPost, Post, ThreadUser, ThreadUsers},
    events::{EventKind, InboundEvent, JoinThread, LeaveThread, OutboundEvent},
    ports::{ConnectOptions, EventSink, GatewayConnection, GatewayTransport, TransportEvent},
};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, OnceLock, Weak,
};
use tracing::{debug, error, info, warn};

//=========================================================================================
// Thread Membership
//=========================================================================================

/// The thread the client last announced itself in, with the identity it used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMembership {
    pub thread_id: String,
    pub user_id: String,
    pub user_name: String,
}

impl ThreadMembership {
    fn join_event(&self) -> OutboundEvent {
        OutboundEvent::JoinThread(JoinThread {
            thread_id: self.thread_id.clone(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
        })
    }
}

/// A recorded membership and the session its join went out on. `None` means
/// the join is still queued and will be flushed by the next session.
#[derive(Debug, Clone)]
struct Presence {
    membership: ThreadMembership,
    announced_in: Option<u32>,
}

type SharedPresence = Arc<Mutex<Option<Presence>>>;

/// Numbers the sessions of one connection and tracks whether one is live.
#[derive(Debug, Default)]
struct SessionState {
    connects: AtomicU32,
    live: AtomicBool,
}

impl SessionState {
    fn begin(&self) -> u32 {
        let session = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.store(true, Ordering::SeqCst);
        session
    }

    fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    /// The live session, if any.
    fn current(&self) -> Option<u32> {
        self.live
            .load(Ordering::SeqCst)
            .then(|| self.connects.load(Ordering::SeqCst))
    }
}

//=========================================================================================
// Transport Event Sink
//=========================================================================================

/// Receives transport events for one connection, logs lifecycle changes and
/// fans gateway events out to the listener registry.
struct ConnectionSink {
    namespace: String,
    listeners: Arc<ListenerRegistry>,
    presence: SharedPresence,
    session: Arc<SessionState>,
    rejoin_on_reconnect: bool,
    connection: OnceLock<Weak<dyn GatewayConnection>>,
}

impl ConnectionSink {
    fn on_connected(&self) {
        let session = self.session.begin();
        info!("Socket connected to namespace: {}", self.namespace);

        let membership = {
            let mut guard = self.presence.lock();
            let Some(presence) = guard.as_mut() else {
                return;
            };
            let previous = presence.announced_in.replace(session);
            match previous {
                // Queued or already sent on this session: the gateway hears it once.
                None => return,
                Some(announced) if announced >= session => return,
                Some(_) => presence.membership.clone(),
            }
        };
        if !self.rejoin_on_reconnect {
            warn!(
                "Reconnected without re-announcing thread {}; call join_thread again to restore presence",
                membership.thread_id
            );
            return;
        }
        let Some(connection) = self.connection.get().and_then(Weak::upgrade) else {
            return;
        };
        match emit(connection.as_ref(), &membership.join_event()) {
            Ok(()) => info!("Re-joined thread {} after reconnect", membership.thread_id),
            Err(e) => error!("Failed to re-join thread {}: {}", membership.thread_id, e),
        }
    }
}

impl EventSink for ConnectionSink {
    fn deliver(&self, event: TransportEvent) {
        let inbound = match event {
            TransportEvent::Connected => {
                self.on_connected();
                InboundEvent::Connected
            }
            TransportEvent::ConnectError(message) => {
                error!("Connection error: {}", message);
                InboundEvent::ConnectError { message }
            }
            TransportEvent::Disconnected(reason) => {
                self.session.end();
                info!("Disconnected from namespace {}: {}", self.namespace, reason);
                InboundEvent::Disconnected { reason }
            }
            TransportEvent::Message { name, payload } => {
                match InboundEvent::decode(&name, payload) {
                    Ok(Some(inbound)) => inbound,
                    Ok(None) => {
                        debug!("Ignoring unhandled gateway event '{}'", name);
                        return;
                    }
                    Err(e) => {
                        warn!("Failed to decode '{}' payload: {}", name, e);
                        return;
                    }
                }
            }
        };
        self.listeners.dispatch(&inbound);
    }
}

fn emit(connection: &dyn GatewayConnection, event: &OutboundEvent) -> ClientResult<()> {
    let payload = event.payload()?;
    connection.emit(event.name(), payload)?;
    Ok(())
}

//=========================================================================================
// The Service
//=========================================================================================

struct ActiveConnection {
    connection: Arc<dyn GatewayConnection>,
    listeners: Arc<ListenerRegistry>,
    presence: SharedPresence,
    session: Arc<SessionState>,
}

/// Client for the discussion gateway's real-time channel.
///
/// Owned by whichever composition root needs it; tests create isolated
/// instances over an in-memory transport. Every operation that needs the
/// connection fails with [`ClientError::NotConnected`] when there is none and
/// has no side effect in that case.
pub struct DiscussionSocketService {
    transport: Arc<dyn GatewayTransport>,
    options: ConnectOptions,
    rejoin_on_reconnect: bool,
    active: Option<ActiveConnection>,
}

impl DiscussionSocketService {
    pub fn new(transport: Arc<dyn GatewayTransport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            options: config.connect_options(),
            rejoin_on_reconnect: config.rejoin_on_reconnect,
            active: None,
        }
    }

    pub fn with_options(transport: Arc<dyn GatewayTransport>, options: ConnectOptions) -> Self {
        Self {
            transport,
            options,
            rejoin_on_reconnect: false,
            active: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.options.namespace
    }

    /// Opens the gateway connection unless one is already open, and returns it.
    pub fn connect(&mut self) -> ClientResult<Arc<dyn GatewayConnection>> {
        if let Some(active) = &self.active {
            return Ok(active.connection.clone());
        }

        let listeners = Arc::new(ListenerRegistry::new());
        let presence: SharedPresence = Arc::new(Mutex::new(None));
        let session = Arc::new(SessionState::default());
        let sink = Arc::new(ConnectionSink {
            namespace: self.options.namespace.clone(),
            listeners: listeners.clone(),
            presence: presence.clone(),
            session: session.clone(),
            rejoin_on_reconnect: self.rejoin_on_reconnect,
            connection: OnceLock::new(),
        });

        info!(
            "Connecting to discussion gateway {}{}",
            self.options.base_url, self.options.namespace
        );
        let connection = self.transport.open(&self.options, sink.clone())?;
        let _ = sink.connection.set(Arc::downgrade(&connection));

        self.active = Some(ActiveConnection {
            connection: connection.clone(),
            listeners,
            presence,
            session,
        });
        Ok(connection)
    }

    /// Closes the connection and forgets the current thread. No-op when disconnected.
    pub fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            active.presence.lock().take();
            active.connection.close();
            debug!("Released discussion connection {}", active.connection.id());
        }
    }

    /// True while the service holds a connection handle, including while the
    /// transport reconnects or after it gave up; emits then fail with
    /// `PortError::Closed` until `disconnect` and `connect` are called again.
    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    pub fn connection(&self) -> Option<Arc<dyn GatewayConnection>> {
        self.active.as_ref().map(|a| a.connection.clone())
    }

    pub fn current_thread(&self) -> Option<String> {
        self.membership().map(|m| m.thread_id)
    }

    pub fn membership(&self) -> Option<ThreadMembership> {
        self.active
            .as_ref()
            .and_then(|a| a.presence.lock().as_ref().map(|p| p.membership.clone()))
    }

    /// Announces presence in a thread. Joining another thread does not leave
    /// the previous one.
    pub fn join_thread(&mut self, thread_id: &str, user_id: &str, user_name: &str) -> ClientResult<()> {
        let active = self.active()?;
        let membership = ThreadMembership {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
        };
        // Held across the emit so a concurrent reconnect sees either no
        // membership or this one with the session it went out on.
        let mut presence = active.presence.lock();
        let announced_in = active.session.current();
        emit(active.connection.as_ref(), &membership.join_event())?;
        info!("Joined thread {} as {}", thread_id, user_id);
        *presence = Some(Presence {
            membership,
            announced_in,
        });
        Ok(())
    }

    pub fn leave_thread(&mut self, thread_id: &str, user_id: &str) -> ClientResult<()> {
        let active = self.active()?;
        active.presence.lock().take();
        let event = OutboundEvent::LeaveThread(LeaveThread {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
        });
        emit(active.connection.as_ref(), &event)?;
        info!("Left thread {}", thread_id);
        Ok(())
    }

    //=====================================================================================
    // Event Subscriptions
    //=====================================================================================

    pub fn on_new_post<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn(&Post) + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::NewPost,
            Arc::new(move |event| {
                if let InboundEvent::NewPost(post) = event {
                    handler(post)
                }
            }),
        )
    }

    pub fn on_update_post<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn(&Post) + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::UpdatePost,
            Arc::new(move |event| {
                if let InboundEvent::UpdatePost(post) = event {
                    handler(post)
                }
            }),
        )
    }

    pub fn on_delete_post<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn(&DeletedPost) + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::DeletePost,
            Arc::new(move |event| {
                if let InboundEvent::DeletePost(deleted) = event {
                    handler(deleted)
                }
            }),
        )
    }

    pub fn on_thread_users<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn(&ThreadUsers) + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::ThreadUsers,
            Arc::new(move |event| {
                if let InboundEvent::ThreadUsers(users) = event {
                    handler(users)
                }
            }),
        )
    }

    pub fn on_user_joined<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn(&ThreadUser) + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::UserJoined,
            Arc::new(move |event| {
                if let InboundEvent::UserJoined(user) = event {
                    handler(user)
                }
            }),
        )
    }

    /// Fires on the first connect and on every transparent reconnect.
    pub fn on_connect<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::Connect,
            Arc::new(move |event| {
                if let InboundEvent::Connected = event {
                    handler()
                }
            }),
        )
    }

    pub fn on_connect_error<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::ConnectError,
            Arc::new(move |event| {
                if let InboundEvent::ConnectError { message } = event {
                    handler(message)
                }
            }),
        )
    }

    pub fn on_disconnect<F>(&self, handler: F) -> ClientResult<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(
            EventKind::Disconnect,
            Arc::new(move |event| {
                if let InboundEvent::Disconnected { reason } = event {
                    handler(reason)
                }
            }),
        )
    }

    /// Detaches every handler registered on the current connection.
    pub fn remove_all_listeners(&self) -> ClientResult<()> {
        self.active()?.listeners.remove_all();
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, listener: Listener) -> ClientResult<()> {
        self.active()?.listeners.add(kind, listener);
        Ok(())
    }

    fn active(&self) -> ClientResult<&ActiveConnection> {
        self.active.as_ref().ok_or(ClientError::NotConnected)
    }
}

impl Drop for DiscussionSocketService {
    fn drop(&mut self) {
        self.disconnect();
    }
}
