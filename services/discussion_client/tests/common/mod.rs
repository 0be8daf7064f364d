//! In-memory gateway transport used by the integration tests.

#![allow(dead_code)]

use discussion_client_lib::{ClientConfig, DiscussionSocketService};
use discussion_core::ports::{
    ConnectOptions, EventSink, GatewayConnection, GatewayTransport, PortError, PortResult,
    TransportEvent,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
pub struct LoopbackTransport {
    opened: Mutex<Vec<Arc<LoopbackConnection>>>,
    options: Mutex<Vec<ConnectOptions>>,
    refuse: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every following `open` fail.
    pub fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn last(&self) -> Arc<LoopbackConnection> {
        self.opened
            .lock()
            .last()
            .cloned()
            .expect("no connection has been opened")
    }

    pub fn last_options(&self) -> ConnectOptions {
        self.options
            .lock()
            .last()
            .cloned()
            .expect("no connection has been opened")
    }
}

impl GatewayTransport for LoopbackTransport {
    fn open(
        &self,
        options: &ConnectOptions,
        sink: Arc<dyn EventSink>,
    ) -> PortResult<Arc<dyn GatewayConnection>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PortError::InvalidEndpoint(options.base_url.clone()));
        }
        let connection = Arc::new(LoopbackConnection {
            id: Uuid::new_v4(),
            sink,
            emitted: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.opened.lock().push(connection.clone());
        self.options.lock().push(options.clone());
        Ok(connection)
    }
}

pub struct LoopbackConnection {
    id: Uuid,
    sink: Arc<dyn EventSink>,
    emitted: Mutex<Vec<(String, Value)>>,
    closed: AtomicBool,
}

impl LoopbackConnection {
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted.lock().clone()
    }

    pub fn emitted_names(&self) -> Vec<String> {
        self.emitted.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Simulates a named event arriving from the gateway.
    pub fn receive(&self, name: &str, payload: Value) {
        self.sink.deliver(TransportEvent::Message {
            name: name.to_string(),
            payload,
        });
    }

    /// Simulates a transport lifecycle change.
    pub fn simulate(&self, event: TransportEvent) {
        self.sink.deliver(event);
    }
}

impl GatewayConnection for LoopbackConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn emit(&self, event: &str, payload: Value) -> PortResult<()> {
        if self.is_closed() {
            return Err(PortError::Closed);
        }
        self.emitted.lock().push((event.to_string(), payload));
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn service_over(transport: &Arc<LoopbackTransport>) -> DiscussionSocketService {
    DiscussionSocketService::new(transport.clone(), &ClientConfig::default())
}

pub fn post_payload(id: &str, content: &str) -> Value {
    serde_json::json!({
        "id": id,
        "threadId": "course-42",
        "authorId": "u7",
        "content": content,
        "isEdited": false,
        "createdAt": "2024-05-01T10:00:00Z",
        "updatedAt": "2024-05-01T10:00:00Z",
        "reactions": [],
        "_count": {"replies": 0}
    })
}
