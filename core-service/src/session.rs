//! Per-connection state.

use bytes::Bytes;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::gateway::Subscriber;
use crate::protocol::{ProtocolVersion, SessionKind};

/// Options a client changes with `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub rpc_version: ProtocolVersion,
    pub pubsub_version: ProtocolVersion,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            rpc_version: ProtocolVersion::V2,
            pubsub_version: ProtocolVersion::V1,
        }
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One client connection. Every write to the client, responses and topic
/// messages alike, goes through `outbox` so they never interleave.
#[derive(Debug)]
pub struct Session {
    id: u64,
    kind: SessionKind,
    peer: Option<SocketAddr>,
    options: Arc<Mutex<SessionOptions>>,
    outbox: UnboundedSender<Bytes>,
}

impl Session {
    pub fn new(kind: SessionKind, peer: Option<SocketAddr>, outbox: UnboundedSender<Bytes>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            peer,
            options: Arc::new(Mutex::new(SessionOptions::default())),
            outbox,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn options(&self) -> SessionOptions {
        *self.options.lock()
    }

    pub fn set_rpc_version(&self, version: ProtocolVersion) {
        self.options.lock().rpc_version = version;
    }

    pub fn set_pubsub_version(&self, version: ProtocolVersion) {
        self.options.lock().pubsub_version = version;
    }

    /// Queue bytes for the client. Fails once the connection is gone.
    pub fn send(&self, bytes: Bytes) -> bool {
        self.outbox.send(bytes).is_ok()
    }

    /// Handle the gateway uses to publish to this session. It follows later
    /// changes of `pubsub_version`.
    pub fn subscriber(&self) -> Subscriber {
        Subscriber::new(self.id, Arc::clone(&self.options), self.outbox.clone())
    }
}
