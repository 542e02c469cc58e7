//! [`ConnectionRegistry`] – live connection bookkeeping for both channels.
//!
//! Each accepted socket is registered under a fresh [`Uuid`] and receives a
//! [`ConnectionGuard`]. The guard removes the entry when dropped, so a
//! handler that exits on any path (clean close, send failure, shutdown)
//! releases its slot. [`ConnectionRegistry::shutdown_all`] signals every live
//! handler to stop and empties the map.
//!
//! The registry never drives protocol decisions.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dobot_types::Channel;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Public view of one registered connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub channel: Channel,
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

struct Entry {
    info: ConnectionInfo,
    shutdown: oneshot::Sender<()>,
}

/// Shared map of live connections, keyed by connection id.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection accepted on `channel` from `peer`.
    ///
    /// The returned guard must live as long as the connection handler.
    pub fn register(self: &Arc<Self>, channel: Channel, peer: SocketAddr) -> ConnectionGuard {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let info = ConnectionInfo {
            id,
            channel,
            peer,
            connected_at: Utc::now(),
        };
        self.entries().insert(id, Entry { info, shutdown: tx });
        debug!(%id, %channel, %peer, "connection registered");

        ConnectionGuard {
            id,
            registry: Arc::clone(self),
            shutdown: rx,
        }
    }

    /// Number of live connections on `channel`.
    pub fn count(&self, channel: Channel) -> usize {
        self.entries()
            .values()
            .filter(|e| e.info.channel == channel)
            .count()
    }

    /// Number of live connections on every channel.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Snapshot of every live connection. Order is unspecified.
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.entries().values().map(|e| e.info.clone()).collect()
    }

    /// Signal every registered handler to stop and clear the registry.
    ///
    /// Returns the number of connections that were signalled. Handlers close
    /// their sockets as they observe the signal.
    pub fn shutdown_all(&self) -> usize {
        let drained: Vec<Entry> = self.entries().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            // The handler may already be gone; nothing left to signal then.
            let _ = entry.shutdown.send(());
        }
        debug!(count, "all connections signalled to shut down");
        count
    }

    fn remove(&self, id: Uuid) {
        if self.entries().remove(&id).is_some() {
            debug!(%id, "connection released");
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle held by a connection handler for the lifetime of its socket.
///
/// Dropping the guard removes the connection from its registry.
pub struct ConnectionGuard {
    id: Uuid,
    registry: Arc<ConnectionRegistry>,
    shutdown: oneshot::Receiver<()>,
}

impl ConnectionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Future that resolves once the registry orders this connection to
    /// stop. Must not be polled again after it has resolved.
    pub fn shutdown_signal(&mut self) -> &mut oneshot::Receiver<()> {
        &mut self.shutdown
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
