//! Connections between signals and slots.
//!
//! A connection links one signal of a sender (by absolute method index) to
//! either a method of a receiver object or a closure. Connections are stored
//! in a runtime-wide arena keyed by [`ConnectionId`]; each object keeps the
//! ids of its outgoing and incoming connections so destruction can sever them.
//!
//! # Connection Types
//!
//! - [`ConnectionType::Direct`] - Call on the emitting thread
//! - [`ConnectionType::Queued`] - Post to the receiver's context queue
//! - [`ConnectionType::Auto`] - Direct within a context, queued across
//! - [`ConnectionType::BlockingQueued`] - Queue and wait for completion

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};

use crate::context::ContextId;
use crate::invocation::SlotCallback;
use crate::object::ObjectId;
use crate::runtime::Runtime;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via
    /// [`Runtime::disconnect`]. The ID stays valid until the connection is
    /// disconnected or either endpoint is destroyed.
    pub struct ConnectionId;
}

/// Specifies how a connected slot should be invoked when the signal is emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// Invoke the slot immediately on the emitting thread.
    ///
    /// If the receiver lives in another context the call is queued instead,
    /// since slots only ever run in their owner's context.
    Direct,

    /// Queue the slot invocation to the receiver's context.
    ///
    /// The slot runs when that context's event loop processes pending
    /// invocations, even when sender and receiver share a context.
    Queued,

    /// Choose Direct or Queued by comparing the emitting context with the
    /// receiver's context at emission time.
    #[default]
    Auto,

    /// Queue the invocation and block until the slot has run.
    ///
    /// Fails fast when the receiver lives in the emitting context.
    BlockingQueued,
}

/// Lifecycle of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Being validated by `connect`; never observable from outside.
    Proposed,
    Active,
    Disconnected,
}

/// Where a connection delivers.
#[derive(Clone)]
pub(crate) enum SlotTarget {
    Method {
        receiver: ObjectId,
        index: usize,
    },
    Callback {
        context: ContextId,
        callback: SlotCallback,
    },
}

impl SlotTarget {
    pub(crate) fn receiver(&self) -> Option<ObjectId> {
        match self {
            Self::Method { receiver, .. } => Some(*receiver),
            Self::Callback { .. } => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct Connection {
    pub(crate) sender: ObjectId,
    pub(crate) signal_index: usize,
    pub(crate) target: SlotTarget,
    pub(crate) connection_type: ConnectionType,
    pub(crate) state: ConnectionState,
}

/// A public description of a live connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub sender: ObjectId,
    pub signal_index: usize,
    /// `None` for closure slots.
    pub receiver: Option<ObjectId>,
    pub slot_index: Option<usize>,
    pub connection_type: ConnectionType,
}

impl Connection {
    pub(crate) fn info(&self, id: ConnectionId) -> ConnectionInfo {
        let slot_index = match &self.target {
            SlotTarget::Method { index, .. } => Some(*index),
            SlotTarget::Callback { .. } => None,
        };
        ConnectionInfo {
            id,
            sender: self.sender,
            signal_index: self.signal_index,
            receiver: self.target.receiver(),
            slot_index,
            connection_type: self.connection_type,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("sender", &self.sender)
            .field("signal_index", &self.signal_index)
            .field("receiver", &self.target.receiver())
            .field("type", &self.connection_type)
            .field("state", &self.state)
            .finish()
    }
}

/// Runtime-wide connection storage.
#[derive(Default)]
pub(crate) struct ConnectionArena {
    connections: RwLock<SlotMap<ConnectionId, Connection>>,
}

impl ConnectionArena {
    pub(crate) fn insert(&self, mut connection: Connection) -> ConnectionId {
        connection.state = ConnectionState::Active;
        self.connections.write().insert(connection)
    }

    pub(crate) fn remove(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.write().remove(id).map(|mut connection| {
            connection.state = ConnectionState::Disconnected;
            connection
        })
    }

    pub(crate) fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.read().get(id).cloned()
    }

    pub(crate) fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Copy the live connections among `ids`, preserving order.
    pub(crate) fn snapshot(&self, ids: &[ConnectionId]) -> Vec<(ConnectionId, Connection)> {
        let connections = self.connections.read();
        ids.iter()
            .filter_map(|&id| connections.get(id).map(|c| (id, c.clone())))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub(crate) fn infos(&self) -> Vec<ConnectionInfo> {
        self.connections
            .read()
            .iter()
            .map(|(id, c)| c.info(id))
            .collect()
    }
}

/// Ids of the connections an object takes part in.
#[derive(Default, Debug)]
pub(crate) struct ObjectLinks {
    /// Outgoing connections, per signal index, in connection order.
    pub(crate) outgoing: HashMap<usize, Vec<ConnectionId>>,
    /// Connections whose slot is on this object.
    pub(crate) incoming: Vec<ConnectionId>,
}

impl ObjectLinks {
    pub(crate) fn remove(&mut self, id: ConnectionId) {
        for ids in self.outgoing.values_mut() {
            ids.retain(|&c| c != id);
        }
        self.outgoing.retain(|_, ids| !ids.is_empty());
        self.incoming.retain(|&c| c != id);
    }

    pub(crate) fn outgoing_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }
}

/// Disconnects its connection when dropped.
#[must_use = "the connection is severed as soon as the guard is dropped"]
pub struct ConnectionGuard {
    runtime: Runtime,
    id: Option<ConnectionId>,
}

impl ConnectionGuard {
    pub fn new(runtime: &Runtime, id: ConnectionId) -> Self {
        Self {
            runtime: runtime.clone(),
            id: Some(id),
        }
    }

    pub fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    /// Keep the connection alive past the guard.
    pub fn release(mut self) -> Option<ConnectionId> {
        self.id.take()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.disconnect(id);
        }
    }
}
