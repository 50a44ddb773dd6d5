//! A live connection as seen by the rest of the process.
//!
//! The socket itself is owned by a writer task; everything else talks to it
//! through a bounded queue. Every push is a `try_send`, so a stalled peer can
//! only ever cost a dropped frame, never a blocked sender.

use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SendError;
use crate::frames::ServerFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the writer task should put on the wire next
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(ServerFrame),
    /// Transport-level keepalive with an empty payload
    Ping,
    /// Send a close frame and stop writing
    Close,
}

/// Handle to one user's live transport session
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: Uuid,
    tx: mpsc::Sender<Outbound>,
}

impl Connection {
    /// Create a connection for `user_id` together with the queue its writer drains.
    pub fn new(user_id: Uuid, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: ConnectionId::new(),
            user_id,
            tx,
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn send(&self, frame: ServerFrame) -> Result<(), SendError> {
        self.push(Outbound::Frame(frame))
    }

    pub fn ping(&self) -> Result<(), SendError> {
        self.push(Outbound::Ping)
    }

    pub fn close(&self) -> Result<(), SendError> {
        self.push(Outbound::Close)
    }

    /// True once the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, outbound: Outbound) -> Result<(), SendError> {
        self.tx.try_send(outbound).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
