//! # Campus Messaging Crate
//!
//! Live delivery for one-to-one direct messages.
//!
//! ## Architecture
//!
//! - **Connection**: handle to one user's socket, backed by a bounded outbound queue
//! - **Registry**: the single shared map of who is reachable by push
//! - **Liveness**: per-connection keepalive pings
//! - **Broker**: reads a session's frames, persists chat messages, pushes deliveries,
//!   typing notices and read receipts
//! - **Presence**: online/offline fan-out on connect and disconnect
//!
//! Every push is best-effort. The message store is the only durable guarantee; a
//! recipient that misses a live frame finds the message in history later.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use campus_messaging::{Connection, ConnectionRegistry, MessageBroker, Session, TransportError};
//! # async fn run(repository: campus_database::MessageRepository) {
//! let broker = MessageBroker::new(ConnectionRegistry::new(), Arc::new(repository));
//!
//! let session = Session { user_id: uuid::Uuid::new_v4(), company_id: uuid::Uuid::new_v4() };
//! let (connection, _outbound) = Connection::new(session.user_id, 64);
//! let inbound = futures_util::stream::iter(vec![Err::<String, _>(TransportError::Closed)]);
//! broker.serve(session, connection, inbound).await;
//! # }
//! ```

pub mod broker;
pub mod connection;
pub mod error;
pub mod frames;
pub mod liveness;
pub mod presence;
pub mod registry;
pub mod store;

#[cfg(test)]
mod testing;

pub use broker::{MessageBroker, Session};
pub use connection::{Connection, ConnectionId, Outbound};
pub use error::{MessagingError, MessagingResult, SendError, TransportError};
pub use frames::{ClientFrame, DeliveryFrame, PresenceStatus, ServerFrame};
pub use liveness::{LivenessMonitor, DEFAULT_KEEPALIVE_INTERVAL};
pub use presence::PresencePublisher;
pub use registry::ConnectionRegistry;
pub use store::MessageStore;
