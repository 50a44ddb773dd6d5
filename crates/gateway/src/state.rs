//! Shared application state for the gateway

use std::sync::Arc;

use campus_config::AppConfig;
use campus_database::MessageRepository;
use campus_messaging::{ConnectionRegistry, MessageBroker, MessageStore};
use sqlx::SqlitePool;

use crate::auth::TokenAuthority;

/// Shared application state containing the broker and token validation
#[derive(Clone)]
pub struct GatewayState {
    /// Live delivery and persistence
    pub broker: MessageBroker,
    /// Token validation for sockets and REST calls
    pub tokens: TokenAuthority,
    /// Frames queued per connection before sends start failing
    pub outbound_buffer: usize,
}

impl GatewayState {
    pub fn new(broker: MessageBroker, tokens: TokenAuthority, outbound_buffer: usize) -> Self {
        Self {
            broker,
            tokens,
            outbound_buffer,
        }
    }

    /// Wire a broker over the SQLite message store.
    pub fn from_config(config: &AppConfig, pool: SqlitePool) -> Self {
        let store: Arc<dyn MessageStore> = Arc::new(MessageRepository::new(pool));
        let broker = MessageBroker::new(ConnectionRegistry::new(), store)
            .with_keepalive(config.messaging.keepalive_interval());

        Self::new(
            broker,
            TokenAuthority::from_config(&config.auth),
            config.messaging.outbound_buffer,
        )
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        self.broker.store()
    }
}
