//! Online/offline fan-out

use tracing::debug;
use uuid::Uuid;

use crate::frames::{PresenceStatus, ServerFrame};
use crate::registry::ConnectionRegistry;

/// Broadcasts a user's status change to every other registered connection.
///
/// Delivery is best-effort per recipient: a peer whose queue is closed or
/// full simply misses the notice.
#[derive(Clone)]
pub struct PresencePublisher {
    registry: ConnectionRegistry,
}

impl PresencePublisher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Returns how many peers accepted the notice.
    pub async fn publish(&self, user_id: Uuid, status: PresenceStatus) -> usize {
        let frame = ServerFrame::Presence { user_id, status };
        let mut delivered = 0;

        let attempted = self
            .registry
            .for_each_except(user_id, |peer| match peer.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(error) => debug!(
                    user_id = %user_id,
                    peer_id = %peer.user_id(),
                    %error,
                    "dropped presence notice"
                ),
            })
            .await;

        debug!(
            user_id = %user_id,
            status = status.as_str(),
            attempted,
            delivered,
            "published presence"
        );
        delivered
    }
}
