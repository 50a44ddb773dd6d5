//! Process-wide map of who is currently reachable by push

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::connection::Connection;

/// Connection registry keyed by user identity.
///
/// Mutations take the write lock, lookups and iteration share the read lock.
/// Nothing awaits while a guard is held: pushes into connections are
/// non-blocking, so one slow peer cannot hold the lock against everyone else.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `connection` for its user, returning whatever it displaced.
    ///
    /// The registry never closes the displaced connection itself; that is up
    /// to the caller.
    pub async fn register(&self, connection: Connection) -> Option<Connection> {
        let user_id = connection.user_id();
        let mut guard = self.inner.write().await;
        let previous = guard.insert(user_id, connection);

        debug!(
            user_id = %user_id,
            superseded = previous.is_some(),
            total = guard.len(),
            "registered connection"
        );
        previous
    }

    /// Remove whatever is registered for `user_id`. No-op when absent.
    pub async fn unregister(&self, user_id: Uuid) -> Option<Connection> {
        self.inner.write().await.remove(&user_id)
    }

    /// Remove the entry only if it still points at `connection`.
    ///
    /// Returns false when the user has since registered a newer connection or
    /// was never registered at all.
    pub async fn unregister_connection(&self, connection: &Connection) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get(&connection.user_id()) {
            Some(current) if current == connection => {
                guard.remove(&connection.user_id());
                debug!(user_id = %connection.user_id(), total = guard.len(), "unregistered connection");
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<Connection> {
        self.inner.read().await.get(&user_id).cloned()
    }

    pub async fn is_registered(&self, user_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    /// Run `f` against every registered connection except `exclude`'s.
    ///
    /// Returns how many connections were visited.
    pub async fn for_each_except<F>(&self, exclude: Uuid, mut f: F) -> usize
    where
        F: FnMut(&Connection),
    {
        let guard = self.inner.read().await;
        let mut visited = 0;
        for (user_id, connection) in guard.iter() {
            if *user_id == exclude {
                continue;
            }
            f(connection);
            visited += 1;
        }
        visited
    }

    /// Hold the read lock so tests can stall writers at a chosen point.
    #[cfg(test)]
    pub(crate) async fn hold_read(
        &self,
    ) -> tokio::sync::RwLockReadGuard<'_, HashMap<Uuid, Connection>> {
        self.inner.read().await
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
