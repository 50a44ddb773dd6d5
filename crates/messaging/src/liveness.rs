//! Per-connection keepalive

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::connection::Connection;

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Sends an empty ping on a fixed interval until a ping cannot be queued.
///
/// A failed ping stops the monitor for good. It does not unregister the
/// connection; the session's read loop owns cleanup.
pub struct LivenessMonitor {
    handle: JoinHandle<()>,
}

impl LivenessMonitor {
    pub fn spawn(connection: Connection, every: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(error) = connection.ping() {
                    debug!(
                        user_id = %connection.user_id(),
                        connection_id = %connection.id(),
                        %error,
                        "keepalive failed, stopping monitor"
                    );
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
