//! Protocol state machine for live sessions, plus the request-path send and
//! read-receipt operations that share its delivery rules.
//!
//! Durability is the only hard guarantee here. Live delivery, typing notices,
//! read receipts and presence are all attempted once and silently dropped
//! when the peer is offline or cannot take the frame.

use std::sync::Arc;
use std::time::Duration;

use campus_database::{ChatMessage, NewMessage};
use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connection::Connection;
use crate::error::{MessagingError, MessagingResult, TransportError};
use crate::frames::{ClientFrame, DeliveryFrame, PresenceStatus, ServerFrame};
use crate::liveness::{LivenessMonitor, DEFAULT_KEEPALIVE_INTERVAL};
use crate::presence::PresencePublisher;
use crate::registry::ConnectionRegistry;
use crate::store::MessageStore;

/// Authenticated identity a session runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub company_id: Uuid,
}

#[derive(Clone)]
pub struct MessageBroker {
    registry: ConnectionRegistry,
    presence: PresencePublisher,
    store: Arc<dyn MessageStore>,
    keepalive: Duration,
}

impl MessageBroker {
    pub fn new(registry: ConnectionRegistry, store: Arc<dyn MessageStore>) -> Self {
        Self {
            presence: PresencePublisher::new(registry.clone()),
            registry,
            store,
            keepalive: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Drive one connection from registration to cleanup.
    ///
    /// Frames are handled strictly in arrival order. The loop ends only when
    /// `inbound` ends or yields a transport error; cleanup (close, unregister,
    /// offline notice) then runs exactly once, and also runs if this future is
    /// dropped mid-session.
    pub async fn serve<S>(&self, session: Session, connection: Connection, inbound: S)
    where
        S: Stream<Item = Result<String, TransportError>> + Send,
    {
        let user_id = session.user_id;
        if connection.user_id() != user_id {
            warn!(
                user_id = %user_id,
                connection_user = %connection.user_id(),
                "connection does not belong to the session user, refusing it"
            );
            let _ = connection.close();
            return;
        }

        if let Some(displaced) = self.registry.register(connection.clone()).await {
            info!(
                user_id = %user_id,
                connection_id = %displaced.id(),
                "closing superseded connection"
            );
            if let Err(error) = displaced.close() {
                debug!(
                    user_id = %user_id,
                    connection_id = %displaced.id(),
                    %error,
                    "close frame not queued for superseded connection"
                );
            }
        }
        info!(user_id = %user_id, connection_id = %connection.id(), "connection registered");

        // from here on the entry must be removed however this future ends
        let mut guard = SessionGuard {
            broker: self.clone(),
            connection: Some(connection.clone()),
            monitor: None,
        };

        self.presence.publish(user_id, PresenceStatus::Online).await;

        guard.monitor = Some(LivenessMonitor::spawn(connection, self.keepalive));

        let mut inbound = std::pin::pin!(inbound);
        while let Some(next) = inbound.next().await {
            match next {
                Ok(text) => self.handle_frame(&session, &text).await,
                Err(TransportError::Closed) => {
                    debug!(user_id = %user_id, "connection closed by peer");
                    break;
                }
                Err(error) => {
                    warn!(user_id = %user_id, %error, "connection read failed");
                    break;
                }
            }
        }

        guard.release().await;
    }

    /// Handle one inbound text frame. Anything malformed is dropped.
    pub async fn handle_frame(&self, session: &Session, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(user_id = %session.user_id, %error, "discarding malformed frame");
                return;
            }
        };

        match frame {
            ClientFrame::Typing { to } => {
                let Ok(target) = Uuid::parse_str(&to) else {
                    debug!(user_id = %session.user_id, to = %to, "discarding typing frame with bad target");
                    return;
                };
                self.notify_typing(session.user_id, target).await;
            }
            ClientFrame::Message {
                to,
                content,
                attachment,
            } => {
                let new = match compose(session, &to, content, attachment) {
                    Ok(new) => new,
                    Err(error) => {
                        debug!(user_id = %session.user_id, %error, "discarding chat frame");
                        return;
                    }
                };

                if let Err(error) = self.persist_and_deliver(new).await {
                    warn!(user_id = %session.user_id, %error, "failed to save message");
                }
            }
        }
    }

    /// Request-path send: same persistence and delivery rules as a chat frame,
    /// but failures are returned to the caller.
    pub async fn send_message(
        &self,
        sender: &Session,
        receiver_id: Uuid,
        content: String,
        attachment: Option<String>,
    ) -> MessagingResult<ChatMessage> {
        let new = compose(sender, &receiver_id.to_string(), content, attachment)?;
        self.persist_and_deliver(new).await
    }

    /// Flag a message as read and tell its sender, if they are online.
    ///
    /// Safe to repeat: every call leaves the message read and makes one
    /// receipt attempt.
    pub async fn mark_as_read(&self, reader_id: Uuid, message_id: Uuid) -> MessagingResult<()> {
        let message = self
            .store
            .find(message_id)
            .await?
            .ok_or(MessagingError::MessageNotFound(message_id))?;

        if !self.store.mark_read(message_id).await? {
            return Err(MessagingError::MessageNotFound(message_id));
        }

        self.push(
            message.sender_id,
            ServerFrame::ReadReceipt {
                message_id,
                reader_id,
            },
        )
        .await;
        Ok(())
    }

    async fn notify_typing(&self, from: Uuid, to: Uuid) {
        self.push(to, ServerFrame::Typing { from }).await;
    }

    async fn persist_and_deliver(&self, new: NewMessage) -> MessagingResult<ChatMessage> {
        let message = ChatMessage::create(new);
        self.store.append(&message).await?;

        let delivered = self
            .push(
                message.receiver_id,
                ServerFrame::Message(DeliveryFrame::from(&message)),
            )
            .await;

        debug!(
            message_id = %message.id,
            receiver_id = %message.receiver_id,
            delivered,
            "message stored"
        );
        Ok(message)
    }

    /// Best-effort push to one user. Returns whether the frame was queued.
    async fn push(&self, user_id: Uuid, frame: ServerFrame) -> bool {
        let Some(connection) = self.registry.lookup(user_id).await else {
            return false;
        };

        match connection.send(frame) {
            Ok(()) => true,
            Err(error) => {
                debug!(user_id = %user_id, %error, "dropped live frame");
                false
            }
        }
    }

    async fn end_session(&self, connection: Connection, monitor: Option<LivenessMonitor>) {
        if let Some(monitor) = monitor {
            monitor.stop();
        }
        let _ = connection.close();

        let user_id = connection.user_id();
        if self.registry.unregister_connection(&connection).await {
            self.presence.publish(user_id, PresenceStatus::Offline).await;
            info!(user_id = %user_id, connection_id = %connection.id(), "connection unregistered");
        } else {
            debug!(
                user_id = %user_id,
                connection_id = %connection.id(),
                "connection was superseded, user stays online"
            );
        }
    }
}

/// Validate the caller-supplied parts of a chat message.
fn compose(
    sender: &Session,
    to: &str,
    content: String,
    attachment: Option<String>,
) -> MessagingResult<NewMessage> {
    let receiver_id =
        Uuid::parse_str(to).map_err(|_| MessagingError::InvalidRecipient(to.to_string()))?;
    let attachment = attachment.filter(|reference| !reference.is_empty());

    if content.is_empty() && attachment.is_none() {
        return Err(MessagingError::EmptyMessage);
    }

    Ok(NewMessage {
        sender_id: sender.user_id,
        receiver_id,
        company_id: sender.company_id,
        content,
        attachment,
    })
}

/// Runs session cleanup exactly once: explicitly via `release`, or from
/// `Drop` when the session future is cancelled.
struct SessionGuard {
    broker: MessageBroker,
    connection: Option<Connection>,
    monitor: Option<LivenessMonitor>,
}

impl SessionGuard {
    async fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            self.broker.end_session(connection, self.monitor.take()).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let broker = self.broker.clone();
        let monitor = self.monitor.take();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { broker.end_session(connection, monitor).await });
            }
            Err(_) => warn!(
                user_id = %connection.user_id(),
                "no runtime available, session cleanup skipped"
            ),
        }
    }
}
