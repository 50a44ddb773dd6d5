//! Message entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A one-to-one message as recorded in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// The caller-supplied part of a message; identity and timestamp are assigned on send.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub company_id: Uuid,
    pub content: String,
    pub attachment: Option<String>,
}

impl ChatMessage {
    /// Stamp a fresh id and server time onto a new message. It starts unread.
    pub fn create(new: NewMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            content: new.content,
            attachment: new.attachment,
            company_id: new.company_id,
            created_at: Utc::now(),
            read: false,
        }
    }

    /// The counterparty of `user_id` in this conversation.
    pub fn partner_of(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id {
            self.receiver_id
        } else {
            self.sender_id
        }
    }
}
