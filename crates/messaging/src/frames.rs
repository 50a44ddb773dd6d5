//! Wire frames exchanged over a live connection

use campus_database::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames received from a client, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// The sender is typing to `to`
    Typing { to: String },
    /// A chat message for `to`
    Message {
        to: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        attachment: Option<String>,
    },
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Frames pushed to a client, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message(DeliveryFrame),
    Typing { from: Uuid },
    ReadReceipt { message_id: Uuid, reader_id: Uuid },
    Presence { user_id: Uuid, status: PresenceStatus },
}

impl ServerFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A stored message as seen by its recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryFrame {
    pub id: Uuid,
    pub from: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub company_id: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for DeliveryFrame {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            from: message.sender_id.to_string(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            company_id: message.company_id,
            content: message.content.clone(),
            attachment: message.attachment.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
        }
    }
}
