//! The durable side of messaging, as the broker sees it

use std::collections::BTreeMap;

use async_trait::async_trait;
use campus_database::{ChatMessage, MessageRepository};
use uuid::Uuid;

use crate::error::MessagingResult;

/// System of record for chat history. Implementations must tolerate
/// concurrent calls from every live session.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> MessagingResult<()>;

    async fn find(&self, id: Uuid) -> MessagingResult<Option<ChatMessage>>;

    /// Returns false when the message does not exist.
    async fn mark_read(&self, id: Uuid) -> MessagingResult<bool>;

    async fn between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: Option<i64>,
        offset: i64,
    ) -> MessagingResult<Vec<ChatMessage>>;

    async fn unread_count(&self, receiver_id: Uuid) -> MessagingResult<i64>;

    async fn partners(&self, user_id: Uuid) -> MessagingResult<Vec<Uuid>>;

    async fn delete(&self, id: Uuid, sender_id: Uuid) -> MessagingResult<bool>;

    /// Keyword search over one user's messages within a company, newest first.
    async fn search(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        keyword: &str,
    ) -> MessagingResult<Vec<ChatMessage>>;

    /// Messages addressed to `receiver_id`, keyed by sender.
    async fn inbox(
        &self,
        receiver_id: Uuid,
    ) -> MessagingResult<BTreeMap<Uuid, Vec<ChatMessage>>>;
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn append(&self, message: &ChatMessage) -> MessagingResult<()> {
        Ok(self.insert(message).await?)
    }

    async fn find(&self, id: Uuid) -> MessagingResult<Option<ChatMessage>> {
        Ok(self.find_by_id(id).await?)
    }

    async fn mark_read(&self, id: Uuid) -> MessagingResult<bool> {
        Ok(MessageRepository::mark_read(self, id).await?)
    }

    async fn between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: Option<i64>,
        offset: i64,
    ) -> MessagingResult<Vec<ChatMessage>> {
        Ok(MessageRepository::between(self, user_a, user_b, limit, offset).await?)
    }

    async fn unread_count(&self, receiver_id: Uuid) -> MessagingResult<i64> {
        Ok(self.count_unread(receiver_id).await?)
    }

    async fn partners(&self, user_id: Uuid) -> MessagingResult<Vec<Uuid>> {
        Ok(MessageRepository::partners(self, user_id).await?)
    }

    async fn delete(&self, id: Uuid, sender_id: Uuid) -> MessagingResult<bool> {
        Ok(MessageRepository::delete(self, id, sender_id).await?)
    }

    async fn search(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        keyword: &str,
    ) -> MessagingResult<Vec<ChatMessage>> {
        Ok(MessageRepository::search(self, company_id, user_id, keyword).await?)
    }

    async fn inbox(
        &self,
        receiver_id: Uuid,
    ) -> MessagingResult<BTreeMap<Uuid, Vec<ChatMessage>>> {
        Ok(MessageRepository::inbox(self, receiver_id).await?)
    }
}
