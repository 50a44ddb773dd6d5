//! In-memory store for broker tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use campus_database::ChatMessage;
use uuid::Uuid;

use crate::error::{MessagingError, MessagingResult};
use crate::store::MessageStore;

#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<ChatMessage>>,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &ChatMessage) -> MessagingResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(MessagingError::Store("store unavailable".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> MessagingResult<Option<ChatMessage>> {
        Ok(self.messages.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn mark_read(&self, id: Uuid) -> MessagingResult<bool> {
        let mut messages = self.messages.lock().unwrap();
        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        _limit: Option<i64>,
        _offset: i64,
    ) -> MessagingResult<Vec<ChatMessage>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                (m.sender_id == user_a && m.receiver_id == user_b)
                    || (m.sender_id == user_b && m.receiver_id == user_a)
            })
            .cloned()
            .collect())
    }

    async fn unread_count(&self, receiver_id: Uuid) -> MessagingResult<i64> {
        let count = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.receiver_id == receiver_id && !m.read)
            .count();
        Ok(count as i64)
    }

    async fn partners(&self, user_id: Uuid) -> MessagingResult<Vec<Uuid>> {
        let mut partners: Vec<Uuid> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .map(|m| m.partner_of(user_id))
            .collect();
        partners.sort();
        partners.dedup();
        Ok(partners)
    }

    async fn delete(&self, id: Uuid, sender_id: Uuid) -> MessagingResult<bool> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| !(m.id == id && m.sender_id == sender_id));
        Ok(messages.len() != before)
    }

    async fn search(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        keyword: &str,
    ) -> MessagingResult<Vec<ChatMessage>> {
        let keyword = keyword.to_lowercase();
        let mut found: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.company_id == company_id)
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .filter(|m| m.content.to_lowercase().contains(&keyword))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn inbox(
        &self,
        receiver_id: Uuid,
    ) -> MessagingResult<BTreeMap<Uuid, Vec<ChatMessage>>> {
        let mut received: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.receiver_id == receiver_id)
            .cloned()
            .collect();
        received.sort_by_key(|m| m.created_at);

        let mut grouped: BTreeMap<Uuid, Vec<ChatMessage>> = BTreeMap::new();
        for message in received {
            grouped.entry(message.sender_id).or_default().push(message);
        }
        Ok(grouped)
    }
}
