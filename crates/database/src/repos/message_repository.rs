//! Repository for message data access operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::ChatMessage;
use crate::types::{DatabaseError, DatabaseResult};

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, company_id, content, attachment, created_at, read";

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a fully populated message
    pub async fn insert(&self, message: &ChatMessage) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, receiver_id, company_id, content, attachment, created_at, read)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(message.sender_id.to_string())
        .bind(message.receiver_id.to_string())
        .bind(message.company_id.to_string())
        .bind(&message.content)
        .bind(&message.attachment)
        .bind(message.created_at)
        .bind(message.read)
        .execute(&self.pool)
        .await?;

        info!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            "stored new message"
        );
        Ok(())
    }

    /// Find a message by its id
    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<ChatMessage>> {
        let row = sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_message_row).transpose()
    }

    /// Flag a message as read. Returns false when no such message exists.
    pub async fn mark_read(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE messages SET read = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Messages exchanged between two users.
    ///
    /// Without a limit the whole conversation is returned oldest first; with a
    /// limit a newest-first page starting at `offset` is returned.
    pub async fn between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: Option<i64>,
        offset: i64,
    ) -> DatabaseResult<Vec<ChatMessage>> {
        let conversation = "(sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)";
        let a = user_a.to_string();
        let b = user_b.to_string();

        let rows = match limit {
            None => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {conversation} ORDER BY created_at ASC"
                ))
                .bind(&a)
                .bind(&b)
                .bind(&b)
                .bind(&a)
                .fetch_all(&self.pool)
                .await?
            }
            Some(limit) => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {conversation}
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(&a)
                .bind(&b)
                .bind(&b)
                .bind(&a)
                .bind(limit.max(0))
                .bind(offset.max(0))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(map_message_row).collect()
    }

    /// Number of unread messages addressed to `receiver_id`
    pub async fn count_unread(&self, receiver_id: Uuid) -> DatabaseResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND read = 0")
                .bind(receiver_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Everyone `user_id` has exchanged at least one message with
    pub async fn partners(&self, user_id: Uuid) -> DatabaseResult<Vec<Uuid>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT CASE WHEN sender_id = ? THEN receiver_id ELSE sender_id END AS partner
             FROM messages WHERE sender_id = ? OR receiver_id = ? ORDER BY partner",
        )
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|raw| parse_uuid("partner", raw)).collect()
    }

    /// Messages in `company_id` sent or received by `user_id` whose content
    /// contains `keyword`, newest first. Matching is case-insensitive for ASCII.
    pub async fn search(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        keyword: &str,
    ) -> DatabaseResult<Vec<ChatMessage>> {
        let pattern = format!("%{}%", escape_like(keyword));
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE company_id = ? AND (sender_id = ? OR receiver_id = ?)
               AND content LIKE ? ESCAPE '\\'
             ORDER BY created_at DESC"
        ))
        .bind(company_id.to_string())
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_message_row).collect()
    }

    /// Everything addressed to `receiver_id`, grouped by sender, each group oldest first
    pub async fn inbox(
        &self,
        receiver_id: Uuid,
    ) -> DatabaseResult<BTreeMap<Uuid, Vec<ChatMessage>>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver_id = ? ORDER BY created_at ASC"
        ))
        .bind(receiver_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: BTreeMap<Uuid, Vec<ChatMessage>> = BTreeMap::new();
        for row in &rows {
            let message = map_message_row(row)?;
            grouped.entry(message.sender_id).or_default().push(message);
        }
        Ok(grouped)
    }

    /// Hard-delete a message. Only the sender may delete; returns whether a row went away.
    pub async fn delete(&self, id: Uuid, sender_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ? AND sender_id = ?")
            .bind(id.to_string())
            .bind(sender_id.to_string())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        debug!(message_id = %id, sender_id = %sender_id, deleted, "delete message");
        Ok(deleted)
    }
}

fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_uuid(column: &str, raw: &str) -> DatabaseResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| DatabaseError::InvalidData(format!("column {column} holds {raw:?}: {e}")))
}

fn map_message_row(row: &SqliteRow) -> DatabaseResult<ChatMessage> {
    let uuid_column = |column: &str| -> DatabaseResult<Uuid> {
        let raw: String = row.try_get(column)?;
        parse_uuid(column, &raw)
    };

    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(ChatMessage {
        id: uuid_column("id")?,
        sender_id: uuid_column("sender_id")?,
        receiver_id: uuid_column("receiver_id")?,
        company_id: uuid_column("company_id")?,
        content: row.try_get("content")?,
        attachment: row.try_get("attachment")?,
        created_at,
        read: row.try_get("read")?,
    })
}
