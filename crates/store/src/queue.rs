//! SQLite implementation of [`DispatchQueue`].
//!
//! Messages go into a single `dispatch_queue` table shared by every queue
//! name. Within a queue, a message whose dedup key was already sent inside
//! the deduplication window is not stored again; the sender gets the
//! existing message id back with `duplicate = true`. Consumers read a
//! group's messages in insertion order with [`SqliteDispatchQueue::pending`]
//! and mark them done with [`SqliteDispatchQueue::acknowledge`]. Acknowledged
//! messages are deleted by a later send once they fall outside the window.

use std::time::Duration;

use async_trait::async_trait;
use intake::{DispatchQueue, QueueError, QueueMessage, QueueReceipt};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use crate::db::{sql_identifier, Database, DbError};

/// Window during which a repeated dedup key is treated as a duplicate.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(5 * 60);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dispatch_queue (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    queue           TEXT NOT NULL,
    group_key       TEXT NOT NULL,
    dedup_key       TEXT NOT NULL,
    body            TEXT NOT NULL,
    enqueued_at_ms  INTEGER NOT NULL,
    acked_at_ms     INTEGER
);
CREATE INDEX IF NOT EXISTS idx_dispatch_queue_dedup ON dispatch_queue(queue, dedup_key);
CREATE INDEX IF NOT EXISTS idx_dispatch_queue_group ON dispatch_queue(queue, group_key, id);
";

/// A message waiting in a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: i64,
    pub group_key: String,
    pub dedup_key: String,
    pub body: String,
    pub enqueued_at_ms: i64,
}

/// FIFO queue with per-key deduplication, stored in SQLite.
#[derive(Clone)]
pub struct SqliteDispatchQueue {
    db: Database,
    queue: String,
    dedup_window: Duration,
}

impl SqliteDispatchQueue {
    pub async fn open(db: Database, queue: &str) -> Result<Self, DbError> {
        let queue = sql_identifier(queue)?;
        db.call(|conn| Ok(conn.execute_batch(SCHEMA)?)).await?;
        Ok(Self {
            db,
            queue,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        })
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn name(&self) -> &str {
        &self.queue
    }

    /// Unacknowledged messages for `group_key`, oldest first.
    pub async fn pending(&self, group_key: &str) -> Result<Vec<QueuedMessage>, DbError> {
        let queue = self.queue.clone();
        let group_key = group_key.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, group_key, dedup_key, body, enqueued_at_ms
                     FROM dispatch_queue
                     WHERE queue = ?1 AND group_key = ?2 AND acked_at_ms IS NULL
                     ORDER BY id",
                )?;
                let messages = stmt
                    .query_map(params![queue, group_key], |row| {
                        Ok(QueuedMessage {
                            id: row.get(0)?,
                            group_key: row.get(1)?,
                            dedup_key: row.get(2)?,
                            body: row.get(3)?,
                            enqueued_at_ms: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(messages)
            })
            .await
    }

    /// Marks a message as consumed. Returns false if it was unknown or already acknowledged.
    pub async fn acknowledge(&self, message_id: i64) -> Result<bool, DbError> {
        let queue = self.queue.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.db
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE dispatch_queue SET acked_at_ms = ?1
                     WHERE id = ?2 AND queue = ?3 AND acked_at_ms IS NULL",
                    params![now_ms, message_id, queue],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    async fn send_at(&self, message: QueueMessage, now_ms: i64) -> Result<QueueReceipt, DbError> {
        let queue = self.queue.clone();
        let window_ms = i64::try_from(self.dedup_window.as_millis()).unwrap_or(i64::MAX);
        let cutoff_ms = now_ms.saturating_sub(window_ms);
        self.db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                // Acknowledged rows outside the window no longer take part in dedup.
                tx.execute(
                    "DELETE FROM dispatch_queue
                     WHERE queue = ?1 AND acked_at_ms IS NOT NULL AND enqueued_at_ms <= ?2",
                    params![queue, cutoff_ms],
                )?;
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM dispatch_queue
                         WHERE queue = ?1 AND dedup_key = ?2 AND enqueued_at_ms > ?3
                         ORDER BY id DESC LIMIT 1",
                        params![queue, message.dedup_key, cutoff_ms],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = existing {
                    tx.commit()?;
                    return Ok(QueueReceipt {
                        message_id: id.to_string(),
                        duplicate: true,
                    });
                }

                tx.execute(
                    "INSERT INTO dispatch_queue (queue, group_key, dedup_key, body, enqueued_at_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        queue,
                        message.group_key,
                        message.dedup_key,
                        message.body,
                        now_ms
                    ],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(QueueReceipt {
                    message_id: id.to_string(),
                    duplicate: false,
                })
            })
            .await
    }
}

impl From<DbError> for QueueError {
    fn from(error: DbError) -> Self {
        QueueError::new(error.to_string())
    }
}

#[async_trait]
impl DispatchQueue for SqliteDispatchQueue {
    async fn send(&self, message: QueueMessage) -> Result<QueueReceipt, QueueError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let receipt = self.send_at(message, now_ms).await?;
        if receipt.duplicate {
            debug!(
                queue = %self.queue,
                message_id = %receipt.message_id,
                "Duplicate message suppressed"
            );
        } else {
            info!(queue = %self.queue, message_id = %receipt.message_id, "Message enqueued");
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(group: &str, dedup: &str, body: &str) -> QueueMessage {
        QueueMessage {
            body: body.to_string(),
            group_key: group.to_string(),
            dedup_key: dedup.to_string(),
        }
    }

    async fn queue(name: &str) -> SqliteDispatchQueue {
        let db = Database::open_in_memory().unwrap();
        SqliteDispatchQueue::open(db, name).await.unwrap()
    }

    #[tokio::test]
    async fn messages_are_pending_in_fifo_order() {
        let queue = queue("tasks").await;
        queue.send(message("10042", "a", "first")).await.unwrap();
        queue.send(message("10042", "b", "second")).await.unwrap();
        queue.send(message("other", "c", "elsewhere")).await.unwrap();

        let pending = queue.pending("10042").await.unwrap();
        let bodies: Vec<_> = pending.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["first", "second"]);
    }

    #[tokio::test]
    async fn repeated_dedup_key_is_reported_as_duplicate() {
        let queue = queue("tasks").await;
        let first = queue.send(message("10042", "10042", "one")).await.unwrap();
        let second = queue.send(message("10042", "10042", "two")).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.message_id, second.message_id);
        assert_eq!(queue.pending("10042").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dedup_key_is_accepted_again_after_the_window() {
        let queue = queue("tasks").await.with_dedup_window(Duration::from_secs(60));
        let first = queue
            .send_at(message("g", "k", "one"), 1_000_000)
            .await
            .unwrap();
        let inside = queue
            .send_at(message("g", "k", "two"), 1_030_000)
            .await
            .unwrap();
        let after = queue
            .send_at(message("g", "k", "three"), 1_061_000)
            .await
            .unwrap();

        assert!(!first.duplicate);
        assert!(inside.duplicate);
        assert!(!after.duplicate);
        assert_ne!(first.message_id, after.message_id);
    }

    #[tokio::test]
    async fn queues_sharing_a_database_are_isolated() {
        let db = Database::open_in_memory().unwrap();
        let tasks = SqliteDispatchQueue::open(db.clone(), "tasks").await.unwrap();
        let audits = SqliteDispatchQueue::open(db, "audits").await.unwrap();

        assert!(!tasks.send(message("g", "k", "x")).await.unwrap().duplicate);
        assert!(!audits.send(message("g", "k", "x")).await.unwrap().duplicate);
        assert_eq!(tasks.pending("g").await.unwrap().len(), 1);
        assert_eq!(audits.pending("g").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn acknowledged_messages_leave_the_pending_list() {
        let queue = queue("tasks").await;
        let receipt = queue.send(message("g", "k", "x")).await.unwrap();
        let id: i64 = receipt.message_id.parse().unwrap();

        assert!(queue.acknowledge(id).await.unwrap());
        assert!(!queue.acknowledge(id).await.unwrap());
        assert!(queue.pending("g").await.unwrap().is_empty());
    }

    async fn row_count(queue: &SqliteDispatchQueue) -> i64 {
        queue
            .db
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM dispatch_queue", [], |row| {
                    row.get(0)
                })?)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn acknowledged_messages_are_reclaimed_after_the_window() {
        let queue = queue("tasks").await.with_dedup_window(Duration::from_secs(60));

        for i in 0..200_i64 {
            let key = format!("story-{i}");
            let receipt = queue
                .send_at(message(&key, &key, "x"), i * 120_000)
                .await
                .unwrap();
            assert!(!receipt.duplicate);
            let id: i64 = receipt.message_id.parse().unwrap();
            assert!(queue.acknowledge(id).await.unwrap());
        }

        assert!(row_count(&queue).await <= 1);
    }

    #[tokio::test]
    async fn unacknowledged_and_recent_messages_are_kept() {
        let queue = queue("tasks").await.with_dedup_window(Duration::from_secs(60));
        queue.send_at(message("a", "a", "pending"), 0).await.unwrap();
        let acked = queue.send_at(message("b", "b", "acked"), 100_000).await.unwrap();
        queue
            .acknowledge(acked.message_id.parse().unwrap())
            .await
            .unwrap();

        // Inside the window of "b": it must still suppress a repeat.
        let repeat = queue.send_at(message("b", "b", "again"), 130_000).await.unwrap();
        assert!(repeat.duplicate);
        assert_eq!(row_count(&queue).await, 2);
        assert_eq!(queue.pending("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_queue_name_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = SqliteDispatchQueue::open(db, "nemo-ai-tasks").await.err().unwrap();
        assert!(matches!(err, DbError::InvalidIdentifier { .. }));
    }
}
