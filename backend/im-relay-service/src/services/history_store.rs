//! Durable, append-only chat history in PostgreSQL.

use crate::error::{StoreError, StoreResult};
use crate::models::message::{HistoryCursor, HistoryRecord, MessageType, StoredHistoryRecord};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one record. Must be durable when this returns `Ok`.
    async fn append_history(&self, record: &HistoryRecord) -> StoreResult<()>;

    /// Newest-first page of a conversation, ordered by `(send_time, id)`,
    /// strictly below `before` when given.
    async fn list_history(
        &self,
        conversation_id: &str,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> StoreResult<Vec<StoredHistoryRecord>>;
}

pub struct PgHistoryStore {
    db: Pool,
}

impl PgHistoryStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }

    fn record_from_row(row: &Row) -> StoreResult<StoredHistoryRecord> {
        let message_type: String = row.get("message_type");
        let message_type = MessageType::parse(&message_type).ok_or_else(|| {
            StoreError::Database(format!("unknown message_type in history: {message_type}"))
        })?;

        let record = HistoryRecord {
            conversation_id: row.get("conversation_id"),
            participant_one: row.get("participant_one"),
            participant_two: row.get("participant_two"),
            sender_id: row.get("sender_id"),
            receiver_id: row.get("receiver_id"),
            goods_id: row.get("goods_id"),
            message_type,
            message_body: row.get("message_body"),
            first_to_second: row.get("first_to_second"),
            send_time: row.get("send_time"),
        };
        Ok(StoredHistoryRecord {
            id: row.get("id"),
            record,
        })
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append_history(&self, record: &HistoryRecord) -> StoreResult<()> {
        let mut client = self.db.get().await?;

        // Unit of work covers the history row only; the cache lives elsewhere.
        let tx = client.transaction().await?;
        tx.execute(
            r#"
            INSERT INTO chat_history (
                conversation_id,
                participant_one,
                participant_two,
                sender_id,
                receiver_id,
                goods_id,
                message_type,
                message_body,
                first_to_second,
                send_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            &[
                &record.conversation_id,
                &record.participant_one,
                &record.participant_two,
                &record.sender_id,
                &record.receiver_id,
                &record.goods_id,
                &record.message_type.as_str(),
                &record.message_body,
                &record.first_to_second,
                &record.send_time,
            ],
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(
            conversation_id = %record.conversation_id,
            sender_id = %record.sender_id,
            "history record appended"
        );
        Ok(())
    }

    async fn list_history(
        &self,
        conversation_id: &str,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> StoreResult<Vec<StoredHistoryRecord>> {
        let client = self.db.get().await?;
        let before_time = before.map(|c| c.send_time);
        let before_id = before.map(|c| c.id);

        let rows = client
            .query(
                r#"
                SELECT id, conversation_id, participant_one, participant_two, sender_id,
                       receiver_id, goods_id, message_type, message_body, first_to_second,
                       send_time
                FROM chat_history
                WHERE conversation_id = $1
                  AND ($2::timestamptz IS NULL
                       OR (send_time, id) < ($2::timestamptz, $3::bigint))
                ORDER BY send_time DESC, id DESC
                LIMIT $4
                "#,
                &[&conversation_id, &before_time, &before_id, &limit],
            )
            .await?;

        rows.iter().map(Self::record_from_row).collect()
    }
}
