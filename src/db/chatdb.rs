// db/chatdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::{db::DBClient, error::StoreError};
use crate::models::chatmodels::*;

#[async_trait]
pub trait ChatExt {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Conversation between two participants of a job, oldest first.
    async fn list_messages(
        &self,
        job_id: Uuid,
        user_one_id: Uuid,
        user_two_id: Uuid,
    ) -> Result<Vec<Message>, StoreError>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
            (job_id, sender_id, receiver_id, content, message_type, metadata, flagged, flag_categories)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#
        )
        .bind(message.job_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(message.content)
        .bind(message.message_type)
        .bind(message.metadata)
        .bind(message.flagged)
        .bind(message.flag_categories)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(message)
    }

    async fn list_messages(
        &self,
        job_id: Uuid,
        user_one_id: Uuid,
        user_two_id: Uuid,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE job_id = $1
              AND ((sender_id = $2 AND receiver_id = $3)
                OR (sender_id = $3 AND receiver_id = $2))
            ORDER BY created_at ASC
            "#
        )
        .bind(job_id)
        .bind(user_one_id)
        .bind(user_two_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}
