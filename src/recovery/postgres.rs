//! PostgreSQL dead-letter store.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use super::{DeadLetterStore, ErrorContext};
use crate::error::Result;

/// Dead-letter store backed by the `dead_letters` table, keyed by message
/// id. Persisting over an existing id replaces the row.
#[derive(Clone)]
pub struct PgDeadLetterStore {
    pool: PgPool,
}

impl PgDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn context_from_row(row: &PgRow) -> ErrorContext {
    let headers = match row.get::<JsonValue, _>("headers") {
        JsonValue::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    ErrorContext {
        message_id: row.get("message_id"),
        channel: row.get("channel"),
        payload_type: row.get("payload_type"),
        stack_trace: row.get("stack_trace"),
        payload: row.get("payload"),
        failed_at: row.get("failed_at"),
        headers,
    }
}

#[async_trait]
impl DeadLetterStore for PgDeadLetterStore {
    async fn persist(&self, context: &ErrorContext) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dead_letters (
                message_id, channel, payload_type, headers, stack_trace, payload, failed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (message_id) DO UPDATE SET
                channel = EXCLUDED.channel,
                payload_type = EXCLUDED.payload_type,
                headers = EXCLUDED.headers,
                stack_trace = EXCLUDED.stack_trace,
                payload = EXCLUDED.payload,
                failed_at = EXCLUDED.failed_at
            "#,
        )
        .bind(&context.message_id)
        .bind(&context.channel)
        .bind(context.payload_type.as_deref())
        .bind(JsonValue::Object(context.headers.clone()))
        .bind(&context.stack_trace)
        .bind(&context.payload)
        .bind(context.failed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn page(&self, limit: i64, offset: i64) -> Result<Vec<ErrorContext>> {
        let rows = sqlx::query(
            r#"
            SELECT message_id, channel, payload_type, headers, stack_trace, payload, failed_at
            FROM dead_letters
            ORDER BY failed_at ASC, message_id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(context_from_row).collect())
    }

    async fn find(&self, message_id: &str) -> Result<Option<ErrorContext>> {
        let row = sqlx::query(
            r#"
            SELECT message_id, channel, payload_type, headers, stack_trace, payload, failed_at
            FROM dead_letters
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(context_from_row))
    }

    async fn remove(&self, message_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM dead_letters WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
