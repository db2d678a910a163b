//! Database-backed channel.
//!
//! Publishing appends to the `channel_messages` table; the host
//! application's consumers drain rows per channel in id order.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::PgPool;
use tracing::debug;

use super::MessageChannel;
use crate::error::Result;

#[derive(Clone)]
pub struct PgMessageChannel {
    pool: PgPool,
}

impl PgMessageChannel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageChannel for PgMessageChannel {
    async fn publish(
        &self,
        channel: &str,
        payload: &str,
        headers: &Map<String, JsonValue>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_messages (channel, payload, headers)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(channel)
        .bind(payload)
        .bind(JsonValue::Object(headers.clone()))
        .execute(&self.pool)
        .await?;

        debug!("Published message to channel {}", channel);
        Ok(())
    }
}
