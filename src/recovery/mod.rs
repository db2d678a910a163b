//! Dead-letter capture and replay.
//!
//! Messages that exhaust processing retries land here with their headers,
//! stack trace and payload. An operator can page through the entries,
//! inspect one, replay one or all back onto the originating channel, or
//! drop them without replay.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDeadLetterStore;
pub use postgres::PgDeadLetterStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{info, instrument, warn};

use crate::channel::MessageChannel;
use crate::error::{RedriveError, Result};

/// Header names attached to a replayed message.
pub mod headers {
    /// Unique id of the originating message.
    pub const MESSAGE_ID: &str = "messageId";
    /// Channel the message was polled from; replay publishes back onto it.
    pub const POLLED_CHANNEL: &str = "polledChannel";
    /// Declared payload type, when known.
    pub const TYPE_ID: &str = "typeId";
    /// Failure timestamp, epoch seconds.
    pub const FAILED_AT: &str = "failedAt";
}

/// Everything captured about one failed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub message_id: String,
    /// Originating channel; replay publishes back onto it.
    pub channel: String,
    /// Declared payload type, when the pipeline knew it.
    pub payload_type: Option<String>,
    pub stack_trace: String,
    /// Original message body, preserved verbatim for replay.
    pub payload: String,
    pub failed_at: DateTime<Utc>,
    /// Remaining message headers, preserved for replay.
    #[serde(default)]
    pub headers: Map<String, JsonValue>,
}

impl ErrorContext {
    /// Capture a failure observed now.
    pub fn new(message_id: &str, channel: &str, stack_trace: &str, payload: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            channel: channel.to_string(),
            payload_type: None,
            stack_trace: stack_trace.to_string(),
            payload: payload.to_string(),
            failed_at: Utc::now(),
            headers: Map::new(),
        }
    }

    pub fn with_payload_type(mut self, payload_type: &str) -> Self {
        self.payload_type = Some(payload_type.to_string());
        self
    }

    pub fn with_failed_at(mut self, failed_at: DateTime<Utc>) -> Self {
        self.failed_at = failed_at;
        self
    }

    pub fn with_header(mut self, name: &str, value: JsonValue) -> Self {
        self.headers.insert(name.to_string(), value);
        self
    }

    /// Full header map republished with the payload on replay.
    pub fn replay_headers(&self) -> Map<String, JsonValue> {
        let mut headers = self.headers.clone();
        headers.insert(
            headers::MESSAGE_ID.to_string(),
            JsonValue::from(self.message_id.clone()),
        );
        headers.insert(
            headers::POLLED_CHANNEL.to_string(),
            JsonValue::from(self.channel.clone()),
        );
        if let Some(ty) = &self.payload_type {
            headers.insert(headers::TYPE_ID.to_string(), JsonValue::from(ty.clone()));
        }
        headers.insert(
            headers::FAILED_AT.to_string(),
            JsonValue::from(self.failed_at.timestamp()),
        );
        headers
    }
}

/// Durable storage for dead-letter entries, at most one live entry per
/// message id.
///
/// `page` orders by failure time ascending, ties broken by message id, so
/// walking pages never skips or repeats an entry while the set is quiet.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Store an entry. An existing entry for the same message id is
    /// replaced.
    async fn persist(&self, context: &ErrorContext) -> Result<()>;

    /// One page of entries, oldest failure first.
    async fn page(&self, limit: i64, offset: i64) -> Result<Vec<ErrorContext>>;

    async fn find(&self, message_id: &str) -> Result<Option<ErrorContext>>;

    /// Remove an entry, reporting whether it existed.
    async fn remove(&self, message_id: &str) -> Result<bool>;
}

/// Outcome of a `reply_all` sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: u64,
    pub failed: u64,
}

/// Batch size used when sweeping the store in `reply_all`.
const REPLAY_BATCH_SIZE: i64 = 100;

/// Operator-facing gateway over a dead-letter store and the message channel.
pub struct DeadLetterService {
    store: Arc<dyn DeadLetterStore>,
    channel: Arc<dyn MessageChannel>,
}

impl DeadLetterService {
    pub fn new(store: Arc<dyn DeadLetterStore>, channel: Arc<dyn MessageChannel>) -> Self {
        Self { store, channel }
    }

    /// Store the failure context for a message that exhausted retries. A
    /// previous entry for the same message id is replaced.
    #[instrument(skip(self, context), fields(message_id = %context.message_id))]
    pub async fn persist_failure(&self, context: &ErrorContext) -> Result<()> {
        self.store.persist(context).await?;
        warn!(
            "Stored dead letter {} from channel {}",
            context.message_id, context.channel
        );
        Ok(())
    }

    /// A page of entries, oldest failure first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ErrorContext>> {
        self.store.page(limit, offset).await
    }

    /// Full detail for one entry.
    pub async fn show(&self, message_id: &str) -> Result<ErrorContext> {
        self.store
            .find(message_id)
            .await?
            .ok_or_else(|| RedriveError::DeadLetterNotFound(message_id.to_string()))
    }

    /// Republish one entry onto its originating channel, then remove it.
    ///
    /// Publish and delete are separate steps: a failed publish leaves the
    /// entry stored for another attempt, and a crash between the two steps
    /// redelivers the message on the next reply. Consumers see a replayed
    /// message at least once.
    #[instrument(skip(self))]
    pub async fn reply(&self, message_id: &str) -> Result<()> {
        let context = self.show(message_id).await?;
        self.replay(&context).await
    }

    async fn replay(&self, context: &ErrorContext) -> Result<()> {
        self.channel
            .publish(&context.channel, &context.payload, &context.replay_headers())
            .await?;
        self.store.remove(&context.message_id).await?;

        info!(
            "Replayed dead letter {} onto channel {}",
            context.message_id, context.channel
        );
        Ok(())
    }

    /// Replay every stored entry. An entry that fails to replay is logged,
    /// left in place and skipped; the sweep continues with the rest.
    #[instrument(skip(self))]
    pub async fn reply_all(&self) -> Result<ReplayReport> {
        let mut report = ReplayReport::default();

        loop {
            // Replayed entries disappear from the store; failed ones stay at
            // the front of the ascending order and are offset past.
            let batch = self
                .store
                .page(REPLAY_BATCH_SIZE, report.failed as i64)
                .await?;
            if batch.is_empty() {
                break;
            }

            for context in &batch {
                match self.replay(context).await {
                    Ok(()) => report.replayed += 1,
                    Err(e) => {
                        warn!("Replay of dead letter {} failed: {}", context.message_id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "Replayed {} dead letters, {} failed",
            report.replayed, report.failed
        );
        Ok(report)
    }

    /// Remove an entry without replaying it.
    #[instrument(skip(self))]
    pub async fn delete(&self, message_id: &str) -> Result<()> {
        if !self.store.remove(message_id).await? {
            return Err(RedriveError::DeadLetterNotFound(message_id.to_string()));
        }

        info!("Deleted dead letter {}", message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockMessageChannel;
    use serde_json::json;

    fn context() -> ErrorContext {
        ErrorContext::new("m-1", "orders", "trace", "{}").with_payload_type("order")
    }

    #[test]
    fn replay_headers_include_routing_metadata() {
        let context = context().with_header("custom", json!("x"));
        let headers = context.replay_headers();

        assert_eq!(headers[headers::MESSAGE_ID], json!("m-1"));
        assert_eq!(headers[headers::POLLED_CHANNEL], json!("orders"));
        assert_eq!(headers[headers::TYPE_ID], json!("order"));
        assert_eq!(headers["custom"], json!("x"));
        assert!(headers.contains_key(headers::FAILED_AT));
    }

    #[tokio::test]
    async fn reply_publishes_then_removes() {
        let store = Arc::new(InMemoryDeadLetterStore::new());
        store.persist(&context()).await.unwrap();

        let mut channel = MockMessageChannel::new();
        channel
            .expect_publish()
            .withf(|channel: &str, payload: &str, _headers: &Map<String, JsonValue>| {
                channel == "orders" && payload == "{}"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = DeadLetterService::new(store.clone(), Arc::new(channel));
        service.reply("m-1").await.unwrap();

        assert!(store.find("m-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_publish_leaves_entry_stored() {
        let store = Arc::new(InMemoryDeadLetterStore::new());
        store.persist(&context()).await.unwrap();

        let mut channel = MockMessageChannel::new();
        channel
            .expect_publish()
            .times(1)
            .returning(|_, _, _| Err(RedriveError::Publish("channel down".to_string())));

        let service = DeadLetterService::new(store.clone(), Arc::new(channel));
        let err = service.reply("m-1").await.unwrap_err();

        assert!(matches!(err, RedriveError::Publish(_)));
        assert!(store.find("m-1").await.unwrap().is_some());
    }
}
