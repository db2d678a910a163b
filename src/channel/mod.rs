//! Message channel publish contract.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryChannel, PublishedMessage};
pub use postgres::PgMessageChannel;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;

/// Publish onto a named channel. The call returns once delivery is
/// acknowledged: it succeeds or fails, with no partial delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn publish(
        &self,
        channel: &str,
        payload: &str,
        headers: &Map<String, JsonValue>,
    ) -> Result<()>;
}
