//! In-memory dead-letter store for tests and local development.

use std::sync::RwLock;

use async_trait::async_trait;

use super::{DeadLetterStore, ErrorContext};
use crate::error::{RedriveError, Result};

/// Dead-letter store held in memory. Same paging contract as the Postgres
/// store: oldest failure first, ties broken by message id.
#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    entries: RwLock<Vec<ErrorContext>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RedriveError {
    RedriveError::Internal("dead letter store lock poisoned".to_string())
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn persist(&self, context: &ErrorContext) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.retain(|e| e.message_id != context.message_id);
        entries.push(context.clone());
        Ok(())
    }

    async fn page(&self, limit: i64, offset: i64) -> Result<Vec<ErrorContext>> {
        let entries = self.entries.read().map_err(poisoned)?;

        let mut ordered: Vec<ErrorContext> = entries.clone();
        ordered.sort_by(|a, b| {
            (a.failed_at, &a.message_id).cmp(&(b.failed_at, &b.message_id))
        });

        Ok(ordered
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find(&self, message_id: &str) -> Result<Option<ErrorContext>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.iter().find(|e| e.message_id == message_id).cloned())
    }

    async fn remove(&self, message_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|e| e.message_id != message_id);
        Ok(entries.len() != before)
    }
}
