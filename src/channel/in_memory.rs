//! Recording channel for tests and local development.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use super::MessageChannel;
use crate::error::{RedriveError, Result};

/// A message captured by [`InMemoryChannel`].
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub channel: String,
    pub payload: String,
    pub headers: Map<String, JsonValue>,
}

/// Channel that records every publish, in order. Individual channel names
/// can be made to fail for exercising replay error paths.
#[derive(Default)]
pub struct InMemoryChannel {
    published: Mutex<Vec<PublishedMessage>>,
    failing: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish on `channel` fails until failures are cleared.
    pub fn fail_channel(&self, channel: &str) {
        lock(&self.failing).insert(channel.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Messages published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.published).clone()
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn publish(
        &self,
        channel: &str,
        payload: &str,
        headers: &Map<String, JsonValue>,
    ) -> Result<()> {
        if lock(&self.failing).contains(channel) {
            return Err(RedriveError::Publish(format!(
                "injected failure for channel {channel}"
            )));
        }

        lock(&self.published).push(PublishedMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
            headers: headers.clone(),
        });
        Ok(())
    }
}
