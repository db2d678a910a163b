//! In-memory document store.
//!
//! Same observable contract as the Postgres store, held in a map under a
//! single lock. Intended for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{decode_document, encode_document, DocumentStore};
use crate::convert::{ConversionService, TypeTag, TypedValue};
use crate::error::{RedriveError, Result};

struct Entry {
    id: String,
    value_type: TypeTag,
    content: String,
}

/// Insertion-ordered document store held entirely in memory.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Entry>>>,
    conversion: Arc<dyn ConversionService>,
    validate_documents: bool,
}

impl InMemoryDocumentStore {
    pub fn new(conversion: Arc<dyn ConversionService>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            conversion,
            validate_documents: true,
        }
    }

    /// Skip JSON validation of serialized content at write time.
    pub fn without_validation(mut self) -> Self {
        self.validate_documents = false;
        self
    }
}

fn poisoned<T>(_: T) -> RedriveError {
    RedriveError::Internal("document store lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn add_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()> {
        let (content, value_type) =
            encode_document(self.conversion.as_ref(), self.validate_documents, value)?;

        let mut collections = self.collections.write().map_err(poisoned)?;
        let entries = collections.entry(collection.to_string()).or_default();

        if entries.iter().any(|e| e.id == id) {
            return Err(RedriveError::DocumentAlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        entries.push(Entry {
            id: id.to_string(),
            value_type,
            content,
        });
        Ok(())
    }

    async fn update_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()> {
        let (content, value_type) =
            encode_document(self.conversion.as_ref(), self.validate_documents, value)?;

        let mut collections = self.collections.write().map_err(poisoned)?;
        let entry = collections
            .get_mut(collection)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
            .ok_or_else(|| RedriveError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        entry.value_type = value_type;
        entry.content = content;
        Ok(())
    }

    async fn upsert_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()> {
        let (content, value_type) =
            encode_document(self.conversion.as_ref(), self.validate_documents, value)?;

        let mut collections = self.collections.write().map_err(poisoned)?;
        let entries = collections.entry(collection.to_string()).or_default();

        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.value_type = value_type;
                entry.content = content;
            }
            None => entries.push(Entry {
                id: id.to_string(),
                value_type,
                content,
            }),
        }
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<TypedValue> {
        let collections = self.collections.read().map_err(poisoned)?;
        let entry = collections
            .get(collection)
            .and_then(|entries| entries.iter().find(|e| e.id == id))
            .ok_or_else(|| RedriveError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        decode_document(
            self.conversion.as_ref(),
            entry.content.clone(),
            entry.value_type.clone(),
        )
    }

    async fn get_all_documents(&self, collection: &str) -> Result<Vec<TypedValue>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let entries = match collections.get(collection) {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };

        entries
            .iter()
            .map(|e| {
                decode_document(
                    self.conversion.as_ref(),
                    e.content.clone(),
                    e.value_type.clone(),
                )
            })
            .collect()
    }

    async fn count_documents(&self, collection: &str) -> Result<i64> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(collection).map_or(0, |e| e.len() as i64))
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        if let Some(entries) = collections.get_mut(collection) {
            entries.retain(|e| e.id != id);
        }
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections.remove(collection);
        Ok(())
    }
}
