//! Collection-scoped document storage.
//!
//! Documents are opaque serialized payloads keyed by `(collection, id)`.
//! Collections are implicit: they exist from the first write and disappear
//! with their last document. Values cross the API as [`TypedValue`] and are
//! serialized through the conversion gateway on the way in and out.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PgDocumentStore;

use async_trait::async_trait;

use crate::convert::{ConversionKey, ConversionService, MediaType, Payload, TypeTag, TypedValue};
use crate::error::{RedriveError, Result};

/// Durable, collection-scoped document storage.
///
/// `(collection, id)` is unique while a document is live. Uniqueness for
/// `add_document` and atomicity for `upsert_document` are enforced by the
/// backing store itself, never by a check-then-act sequence here.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails with `DocumentAlreadyExists` when the
    /// key already holds a live document.
    async fn add_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()>;

    /// Overwrite an existing document in place. Fails with
    /// `DocumentNotFound` when the key is absent; never creates.
    async fn update_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()>;

    /// Insert if absent, overwrite if present, atomically.
    async fn upsert_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()>;

    /// Fetch one document, converted back to its recorded type.
    async fn get_document(&self, collection: &str, id: &str) -> Result<TypedValue>;

    /// All live documents in the collection, in insertion order.
    async fn get_all_documents(&self, collection: &str) -> Result<Vec<TypedValue>>;

    /// Number of live documents; zero for an unknown or empty collection.
    async fn count_documents(&self, collection: &str) -> Result<i64>;

    /// Remove a document. Removing an absent key is a no-op.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;

    /// Remove every document in the collection. Dropping an unknown or
    /// already-empty collection succeeds silently.
    async fn drop_collection(&self, collection: &str) -> Result<()>;
}

/// Serialize a value to stored text, recording its logical type so reads can
/// convert back. With `validate` set, content that does not parse as JSON is
/// rejected before anything is written.
fn encode_document(
    conversion: &dyn ConversionService,
    validate: bool,
    value: TypedValue,
) -> Result<(String, TypeTag)> {
    let TypedValue { data, ty, media } = value;
    let key = ConversionKey::new(ty.clone(), media, TypeTag::string(), MediaType::json());
    let content = conversion.convert(data, &key)?.into_text()?;

    if validate {
        serde_json::from_str::<serde_json::Value>(&content)
            .map_err(|e| RedriveError::InvalidDocument(format!("content is not valid JSON: {e}")))?;
    }

    Ok((content, ty))
}

/// Convert stored text back to the representation recorded at write time.
fn decode_document(
    conversion: &dyn ConversionService,
    content: String,
    ty: TypeTag,
) -> Result<TypedValue> {
    let target_media = if ty == TypeTag::string() {
        MediaType::json()
    } else {
        MediaType::native()
    };
    let key = ConversionKey::new(
        TypeTag::string(),
        MediaType::json(),
        ty.clone(),
        target_media.clone(),
    );
    let data = conversion.convert(Payload::Text(content), &key)?;

    Ok(TypedValue {
        data,
        ty,
        media: target_media,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConverterRegistry;

    #[test]
    fn encode_rejects_malformed_json_when_validating() {
        let registry = ConverterRegistry::new();

        let err = encode_document(&registry, true, TypedValue::text(r#"{"name":"#)).unwrap_err();

        assert!(matches!(err, RedriveError::InvalidDocument(_)));
    }

    #[test]
    fn encode_accepts_anything_without_validation() {
        let registry = ConverterRegistry::new();

        let (content, ty) =
            encode_document(&registry, false, TypedValue::text("not json at all")).unwrap();

        assert_eq!(content, "not json at all");
        assert_eq!(ty, TypeTag::string());
    }

    #[test]
    fn decode_of_plain_text_is_identity() {
        let registry = ConverterRegistry::new();

        let value =
            decode_document(&registry, r#"{"name":"Johny"}"#.to_string(), TypeTag::string())
                .unwrap();

        assert_eq!(
            value.data,
            Payload::Text(r#"{"name":"Johny"}"#.to_string())
        );
    }
}
