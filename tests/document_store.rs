//! Document store behavior, exercised against the in-memory backend.

use std::sync::Arc;

use redrive::convert::{ConverterRegistry, Payload, TypeTag, TypedValue};
use redrive::error::RedriveError;
use redrive::store::{DocumentStore, InMemoryDocumentStore};
use serde_json::json;

fn plain_store() -> InMemoryDocumentStore {
    InMemoryDocumentStore::new(Arc::new(ConverterRegistry::new()))
}

fn user_store() -> InMemoryDocumentStore {
    let mut registry = ConverterRegistry::new();
    registry.register_json(&TypeTag::of("user"));
    InMemoryDocumentStore::new(Arc::new(registry))
}

#[tokio::test]
async fn added_document_is_returned_and_counted() {
    let store = plain_store();

    assert_eq!(store.count_documents("users").await.unwrap(), 0);

    store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();

    let document = store.get_document("users", "123").await.unwrap();
    assert_eq!(
        document.data,
        Payload::Text(r#"{"name":"Johny"}"#.to_string())
    );
    assert_eq!(store.count_documents("users").await.unwrap(), 1);
}

#[tokio::test]
async fn adding_same_key_twice_fails_and_keeps_first_value() {
    let store = plain_store();
    store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();

    let err = store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Franco"}"#))
        .await
        .unwrap_err();
    assert!(matches!(err, RedriveError::DocumentAlreadyExists { .. }));

    let document = store.get_document("users", "123").await.unwrap();
    assert_eq!(
        document.data,
        Payload::Text(r#"{"name":"Johny"}"#.to_string())
    );
}

#[tokio::test]
async fn update_overwrites_existing_document() {
    let store = plain_store();
    store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();

    store
        .update_document("users", "123", TypedValue::text(r#"{"name":"Franco"}"#))
        .await
        .unwrap();

    let document = store.get_document("users", "123").await.unwrap();
    assert_eq!(
        document.data,
        Payload::Text(r#"{"name":"Franco"}"#.to_string())
    );
    assert_eq!(store.count_documents("users").await.unwrap(), 1);
}

#[tokio::test]
async fn update_of_missing_document_fails() {
    let store = plain_store();

    let err = store
        .update_document("users", "123", TypedValue::text("{}"))
        .await
        .unwrap_err();

    assert!(matches!(err, RedriveError::DocumentNotFound { .. }));
}

#[tokio::test]
async fn delete_of_missing_key_is_a_noop() {
    let store = plain_store();

    store.delete_document("users", "123").await.unwrap();

    assert_eq!(store.count_documents("users").await.unwrap(), 0);
}

#[tokio::test]
async fn get_after_delete_fails_with_not_found() {
    let store = plain_store();
    store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();

    store.delete_document("users", "123").await.unwrap();

    let err = store.get_document("users", "123").await.unwrap_err();
    assert!(matches!(err, RedriveError::DocumentNotFound { .. }));
}

#[tokio::test]
async fn get_all_preserves_insertion_order() {
    let store = plain_store();

    assert!(store.get_all_documents("users").await.unwrap().is_empty());

    store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();
    store
        .add_document("users", "124", TypedValue::text(r#"{"name":"Franco"}"#))
        .await
        .unwrap();

    let documents = store.get_all_documents("users").await.unwrap();
    let contents: Vec<&str> = documents
        .iter()
        .filter_map(|d| d.data.as_text())
        .collect();

    assert_eq!(
        contents,
        vec![r#"{"name":"Johny"}"#, r#"{"name":"Franco"}"#]
    );
}

#[tokio::test]
async fn drop_collection_empties_populated_and_unknown_collections() {
    let store = plain_store();
    store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();
    store
        .add_document("users", "124", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();

    store.drop_collection("users").await.unwrap();
    assert_eq!(store.count_documents("users").await.unwrap(), 0);

    store.drop_collection("never-populated").await.unwrap();
    assert_eq!(store.count_documents("never-populated").await.unwrap(), 0);
}

#[tokio::test]
async fn upsert_inserts_then_overwrites() {
    let store = plain_store();

    store
        .upsert_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();
    store
        .upsert_document("users", "123", TypedValue::text(r#"{"name":"Johny Mac"}"#))
        .await
        .unwrap();

    assert_eq!(store.count_documents("users").await.unwrap(), 1);
    let document = store.get_document("users", "123").await.unwrap();
    assert_eq!(
        document.data,
        Payload::Text(r#"{"name":"Johny Mac"}"#.to_string())
    );
}

#[tokio::test]
async fn upsert_after_add_replaces_content() {
    let store = plain_store();
    store
        .add_document("users", "123", TypedValue::text(r#"{"name":"Johny"}"#))
        .await
        .unwrap();

    store
        .upsert_document("users", "123", TypedValue::text(r#"{"name":"Johny Mac"}"#))
        .await
        .unwrap();

    let document = store.get_document("users", "123").await.unwrap();
    assert_eq!(
        document.data,
        Payload::Text(r#"{"name":"Johny Mac"}"#.to_string())
    );
}

#[tokio::test]
async fn malformed_json_is_rejected_at_write_time() {
    let store = plain_store();

    let err = store
        .add_document("users", "123", TypedValue::text(r#"{"name":"#))
        .await
        .unwrap_err();

    assert!(matches!(err, RedriveError::InvalidDocument(_)));
    assert_eq!(store.count_documents("users").await.unwrap(), 0);
}

#[tokio::test]
async fn validation_can_be_disabled() {
    let store = plain_store().without_validation();

    store
        .add_document("blobs", "1", TypedValue::text("not json at all"))
        .await
        .unwrap();

    assert_eq!(store.count_documents("blobs").await.unwrap(), 1);
}

#[tokio::test]
async fn native_values_round_trip_through_registered_converters() {
    let store = user_store();

    let value = TypedValue::json(json!({"name": "johny"}), TypeTag::of("user"));
    store.add_document("users", "123", value).await.unwrap();

    let loaded = store.get_document("users", "123").await.unwrap();
    assert_eq!(loaded.data, Payload::Json(json!({"name": "johny"})));
    assert_eq!(loaded.ty, TypeTag::of("user"));
}

#[tokio::test]
async fn collections_of_native_values_come_back_in_order() {
    let store = user_store();

    store
        .add_document(
            "users",
            "123",
            TypedValue::json(json!({"name": "johny"}), TypeTag::of("user")),
        )
        .await
        .unwrap();
    store
        .add_document(
            "users",
            "124",
            TypedValue::json(json!({"name": "franco"}), TypeTag::of("user")),
        )
        .await
        .unwrap();

    let documents = store.get_all_documents("users").await.unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].data, Payload::Json(json!({"name": "johny"})));
    assert_eq!(documents[1].data, Payload::Json(json!({"name": "franco"})));
}
