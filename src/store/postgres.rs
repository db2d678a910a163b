//! PostgreSQL document store.
//!
//! One table holds every collection, keyed by `(collection, id)` under a
//! unique index. Insert conflicts surface as `DocumentAlreadyExists`;
//! upserts go through `ON CONFLICT DO UPDATE` so concurrent writers
//! serialize to a single final value.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, instrument};

use super::{decode_document, encode_document, DocumentStore};
use crate::convert::{ConversionService, TypeTag, TypedValue};
use crate::error::{RedriveError, Result};

/// Document store backed by the `documents` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    conversion: Arc<dyn ConversionService>,
    validate_documents: bool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, conversion: Arc<dyn ConversionService>) -> Self {
        Self {
            pool,
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

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self, value))]
    async fn add_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()> {
        let (content, ty) =
            encode_document(self.conversion.as_ref(), self.validate_documents, value)?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, value_type, content)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(ty.as_str())
        .bind(&content)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Added document {}/{}", collection, id);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(RedriveError::DocumentAlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, value))]
    async fn update_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()> {
        let (content, ty) =
            encode_document(self.conversion.as_ref(), self.validate_documents, value)?;

        let result = sqlx::query(
            r#"
            UPDATE documents
            SET value_type = $3, content = $4, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(ty.as_str())
        .bind(&content)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RedriveError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn upsert_document(&self, collection: &str, id: &str, value: TypedValue) -> Result<()> {
        let (content, ty) =
            encode_document(self.conversion.as_ref(), self.validate_documents, value)?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, value_type, content)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, id) DO UPDATE SET
                value_type = EXCLUDED.value_type,
                content = EXCLUDED.content,
                updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(ty.as_str())
        .bind(&content)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<TypedValue> {
        let row = sqlx::query(
            r#"
            SELECT value_type, content
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| RedriveError::DocumentNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

        decode_document(
            self.conversion.as_ref(),
            row.get("content"),
            TypeTag::of(&row.get::<String, _>("value_type")),
        )
    }

    async fn get_all_documents(&self, collection: &str) -> Result<Vec<TypedValue>> {
        let rows = sqlx::query(
            r#"
            SELECT value_type, content
            FROM documents
            WHERE collection = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                decode_document(
                    self.conversion.as_ref(),
                    row.get("content"),
                    TypeTag::of(&row.get::<String, _>("value_type")),
                )
            })
            .collect()
    }

    async fn count_documents(&self, collection: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM documents WHERE collection = $1
            "#,
        )
        .bind(collection)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("count"))
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM documents WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents WHERE collection = $1
            "#,
        )
        .bind(collection)
        .execute(&self.pool)
        .await?;

        debug!(
            "Dropped collection {} ({} documents)",
            collection,
            result.rows_affected()
        );
        Ok(())
    }
}
