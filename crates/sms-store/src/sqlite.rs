//! SQLite-backed document store.
//!
//! All collections share one `documents` table; each row holds the JSON body
//! of a document. `seq` preserves insertion order.

use async_trait::async_trait;
use sms_core::{MESSAGE_COLLECTION, Message, MessageStore, PersistedMessage, SmsError};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use time::OffsetDateTime;
use tracing::debug;

use crate::{format_timestamp, from_document, parse_timestamp, store_err, to_document};

const CREATE_DOCUMENTS: &str = "CREATE TABLE IF NOT EXISTS documents (\
     seq INTEGER PRIMARY KEY AUTOINCREMENT, \
     id TEXT NOT NULL UNIQUE, \
     collection TEXT NOT NULL, \
     body TEXT NOT NULL, \
     created_at TEXT NOT NULL, \
     updated_at TEXT NOT NULL)";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://messages.db`), creating the file if needed.
    pub async fn connect(url: &str) -> Result<Self, SmsError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(store_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(store_err)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the documents table if it is missing.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SmsError> {
        sqlx::query(CREATE_DOCUMENTS)
            .execute(&pool)
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert(&self, message: &Message) -> Result<String, SmsError> {
        let body = to_document(message)?.to_string();
        let now = format_timestamp(OffsetDateTime::now_utc())?;
        let id = sms_core::new_document_id();

        sqlx::query(
            "INSERT INTO documents (id, collection, body, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(&id)
        .bind(MESSAGE_COLLECTION)
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(id = %id, collection = MESSAGE_COLLECTION, "document inserted");
        Ok(id)
    }

    async fn find(&self, limit: Option<usize>) -> Result<Vec<PersistedMessage>, SmsError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = sqlx::query(
            "SELECT id, body, created_at, updated_at FROM documents \
             WHERE collection = ?1 ORDER BY seq LIMIT ?2",
        )
        .bind(MESSAGE_COLLECTION)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(store_err)?;
                let body: String = row.try_get("body").map_err(store_err)?;
                let created_at: String = row.try_get("created_at").map_err(store_err)?;
                let updated_at: String = row.try_get("updated_at").map_err(store_err)?;
                from_document(
                    id,
                    serde_json::from_str(&body).map_err(store_err)?,
                    parse_timestamp(&created_at)?,
                    parse_timestamp(&updated_at)?,
                )
            })
            .collect()
    }

    async fn collection_names(&self) -> Result<Vec<String>, SmsError> {
        let rows = sqlx::query("SELECT DISTINCT collection FROM documents ORDER BY collection")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter()
            .map(|row| row.try_get("collection").map_err(store_err))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;
    use sms_core::{DeliveryResult, MessageStatus};

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn stores_and_lists_in_insertion_order() {
        let store = memory_store().await;
        let first = store.insert(&sample("+15550000001")).await.unwrap();
        let second = store.insert(&sample("+15550000002")).await.unwrap();
        store.insert(&sample("+15550000003")).await.unwrap();

        let listed = store.find(Some(2)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[1].id, second);
        assert_eq!(store.find(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn preserves_every_message_field() {
        let store = memory_store().await;
        let message = Message::new(
            "+15551234567",
            "línea uno\nline two",
            DeliveryResult::failed("twilio", Some("SM1".into()), "bad request"),
        );
        store.insert(&message).await.unwrap();

        let listed = store.find(None).await.unwrap();
        assert_eq!(listed[0].message, message);
        assert_eq!(listed[0].message.status, MessageStatus::Failed);
        assert!(listed[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn collection_names_reflect_inserts() {
        let store = memory_store().await;
        assert!(store.is_persistent());
        assert!(store.collection_names().await.unwrap().is_empty());
        store.insert(&sample("+15551234567")).await.unwrap();
        assert_eq!(store.collection_names().await.unwrap(), vec!["message"]);
    }

    #[tokio::test]
    async fn reopening_existing_table_is_harmless() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool.clone()).await.unwrap();
        store.insert(&sample("+15551234567")).await.unwrap();

        let again = SqliteStore::from_pool(pool).await.unwrap();
        assert_eq!(again.find(None).await.unwrap().len(), 1);
    }
}
