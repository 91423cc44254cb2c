//! # SMS Store
//!
//! Document store adapters implementing [`sms_core::MessageStore`].
//!
//! Messages are kept as JSON documents in the `message` collection, each
//! stamped with `created_at`/`updated_at` at insert time. Two backends are
//! provided:
//! - [`MemoryStore`], process-local and lost on restart
//! - [`SqliteStore`], a single-table document store on top of sqlx
//!
//! ```rust,ignore
//! let store = sms_store::open(Some("sqlite://messages.db")).await?;
//! let id = store.insert(&message).await?;
//! ```

use serde_json::Value;
use sms_core::{Message, MessageStore, PersistedMessage, SmsError};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Open the store named by `url`, or an in-memory store when there is none.
pub async fn open(url: Option<&str>) -> Result<Arc<dyn MessageStore>, SmsError> {
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => {
            let store = SqliteStore::connect(url).await?;
            tracing::info!(backend = "sqlite", "document store ready");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(backend = "memory", "DATABASE_URL not set, messages will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn store_err(e: impl std::fmt::Display) -> SmsError {
    SmsError::Store(e.to_string())
}

fn to_document(message: &Message) -> Result<Value, SmsError> {
    serde_json::to_value(message).map_err(store_err)
}

fn from_document(
    id: String,
    body: Value,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
) -> Result<PersistedMessage, SmsError> {
    let message: Message = serde_json::from_value(body).map_err(store_err)?;
    Ok(PersistedMessage {
        id,
        message,
        created_at,
        updated_at: Some(updated_at),
    })
}

fn format_timestamp(ts: OffsetDateTime) -> Result<String, SmsError> {
    ts.format(&Rfc3339).map_err(store_err)
}

fn parse_timestamp(s: &str) -> Result<OffsetDateTime, SmsError> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(store_err)
}

#[cfg(test)]
fn sample(to: &str) -> Message {
    use sms_core::DeliveryResult;
    Message::new(to, "hello", DeliveryResult::simulated("simulated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_through_text() {
        let ts = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let text = format_timestamp(ts).unwrap();
        assert_eq!(text, "2023-11-14T22:13:20Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn rejects_documents_that_are_not_messages() {
        let now = OffsetDateTime::now_utc();
        let err = from_document("x".into(), serde_json::json!({ "to": 5 }), now, now).unwrap_err();
        assert!(matches!(err, SmsError::Store(_)));
    }

    #[tokio::test]
    async fn open_without_url_uses_memory() {
        let store = open(None).await.unwrap();
        assert!(!store.is_persistent());
        let id = store.insert(&sample("+15551234567")).await.unwrap();
        let found = store.find(None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }
}
