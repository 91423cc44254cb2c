use async_trait::async_trait;
use serde_json::Value;
use sms_core::{MESSAGE_COLLECTION, Message, MessageStore, PersistedMessage, SmsError};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{from_document, to_document};

/// Process-local document store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<StoredDocument>>>>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    body: Value,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, message: &Message) -> Result<String, SmsError> {
        let body = to_document(message)?;
        let now = OffsetDateTime::now_utc();
        let id = sms_core::new_document_id();

        let mut collections = self.collections.write().await;
        collections
            .entry(MESSAGE_COLLECTION.to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                body,
                created_at: now,
                updated_at: now,
            });
        debug!(id = %id, collection = MESSAGE_COLLECTION, "document inserted");
        Ok(id)
    }

    async fn find(&self, limit: Option<usize>) -> Result<Vec<PersistedMessage>, SmsError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(MESSAGE_COLLECTION) else {
            return Ok(Vec::new());
        };
        docs.iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|doc| {
                from_document(
                    doc.id.clone(),
                    doc.body.clone(),
                    doc.created_at,
                    doc.updated_at,
                )
            })
            .collect()
    }

    async fn collection_names(&self) -> Result<Vec<String>, SmsError> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
