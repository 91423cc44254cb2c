use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sms_core::{
    ApiResponse, CreateMessage, HttpStatus, Message, MessageStore, PersistedMessage, SendRequest,
    SmsError, SmsGateway, mask_phone, validate_body, validate_phone,
};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Page size used when a listing request names no limit.
pub const DEFAULT_LIST_LIMIT: usize = 25;

/// Collections shown at most by the diagnostics endpoint.
const MAX_REPORTED_COLLECTIONS: usize = 10;

/// Validates, sends and records messages.
#[derive(Clone)]
pub struct MessageService {
    gateway: Arc<dyn SmsGateway>,
    store: Arc<dyn MessageStore>,
}

impl MessageService {
    pub fn new(gateway: Arc<dyn SmsGateway>, store: Arc<dyn MessageStore>) -> Self {
        Self { gateway, store }
    }

    /// Send one message and persist the outcome.
    ///
    /// Invalid input is rejected before the provider or the store is touched.
    /// Provider failures do not fail the call; they are recorded on the
    /// returned message. Store failures propagate.
    pub async fn create_message(&self, to: &str, body: &str) -> Result<PersistedMessage, SmsError> {
        validate_body(body)?;
        validate_phone(to)?;

        let result = self.gateway.send(SendRequest { to, body }).await;
        let message = Message::new(to, body, result);
        let id = self.store.insert(&message).await?;

        info!(
            id = %id,
            to = %mask_phone(to),
            status = %message.status,
            provider = self.gateway.provider(),
            simulated = message.provider.is_none(),
            "message recorded"
        );
        Ok(PersistedMessage {
            id,
            message,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        })
    }

    /// List stored messages in store order; a `limit` of 0 lists everything.
    pub async fn list_messages(&self, limit: usize) -> Result<Vec<PersistedMessage>, SmsError> {
        let limit = (limit > 0).then_some(limit);
        let messages = self.store.find(limit).await?;
        debug!(count = messages.len(), ?limit, "messages listed");
        Ok(messages)
    }

    /// Best-effort report on store connectivity. Never fails.
    ///
    /// A store that does not outlive the process is reported as not initialized.
    pub async fn diagnostics(&self, settings: DatabaseSettings) -> Diagnostics {
        let mut report = Diagnostics {
            backend: "✅ Running".to_string(),
            database: "⚠️  Available but not initialized".to_string(),
            database_url: presence(settings.url_set),
            database_name: presence(settings.name_set),
            connection_status: "Not Connected".to_string(),
            collections: Vec::new(),
        };
        if !self.store.is_persistent() {
            return report;
        }

        report.connection_status = "Connected".to_string();
        match self.store.collection_names().await {
            Ok(mut names) => {
                names.truncate(MAX_REPORTED_COLLECTIONS);
                report.collections = names;
                report.database = "✅ Connected & Working".to_string();
            }
            Err(e) => {
                warn!(error = %e, "store diagnostics failed");
                let detail = match e {
                    SmsError::Store(msg) => msg,
                    other => other.to_string(),
                };
                let short: String = detail.chars().take(50).collect();
                report.database = format!("⚠️  Connected but Error: {}", short);
            }
        }
        report
    }
}

fn presence(set: bool) -> String {
    let label = if set { "✅ Set" } else { "❌ Not Set" };
    label.to_string()
}

/// Whether the database settings were provided at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub url_set: bool,
    pub name_set: bool,
}

/// Body of the diagnostics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostics {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    pub collections: Vec<String>,
}

/// Query parameters of the listing endpoint.
///
/// A negative `limit` counts the same as its absolute value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

impl ListParams {
    /// Requested page size, defaulting to [`DEFAULT_LIST_LIMIT`]; 0 means no limit.
    pub fn page_size(&self) -> usize {
        self.limit
            .map(|n| usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

/// Field descriptions of the `message` collection, for database viewers.
pub fn message_schema() -> Value {
    let field = |description: &str| json!({ "type": "string", "description": description });
    json!({
        "message": {
            "fields": {
                "to": field("Destination phone"),
                "body": field("Message body"),
                "status": field("Delivery status"),
                "provider": field("Provider used"),
                "sid": field("Provider SID"),
                "error": field("Error if any"),
            }
        }
    })
}

/// Framework-agnostic endpoint processor that handles the request logic
#[derive(Clone)]
pub struct MessageProcessor {
    service: MessageService,
    database: DatabaseSettings,
}

impl MessageProcessor {
    pub fn new(service: MessageService, database: DatabaseSettings) -> Self {
        Self { service, database }
    }

    pub fn root(&self) -> ApiResponse {
        ApiResponse::json(HttpStatus::Ok, &json!({ "message": "Free SMS Messaging API" }))
    }

    pub fn hello(&self) -> ApiResponse {
        ApiResponse::json(
            HttpStatus::Ok,
            &json!({ "message": "Hello from the backend API!" }),
        )
    }

    pub fn schema(&self) -> ApiResponse {
        ApiResponse::json(HttpStatus::Ok, &message_schema())
    }

    pub async fn diagnostics(&self) -> ApiResponse {
        let report = self.service.diagnostics(self.database).await;
        ApiResponse::json(HttpStatus::Ok, &report)
    }

    /// Handle a raw JSON creation request body.
    pub async fn create_message(&self, body: &[u8]) -> ApiResponse {
        let request: CreateMessage = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "rejected malformed create request");
                return ApiResponse::error(
                    HttpStatus::UnprocessableEntity,
                    &format!("invalid request body: {}", e),
                );
            }
        };
        match self.service.create_message(&request.to, &request.body).await {
            Ok(message) => ApiResponse::json(HttpStatus::Ok, &message),
            Err(e) => self.error_to_response(e),
        }
    }

    pub async fn list_messages(&self, params: ListParams) -> ApiResponse {
        match self.service.list_messages(params.page_size()).await {
            Ok(messages) => ApiResponse::json(HttpStatus::Ok, &messages),
            Err(e) => self.error_to_response(e),
        }
    }

    /// Reply to a listing request whose query string could not be parsed.
    pub fn invalid_query(&self, detail: &str) -> ApiResponse {
        debug!(detail, "rejected malformed list query");
        ApiResponse::error(HttpStatus::UnprocessableEntity, detail)
    }

    fn error_to_response(&self, error: SmsError) -> ApiResponse {
        match &error {
            SmsError::Invalid(_) | SmsError::Unprocessable(_) => {
                debug!(error = %error, "request rejected")
            }
            SmsError::Store(_) => warn!(error = %error, "request failed"),
        }
        ApiResponse::from(error)
    }
}

/// Helper trait for framework adapters to convert responses
pub trait ResponseConverter {
    type ResponseType;

    fn from_api_response(response: ApiResponse) -> Self::ResponseType;
}
