//! # SMS Core
//!
//! Core traits and types shared by the smsrelay crates.
//!
//! This crate provides the fundamental building blocks:
//! - [`Message`] and [`PersistedMessage`], the only domain records
//! - [`SmsGateway`] trait for handing a message to a provider
//! - [`MessageStore`] trait for persisting and listing messages
//! - Input validation and a framework-agnostic [`ApiResponse`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{SendRequest, SmsGateway};
//!
//! // Any provider implements SmsGateway; failures come back as data
//! let result = gateway.send(SendRequest {
//!     to: "+15551234567",
//!     body: "Hello world!",
//! }).await;
//! println!("{}", result.status);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Collection that holds every [`Message`] document.
pub const MESSAGE_COLLECTION: &str = "message";

/// Shortest accepted destination, `+` included.
pub const PHONE_MIN_LEN: usize = 8;
/// Longest accepted destination, `+` included.
pub const PHONE_MAX_LEN: usize = 18;
/// Longest accepted message body, in characters.
pub const BODY_MAX_CHARS: usize = 1600;

/// Detail returned to callers for a malformed destination.
pub const INVALID_PHONE_DETAIL: &str = "Invalid phone number format. Use E.164 like +15551234567";

/// Errors that can occur while handling a message
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// Malformed destination number
    #[error("{0}")]
    Invalid(String),
    /// Request was well formed but its content is out of bounds
    #[error("{0}")]
    Unprocessable(String),
    /// Document store failure
    #[error("store error: {0}")]
    Store(String),
}

/// HTTP status code for web responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    UnprocessableEntity = 422,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl From<&SmsError> for HttpStatus {
    fn from(err: &SmsError) -> Self {
        match err {
            SmsError::Invalid(_) => HttpStatus::BadRequest,
            SmsError::Unprocessable(_) => HttpStatus::UnprocessableEntity,
            SmsError::Store(_) => HttpStatus::InternalServerError,
        }
    }
}

/// Generic response that can be converted to any framework's response type
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: HttpStatus, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                body,
                content_type: "application/json".to_string(),
            },
            Err(e) => Self::error(HttpStatus::InternalServerError, &e.to_string()),
        }
    }

    pub fn error(status: HttpStatus, detail: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "detail": detail }).to_string(),
            content_type: "application/json".to_string(),
        }
    }
}

impl From<SmsError> for ApiResponse {
    fn from(err: SmsError) -> Self {
        ApiResponse::error(HttpStatus::from(&err), &err.to_string())
    }
}

/// Delivery state of a message.
///
/// Provider-supplied states that have no dedicated variant are kept verbatim
/// in [`MessageStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageStatus {
    Queued,
    Sent,
    Failed,
    Other(String),
}

impl MessageStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MessageStatus::Queued => "queued",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Other(s) => s,
        }
    }
}

impl From<String> for MessageStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => MessageStatus::Queued,
            "sent" => MessageStatus::Sent,
            "failed" => MessageStatus::Failed,
            _ => MessageStatus::Other(s),
        }
    }
}

impl From<&str> for MessageStatus {
    fn from(s: &str) -> Self {
        MessageStatus::from(s.to_string())
    }
}

impl From<MessageStatus> for String {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized outcome of a single provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Provider that was contacted; `None` when the send was simulated.
    pub provider: Option<&'static str>,
    pub status: MessageStatus,
    pub sid: Option<String>,
    pub error: Option<String>,
}

impl DeliveryResult {
    /// Outcome recorded when no provider credentials are configured.
    pub fn simulated(notice: impl Into<String>) -> Self {
        Self {
            provider: None,
            status: MessageStatus::Queued,
            sid: None,
            error: Some(notice.into()),
        }
    }

    pub fn accepted(provider: &'static str, status: MessageStatus, sid: Option<String>) -> Self {
        Self {
            provider: Some(provider),
            status,
            sid,
            error: None,
        }
    }

    pub fn failed(provider: &'static str, sid: Option<String>, error: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            status: MessageStatus::Failed,
            sid,
            error: Some(error.into()),
        }
    }
}

/// A message as stored: the request plus the provider outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub to: String,
    pub body: String,
    pub status: MessageStatus,
    pub provider: Option<String>,
    pub sid: Option<String>,
    pub error: Option<String>,
}

impl Message {
    pub fn new(to: impl Into<String>, body: impl Into<String>, result: DeliveryResult) -> Self {
        Self {
            to: to.into(),
            body: body.into(),
            status: result.status,
            provider: result.provider.map(str::to_string),
            sid: result.sid,
            error: result.error,
        }
    }
}

/// A [`Message`] annotated with its store id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub id: String,
    #[serde(flatten)]
    pub message: Message,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

/// Request body accepted by the message creation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessage {
    pub to: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub body: &'a str,
}

/// Check that `to` is `+` followed only by digits, 8 to 18 characters overall.
pub fn validate_phone(to: &str) -> Result<(), SmsError> {
    let valid = match to.strip_prefix('+') {
        Some(digits) => {
            !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit())
                && (PHONE_MIN_LEN..=PHONE_MAX_LEN).contains(&to.len())
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SmsError::Invalid(INVALID_PHONE_DETAIL.to_string()))
    }
}

pub fn validate_body(body: &str) -> Result<(), SmsError> {
    let len = body.chars().count();
    if (1..=BODY_MAX_CHARS).contains(&len) {
        Ok(())
    } else {
        Err(SmsError::Unprocessable(format!(
            "body must be between 1 and {} characters, got {}",
            BODY_MAX_CHARS, len
        )))
    }
}

/// Hide all but the last four characters of a phone number for logging.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

/// Fresh identifier for a stored document.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Stable provider key, e.g. "twilio".
    fn provider(&self) -> &'static str;
    /// Make a single delivery attempt. Never fails; problems are reported in the result.
    async fn send(&self, req: SendRequest<'_>) -> DeliveryResult;
}

/// Narrow persistence contract for [`Message`] records.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return the id the store assigned to it.
    async fn insert(&self, message: &Message) -> Result<String, SmsError>;
    /// Return up to `limit` messages in store order; `None` returns all of them.
    async fn find(&self, limit: Option<usize>) -> Result<Vec<PersistedMessage>, SmsError>;
    /// Names of the collections that currently hold documents.
    async fn collection_names(&self) -> Result<Vec<String>, SmsError>;
    /// False for stores whose contents are lost when the process exits.
    fn is_persistent(&self) -> bool {
        true
    }
}
