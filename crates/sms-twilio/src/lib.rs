//! # Twilio SMS Provider
//!
//! Twilio delivery gateway for smsrelay.
//!
//! A [`TwilioClient`] makes exactly one attempt per message against the
//! Twilio Messages API and normalizes whatever happens into a
//! [`DeliveryResult`]. Without credentials it never touches the network and
//! reports every message as queued.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{SendRequest, SmsGateway};
//! use sms_twilio::{TwilioClient, TwilioCredentials};
//!
//! let credentials = TwilioCredentials::from_parts(sid, token, from);
//! let client = TwilioClient::new(credentials);
//! let result = client.send(SendRequest {
//!     to: "+15551234567",
//!     body: "Hello from Twilio!",
//! }).await;
//! ```

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sms_core::{DeliveryResult, MessageStatus, SendRequest, SmsGateway, mask_phone};
use std::time::Duration;
use tracing::{debug, info, warn};

const PROVIDER: &str = "twilio";

pub const DEFAULT_BASE_URL: &str = "https://api.twilio.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const SIMULATION_NOTICE: &str =
    "Twilio credentials not configured. Message queued (simulation).";

/// Account credentials and sender address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwilioCredentials {
    /// Twilio Account SID.
    pub account_sid: String,
    /// Twilio Auth Token (password for Basic auth).
    pub auth_token: String,
    /// Sending number or messaging service address.
    pub from: String,
}

impl TwilioCredentials {
    /// Returns `None` unless all three values are present and non-empty.
    pub fn from_parts(
        account_sid: Option<String>,
        auth_token: Option<String>,
        from: Option<String>,
    ) -> Option<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(Self {
            account_sid: present(account_sid)?,
            auth_token: present(auth_token)?,
            from: present(from)?,
        })
    }
}

/// Twilio REST client.
#[derive(Clone, Debug)]
pub struct TwilioClient {
    credentials: Option<TwilioCredentials>,
    /// API base URL; override for testing/mocking.
    pub base_url: String,
    /// Applied to every request.
    pub timeout: Duration,
    http: reqwest::Client,
}

impl TwilioClient {
    pub fn new(credentials: Option<TwilioCredentials>) -> Self {
        Self::with_base_url(credentials, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(credentials: Option<TwilioCredentials>, base_url: String) -> Self {
        Self {
            credentials,
            base_url,
            timeout: DEFAULT_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// True when sends are simulated because credentials are missing.
    pub fn is_simulated(&self) -> bool {
        self.credentials.is_none()
    }

    async fn post_message(
        &self,
        credentials: &TwilioCredentials,
        req: SendRequest<'_>,
    ) -> Result<(u16, String), reqwest::Error> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            credentials.account_sid
        );
        let form = TwilioSendRequest {
            to: req.to,
            from: &credentials.from,
            body: req.body,
        };
        let res = self
            .http
            .post(url)
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await?;

        let status = res.status().as_u16();
        let raw_text = res.text().await?;
        Ok((status, raw_text))
    }
}

#[derive(Debug, Serialize)]
struct TwilioSendRequest<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

/// Turn a Twilio HTTP response into a delivery outcome.
fn interpret_response(status_code: u16, raw_text: &str) -> DeliveryResult {
    let payload: Value = serde_json::from_str(raw_text)
        .unwrap_or_else(|_| serde_json::json!({ "raw": raw_text }));
    let field = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    if (200..300).contains(&status_code) {
        if !payload.is_object() {
            return DeliveryResult::failed(
                PROVIDER,
                None,
                format!("unexpected Twilio response: {}", raw_text),
            );
        }
        let status = field("status")
            .map(MessageStatus::from)
            .unwrap_or(MessageStatus::Sent);
        DeliveryResult::accepted(PROVIDER, status, field("sid"))
    } else {
        let error = field("message")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status_code));
        DeliveryResult::failed(PROVIDER, field("sid"), error)
    }
}

#[async_trait]
impl SmsGateway for TwilioClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn send(&self, req: SendRequest<'_>) -> DeliveryResult {
        let Some(credentials) = &self.credentials else {
            debug!(to = %mask_phone(req.to), "twilio credentials missing, simulating send");
            return DeliveryResult::simulated(SIMULATION_NOTICE);
        };

        info!(
            to = %mask_phone(req.to),
            chars = req.body.chars().count(),
            "sending sms via twilio"
        );
        match self.post_message(credentials, req).await {
            Ok((status_code, raw_text)) => {
                let result = interpret_response(status_code, &raw_text);
                if result.status == MessageStatus::Failed {
                    warn!(
                        status_code,
                        error = result.error.as_deref().unwrap_or_default(),
                        "twilio rejected message"
                    );
                } else {
                    info!(status_code, sid = ?result.sid, status = %result.status, "twilio accepted message");
                }
                result
            }
            Err(e) => {
                warn!(error = %e, "twilio request failed");
                DeliveryResult::failed(PROVIDER, None, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Form, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, Option<String>, HashMap<String, String>)>>>;

    fn credentials() -> Option<TwilioCredentials> {
        TwilioCredentials::from_parts(
            Some("AC123".into()),
            Some("secret".into()),
            Some("+15550000000".into()),
        )
    }

    /// Serve a canned Twilio reply on an ephemeral port and record what hits it.
    async fn fake_twilio(status: StatusCode, reply: &'static str) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/2010-04-01/Accounts/{sid}/Messages.json",
                post(
                    move |State(seen): State<Captured>,
                          Path(sid): Path<String>,
                          headers: HeaderMap,
                          Form(form): Form<HashMap<String, String>>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push((sid, auth, form));
                        (status, reply)
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    #[test]
    fn credentials_require_all_three_values() {
        assert!(credentials().is_some());
        assert!(TwilioCredentials::from_parts(None, Some("t".into()), Some("f".into())).is_none());
        assert!(
            TwilioCredentials::from_parts(Some("a".into()), Some("".into()), Some("f".into()))
                .is_none()
        );
        assert!(TwilioCredentials::from_parts(Some("a".into()), Some("t".into()), None).is_none());
    }

    #[test]
    fn success_uses_payload_status_and_sid() {
        let result = interpret_response(201, r#"{"sid":"SM123","status":"sent"}"#);
        assert_eq!(result.provider, Some("twilio"));
        assert_eq!(result.status, MessageStatus::Sent);
        assert_eq!(result.sid.as_deref(), Some("SM123"));
        assert_eq!(result.error, None);

        let result = interpret_response(201, r#"{"sid":"SM9","status":"accepted"}"#);
        assert_eq!(result.status, MessageStatus::Other("accepted".into()));
    }

    #[test]
    fn success_without_status_defaults_to_sent() {
        let result = interpret_response(200, "not json at all");
        assert_eq!(result.status, MessageStatus::Sent);
        assert_eq!(result.sid, None);
    }

    #[test]
    fn success_with_non_object_json_is_failed() {
        let result = interpret_response(200, r#"["unexpected"]"#);
        assert_eq!(result.status, MessageStatus::Failed);
        assert_eq!(result.sid, None);
        assert_eq!(
            result.error.as_deref(),
            Some(r#"unexpected Twilio response: ["unexpected"]"#)
        );

        let result = interpret_response(201, "42");
        assert_eq!(result.status, MessageStatus::Failed);
    }

    #[test]
    fn failure_prefers_payload_message() {
        let result = interpret_response(500, r#"{"message":"bad request"}"#);
        assert_eq!(result.status, MessageStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("bad request"));

        let result = interpret_response(400, r#"{"sid":"SM1","code":21211}"#);
        assert_eq!(result.sid.as_deref(), Some("SM1"));
        assert_eq!(result.error.as_deref(), Some("HTTP 400"));

        let result = interpret_response(502, "<html>Bad Gateway</html>");
        assert_eq!(result.error.as_deref(), Some("HTTP 502"));
    }

    #[tokio::test]
    async fn simulates_without_credentials() {
        let client = TwilioClient::with_base_url(None, "http://127.0.0.1:1".into());
        assert!(client.is_simulated());
        let result = client
            .send(SendRequest {
                to: "+15551234567",
                body: "hi",
            })
            .await;
        assert_eq!(result.status, MessageStatus::Queued);
        assert_eq!(result.provider, None);
        assert_eq!(result.sid, None);
        assert_eq!(result.error.as_deref(), Some(SIMULATION_NOTICE));
    }

    #[tokio::test]
    async fn posts_form_with_basic_auth() {
        let (base_url, captured) =
            fake_twilio(StatusCode::CREATED, r#"{"sid":"SM123","status":"queued"}"#).await;
        let client = TwilioClient::with_base_url(credentials(), base_url);

        let result = client
            .send(SendRequest {
                to: "+15551234567",
                body: "hello there",
            })
            .await;
        assert_eq!(result.status, MessageStatus::Queued);
        assert_eq!(result.sid.as_deref(), Some("SM123"));
        assert_eq!(result.error, None);

        let seen = captured.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (sid, auth, form) = &seen[0];
        assert_eq!(sid, "AC123");
        assert!(auth.as_deref().unwrap_or_default().starts_with("Basic "));
        assert_eq!(form["To"], "+15551234567");
        assert_eq!(form["From"], "+15550000000");
        assert_eq!(form["Body"], "hello there");
    }

    #[tokio::test]
    async fn provider_rejection_is_recorded() {
        let (base_url, captured) =
            fake_twilio(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"bad request"}"#).await;
        let client = TwilioClient::with_base_url(credentials(), base_url);

        let result = client
            .send(SendRequest {
                to: "+15551234567",
                body: "hi",
            })
            .await;
        assert_eq!(result.status, MessageStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("bad request"));
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_becomes_failed_result() {
        // Bind and drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TwilioClient::with_base_url(credentials(), format!("http://{}", addr));
        let result = client
            .send(SendRequest {
                to: "+15551234567",
                body: "hi",
            })
            .await;
        assert_eq!(result.status, MessageStatus::Failed);
        assert_eq!(result.sid, None);
        assert!(!result.error.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let app = Router::new().route(
            "/2010-04-01/Accounts/{sid}/Messages.json",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = TwilioClient::with_base_url(credentials(), format!("http://{}", addr))
            .with_timeout(Duration::from_millis(200));
        let result = client
            .send(SendRequest {
                to: "+15551234567",
                body: "hi",
            })
            .await;
        assert_eq!(result.status, MessageStatus::Failed);
        assert!(result.error.is_some());
    }
}
