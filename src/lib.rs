//! # SMS Relay
//!
//! A small HTTP backend that sends SMS messages through Twilio and keeps a
//! record of every attempt.
//!
//! ## Features
//!
//! - **Single provider**: one Twilio attempt per message, no retries
//! - **Simulation mode**: messages are queued, not sent, when credentials are missing
//! - **Document store**: SQLite when `DATABASE_URL` is set, in-memory otherwise
//! - **Configuration**: defaults, config files and environment variables
//! - **Observability**: structured logging through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smsrelay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     smsrelay::logging::init(&config.logging);
//!     smsrelay::server::run(config).await
//! }
//! ```
//!
//! ## Configuration
//!
//! Besides `SMSRELAY__SECTION__KEY` variables, the usual deployment
//! variables are honoured directly:
//!
//! ```text
//! TWILIO_ACCOUNT_SID  TWILIO_AUTH_TOKEN  TWILIO_FROM
//! PORT  DATABASE_URL  DATABASE_NAME
//! ```

pub mod config;
pub mod logging;
pub mod server;

pub use crate::config::*;

/// Common imports for SMS Relay usage
pub mod prelude {
    pub use crate::config::{AppConfig, DatabaseConfig, LoggingConfig, ServerConfig, TwilioConfig};
    pub use sms_core::*;
    pub use sms_web_generic::{DatabaseSettings, MessageProcessor, MessageService};
}
