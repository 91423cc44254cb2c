use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Twilio credentials and client settings
    pub twilio: TwilioConfig,
    /// Document store configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8000)
    pub port: u16,
}

/// Twilio provider configuration.
///
/// Sends are simulated unless `account_sid`, `auth_token` and `from` are all set.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TwilioConfig {
    /// Twilio Account SID
    pub account_sid: Option<String>,
    /// Twilio Auth Token
    pub auth_token: Option<String>,
    /// Sender number
    pub from: Option<String>,
    /// API base URL (default: https://api.twilio.com)
    pub base_url: String,
    /// Provider request timeout in seconds (default: 20)
    pub timeout_seconds: u64,
}

/// Document store configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Store URL; an in-memory store is used when unset
    pub url: Option<String>,
    /// Database name, reported by the diagnostics endpoint
    pub name: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from: None,
            base_url: sms_twilio::DEFAULT_BASE_URL.to_string(),
            timeout_seconds: sms_twilio::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Unprefixed variables recognised for compatibility with common deployments.
const FLAT_OVERRIDES: &[(&str, &str)] = &[
    ("TWILIO_ACCOUNT_SID", "twilio.account_sid"),
    ("TWILIO_AUTH_TOKEN", "twilio.auth_token"),
    ("TWILIO_FROM", "twilio.from"),
    ("PORT", "server.port"),
    ("DATABASE_URL", "database.url"),
    ("DATABASE_NAME", "database.name"),
];

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with SMSRELAY__)
            .add_source(
                Environment::with_prefix("SMSRELAY")
                    .prefix_separator("__")
                    .separator("__"),
            );

        Self::with_flat_overrides(builder, |key| env::var(key).ok())?
            .build()?
            .try_deserialize()
    }

    /// Apply the unprefixed variables found by `lookup`; blank values are ignored.
    fn with_flat_overrides(
        mut builder: ConfigBuilder<DefaultState>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        for (var, key) in FLAT_OVERRIDES {
            let value = lookup(*var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }
        Ok(builder)
    }

    /// Provider credentials, present only when all three values are configured.
    pub fn twilio_credentials(&self) -> Option<sms_twilio::TwilioCredentials> {
        sms_twilio::TwilioCredentials::from_parts(
            self.twilio.account_sid.clone(),
            self.twilio.auth_token.clone(),
            self.twilio.from.clone(),
        )
    }

    pub fn database_settings(&self) -> sms_web_generic::DatabaseSettings {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        sms_web_generic::DatabaseSettings {
            url_set: set(&self.database.url),
            name_set: set(&self.database.name),
        }
    }
}
