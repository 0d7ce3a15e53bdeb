//! Startup configuration.
//!
//! Read once from the environment at process start and validated before
//! the server binds.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Where the DM responder takes its opt-out keywords from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptOutSource {
    /// Fixed `stop` / `unsubscribe` set. Account settings are ignored.
    #[default]
    Builtin,
    /// The account's `settings.opt_out` list, falling back to the builtin set.
    Account,
}

impl std::str::FromStr for OptOutSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "builtin" => Ok(Self::Builtin),
            "account" => Ok(Self::Account),
            other => Err(format!("expected 'builtin' or 'account', got '{other}'")),
        }
    }
}

/// How logged messages are grouped into conversation documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationMode {
    /// Every logged interaction creates a new conversation document.
    #[default]
    PerInteraction,
    /// Messages are appended to one conversation per (account, user).
    Thread,
}

impl std::str::FromStr for ConversationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_interaction" => Ok(Self::PerInteraction),
            "thread" => Ok(Self::Thread),
            other => Err(format!("expected 'per_interaction' or 'thread', got '{other}'")),
        }
    }
}

/// Webhook handling options shared with the request handlers.
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    /// Expected `hub.verify_token`. `None` accepts any non-empty token.
    pub verify_token: Option<SecretString>,
    /// Secret for `X-Hub-Signature-256` payload signatures. `None` disables the check.
    pub app_secret: Option<SecretString>,
    pub opt_out_source: OptOutSource,
    pub conversation_mode: ConversationMode,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// libSQL database path, or `:memory:`.
    pub database_url: String,
    /// Logical database name reported by diagnostics.
    pub database_name: Option<String>,
    /// CORS allow-list. `*` allows any origin; empty sends no CORS headers.
    pub allowed_origins: Vec<String>,
    pub request_timeout: Duration,
    pub webhook: WebhookConfig,
}

impl ServerConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&get, "PORT", 8000u16)?;
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let database_url =
            get("DATABASE_URL").ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;
        if let Some((scheme, _)) = database_url.split_once("://") {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_URL".into(),
                message: format!(
                    "'{scheme}://' URLs are not supported; use a libSQL file path or :memory:"
                ),
            });
        }
        let database_name = get("DATABASE_NAME");

        let allowed_origins: Vec<String> = get("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let timeout_secs: u64 = parse_or(&get, "REQUEST_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REQUEST_TIMEOUT_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }

        let webhook = WebhookConfig {
            verify_token: get("WEBHOOK_VERIFY_TOKEN").map(SecretString::from),
            app_secret: get("WEBHOOK_APP_SECRET").map(SecretString::from),
            opt_out_source: parse_or(&get, "OPT_OUT_SOURCE", OptOutSource::default())?,
            conversation_mode: parse_or(&get, "CONVERSATION_MODE", ConversationMode::default())?,
        };

        Ok(Self {
            host,
            port,
            database_url,
            database_name,
            allowed_origins,
            request_timeout: Duration::from_secs(timeout_secs),
            webhook,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
