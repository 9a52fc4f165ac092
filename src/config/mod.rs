//! Configuration loading for the connect service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `OMNICRM_`, producing a typed [`AppConfig`]. The credential encryption
//! key is decoded and validated here: a missing or malformed key is a
//! fatal startup error, never a per-request one.

use std::{env, net::SocketAddr};

use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::CryptoKey;

const ENV_PREFIX: &str = "OMNICRM_";

/// Application configuration derived from `OMNICRM_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub profile: String,
    pub api_bind_addr: String,
    pub log_level: String,
    /// "json" or "pretty"
    pub log_format: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_ms: u64,
    /// Base64-encoded 32-byte AES key for credential encryption at rest.
    /// Never logged or returned; see [`AppConfig::redacted_json`].
    pub secret_encryption_key: String,
    /// Public base URL of this service, used to build OAuth login and
    /// callback URLs handed to tenants.
    pub base_service_url: String,
    /// Client-side page the OAuth callback redirects to with a success or
    /// error query parameter.
    pub client_integrations_page_url: String,
    /// Per-process OAuth state string; generated at startup when unset.
    pub oauth_state_string: String,
    /// Salesforce OAuth authorize/token host.
    pub salesforce_login_base: String,
    /// Overrides the per-subdomain Salesforce API base URL (tests).
    pub salesforce_api_base: Option<String>,
    /// HubSpot CRM object API base URL.
    pub hubspot_api_base: String,
    /// Timeout for outbound CRM calls, in seconds.
    pub outbound_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: "dev".to_string(),
            api_bind_addr: "127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            database_url: "postgres://localhost:5432/omnicrm".to_string(),
            db_max_connections: 10,
            db_acquire_timeout_ms: 5_000,
            secret_encryption_key: base64::engine::general_purpose::STANDARD.encode([0u8; 32]),
            base_service_url: "http://localhost:8080".to_string(),
            client_integrations_page_url: "http://localhost:3000/integrations".to_string(),
            oauth_state_string: "local-dev-oauth-state".to_string(),
            salesforce_login_base: "https://login.salesforce.com".to_string(),
            salesforce_api_base: None,
            hubspot_api_base: "https://api.hubapi.com/crm/v3/objects".to_string(),
            outbound_timeout_seconds: 60,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {key}")]
    MissingKey { key: String },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("invalid credential encryption key: {0}")]
    InvalidEncryptionKey(String),
    #[error("invalid bind address '{addr}': {message}")]
    InvalidBindAddr { addr: String, message: String },
}

impl AppConfig {
    /// Decode the configured credential encryption key.
    pub fn crypto_key(&self) -> Result<CryptoKey, ConfigError> {
        if self.secret_encryption_key.is_empty() {
            return Err(ConfigError::MissingKey {
                key: format!("{}SECRET_ENCRYPTION_KEY", ENV_PREFIX),
            });
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.secret_encryption_key)
            .map_err(|e| ConfigError::InvalidEncryptionKey(format!("not valid base64: {}", e)))?;

        CryptoKey::new(bytes).map_err(|e| ConfigError::InvalidEncryptionKey(e.to_string()))
    }

    /// Resolve the configured bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.api_bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidBindAddr {
                addr: self.api_bind_addr.clone(),
                message: e.to_string(),
            })
    }

    /// Configuration serialized for startup logging with secrets masked.
    pub fn redacted_json(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            for key in ["secret_encryption_key", "oauth_state_string", "database_url"] {
                if map.contains_key(key) {
                    map.insert(key.to_string(), serde_json::Value::String("[REDACTED]".into()));
                }
            }
        }
        serde_json::to_string(&value)
    }
}

/// Loads [`AppConfig`] from layered `.env` files and the process environment.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration: `.env`, then `.env.<profile>`, then real
    /// environment variables (which always win; dotenvy does not override).
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let _ = dotenvy::dotenv();
        if let Ok(profile) = env::var(format!("{}PROFILE", ENV_PREFIX)) {
            let _ = dotenvy::from_filename(format!(".env.{}", profile));
        }
        self.build_from_env()
    }

    /// Load configuration from an explicit env file plus the environment.
    pub fn load_from_path(&self, path: &std::path::Path) -> Result<AppConfig, ConfigError> {
        let _ = dotenvy::from_path(path);
        self.build_from_env()
    }

    fn build_from_env(&self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            profile: self.var("PROFILE").unwrap_or(defaults.profile),
            api_bind_addr: self.var("API_BIND_ADDR").unwrap_or(defaults.api_bind_addr),
            log_level: self.var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: self.var("LOG_FORMAT").unwrap_or(defaults.log_format),
            database_url: self.var("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: self.parsed_var("DB_MAX_CONNECTIONS")?.unwrap_or(defaults.db_max_connections),
            db_acquire_timeout_ms: self.parsed_var("DB_ACQUIRE_TIMEOUT_MS")?.unwrap_or(defaults.db_acquire_timeout_ms),
            secret_encryption_key: self
                .var("SECRET_ENCRYPTION_KEY")
                .ok_or_else(|| ConfigError::MissingKey {
                    key: format!("{}SECRET_ENCRYPTION_KEY", ENV_PREFIX),
                })?,
            base_service_url: self.var("BASE_SERVICE_URL").unwrap_or(defaults.base_service_url),
            client_integrations_page_url: self
                .var("CLIENT_INTEGRATIONS_PAGE_URL")
                .unwrap_or(defaults.client_integrations_page_url),
            oauth_state_string: self
                .var("OAUTH_STATE_STRING")
                .unwrap_or_else(generate_process_state),
            salesforce_login_base: self
                .var("SALESFORCE_LOGIN_BASE")
                .unwrap_or(defaults.salesforce_login_base),
            salesforce_api_base: self.var("SALESFORCE_API_BASE"),
            hubspot_api_base: self.var("HUBSPOT_API_BASE").unwrap_or(defaults.hubspot_api_base),
            outbound_timeout_seconds: self
                .parsed_var("OUTBOUND_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.outbound_timeout_seconds),
        };

        // Fail startup on an unusable key or bind address.
        config.crypto_key()?;
        config.bind_addr()?;

        Ok(config)
    }

    fn var(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key))
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn parsed_var<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.var(key) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
                key: format!("{}{}", ENV_PREFIX, key),
                message: e.to_string(),
            }),
        }
    }
}

/// Generate a per-process OAuth state string when none is configured.
fn generate_process_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    base64_url::encode(&bytes)
}
