//! Test utilities for database-backed integration tests.
//!
//! Sets up in-memory SQLite databases with the connect schema applied and
//! provides fixture helpers shared across the test binaries.

use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use omnicrm::config::AppConfig;
use omnicrm::connect::ConnectService;
use omnicrm::crypto::CryptoKey;
use omnicrm::repositories::ConsumerRepository;

const SCHEMA: &[&str] = &[
    "CREATE TABLE consumers (
        id uuid NOT NULL PRIMARY KEY,
        created_at timestamp_with_timezone_text NOT NULL,
        updated_at timestamp_with_timezone_text NOT NULL
    )",
    "CREATE TABLE consumer_integrations (
        id uuid NOT NULL PRIMARY KEY,
        consumer_id uuid NOT NULL,
        integration_type varchar NOT NULL,
        service_code varchar NOT NULL,
        enabled boolean NOT NULL DEFAULT FALSE,
        secret_ciphertext blob,
        created_at timestamp_with_timezone_text NOT NULL,
        updated_at timestamp_with_timezone_text NOT NULL
    )",
    "CREATE TABLE consumer_oauth2_credentials (
        id uuid NOT NULL PRIMARY KEY,
        consumer_integration_id uuid NOT NULL,
        client_id_ciphertext blob,
        client_secret_ciphertext blob,
        redirect_url varchar,
        token_type varchar,
        access_token_ciphertext blob,
        refresh_token_ciphertext blob,
        custom_settings json_text,
        created_at timestamp_with_timezone_text NOT NULL,
        updated_at timestamp_with_timezone_text NOT NULL
    )",
];

/// Sets up an in-memory SQLite database with the connect schema applied.
#[allow(dead_code)]
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;

    for ddl in SCHEMA {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            ddl.to_string(),
        ))
        .await?;
    }

    Ok(db)
}

/// Deterministic 32-byte key for tests.
#[allow(dead_code)]
pub fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(vec![42u8; 32]).expect("valid test key")
}

/// App config pointing the connectors at mock servers.
#[allow(dead_code)]
pub fn test_config(salesforce_base: Option<&str>, hubspot_base: Option<&str>) -> AppConfig {
    AppConfig {
        secret_encryption_key: base64::engine::general_purpose::STANDARD.encode([42u8; 32]),
        base_service_url: "http://localhost:8080".to_string(),
        client_integrations_page_url: "http://localhost:3000/integrations".to_string(),
        oauth_state_string: "test-oauth-state".to_string(),
        salesforce_login_base: salesforce_base.unwrap_or("https://login.salesforce.com").to_string(),
        salesforce_api_base: salesforce_base.map(|base| base.to_string()),
        hubspot_api_base: hubspot_base
            .unwrap_or("https://api.hubapi.com/crm/v3/objects")
            .to_string(),
        outbound_timeout_seconds: 5,
        ..AppConfig::default()
    }
}

/// Builds a [`ConnectService`] over the given database and config.
#[allow(dead_code)]
pub fn connect_service(db: &DatabaseConnection, config: AppConfig) -> ConnectService {
    ConnectService::new(Arc::new(config), Arc::new(db.clone()), test_crypto_key())
}

/// Creates a consumer row for testing.
#[allow(dead_code)]
pub async fn create_test_consumer(db: &DatabaseConnection) -> Result<Uuid> {
    let repo = ConsumerRepository::new(Arc::new(db.clone()));
    let consumer = repo.create().await?;
    Ok(consumer.id)
}
