//! OAuth2 credential repository
//!
//! Find-or-create and update operations over `consumer_oauth2_credentials`
//! with transparent encryption of the four secret-bearing columns. Token
//! rotation (callback or silent refresh) is a single row update so a
//! cancelled request can never leave the credential half-written.

use anyhow::{Result, anyhow};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_opt, encrypt_str};
use crate::models::oauth2_credential::{self, Entity as Oauth2Credential};

/// Backend-specific settings stored alongside OAuth2 credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Oauth2CustomSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salesforce_instance_subdomain: Option<String>,
}

/// In-memory plaintext view of a credential row.
///
/// Exists only on the caller's stack; the row itself never holds
/// plaintext secrets.
#[derive(Debug, Clone)]
pub struct DecryptedOauth2Credential {
    pub id: Uuid,
    pub consumer_integration_id: Uuid,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub token_type: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub custom_settings: Oauth2CustomSettings,
}

impl DecryptedOauth2Credential {
    pub fn client_credentials_set(&self) -> bool {
        self.client_id.as_deref().is_some_and(|v| !v.is_empty())
            && self.client_secret.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn tokens_set(&self) -> bool {
        self.access_token.as_deref().is_some_and(|v| !v.is_empty())
            && self.refresh_token.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Repository for OAuth2 credential database operations
#[derive(Debug, Clone)]
pub struct Oauth2CredentialRepository {
    pub db: Arc<DatabaseConnection>,
    /// Crypto key for credential encryption
    pub crypto_key: CryptoKey,
}

impl Oauth2CredentialRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Finds the credential row for an integration.
    pub async fn find_by_integration(
        &self,
        consumer_integration_id: &Uuid,
    ) -> Result<Option<oauth2_credential::Model>> {
        Ok(Oauth2Credential::find()
            .filter(
                oauth2_credential::Column::ConsumerIntegrationId.eq(*consumer_integration_id),
            )
            .one(&*self.db)
            .await?)
    }

    /// Finds the credential row for an integration, creating an empty one
    /// when absent (credentials are configured lazily).
    pub async fn find_or_create(
        &self,
        consumer_integration_id: &Uuid,
    ) -> Result<oauth2_credential::Model> {
        if let Some(existing) = self.find_by_integration(consumer_integration_id).await? {
            return Ok(existing);
        }

        let now = chrono::Utc::now();
        let active = oauth2_credential::ActiveModel {
            id: Set(Uuid::new_v4()),
            consumer_integration_id: Set(*consumer_integration_id),
            client_id_ciphertext: Set(None),
            client_secret_ciphertext: Set(None),
            redirect_url: Set(None),
            token_type: Set(None),
            access_token_ciphertext: Set(None),
            refresh_token_ciphertext: Set(None),
            custom_settings: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        Ok(active.insert(&*self.db).await?)
    }

    /// Encrypts and stores the tenant-supplied OAuth2 client settings.
    pub async fn store_client_settings(
        &self,
        consumer_integration_id: &Uuid,
        client_id: &str,
        client_secret: &str,
        redirect_url: &str,
        custom_settings: Option<&Oauth2CustomSettings>,
    ) -> Result<oauth2_credential::Model> {
        let existing = self.find_or_create(consumer_integration_id).await?;
        let aad = credential_aad(consumer_integration_id);

        let client_id_ciphertext = encrypt_str(&self.crypto_key, aad.as_bytes(), client_id)
            .map_err(|e| anyhow!(crate::error::ConnectError::from(e)))?;
        let client_secret_ciphertext = encrypt_str(&self.crypto_key, aad.as_bytes(), client_secret)
            .map_err(|e| anyhow!(crate::error::ConnectError::from(e)))?;

        let mut active: oauth2_credential::ActiveModel = existing.into();
        active.client_id_ciphertext = Set(Some(client_id_ciphertext));
        active.client_secret_ciphertext = Set(Some(client_secret_ciphertext));
        active.redirect_url = Set(Some(redirect_url.to_string()));
        if let Some(settings) = custom_settings {
            active.custom_settings = Set(Some(serde_json::to_value(settings)?));
        }
        active.updated_at = Set(chrono::Utc::now().into());

        Ok(active.update(&*self.db).await?)
    }

    /// Overwrites the stored tokens in one atomic row update. Called on
    /// every successful OAuth callback and every silent refresh.
    pub async fn update_tokens(
        &self,
        credential_id: &Uuid,
        token_type: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<oauth2_credential::Model> {
        let existing = Oauth2Credential::find_by_id(*credential_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("OAuth2 credential '{}' not found", credential_id))?;

        let aad = credential_aad(&existing.consumer_integration_id);

        let access_ciphertext = encrypt_str(&self.crypto_key, aad.as_bytes(), access_token)
            .map_err(|e| anyhow!(crate::error::ConnectError::from(e)))?;
        let refresh_ciphertext = encrypt_str(&self.crypto_key, aad.as_bytes(), refresh_token)
            .map_err(|e| anyhow!(crate::error::ConnectError::from(e)))?;

        let mut active: oauth2_credential::ActiveModel = existing.into();
        active.token_type = Set(Some(token_type.to_string()));
        active.access_token_ciphertext = Set(Some(access_ciphertext));
        active.refresh_token_ciphertext = Set(Some(refresh_ciphertext));
        active.updated_at = Set(chrono::Utc::now().into());

        Ok(active.update(&*self.db).await?)
    }

    /// Decrypts a credential row into its in-memory plaintext view.
    pub fn decrypt(&self, model: &oauth2_credential::Model) -> Result<DecryptedOauth2Credential> {
        let aad = credential_aad(&model.consumer_integration_id);

        let decrypt_field = |ciphertext: Option<&Vec<u8>>| {
            decrypt_opt(&self.crypto_key, aad.as_bytes(), ciphertext).map_err(|e| {
                tracing::error!(
                    consumer_integration_id = %model.consumer_integration_id,
                    "OAuth2 credential decryption failed"
                );
                anyhow!(crate::error::ConnectError::from(e))
            })
        };

        let custom_settings = match &model.custom_settings {
            Some(value) => serde_json::from_value(value.clone())?,
            None => Oauth2CustomSettings::default(),
        };

        Ok(DecryptedOauth2Credential {
            id: model.id,
            consumer_integration_id: model.consumer_integration_id,
            client_id: decrypt_field(model.client_id_ciphertext.as_ref())?,
            client_secret: decrypt_field(model.client_secret_ciphertext.as_ref())?,
            redirect_url: model.redirect_url.clone(),
            token_type: model.token_type.clone(),
            access_token: decrypt_field(model.access_token_ciphertext.as_ref())?,
            refresh_token: decrypt_field(model.refresh_token_ciphertext.as_ref())?,
            custom_settings,
        })
    }
}

/// AAD binding credential ciphertext to its owning integration.
fn credential_aad(consumer_integration_id: &Uuid) -> String {
    format!("oauth2|{}", consumer_integration_id)
}
