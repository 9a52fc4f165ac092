//! Connect service
//!
//! Tenant-facing operations over integrations: listing the catalog merged
//! with DB state, enable/disable with single-active-per-type exclusivity,
//! OAuth2 configuration and the login/callback flow, and resolution of
//! the enabled integration into a concrete CRM connector. Every operation
//! builds connectors from freshly loaded, freshly decrypted credentials;
//! nothing is cached across requests.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::catalog::{
    self, AuthType, CONNECTOR_CRM_HUBSPOT, CONNECTOR_CRM_SALESFORCE, ConnectorDescriptor,
};
use crate::config::AppConfig;
use crate::crm::{
    CrmConnector, HubspotConfig, HubspotConnector, SalesforceConfig, SalesforceConnector,
};
use crate::crypto::CryptoKey;
use crate::error::ConnectError;
use crate::repositories::{
    ConsumerRepository, IntegrationRepository, Oauth2CredentialRepository,
    oauth2_credential::Oauth2CustomSettings,
};

/// OAuth2 readiness flags reported alongside an integration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Oauth2Metadata {
    pub client_credentials_set: bool,
    pub tokens_set: bool,
}

/// One catalog entry merged with the consumer's stored state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationView {
    /// Present only once the consumer has configured or enabled the integration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub integration_type: String,
    pub service_code: String,
    pub service_name: String,
    pub description: String,
    pub auth_type: AuthType,
    pub enabled: bool,
    pub login_url: String,
    pub callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2_metadata: Option<Oauth2Metadata>,
}

/// Tenant-supplied OAuth2 settings.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Oauth2ConfigurationInput {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub salesforce_instance_subdomain: Option<String>,
}

/// Service wiring the catalog, repositories, and connector constructors.
#[derive(Clone)]
pub struct ConnectService {
    config: Arc<AppConfig>,
    consumer_repo: ConsumerRepository,
    integration_repo: IntegrationRepository,
    credential_repo: Oauth2CredentialRepository,
}

impl ConnectService {
    pub fn new(config: Arc<AppConfig>, db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self {
            config,
            consumer_repo: ConsumerRepository::new(db.clone()),
            integration_repo: IntegrationRepository::new(db.clone(), crypto_key.clone()),
            credential_repo: Oauth2CredentialRepository::new(db, crypto_key),
        }
    }

    /// Create a new consumer and return its id.
    pub async fn create_consumer(&self) -> Result<Uuid, ConnectError> {
        let consumer = self.consumer_repo.create().await?;
        info!(consumer_id = %consumer.id, "created consumer");
        Ok(consumer.id)
    }

    /// Every catalog connector merged with the consumer's stored rows.
    /// Unconfigured connectors appear disabled with an absent id.
    pub async fn list_integrations(
        &self,
        consumer_id: &Uuid,
    ) -> Result<Vec<IntegrationView>, ConnectError> {
        let stored = self.integration_repo.find_by_consumer(consumer_id).await?;

        let mut views = Vec::with_capacity(catalog::AVAILABLE_CONNECTORS.len());
        for connector in catalog::AVAILABLE_CONNECTORS.iter() {
            let mut view = self.view_from_descriptor(consumer_id, connector);

            if let Some(integration) = stored
                .iter()
                .find(|row| row.service_code == connector.service_code)
            {
                view.id = Some(integration.id);
                view.enabled = integration.enabled;

                // Ciphertext presence is enough for the readiness flags;
                // no reason to decrypt on the listing path.
                let credential = self
                    .credential_repo
                    .find_by_integration(&integration.id)
                    .await?;
                view.oauth2_metadata = Some(match credential {
                    Some(credential) => Oauth2Metadata {
                        client_credentials_set: credential.client_id_ciphertext.is_some()
                            && credential.client_secret_ciphertext.is_some(),
                        tokens_set: credential.access_token_ciphertext.is_some()
                            && credential.refresh_token_ciphertext.is_some(),
                    },
                    None => Oauth2Metadata {
                        client_credentials_set: false,
                        tokens_set: false,
                    },
                });
            }

            views.push(view);
        }

        Ok(views)
    }

    /// Enable or disable an integration, creating its row when absent.
    /// Enabling disables every sibling of the same type atomically.
    pub async fn set_enabled(
        &self,
        consumer_id: &Uuid,
        service_code: &str,
        enabled: bool,
    ) -> Result<bool, ConnectError> {
        let connector = catalog::find_connector(service_code).ok_or_else(|| {
            ConnectError::invalid_argument(format!(
                "cannot change {} integration: {} is not in the list of available integrations",
                service_code, service_code
            ))
        })?;

        self.integration_repo
            .set_enabled(consumer_id, connector.service_code, connector.kind, enabled)
            .await?;

        info!(
            consumer_id = %consumer_id,
            service_code = %service_code,
            enabled = enabled,
            "integration enablement updated"
        );

        Ok(true)
    }

    /// Store tenant-supplied OAuth2 client settings for an integration.
    /// Validation failures leave the credential row untouched (and
    /// uncreated when it did not exist yet).
    pub async fn configure_oauth2(
        &self,
        consumer_id: &Uuid,
        integration_id: &Uuid,
        input: &Oauth2ConfigurationInput,
    ) -> Result<bool, ConnectError> {
        let integration = self
            .integration_repo
            .find_by_id(consumer_id, integration_id)
            .await?
            .ok_or_else(|| {
                ConnectError::not_found(format!("integration '{}' not found", integration_id))
            })?;

        let client_id = input
            .client_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ConnectError::invalid_argument("clientId and clientSecret must be non-empty")
            })?;
        let client_secret = input
            .client_secret
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ConnectError::invalid_argument("clientId and clientSecret must be non-empty")
            })?;

        let custom_settings = if integration.service_code == CONNECTOR_CRM_SALESFORCE {
            let subdomain = input
                .salesforce_instance_subdomain
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ConnectError::invalid_argument("salesforceInstanceSubdomain must be provided")
                })?;
            Some(Oauth2CustomSettings {
                salesforce_instance_subdomain: Some(subdomain.to_string()),
            })
        } else {
            None
        };

        self.credential_repo
            .store_client_settings(
                &integration.id,
                client_id,
                client_secret,
                &self.callback_url(consumer_id, &integration.service_code),
                custom_settings.as_ref(),
            )
            .await?;

        info!(
            consumer_id = %consumer_id,
            service_code = %integration.service_code,
            "OAuth2 client settings configured"
        );

        Ok(true)
    }

    /// Encrypt and store an integration secret (secret-auth connectors).
    pub async fn set_integration_secret(
        &self,
        consumer_id: &Uuid,
        integration_id: &Uuid,
        secret: &str,
    ) -> Result<(), ConnectError> {
        if secret.is_empty() {
            return Err(ConnectError::invalid_argument("secret key must be provided"));
        }

        self.integration_repo
            .find_by_id(consumer_id, integration_id)
            .await?
            .ok_or_else(|| {
                ConnectError::not_found(format!("integration '{}' not found", integration_id))
            })?;

        self.integration_repo
            .set_secret(consumer_id, integration_id, secret)
            .await?;

        Ok(())
    }

    /// Resolve the consumer's enabled CRM integration into a connector.
    /// Fails closed: no enabled integration means `NotFound`, never a
    /// default backend.
    pub async fn crm_connector(
        &self,
        consumer_id: &Uuid,
    ) -> Result<Box<dyn CrmConnector>, ConnectError> {
        let integration = self
            .integration_repo
            .find_enabled(consumer_id, catalog::CONNECTOR_TYPE_CRM)
            .await?
            .ok_or_else(|| {
                ConnectError::not_found("no enabled CRM integration for this consumer")
            })?;

        match integration.service_code.as_str() {
            CONNECTOR_CRM_SALESFORCE => {
                let connector = self.salesforce_connector(&integration.id).await?;
                Ok(Box::new(connector))
            }
            CONNECTOR_CRM_HUBSPOT => {
                let secret = self
                    .integration_repo
                    .decrypt_secret(&integration)?
                    .unwrap_or_default();
                let connector = HubspotConnector::new(self.hubspot_config(), secret)?;
                Ok(Box::new(connector))
            }
            other => {
                warn!(service_code = %other, "enabled integration references unknown connector");
                Err(ConnectError::Internal(format!(
                    "integration references unknown connector '{}'",
                    other
                )))
            }
        }
    }

    /// The backend authorize URL for the OAuth2 login redirect.
    pub async fn oauth2_login_url(
        &self,
        consumer_id: &Uuid,
        service_code: &str,
    ) -> Result<Url, ConnectError> {
        let integration = self.require_oauth2_integration(consumer_id, service_code).await?;
        let connector = self.salesforce_connector(&integration.id).await?;
        connector.authorize_url(&self.config.oauth_state_string)
    }

    /// Handle the OAuth2 callback: verify state, exchange the code, and
    /// persist the tokens in one credential update.
    pub async fn oauth2_callback(
        &self,
        consumer_id: &Uuid,
        service_code: &str,
        state: &str,
        code: &str,
    ) -> Result<(), ConnectError> {
        if !state_matches(&self.config.oauth_state_string, state) {
            warn!(consumer_id = %consumer_id, "oauth callback with mismatched state");
            return Err(ConnectError::auth("invalid oauth state"));
        }

        let integration = self.require_oauth2_integration(consumer_id, service_code).await?;
        let connector = self.salesforce_connector(&integration.id).await?;

        let token = connector.exchange_code(code).await?;

        let credential = self.credential_repo.find_or_create(&integration.id).await?;
        self.credential_repo
            .update_tokens(
                &credential.id,
                &token.token_type,
                &token.access_token,
                token.refresh_token.as_deref().unwrap_or_default(),
            )
            .await?;

        info!(
            consumer_id = %consumer_id,
            service_code = %service_code,
            "OAuth2 tokens stored"
        );

        Ok(())
    }

    /// Client page the callback redirects to, carrying a result message.
    pub fn client_redirect_url(&self, result: Result<(), &ConnectError>) -> String {
        let base = &self.config.client_integrations_page_url;
        match result {
            Ok(()) => format!(
                "{}?successMessage={}",
                base,
                urlencode("OAuth2 token was updated")
            ),
            Err(error) => {
                let message = match error {
                    ConnectError::Auth(_) => "Error getting OAuth token from the CRM backend.",
                    ConnectError::NotFound(_) => "Error finding the integration.",
                    _ => "Error updating OAuth2 token. Please try again.",
                };
                format!("{}?errorMessage={}", base, urlencode(message))
            }
        }
    }

    pub fn login_url(&self, consumer_id: &Uuid, service_code: &str) -> String {
        format!(
            "{}/connect/{}/integrations/{}/oauth2/login",
            self.config.base_service_url, consumer_id, service_code
        )
    }

    pub fn callback_url(&self, consumer_id: &Uuid, service_code: &str) -> String {
        format!(
            "{}/connect/{}/integrations/{}/oauth2/callback",
            self.config.base_service_url, consumer_id, service_code
        )
    }

    // -------- private --------

    fn view_from_descriptor(
        &self,
        consumer_id: &Uuid,
        connector: &ConnectorDescriptor,
    ) -> IntegrationView {
        IntegrationView {
            id: None,
            integration_type: connector.kind.to_string(),
            service_code: connector.service_code.to_string(),
            service_name: connector.name.to_string(),
            description: connector.description.to_string(),
            auth_type: connector.auth_type,
            enabled: false,
            login_url: self.login_url(consumer_id, connector.service_code),
            callback_url: self.callback_url(consumer_id, connector.service_code),
            oauth2_metadata: None,
        }
    }

    /// Load the integration row for an OAuth2 login/callback request.
    async fn require_oauth2_integration(
        &self,
        consumer_id: &Uuid,
        service_code: &str,
    ) -> Result<crate::models::integration::Model, ConnectError> {
        let connector = catalog::find_connector(service_code).ok_or_else(|| {
            ConnectError::not_found(format!("connector '{}' not found", service_code))
        })?;

        if connector.auth_type != AuthType::OAuth2 {
            return Err(ConnectError::invalid_argument(format!(
                "connector '{}' does not support OAuth2",
                service_code
            )));
        }

        self.integration_repo
            .find_by_service_code(consumer_id, service_code)
            .await?
            .ok_or_else(|| {
                ConnectError::not_found(format!(
                    "integration '{}' is not configured for this consumer",
                    service_code
                ))
            })
    }

    async fn salesforce_connector(
        &self,
        integration_id: &Uuid,
    ) -> Result<SalesforceConnector, ConnectError> {
        let credential = self
            .credential_repo
            .find_by_integration(integration_id)
            .await?
            .ok_or_else(|| {
                ConnectError::not_found("OAuth2 configuration not found for this integration")
            })?;

        let decrypted = self.credential_repo.decrypt(&credential)?;

        SalesforceConnector::new(
            self.salesforce_config(),
            decrypted,
            self.credential_repo.clone(),
        )
    }

    fn salesforce_config(&self) -> SalesforceConfig {
        SalesforceConfig {
            login_base: self.config.salesforce_login_base.clone(),
            api_base_override: self.config.salesforce_api_base.clone(),
            timeout: std::time::Duration::from_secs(self.config.outbound_timeout_seconds),
        }
    }

    fn hubspot_config(&self) -> HubspotConfig {
        HubspotConfig {
            api_base: self.config.hubspot_api_base.clone(),
            timeout: std::time::Duration::from_secs(self.config.outbound_timeout_seconds),
        }
    }
}

/// Constant-time OAuth state comparison.
fn state_matches(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_comparison_matches_exact_only() {
        assert!(state_matches("state-abc", "state-abc"));
        assert!(!state_matches("state-abc", "state-abd"));
        assert!(!state_matches("state-abc", "state-ab"));
        assert!(!state_matches("state-abc", ""));
    }

    #[test]
    fn urlencode_escapes_query_values() {
        assert_eq!(
            urlencode("OAuth2 token was updated"),
            "OAuth2+token+was+updated"
        );
    }
}
