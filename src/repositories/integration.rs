//! Consumer integration repository
//!
//! Tenant-scoped CRUD over `consumer_integrations`, including the
//! find-or-create keyed by (consumer, service code, type) and the
//! single-enabled-per-type invariant applied inside one transaction.

use anyhow::{Result, anyhow};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_opt, encrypt_str};
use crate::models::integration::{self, Entity as Integration};

/// Repository for consumer integration database operations
#[derive(Debug, Clone)]
pub struct IntegrationRepository {
    pub db: Arc<DatabaseConnection>,
    /// Crypto key for integration secret encryption
    pub crypto_key: CryptoKey,
}

impl IntegrationRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Lists all integrations for a consumer, oldest first.
    pub async fn find_by_consumer(&self, consumer_id: &Uuid) -> Result<Vec<integration::Model>> {
        Ok(Integration::find()
            .filter(integration::Column::ConsumerId.eq(*consumer_id))
            .order_by_asc(integration::Column::CreatedAt)
            .order_by_asc(integration::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Finds an integration by its ID within a consumer scope.
    pub async fn find_by_id(
        &self,
        consumer_id: &Uuid,
        id: &Uuid,
    ) -> Result<Option<integration::Model>> {
        Ok(Integration::find_by_id(*id)
            .filter(integration::Column::ConsumerId.eq(*consumer_id))
            .one(&*self.db)
            .await?)
    }

    /// Finds an integration by its (consumer, service code) pair.
    pub async fn find_by_service_code(
        &self,
        consumer_id: &Uuid,
        service_code: &str,
    ) -> Result<Option<integration::Model>> {
        Ok(Integration::find()
            .filter(integration::Column::ConsumerId.eq(*consumer_id))
            .filter(integration::Column::ServiceCode.eq(service_code))
            .one(&*self.db)
            .await?)
    }

    /// Finds the enabled integration of the given type for a consumer.
    pub async fn find_enabled(
        &self,
        consumer_id: &Uuid,
        integration_type: &str,
    ) -> Result<Option<integration::Model>> {
        Ok(Integration::find()
            .filter(integration::Column::ConsumerId.eq(*consumer_id))
            .filter(integration::Column::IntegrationType.eq(integration_type))
            .filter(integration::Column::Enabled.eq(true))
            .one(&*self.db)
            .await?)
    }

    /// Sets the enabled flag on the (consumer, service code, type) row,
    /// creating it when absent. Enabling also disables every other
    /// integration of the same type for the consumer; both updates happen
    /// in one transaction so the single-enabled invariant is never
    /// observable as violated.
    pub async fn set_enabled(
        &self,
        consumer_id: &Uuid,
        service_code: &str,
        integration_type: &str,
        enabled: bool,
    ) -> Result<integration::Model> {
        let txn = self.db.begin().await?;

        let existing = Integration::find()
            .filter(integration::Column::ConsumerId.eq(*consumer_id))
            .filter(integration::Column::ServiceCode.eq(service_code))
            .filter(integration::Column::IntegrationType.eq(integration_type))
            .one(&txn)
            .await?;

        let now = chrono::Utc::now();
        let model = match existing {
            Some(model) => {
                let mut active: integration::ActiveModel = model.into();
                active.enabled = Set(enabled);
                active.updated_at = Set(now.into());
                active.update(&txn).await?
            }
            None => {
                let active = integration::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    consumer_id: Set(*consumer_id),
                    integration_type: Set(integration_type.to_string()),
                    service_code: Set(service_code.to_string()),
                    enabled: Set(enabled),
                    secret_ciphertext: Set(None),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                active.insert(&txn).await?
            }
        };

        if enabled {
            use sea_orm::sea_query::Expr;

            Integration::update_many()
                .col_expr(integration::Column::Enabled, Expr::value(false))
                .col_expr(
                    integration::Column::UpdatedAt,
                    Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)),
                )
                .filter(integration::Column::ConsumerId.eq(*consumer_id))
                .filter(integration::Column::IntegrationType.eq(integration_type))
                .filter(integration::Column::Id.ne(model.id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        Ok(model)
    }

    /// Encrypts and stores the integration secret.
    pub async fn set_secret(
        &self,
        consumer_id: &Uuid,
        integration_id: &Uuid,
        secret: &str,
    ) -> Result<integration::Model> {
        let existing = self
            .find_by_id(consumer_id, integration_id)
            .await?
            .ok_or_else(|| anyhow!("Integration '{}' not found for consumer", integration_id))?;

        let ciphertext = encrypt_str(&self.crypto_key, secret_aad(&existing.id).as_bytes(), secret)
            .map_err(|e| anyhow!("Secret encryption failed: {}", e))?;

        let mut active: integration::ActiveModel = existing.into();
        active.secret_ciphertext = Set(Some(ciphertext));
        active.updated_at = Set(chrono::Utc::now().into());

        Ok(active.update(&*self.db).await?)
    }

    /// Decrypts the stored integration secret, if any.
    pub fn decrypt_secret(&self, model: &integration::Model) -> Result<Option<String>> {
        decrypt_opt(
            &self.crypto_key,
            secret_aad(&model.id).as_bytes(),
            model.secret_ciphertext.as_ref(),
        )
        .map_err(|e| {
            tracing::error!(
                consumer_id = %model.consumer_id,
                service_code = %model.service_code,
                "Integration secret decryption failed"
            );
            anyhow!(crate::error::ConnectError::from(e))
        })
    }
}

/// AAD binding an integration secret to its row.
fn secret_aad(integration_id: &Uuid) -> String {
    format!("integration|{}", integration_id)
}
