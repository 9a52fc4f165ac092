//! # Integration Handlers
//!
//! Consumer and integration management: catalog listing merged with
//! stored state, enable/disable, OAuth2 configuration, and integration
//! secrets.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::connect::{IntegrationView, Oauth2ConfigurationInput};
use crate::error::ConnectError;
use crate::server::AppState;

/// Response payload for consumer creation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsumerResponse {
    /// Unique identifier for the new consumer (UUID)
    pub consumer_id: Uuid,
}

/// Request payload for enabling or disabling an integration
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// Request payload for storing an integration secret
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetSecretRequest {
    pub secret: String,
}

/// Generic success payload for mutations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create a new consumer
#[utoipa::path(
    post,
    path = "/connect/consumers",
    responses(
        (status = 200, description = "Consumer created", body = CreateConsumerResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "connect"
)]
pub async fn create_consumer(
    State(state): State<AppState>,
) -> Result<Json<CreateConsumerResponse>, ConnectError> {
    let consumer_id = state.connect.create_consumer().await?;
    Ok(Json(CreateConsumerResponse { consumer_id }))
}

/// List every available integration for a consumer
///
/// Returns all catalog connectors; connectors the consumer has never
/// configured appear with `enabled=false` and no id.
#[utoipa::path(
    get,
    path = "/connect/{consumer_id}/integrations",
    params(
        ("consumer_id" = Uuid, Path, description = "Consumer identifier")
    ),
    responses(
        (status = 200, description = "Integrations for the consumer", body = [IntegrationView]),
        (status = 500, description = "Internal server error")
    ),
    tag = "connect"
)]
pub async fn list_integrations(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
) -> Result<Json<Vec<IntegrationView>>, ConnectError> {
    let integrations = state.connect.list_integrations(&consumer_id).await?;
    Ok(Json(integrations))
}

/// Enable or disable an integration
///
/// Enabling one integration disables every other integration of the same
/// type for the consumer.
#[utoipa::path(
    post,
    path = "/connect/{consumer_id}/integrations/{service_code}/enable",
    params(
        ("consumer_id" = Uuid, Path, description = "Consumer identifier"),
        ("service_code" = String, Path, description = "Connector service code")
    ),
    responses(
        (status = 200, description = "Enablement updated", body = SuccessResponse),
        (status = 400, description = "Unknown service code"),
        (status = 500, description = "Internal server error")
    ),
    tag = "connect"
)]
pub async fn set_enabled(
    State(state): State<AppState>,
    Path((consumer_id, service_code)): Path<(Uuid, String)>,
    Json(request): Json<SetEnabledRequest>,
) -> Result<Json<SuccessResponse>, ConnectError> {
    let success = state
        .connect
        .set_enabled(&consumer_id, &service_code, request.enabled)
        .await?;
    Ok(Json(SuccessResponse { success }))
}

/// Configure OAuth2 client settings for an integration
#[utoipa::path(
    post,
    path = "/connect/{consumer_id}/integrations/{integration_id}/oauth2",
    params(
        ("consumer_id" = Uuid, Path, description = "Consumer identifier"),
        ("integration_id" = Uuid, Path, description = "Integration identifier")
    ),
    responses(
        (status = 200, description = "OAuth2 settings stored", body = SuccessResponse),
        (status = 400, description = "Missing client credentials or custom settings"),
        (status = 404, description = "Integration not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "connect"
)]
pub async fn configure_oauth2(
    State(state): State<AppState>,
    Path((consumer_id, integration_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<Oauth2ConfigurationInput>,
) -> Result<Json<SuccessResponse>, ConnectError> {
    let success = state
        .connect
        .configure_oauth2(&consumer_id, &integration_id, &request)
        .await?;
    Ok(Json(SuccessResponse { success }))
}

/// Store the integration secret for a secret-auth connector
#[utoipa::path(
    post,
    path = "/connect/{consumer_id}/integrations/{integration_id}/secret",
    params(
        ("consumer_id" = Uuid, Path, description = "Consumer identifier"),
        ("integration_id" = Uuid, Path, description = "Integration identifier")
    ),
    responses(
        (status = 200, description = "Secret stored", body = SuccessResponse),
        (status = 400, description = "Empty secret"),
        (status = 404, description = "Integration not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "connect"
)]
pub async fn set_secret(
    State(state): State<AppState>,
    Path((consumer_id, integration_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SetSecretRequest>,
) -> Result<Json<SuccessResponse>, ConnectError> {
    state
        .connect
        .set_integration_secret(&consumer_id, &integration_id, &request.secret)
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}
