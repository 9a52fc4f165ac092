//! # OAuth2 Flow Handlers
//!
//! Login issues a 307 redirect to the backend authorize URL carrying the
//! per-process state string. The callback exchanges the code for tokens
//! and always 307-redirects back to the configured client integrations
//! page with a human-readable success or error message, never a raw
//! error page.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ConnectError;
use crate::server::AppState;

/// Query parameters delivered by the backend on the OAuth2 callback
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code: String,
}

/// Begin the OAuth2 login flow for an integration
#[utoipa::path(
    get,
    path = "/connect/{consumer_id}/integrations/{service_code}/oauth2/login",
    params(
        ("consumer_id" = Uuid, Path, description = "Consumer identifier"),
        ("service_code" = String, Path, description = "Connector service code")
    ),
    responses(
        (status = 307, description = "Redirect to the backend authorization URL"),
        (status = 400, description = "Connector does not support OAuth2"),
        (status = 404, description = "Integration or OAuth2 configuration not found")
    ),
    tag = "oauth2"
)]
pub async fn login(
    State(state): State<AppState>,
    Path((consumer_id, service_code)): Path<(Uuid, String)>,
) -> Result<Redirect, ConnectError> {
    let authorize_url = state
        .connect
        .oauth2_login_url(&consumer_id, &service_code)
        .await?;

    Ok(Redirect::temporary(authorize_url.as_str()))
}

/// Complete the OAuth2 flow: exchange the code and persist tokens
#[utoipa::path(
    get,
    path = "/connect/{consumer_id}/integrations/{service_code}/oauth2/callback",
    params(
        ("consumer_id" = Uuid, Path, description = "Consumer identifier"),
        ("service_code" = String, Path, description = "Connector service code"),
        ("state" = String, Query, description = "State string issued at login time"),
        ("code" = String, Query, description = "Authorization code")
    ),
    responses(
        (status = 307, description = "Redirect to the client integrations page with a result message")
    ),
    tag = "oauth2"
)]
pub async fn callback(
    State(state): State<AppState>,
    Path((consumer_id, service_code)): Path<(Uuid, String)>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let result = state
        .connect
        .oauth2_callback(&consumer_id, &service_code, &params.state, &params.code)
        .await;

    let redirect_url = match &result {
        Ok(()) => state.connect.client_redirect_url(Ok(())),
        Err(error) => {
            warn!(
                consumer_id = %consumer_id,
                service_code = %service_code,
                error = %error,
                "oauth callback failed"
            );
            state.connect.client_redirect_url(Err(error))
        }
    };

    Redirect::temporary(&redirect_url)
}
