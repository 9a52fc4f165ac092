//! # API Handlers
//!
//! Axum handlers for the connect REST surface. The CRM operations
//! themselves are the `CrmConnector` library surface; these handlers
//! cover consumer/integration management and the OAuth2 flow.

pub mod integrations;
pub mod oauth;

use axum::response::Json;

use crate::models::ServiceInfo;

/// Basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "service"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
