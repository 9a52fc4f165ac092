//! # Data Models
//!
//! SeaORM entities for the connect service's persistence layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod consumer;
pub mod integration;
pub mod oauth2_credential;

pub use consumer::Entity as Consumer;
pub use integration::Entity as Integration;
pub use oauth2_credential::Entity as Oauth2Credential;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "omnicrm".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
