//! OAuth2 credential entity model
//!
//! One credential row per integration (1:1). Every secret-bearing column
//! holds AES-GCM ciphertext only; plaintext exists solely in memory on
//! either side of the repository boundary. A credential's lifetime never
//! exceeds its integration's.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

/// Stored OAuth2 credentials for one consumer integration
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "consumer_oauth2_credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub consumer_integration_id: Uuid,

    pub client_id_ciphertext: Option<Vec<u8>>,

    pub client_secret_ciphertext: Option<Vec<u8>>,

    /// OAuth2 callback URL registered with the backend
    pub redirect_url: Option<String>,

    /// Token type returned by the backend, e.g. "bearer"
    pub token_type: Option<String>,

    pub access_token_ciphertext: Option<Vec<u8>>,

    pub refresh_token_ciphertext: Option<Vec<u8>>,

    /// Backend-specific settings blob (e.g. Salesforce instance subdomain)
    #[sea_orm(column_type = "JsonBinary")]
    pub custom_settings: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::integration::Entity",
        from = "Column::ConsumerIntegrationId",
        to = "super::integration::Column::Id"
    )]
    Integration,
}

impl Related<super::integration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Integration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
