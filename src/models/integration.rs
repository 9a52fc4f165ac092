//! Consumer integration entity model
//!
//! One row per (consumer, service code) binding. At most one row per
//! (consumer, integration type) may be enabled at a time; the enablement
//! manager maintains that invariant transactionally.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Consumer integration: a tenant's binding to one connector
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "consumer_integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub consumer_id: Uuid,

    /// Integration type, e.g. "crm"
    pub integration_type: String,

    /// Connector identifier, e.g. "crm_salesforce"
    pub service_code: String,

    pub enabled: bool,

    /// Encrypted integration secret (secret-auth connectors only)
    pub secret_ciphertext: Option<Vec<u8>>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consumer::Entity",
        from = "Column::ConsumerId",
        to = "super::consumer::Column::Id"
    )]
    Consumer,
    #[sea_orm(has_one = "super::oauth2_credential::Entity")]
    Oauth2Credential,
}

impl Related<super::consumer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consumer.def()
    }
}

impl Related<super::oauth2_credential::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Oauth2Credential.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
