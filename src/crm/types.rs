//! Normalized CRM entity types
//!
//! Backend-agnostic shapes shared by every connector. IDs are the opaque
//! native identifiers of the source backend and are never reassigned.
//! Input types carry only optional fields where the backends support
//! partial updates: an unset field is omitted from the native payload and
//! left untouched server-side, never nulled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pagination::Page;

/// A person record in the tenant's CRM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Backend-native record id
    pub id: String,
    /// Combined display name derived from first/last name
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub website: Option<String>,
    pub archived: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields accepted when creating or partially updating a contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub company_name: Option<String>,
}

/// A sales opportunity (HubSpot calls these deals).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Backend-native record id
    pub id: String,
    pub name: String,
    pub stage_name: Option<String>,
    /// Monetary amount as a decimal string, backend-formatted
    pub amount: Option<String>,
    pub close_date: Option<DateTime<Utc>>,
}

/// Fields accepted when creating or updating an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityInput {
    pub name: String,
    pub stage_name: String,
    pub close_date: DateTime<Utc>,
    pub amount: Option<String>,
}

/// A free-form note attached to a contact or opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Backend-native record id
    pub id: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating a note under a parent record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    pub content: String,
}

pub type ContactPage = Page<Contact>;
pub type OpportunityPage = Page<Opportunity>;
