//! Connector catalog
//!
//! The fixed, compile-time list of CRM connectors this service can speak
//! to. The catalog is the single source of truth for which service codes
//! exist; connector implementations must not invent codes outside it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const CONNECTOR_TYPE_CRM: &str = "crm";
pub const CONNECTOR_CRM_SALESFORCE: &str = "crm_salesforce";
pub const CONNECTOR_CRM_HUBSPOT: &str = "crm_hubspot";

/// Authentication model a connector requires from the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// OAuth 2.0 authorization code flow with stored refresh tokens
    OAuth2,
    /// A single long-lived secret (API token) supplied by the tenant
    Secret,
}

/// Immutable description of an available connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorDescriptor {
    /// Stable identifier, unique across all connectors (e.g. "crm_salesforce")
    pub service_code: &'static str,
    /// Integration type the connector belongs to (e.g. "crm")
    pub kind: &'static str,
    /// Human-readable service name
    pub name: &'static str,
    pub description: &'static str,
    pub auth_type: AuthType,
}

/// Every connector this build knows about.
pub const AVAILABLE_CONNECTORS: [ConnectorDescriptor; 2] = [
    ConnectorDescriptor {
        service_code: CONNECTOR_CRM_SALESFORCE,
        kind: CONNECTOR_TYPE_CRM,
        name: "Salesforce",
        description: "Salesforce is the world's #1 customer relationship management (CRM) platform.",
        auth_type: AuthType::OAuth2,
    },
    ConnectorDescriptor {
        service_code: CONNECTOR_CRM_HUBSPOT,
        kind: CONNECTOR_TYPE_CRM,
        name: "Hubspot",
        description: "HubSpot's CRM platform also offers enterprise software for marketing, sales, customer service, content management, and operations.",
        auth_type: AuthType::Secret,
    },
];

/// Look up a connector by service code. Unknown codes are simply absent.
pub fn find_connector(service_code: &str) -> Option<&'static ConnectorDescriptor> {
    AVAILABLE_CONNECTORS
        .iter()
        .find(|connector| connector.service_code == service_code)
}
