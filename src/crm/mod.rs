//! CRM connector module
//!
//! This module provides the normalized CRM surface:
//! - The `CrmConnector` trait both backend implementations satisfy
//! - Normalized entity and input types
//! - The Salesforce (REST/SOQL) and HubSpot (REST/object) connectors

pub mod hubspot;
pub mod salesforce;
pub mod trait_;
pub mod types;

pub use hubspot::{HubspotConfig, HubspotConnector};
pub use salesforce::{SalesforceConfig, SalesforceConnector, SfTokenResponse};
pub use trait_::CrmConnector;
pub use types::{
    Contact, ContactInput, ContactPage, Note, NoteInput, Opportunity, OpportunityInput,
    OpportunityPage,
};
