//! CRM connector trait definition
//!
//! The capability interface every CRM backend implementation satisfies.
//! Connector selection is a pure function of the enabled integration's
//! service code; callers hold a `Box<dyn CrmConnector>` and never see
//! backend-specific types.

use async_trait::async_trait;

use crate::crm::types::{
    Contact, ContactInput, ContactPage, Note, NoteInput, Opportunity, OpportunityInput,
    OpportunityPage,
};
use crate::error::ConnectError;

#[async_trait]
pub trait CrmConnector: Send + Sync {
    /// List contacts as a cursor page of up to `first` records.
    async fn list_contacts(
        &self,
        first: i64,
        after: Option<String>,
    ) -> Result<ContactPage, ConnectError>;

    /// Fetch a single contact by its backend-native id.
    async fn get_contact(&self, contact_id: &str) -> Result<Contact, ConnectError>;

    /// Create a contact from the set input fields.
    async fn create_contact(&self, input: &ContactInput) -> Result<Contact, ConnectError>;

    /// Partially update a contact; unset input fields are left untouched.
    async fn update_contact(
        &self,
        contact_id: &str,
        input: &ContactInput,
    ) -> Result<bool, ConnectError>;

    /// Delete (or archive, where the backend archives) a contact.
    async fn delete_contact(&self, contact_id: &str) -> Result<bool, ConnectError>;

    /// List all notes attached to a contact.
    async fn list_contact_notes(&self, contact_id: &str) -> Result<Vec<Note>, ConnectError>;

    /// Create a note and attach it to a contact.
    async fn create_contact_note(
        &self,
        contact_id: &str,
        input: &NoteInput,
    ) -> Result<Note, ConnectError>;

    /// List opportunities as a cursor page of up to `first` records.
    async fn list_opportunities(
        &self,
        first: i64,
        after: Option<String>,
    ) -> Result<OpportunityPage, ConnectError>;

    /// Fetch a single opportunity by its backend-native id.
    async fn get_opportunity(&self, opportunity_id: &str) -> Result<Opportunity, ConnectError>;

    async fn create_opportunity(
        &self,
        input: &OpportunityInput,
    ) -> Result<Opportunity, ConnectError>;

    async fn update_opportunity(
        &self,
        opportunity_id: &str,
        input: &OpportunityInput,
    ) -> Result<bool, ConnectError>;

    async fn delete_opportunity(&self, opportunity_id: &str) -> Result<bool, ConnectError>;

    /// List all notes attached to an opportunity.
    async fn list_opportunity_notes(&self, opportunity_id: &str)
    -> Result<Vec<Note>, ConnectError>;

    /// Create a note and attach it to an opportunity.
    async fn create_opportunity_note(
        &self,
        opportunity_id: &str,
        input: &NoteInput,
    ) -> Result<Note, ConnectError>;
}
