//! HubSpot CRM connector
//!
//! Talks to the HubSpot CRM v3 object API with a tenant-supplied bearer
//! secret. Listing is cursor-based but inclusive: the backend echoes the
//! `after` record as the first row, so pages over-fetch by one extra row
//! and drop the echo client-side. Opportunities are HubSpot "deals";
//! notes attach to their parent through a separate association call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::crm::trait_::CrmConnector;
use crate::crm::types::{
    Contact, ContactInput, ContactPage, Note, NoteInput, Opportunity, OpportunityInput,
    OpportunityPage,
};
use crate::cursor::decode_cursor;
use crate::error::ConnectError;
use crate::pagination::{AfterMode, Edge, fetch_limit, paginate};

const CONTACTS_PATH: &str = "contacts";
const DEALS_PATH: &str = "deals";
const NOTES_PATH: &str = "notes";

const NOTE_TO_CONTACT: &str = "note_to_contact";
const NOTE_TO_DEAL: &str = "note_to_deal";

// Statically declared property-selection lists per object.
const CONTACT_PROPS: &[&str] = &[
    "company",
    "phone",
    "website",
    "createddate",
    "email",
    "firstname",
    "lastname",
    "hs_object_id",
    "lastmodifieddate",
];
const DEAL_PROPS: &[&str] = &[
    "amount",
    "closedate",
    "dealname",
    "dealstage",
    "hubspot_owner_id",
    "pipeline",
];
const NOTE_PROPS: &[&str] = &["hs_note_body", "hs_createdate"];

/// Connection parameters for the HubSpot API.
#[derive(Debug, Clone)]
pub struct HubspotConfig {
    /// CRM object API base, e.g. "https://api.hubapi.com/crm/v3/objects"
    pub api_base: String,
    pub timeout: std::time::Duration,
}

/// HubSpot connector bound to one tenant's decrypted integration secret.
pub struct HubspotConnector {
    base_url: String,
    access_token: String,
    http: reqwest::Client,
}

/// HubSpot error body.
#[derive(Debug, Deserialize)]
struct HsErrorResponse {
    #[serde(default)]
    message: String,
    #[serde(rename = "correlationId", default)]
    correlation_id: String,
}

#[derive(Debug, Deserialize)]
struct HsListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HsAssociation {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct HsContact {
    #[serde(default)]
    id: String,
    #[serde(rename = "createdAt", default)]
    created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    updated_at: Option<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    properties: HsContactProperties,
}

#[derive(Debug, Default, Deserialize)]
struct HsContactProperties {
    #[serde(default)]
    company: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    firstname: String,
    #[serde(default)]
    lastname: String,
}

#[derive(Debug, Default, Serialize)]
struct HsContactPayload {
    properties: HsContactPayloadProperties,
}

#[derive(Debug, Default, Serialize)]
struct HsContactPayloadProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    website: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HsDeal {
    #[serde(default)]
    id: String,
    #[serde(default)]
    properties: HsDealProperties,
}

#[derive(Debug, Default, Deserialize)]
struct HsDealProperties {
    #[serde(default)]
    amount: Option<String>,
    #[serde(rename = "closedate", default)]
    close_date: Option<String>,
    #[serde(rename = "dealname", default)]
    deal_name: String,
    #[serde(rename = "dealstage", default)]
    deal_stage: Option<String>,
}

#[derive(Debug, Serialize)]
struct HsDealPayload {
    properties: HsDealPayloadProperties,
}

#[derive(Debug, Serialize)]
struct HsDealPayloadProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(rename = "closedate")]
    close_date: String,
    #[serde(rename = "dealname")]
    deal_name: String,
    #[serde(rename = "dealstage")]
    deal_stage: String,
}

#[derive(Debug, Default, Deserialize)]
struct HsNote {
    #[serde(default)]
    id: String,
    #[serde(rename = "updatedAt", default)]
    updated_at: Option<String>,
    #[serde(default)]
    properties: HsNoteProperties,
}

#[derive(Debug, Default, Deserialize)]
struct HsNoteProperties {
    #[serde(rename = "hs_createdate", default)]
    hs_create_date: Option<String>,
    #[serde(rename = "hs_note_body", default)]
    hs_note_body: Option<String>,
}

#[derive(Debug, Serialize)]
struct HsNotePayload {
    properties: HsNotePayloadProperties,
}

#[derive(Debug, Serialize)]
struct HsNotePayloadProperties {
    #[serde(rename = "hs_note_body")]
    hs_note_body: String,
    #[serde(rename = "hs_timestamp")]
    hs_timestamp: String,
}

impl HubspotConnector {
    /// Build a connector from a tenant's decrypted integration secret.
    pub fn new(config: HubspotConfig, access_token: String) -> Result<Self, ConnectError> {
        if access_token.is_empty() {
            return Err(ConnectError::auth(
                "integration secret is not configured for this integration",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConnectError::Internal(format!("http client build failed: {}", e)))?;

        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            access_token,
            http,
        })
    }

    async fn send_request(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ConnectError> {
        let response = request
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Accept", "application/json; charset=utf-8")
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        debug!(status = response.status().as_u16(), "hubspot request");

        Ok(response)
    }

    /// Map an error response to the domain taxonomy.
    async fn into_backend_error(response: reqwest::Response) -> ConnectError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<HsErrorResponse>(&body) {
            Ok(parsed) if !parsed.message.is_empty() => {
                if parsed.correlation_id.is_empty() {
                    parsed.message
                } else {
                    format!("{} (correlation {})", parsed.message, parsed.correlation_id)
                }
            }
            _ => format!("unexpected status code {}", status),
        };

        ConnectError::backend(status, message)
    }

    async fn get_object<T: DeserializeOwned>(
        &self,
        object_path: &str,
        object_id: &str,
        props: &[&str],
    ) -> Result<T, ConnectError> {
        let url = format!("{}/{}/{}", self.base_url, object_path, object_id);
        let response = self
            .send_request(self.http.get(&url).query(&[("properties", props.join(","))]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConnectError::not_found(format!(
                "{} '{}' not found",
                object_path, object_id
            )));
        }
        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn create_object<P: Serialize, T: DeserializeOwned>(
        &self,
        object_path: &str,
        payload: &P,
    ) -> Result<T, ConnectError> {
        let url = format!("{}/{}", self.base_url, object_path);
        let response = self.send_request(self.http.post(&url).json(payload)).await?;

        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn update_object<P: Serialize, T: DeserializeOwned>(
        &self,
        object_path: &str,
        object_id: &str,
        payload: &P,
    ) -> Result<T, ConnectError> {
        let url = format!("{}/{}/{}", self.base_url, object_path, object_id);
        let response = self
            .send_request(self.http.patch(&url).json(payload))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConnectError::not_found(format!(
                "{} '{}' not found",
                object_path, object_id
            )));
        }
        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn delete_object(&self, object_path: &str, object_id: &str) -> Result<(), ConnectError> {
        let url = format!("{}/{}/{}", self.base_url, object_path, object_id);
        let response = self.send_request(self.http.delete(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConnectError::not_found(format!(
                "{} '{}' not found",
                object_path, object_id
            )));
        }
        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(())
    }

    async fn list_objects<T: DeserializeOwned>(
        &self,
        object_path: &str,
        props: &[&str],
        limit: i64,
        after_id: Option<&str>,
    ) -> Result<Vec<T>, ConnectError> {
        let url = format!("{}/{}", self.base_url, object_path);
        let mut query: Vec<(&str, String)> = vec![
            ("properties", props.join(",")),
            ("limit", limit.to_string()),
        ];
        if let Some(after) = after_id {
            query.push(("after", after.to_string()));
        }

        let response = self.send_request(self.http.get(&url).query(&query)).await?;

        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        let parsed: HsListResponse<T> = response.json().await?;
        Ok(parsed.results)
    }

    async fn list_notes(
        &self,
        object_path: &str,
        object_id: &str,
    ) -> Result<Vec<Note>, ConnectError> {
        let url = format!(
            "{}/{}/{}/associations/notes",
            self.base_url, object_path, object_id
        );
        let response = self.send_request(self.http.get(&url)).await?;

        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        let associations: HsListResponse<HsAssociation> = response.json().await?;

        // The association listing only carries ids; each note body is a
        // dependent, strictly sequential fetch.
        let mut notes = Vec::with_capacity(associations.results.len());
        for association in &associations.results {
            let note: HsNote = self
                .get_object(NOTES_PATH, &association.id, NOTE_PROPS)
                .await?;
            notes.push(note.into_note());
        }

        Ok(notes)
    }

    async fn create_note_and_associate(
        &self,
        object_path: &str,
        object_id: &str,
        association_name: &str,
        input: &NoteInput,
    ) -> Result<Note, ConnectError> {
        let payload = HsNotePayload {
            properties: HsNotePayloadProperties {
                hs_note_body: input.content.clone(),
                hs_timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            },
        };

        let note: HsNote = self.create_object(NOTES_PATH, &payload).await?;

        let url = format!(
            "{}/notes/{}/associations/{}/{}/{}",
            self.base_url, note.id, object_path, object_id, association_name
        );
        let response = self.send_request(self.http.put(&url)).await?;

        if !response.status().is_success() {
            let association_error = Self::into_backend_error(response).await;

            // Compensate: the note exists but is attached to nothing, so
            // delete it before surfacing the association failure. Cleanup
            // failure is only logged; the original error still wins.
            if let Err(cleanup_error) = self.delete_object(NOTES_PATH, &note.id).await {
                warn!(
                    note_id = %note.id,
                    error = %cleanup_error,
                    "failed to delete orphan note after association failure"
                );
            }

            return Err(association_error);
        }

        Ok(note.into_note())
    }
}

#[async_trait]
impl CrmConnector for HubspotConnector {
    async fn list_contacts(
        &self,
        first: i64,
        after: Option<String>,
    ) -> Result<ContactPage, ConnectError> {
        if first <= 0 {
            return Err(ConnectError::invalid_argument(
                "page size 'first' must be greater than zero",
            ));
        }

        let after_id = after.as_deref().map(decode_cursor).transpose()?;
        let limit = fetch_limit(first, after.is_some(), AfterMode::Inclusive);

        let records: Vec<HsContact> = self
            .list_objects(CONTACTS_PATH, CONTACT_PROPS, limit, after_id.as_deref())
            .await?;

        let edges = records
            .into_iter()
            .map(|record| {
                let contact = record.into_contact();
                let id = contact.id.clone();
                Edge::new(contact, &id)
            })
            .collect();

        paginate(first, after.as_deref(), AfterMode::Inclusive, edges)
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Contact, ConnectError> {
        let record: HsContact = self
            .get_object(CONTACTS_PATH, contact_id, CONTACT_PROPS)
            .await?;
        Ok(record.into_contact())
    }

    async fn create_contact(&self, input: &ContactInput) -> Result<Contact, ConnectError> {
        let payload = HsContactPayload::from_input(input);
        let record: HsContact = self.create_object(CONTACTS_PATH, &payload).await?;
        Ok(record.into_contact())
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        input: &ContactInput,
    ) -> Result<bool, ConnectError> {
        let payload = HsContactPayload::from_input(input);
        let _updated: HsContact = self
            .update_object(CONTACTS_PATH, contact_id, &payload)
            .await?;
        Ok(true)
    }

    async fn delete_contact(&self, contact_id: &str) -> Result<bool, ConnectError> {
        self.delete_object(CONTACTS_PATH, contact_id).await?;
        Ok(true)
    }

    async fn list_contact_notes(&self, contact_id: &str) -> Result<Vec<Note>, ConnectError> {
        self.list_notes(CONTACTS_PATH, contact_id).await
    }

    async fn create_contact_note(
        &self,
        contact_id: &str,
        input: &NoteInput,
    ) -> Result<Note, ConnectError> {
        self.create_note_and_associate(CONTACTS_PATH, contact_id, NOTE_TO_CONTACT, input)
            .await
    }

    async fn list_opportunities(
        &self,
        first: i64,
        after: Option<String>,
    ) -> Result<OpportunityPage, ConnectError> {
        if first <= 0 {
            return Err(ConnectError::invalid_argument(
                "page size 'first' must be greater than zero",
            ));
        }

        let after_id = after.as_deref().map(decode_cursor).transpose()?;
        let limit = fetch_limit(first, after.is_some(), AfterMode::Inclusive);

        let records: Vec<HsDeal> = self
            .list_objects(DEALS_PATH, DEAL_PROPS, limit, after_id.as_deref())
            .await?;

        let edges = records
            .into_iter()
            .map(|record| {
                let opportunity = record.into_opportunity();
                let id = opportunity.id.clone();
                Edge::new(opportunity, &id)
            })
            .collect();

        paginate(first, after.as_deref(), AfterMode::Inclusive, edges)
    }

    async fn get_opportunity(&self, opportunity_id: &str) -> Result<Opportunity, ConnectError> {
        let record: HsDeal = self
            .get_object(DEALS_PATH, opportunity_id, DEAL_PROPS)
            .await?;
        Ok(record.into_opportunity())
    }

    async fn create_opportunity(
        &self,
        input: &OpportunityInput,
    ) -> Result<Opportunity, ConnectError> {
        let payload = HsDealPayload::from_input(input);
        let record: HsDeal = self.create_object(DEALS_PATH, &payload).await?;
        Ok(record.into_opportunity())
    }

    async fn update_opportunity(
        &self,
        opportunity_id: &str,
        input: &OpportunityInput,
    ) -> Result<bool, ConnectError> {
        let payload = HsDealPayload::from_input(input);
        let _updated: HsDeal = self
            .update_object(DEALS_PATH, opportunity_id, &payload)
            .await?;
        Ok(true)
    }

    async fn delete_opportunity(&self, opportunity_id: &str) -> Result<bool, ConnectError> {
        self.delete_object(DEALS_PATH, opportunity_id).await?;
        Ok(true)
    }

    async fn list_opportunity_notes(
        &self,
        opportunity_id: &str,
    ) -> Result<Vec<Note>, ConnectError> {
        self.list_notes(DEALS_PATH, opportunity_id).await
    }

    async fn create_opportunity_note(
        &self,
        opportunity_id: &str,
        input: &NoteInput,
    ) -> Result<Note, ConnectError> {
        self.create_note_and_associate(DEALS_PATH, opportunity_id, NOTE_TO_DEAL, input)
            .await
    }
}

impl HsContactPayload {
    fn from_input(input: &ContactInput) -> Self {
        Self {
            properties: HsContactPayloadProperties {
                company: input.company_name.clone(),
                firstname: input.first_name.clone(),
                lastname: input.last_name.clone(),
                email: input.email.clone(),
                phone: input.phone.clone(),
                website: input.website.clone(),
            },
        }
    }
}

impl HsDealPayload {
    fn from_input(input: &OpportunityInput) -> Self {
        Self {
            properties: HsDealPayloadProperties {
                amount: input.amount.clone(),
                close_date: input.close_date.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                deal_name: input.name.clone(),
                deal_stage: input.stage_name.clone(),
            },
        }
    }
}

impl HsContact {
    fn into_contact(self) -> Contact {
        let name = format!(
            "{} {}",
            self.properties.firstname, self.properties.lastname
        )
        .trim()
        .to_string();

        Contact {
            id: self.id,
            name: non_empty(name),
            first_name: non_empty(self.properties.firstname),
            last_name: non_empty(self.properties.lastname),
            email: non_empty(self.properties.email),
            phone: non_empty(self.properties.phone),
            company_name: non_empty(self.properties.company),
            website: non_empty(self.properties.website),
            archived: Some(self.archived),
            created_at: parse_hs_datetime(self.created_at.as_deref()),
            updated_at: parse_hs_datetime(self.updated_at.as_deref()),
        }
    }
}

impl HsDeal {
    fn into_opportunity(self) -> Opportunity {
        Opportunity {
            id: self.id,
            name: self.properties.deal_name,
            stage_name: self.properties.deal_stage,
            amount: self.properties.amount,
            close_date: parse_hs_datetime(self.properties.close_date.as_deref()),
        }
    }
}

impl HsNote {
    fn into_note(self) -> Note {
        Note {
            id: self.id,
            content: self.properties.hs_note_body.unwrap_or_default(),
            created_at: parse_hs_datetime(self.properties.hs_create_date.as_deref()),
            updated_at: parse_hs_datetime(self.updated_at.as_deref()),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Parse an RFC3339 timestamp. Failures are logged and yield an absent
/// timestamp rather than failing the record.
pub fn parse_hs_datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }

    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(_) => {
            warn!(date_time = %raw, "failed to parse hubspot dateTime");
            None
        }
    }
}
