//! Salesforce CRM connector
//!
//! Talks to the Salesforce REST/SOQL API. Listing uses SOQL ordered by
//! record id with an exclusive `Id > 'after'` filter, so pages never
//! contain the cursor record. Salesforce does not expose token lifetimes;
//! expiry is detected lazily when a call answers 401, which triggers
//! exactly one silent refresh and one retry of the original request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::crm::trait_::CrmConnector;
use crate::crm::types::{
    Contact, ContactInput, ContactPage, Note, NoteInput, Opportunity, OpportunityInput,
    OpportunityPage,
};
use crate::cursor::decode_cursor;
use crate::error::ConnectError;
use crate::pagination::{AfterMode, Edge, fetch_limit, paginate};
use crate::repositories::{DecryptedOauth2Credential, Oauth2CredentialRepository};

pub const SALESFORCE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";
const API_BASE_TEMPLATE: &str = "https://{subdomain}.my.salesforce.com/services/data/v53.0";

const CONTACT_OBJECT: &str = "Contact";
const OPPORTUNITY_OBJECT: &str = "Opportunity";
const NOTE_OBJECT: &str = "Note";
const NOTE_TITLE_LENGTH: usize = 30;

// Statically declared field-selection lists per object.
const CONTACT_FIELDS: &[&str] = &[
    "Id",
    "Name",
    "Description",
    "FirstName",
    "LastName",
    "Title",
    "Department",
    "Email",
    "Phone",
    "MobilePhone",
    "IsDeleted",
    "AccountId",
    "CreatedDate",
    "LastModifiedDate",
];
const OPPORTUNITY_FIELDS: &[&str] = &["Id", "Name", "StageName", "CloseDate", "Amount"];
const NOTE_FIELDS: &[&str] = &[
    "Id",
    "Body",
    "IsDeleted",
    "IsPrivate",
    "OwnerId",
    "ParentId",
    "Title",
    "CreatedDate",
    "LastModifiedDate",
];

/// Connection parameters for the Salesforce API.
#[derive(Debug, Clone)]
pub struct SalesforceConfig {
    /// OAuth authorize/token host, e.g. "https://login.salesforce.com"
    pub login_base: String,
    /// Overrides the per-subdomain API base URL (tests)
    pub api_base_override: Option<String>,
    pub timeout: std::time::Duration,
}

/// Salesforce connector bound to one tenant's decrypted credentials.
pub struct SalesforceConnector {
    api_base: String,
    login_base: String,
    http: reqwest::Client,
    credential_id: Uuid,
    client_id: String,
    client_secret: String,
    redirect_url: Option<String>,
    token_type: String,
    refresh_token: Option<String>,
    access_token: Mutex<String>,
    credential_repo: Oauth2CredentialRepository,
}

/// Salesforce error body: an array of coded messages.
#[derive(Debug, Deserialize)]
struct SfError {
    #[serde(default)]
    message: String,
    #[serde(rename = "errorCode", default)]
    error_code: String,
}

#[derive(Debug, Deserialize)]
struct SfListResponse<T> {
    #[serde(default = "Vec::new")]
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SfCreateResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<SfError>,
}

/// Token endpoint response for both code exchange and refresh grants.
#[derive(Debug, Clone, Deserialize)]
pub struct SfTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct SfContact {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "FirstName", default)]
    first_name: String,
    #[serde(rename = "LastName", default)]
    last_name: String,
    #[serde(rename = "Email", default)]
    email: String,
    #[serde(rename = "Phone", default)]
    phone: String,
    #[serde(rename = "CreatedDate", default)]
    created_date: String,
    #[serde(rename = "LastModifiedDate", default)]
    last_modified_date: String,
}

#[derive(Debug, Default, Serialize)]
struct SfContactPayload {
    #[serde(rename = "FirstName", skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(rename = "LastName", skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(rename = "Phone", skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SfOpportunity {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "StageName", default)]
    stage_name: String,
    #[serde(rename = "CloseDate", default)]
    close_date: Option<String>,
    #[serde(rename = "Amount", default)]
    amount: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SfOpportunityPayload {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "StageName")]
    stage_name: String,
    #[serde(rename = "CloseDate")]
    close_date: String,
    #[serde(rename = "Amount", skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SfNote {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Body", default)]
    body: String,
    #[serde(rename = "CreatedDate", default)]
    created_date: String,
    #[serde(rename = "LastModifiedDate", default)]
    last_modified_date: String,
}

#[derive(Debug, Serialize)]
struct SfNotePayload {
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "ParentId")]
    parent_id: String,
}

impl SalesforceConnector {
    /// Build a connector from a tenant's decrypted OAuth2 credential.
    pub fn new(
        config: SalesforceConfig,
        credential: DecryptedOauth2Credential,
        credential_repo: Oauth2CredentialRepository,
    ) -> Result<Self, ConnectError> {
        let api_base = match &config.api_base_override {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => {
                let subdomain = credential
                    .custom_settings
                    .salesforce_instance_subdomain
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ConnectError::invalid_argument(
                            "salesforceInstanceSubdomain is not configured for this integration",
                        )
                    })?;
                API_BASE_TEMPLATE.replace("{subdomain}", subdomain)
            }
        };

        let client_id = credential.client_id.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
            ConnectError::auth("OAuth2 client credentials are not configured for this integration")
        })?;
        let client_secret =
            credential.client_secret.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
                ConnectError::auth(
                    "OAuth2 client credentials are not configured for this integration",
                )
            })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConnectError::Internal(format!("http client build failed: {}", e)))?;

        Ok(Self {
            api_base,
            login_base: config.login_base.trim_end_matches('/').to_string(),
            http,
            credential_id: credential.id,
            client_id,
            client_secret,
            redirect_url: credential.redirect_url.clone(),
            token_type: credential
                .token_type
                .clone()
                .unwrap_or_else(default_token_type),
            refresh_token: credential.refresh_token.clone(),
            access_token: Mutex::new(credential.access_token.clone().unwrap_or_default()),
            credential_repo,
        })
    }

    /// OAuth2 authorize URL carrying the given state string.
    pub fn authorize_url(&self, state: &str) -> Result<Url, ConnectError> {
        let redirect_url = self.redirect_url.as_deref().ok_or_else(|| {
            ConnectError::invalid_argument("OAuth2 redirect URL is not configured")
        })?;

        let mut url = Url::parse(&format!("{}/services/oauth2/authorize", self.login_base))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_url)
            .append_pair("state", state);

        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<SfTokenResponse, ConnectError> {
        let redirect_url = self.redirect_url.as_deref().ok_or_else(|| {
            ConnectError::invalid_argument("OAuth2 redirect URL is not configured")
        })?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", redirect_url),
        ];

        let response = self
            .http
            .post(format!("{}/services/oauth2/token", self.login_base))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status, "salesforce code exchange failed");
            return Err(ConnectError::auth(format!(
                "code exchange failed with status {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        Ok(response.json().await?)
    }

    /// Exchange the stored refresh token for a new access token and
    /// persist the rotated pair in a single credential update.
    async fn refresh_access_token(&self) -> Result<String, ConnectError> {
        counter!("salesforce_token_refresh_attempts_total").increment(1);

        let refresh_token = self
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConnectError::auth("no refresh token stored for this integration"))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(format!("{}/services/oauth2/token", self.login_base))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            counter!("salesforce_token_refresh_failure_total").increment(1);
            let status = response.status().as_u16();
            warn!(status = status, "salesforce token refresh rejected");
            return Err(ConnectError::auth("failed to refresh token"));
        }

        let token: SfTokenResponse = response.json().await?;

        // Salesforce may omit the refresh token from the response; the
        // stored one remains valid in that case.
        let new_refresh = token.refresh_token.as_deref().unwrap_or(refresh_token);
        self.credential_repo
            .update_tokens(
                &self.credential_id,
                &token.token_type,
                &token.access_token,
                new_refresh,
            )
            .await?;

        let mut current = self.access_token.lock().await;
        *current = token.access_token.clone();
        drop(current);

        counter!("salesforce_token_refresh_success_total").increment(1);
        info!("salesforce access token refreshed");

        Ok(token.access_token)
    }

    /// Send an API request, refreshing the access token and retrying
    /// exactly once when the backend answers 401.
    async fn send_api_request<F>(&self, build: F) -> Result<reqwest::Response, ConnectError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let token = self.access_token.lock().await.clone();
        let response = build(&self.http)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Accept", "application/json; charset=utf-8")
            .bearer_auth(&token)
            .send()
            .await?;

        debug!(status = response.status().as_u16(), "salesforce request");

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // No expiry timestamp is exposed; a 401 is the expiry signal.
        info!("salesforce access token rejected, attempting refresh");
        let refreshed = match self.refresh_access_token().await {
            Ok(token) => token,
            Err(refresh_error) => {
                warn!(error = %refresh_error, "salesforce token refresh failed");
                return Err(ConnectError::auth(
                    "backend returned 401 and token refresh failed",
                ));
            }
        };

        let retry = build(&self.http)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Accept", "application/json; charset=utf-8")
            .bearer_auth(&refreshed)
            .send()
            .await?;

        debug!(status = retry.status().as_u16(), "salesforce request retry");

        if retry.status() == StatusCode::UNAUTHORIZED {
            // One refresh, one retry; never a third attempt.
            return Err(ConnectError::auth(
                "salesforce rejected the refreshed access token",
            ));
        }

        Ok(retry)
    }

    /// Map an error response to the domain taxonomy.
    async fn into_backend_error(response: reqwest::Response) -> ConnectError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<Vec<SfError>>(&body)
            .ok()
            .and_then(|errors| errors.into_iter().next())
            .map(|error| {
                if error.error_code.is_empty() {
                    error.message
                } else {
                    format!("{}: {}", error.error_code, error.message)
                }
            })
            .unwrap_or_else(|| truncate_body(&body));

        ConnectError::backend(status, message)
    }

    async fn soql_query<T: DeserializeOwned>(
        &self,
        soql: String,
    ) -> Result<SfListResponse<T>, ConnectError> {
        debug!(query = %soql, "salesforce SOQL query");

        let api_base = self.api_base.clone();
        let response = self
            .send_api_request(move |client| {
                client
                    .get(format!("{}/query", api_base))
                    .query(&[("q", soql.as_str())])
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn get_object<T: DeserializeOwned>(
        &self,
        object: &str,
        object_id: &str,
        fields: &[&str],
    ) -> Result<T, ConnectError> {
        let url = format!("{}/sobjects/{}/{}", self.api_base, object, object_id);
        let fields_param = fields.join(",");

        let response = self
            .send_api_request(move |client| {
                client.get(&url).query(&[("fields", fields_param.as_str())])
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConnectError::not_found(format!(
                "{} '{}' not found",
                object, object_id
            )));
        }
        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn create_object<P: Serialize>(
        &self,
        object: &str,
        payload: &P,
    ) -> Result<String, ConnectError> {
        let url = format!("{}/sobjects/{}", self.api_base, object);
        let body = serde_json::to_value(payload)
            .map_err(|e| ConnectError::Internal(format!("payload encoding failed: {}", e)))?;

        let response = self
            .send_api_request(move |client| client.post(&url).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        let created: SfCreateResponse = response.json().await?;
        if !created.success && !created.errors.is_empty() {
            let message = created
                .errors
                .iter()
                .map(|error| format!("{}: {}", error.error_code, error.message))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConnectError::backend(status.as_u16(), message));
        }

        Ok(created.id)
    }

    async fn update_object<P: Serialize>(
        &self,
        object: &str,
        object_id: &str,
        payload: &P,
    ) -> Result<(), ConnectError> {
        let url = format!("{}/sobjects/{}/{}", self.api_base, object, object_id);
        let body = serde_json::to_value(payload)
            .map_err(|e| ConnectError::Internal(format!("payload encoding failed: {}", e)))?;

        let response = self
            .send_api_request(move |client| client.patch(&url).json(&body))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConnectError::not_found(format!(
                "{} '{}' not found",
                object, object_id
            )));
        }
        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(())
    }

    async fn delete_object(&self, object: &str, object_id: &str) -> Result<(), ConnectError> {
        let url = format!("{}/sobjects/{}/{}", self.api_base, object, object_id);

        let response = self
            .send_api_request(move |client| client.delete(&url))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConnectError::not_found(format!(
                "{} '{}' not found",
                object, object_id
            )));
        }
        if !response.status().is_success() {
            return Err(Self::into_backend_error(response).await);
        }

        Ok(())
    }

    /// SOQL for a page of `limit` records after the given id, ordered by id.
    fn list_soql(object: &str, fields: &[&str], after_id: Option<&str>, limit: i64) -> String {
        let field_list = fields.join(",");
        match after_id {
            Some(after) => format!(
                "SELECT {} FROM {} WHERE Id > '{}' ORDER BY Id LIMIT {}",
                field_list,
                object,
                escape_soql(after),
                limit
            ),
            None => format!(
                "SELECT {} FROM {} ORDER BY Id LIMIT {}",
                field_list, object, limit
            ),
        }
    }

    async fn list_notes(&self, parent_id: &str) -> Result<Vec<Note>, ConnectError> {
        let soql = format!(
            "SELECT {} FROM {} WHERE ParentId = '{}'",
            NOTE_FIELDS.join(","),
            NOTE_OBJECT,
            escape_soql(parent_id)
        );

        let response: SfListResponse<SfNote> = self.soql_query(soql).await?;
        Ok(response.records.into_iter().map(SfNote::into_note).collect())
    }

    async fn create_note(&self, parent_id: &str, input: &NoteInput) -> Result<Note, ConnectError> {
        let payload = SfNotePayload {
            body: input.content.clone(),
            title: note_title(&input.content),
            parent_id: parent_id.to_string(),
        };

        let note_id = self.create_object(NOTE_OBJECT, &payload).await?;

        // Fetch the stored note so timestamps come from the backend.
        let note: SfNote = self.get_object(NOTE_OBJECT, &note_id, NOTE_FIELDS).await?;
        Ok(note.into_note())
    }
}

#[async_trait]
impl CrmConnector for SalesforceConnector {
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
        let limit = fetch_limit(first, after.is_some(), AfterMode::Exclusive);
        let soql = Self::list_soql(CONTACT_OBJECT, CONTACT_FIELDS, after_id.as_deref(), limit);

        let response: SfListResponse<SfContact> = self.soql_query(soql).await?;
        let edges = response
            .records
            .into_iter()
            .map(|record| {
                let contact = record.into_contact();
                let id = contact.id.clone();
                Edge::new(contact, &id)
            })
            .collect();

        paginate(first, after.as_deref(), AfterMode::Exclusive, edges)
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Contact, ConnectError> {
        let record: SfContact = self
            .get_object(CONTACT_OBJECT, contact_id, CONTACT_FIELDS)
            .await?;
        Ok(record.into_contact())
    }

    async fn create_contact(&self, input: &ContactInput) -> Result<Contact, ConnectError> {
        let payload = SfContactPayload::from_input(input);
        let object_id = self.create_object(CONTACT_OBJECT, &payload).await?;

        // Fetch all fields after creation; the create response only carries the id.
        self.get_contact(&object_id).await
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        input: &ContactInput,
    ) -> Result<bool, ConnectError> {
        let payload = SfContactPayload::from_input(input);
        self.update_object(CONTACT_OBJECT, contact_id, &payload)
            .await?;
        Ok(true)
    }

    async fn delete_contact(&self, contact_id: &str) -> Result<bool, ConnectError> {
        self.delete_object(CONTACT_OBJECT, contact_id).await?;
        Ok(true)
    }

    async fn list_contact_notes(&self, contact_id: &str) -> Result<Vec<Note>, ConnectError> {
        self.list_notes(contact_id).await
    }

    async fn create_contact_note(
        &self,
        contact_id: &str,
        input: &NoteInput,
    ) -> Result<Note, ConnectError> {
        self.create_note(contact_id, input).await
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
        let limit = fetch_limit(first, after.is_some(), AfterMode::Exclusive);
        let soql = Self::list_soql(
            OPPORTUNITY_OBJECT,
            OPPORTUNITY_FIELDS,
            after_id.as_deref(),
            limit,
        );

        let response: SfListResponse<SfOpportunity> = self.soql_query(soql).await?;
        let edges = response
            .records
            .into_iter()
            .map(|record| {
                let opportunity = record.into_opportunity();
                let id = opportunity.id.clone();
                Edge::new(opportunity, &id)
            })
            .collect();

        paginate(first, after.as_deref(), AfterMode::Exclusive, edges)
    }

    async fn get_opportunity(&self, opportunity_id: &str) -> Result<Opportunity, ConnectError> {
        let record: SfOpportunity = self
            .get_object(OPPORTUNITY_OBJECT, opportunity_id, OPPORTUNITY_FIELDS)
            .await?;
        Ok(record.into_opportunity())
    }

    async fn create_opportunity(
        &self,
        input: &OpportunityInput,
    ) -> Result<Opportunity, ConnectError> {
        let payload = SfOpportunityPayload::from_input(input);
        let object_id = self.create_object(OPPORTUNITY_OBJECT, &payload).await?;

        self.get_opportunity(&object_id).await
    }

    async fn update_opportunity(
        &self,
        opportunity_id: &str,
        input: &OpportunityInput,
    ) -> Result<bool, ConnectError> {
        let payload = SfOpportunityPayload::from_input(input);
        self.update_object(OPPORTUNITY_OBJECT, opportunity_id, &payload)
            .await?;
        Ok(true)
    }

    async fn delete_opportunity(&self, opportunity_id: &str) -> Result<bool, ConnectError> {
        self.delete_object(OPPORTUNITY_OBJECT, opportunity_id)
            .await?;
        Ok(true)
    }

    async fn list_opportunity_notes(
        &self,
        opportunity_id: &str,
    ) -> Result<Vec<Note>, ConnectError> {
        self.list_notes(opportunity_id).await
    }

    async fn create_opportunity_note(
        &self,
        opportunity_id: &str,
        input: &NoteInput,
    ) -> Result<Note, ConnectError> {
        self.create_note(opportunity_id, input).await
    }
}

impl SfContactPayload {
    fn from_input(input: &ContactInput) -> Self {
        Self {
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
        }
    }
}

impl SfOpportunityPayload {
    fn from_input(input: &OpportunityInput) -> Self {
        Self {
            name: input.name.clone(),
            stage_name: input.stage_name.clone(),
            close_date: format_sf_datetime(&input.close_date),
            amount: input.amount.clone(),
        }
    }
}

impl SfContact {
    fn into_contact(self) -> Contact {
        let name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();

        Contact {
            id: self.id,
            name: non_empty(name),
            first_name: non_empty(self.first_name),
            last_name: non_empty(self.last_name),
            email: non_empty(self.email),
            phone: non_empty(self.phone),
            company_name: None,
            website: None,
            archived: None,
            created_at: parse_sf_datetime(&self.created_date),
            updated_at: parse_sf_datetime(&self.last_modified_date),
        }
    }
}

impl SfOpportunity {
    fn into_opportunity(self) -> Opportunity {
        Opportunity {
            id: self.id,
            name: self.name,
            stage_name: non_empty(self.stage_name),
            amount: self.amount.map(|amount| amount.to_string()),
            close_date: self
                .close_date
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|parsed| parsed.with_timezone(&Utc)),
        }
    }
}

impl SfNote {
    fn into_note(self) -> Note {
        Note {
            id: self.id,
            content: self.body,
            created_at: parse_sf_datetime(&self.created_date),
            updated_at: parse_sf_datetime(&self.last_modified_date),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Note titles are the leading slice of the content, char-boundary safe.
fn note_title(content: &str) -> String {
    let title: String = content.chars().take(NOTE_TITLE_LENGTH).collect();
    format!("{}...", title)
}

/// Escape a value interpolated into a SOQL string literal.
fn escape_soql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Parse the Salesforce-proprietary timestamp format. Failures are logged
/// and yield an absent timestamp rather than failing the record.
pub fn parse_sf_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }

    match DateTime::parse_from_str(raw, SALESFORCE_TIME_FORMAT) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(_) => {
            warn!(date_time = %raw, "failed to parse salesforce dateTime");
            None
        }
    }
}

pub fn format_sf_datetime(date_time: &DateTime<Utc>) -> String {
    date_time.format(SALESFORCE_TIME_FORMAT).to_string()
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > 200 {
        let truncated: String = body.chars().take(200).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_salesforce_timestamp_format() {
        let parsed = parse_sf_datetime("2022-03-04T09:30:15.000+0000").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2022, 3, 4, 9, 30, 15).unwrap());
    }

    #[test]
    fn unparseable_timestamp_is_absent_not_fatal() {
        assert_eq!(parse_sf_datetime("03/04/2022"), None);
        assert_eq!(parse_sf_datetime(""), None);
    }

    #[test]
    fn timestamp_roundtrips_through_format() {
        let original = Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 59).unwrap();
        let formatted = format_sf_datetime(&original);
        assert_eq!(formatted, "2021-12-31T23:59:59.000+0000");
        assert_eq!(parse_sf_datetime(&formatted), Some(original));
    }

    #[test]
    fn note_title_is_leading_content_slice() {
        assert_eq!(note_title("short"), "short...");

        let long = "a".repeat(80);
        let title = note_title(&long);
        assert_eq!(title.len(), NOTE_TITLE_LENGTH + 3);

        // Must not split a multi-byte char.
        let cyrillic = "записка".repeat(10);
        let title = note_title(&cyrillic);
        assert_eq!(title.chars().count(), NOTE_TITLE_LENGTH + 3);
    }

    #[test]
    fn soql_escaping_neutralizes_quotes() {
        assert_eq!(escape_soql("plain"), "plain");
        assert_eq!(escape_soql("O'Brien"), "O\\'Brien");
        assert_eq!(escape_soql("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn list_soql_shapes_exclusive_window() {
        let soql = SalesforceConnector::list_soql("Contact", &["Id", "Name"], None, 11);
        assert_eq!(soql, "SELECT Id,Name FROM Contact ORDER BY Id LIMIT 11");

        let soql =
            SalesforceConnector::list_soql("Contact", &["Id", "Name"], Some("003xx0001"), 11);
        assert_eq!(
            soql,
            "SELECT Id,Name FROM Contact WHERE Id > '003xx0001' ORDER BY Id LIMIT 11"
        );
    }

    #[test]
    fn contact_mapping_drops_empty_fields() {
        let record = SfContact {
            id: "003A".to_string(),
            first_name: "Ada".to_string(),
            last_name: String::new(),
            email: String::new(),
            phone: "555-0100".to_string(),
            created_date: "2022-03-04T09:30:15.000+0000".to_string(),
            last_modified_date: String::new(),
        };

        let contact = record.into_contact();
        assert_eq!(contact.name.as_deref(), Some("Ada"));
        assert_eq!(contact.first_name.as_deref(), Some("Ada"));
        assert_eq!(contact.last_name, None);
        assert_eq!(contact.email, None);
        assert_eq!(contact.phone.as_deref(), Some("555-0100"));
        assert!(contact.created_at.is_some());
        assert!(contact.updated_at.is_none());
    }

    #[test]
    fn opportunity_mapping_formats_amount() {
        let record = SfOpportunity {
            id: "006A".to_string(),
            name: "Renewal".to_string(),
            stage_name: "Prospecting".to_string(),
            close_date: Some("2022-06-30T00:00:00+00:00".to_string()),
            amount: Some(1250.5),
        };

        let opportunity = record.into_opportunity();
        assert_eq!(opportunity.amount.as_deref(), Some("1250.5"));
        assert!(opportunity.close_date.is_some());
    }

    #[test]
    fn partial_contact_payload_omits_unset_fields() {
        let input = ContactInput {
            email: Some("ada@example.com".to_string()),
            ..ContactInput::default()
        };
        let payload = SfContactPayload::from_input(&input);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json.as_object().unwrap().len(), 1);
        assert_eq!(json["Email"], "ada@example.com");
    }
}
