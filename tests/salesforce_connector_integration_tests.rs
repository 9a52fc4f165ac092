//! Salesforce connector integration tests against a mock API server,
//! covering SOQL pagination, error mapping, and the refresh-on-401
//! protocol.

mod test_utils;

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use omnicrm::catalog::{CONNECTOR_CRM_SALESFORCE, CONNECTOR_TYPE_CRM};
use omnicrm::crm::{CrmConnector, ContactInput, NoteInput, SalesforceConfig, SalesforceConnector};
use omnicrm::cursor::encode_cursor;
use omnicrm::error::ConnectError;
use omnicrm::repositories::{
    IntegrationRepository, Oauth2CredentialRepository, oauth2_credential::Oauth2CustomSettings,
};
use test_utils::{create_test_consumer, setup_test_db, test_crypto_key};

const CONTACT_SOQL_FIELDS: &str = "Id,Name,Description,FirstName,LastName,Title,Department,Email,Phone,MobilePhone,IsDeleted,AccountId,CreatedDate,LastModifiedDate";

struct Fixture {
    connector: SalesforceConnector,
    credential_repo: Oauth2CredentialRepository,
    integration_id: Uuid,
}

/// Seeds a consumer with a configured Salesforce integration and builds a
/// connector pointed at the mock server.
async fn salesforce_fixture(db: &sea_orm::DatabaseConnection, mock_uri: &str) -> Fixture {
    let key = test_crypto_key();
    let consumer_id = create_test_consumer(db).await.unwrap();

    let integration_repo = IntegrationRepository::new(Arc::new(db.clone()), key.clone());
    let integration = integration_repo
        .set_enabled(&consumer_id, CONNECTOR_CRM_SALESFORCE, CONNECTOR_TYPE_CRM, true)
        .await
        .unwrap();

    let credential_repo = Oauth2CredentialRepository::new(Arc::new(db.clone()), key);
    let settings = Oauth2CustomSettings {
        salesforce_instance_subdomain: Some("acme".to_string()),
    };
    credential_repo
        .store_client_settings(
            &integration.id,
            "sf-client-id",
            "sf-client-secret",
            "http://localhost:8080/callback",
            Some(&settings),
        )
        .await
        .unwrap();

    let credential = credential_repo
        .find_by_integration(&integration.id)
        .await
        .unwrap()
        .unwrap();
    credential_repo
        .update_tokens(&credential.id, "Bearer", "old-access", "old-refresh")
        .await
        .unwrap();

    let stored = credential_repo
        .find_by_integration(&integration.id)
        .await
        .unwrap()
        .unwrap();
    let decrypted = credential_repo.decrypt(&stored).unwrap();

    let config = SalesforceConfig {
        login_base: mock_uri.to_string(),
        api_base_override: Some(mock_uri.to_string()),
        timeout: std::time::Duration::from_secs(5),
    };
    let connector =
        SalesforceConnector::new(config, decrypted, credential_repo.clone()).unwrap();

    Fixture {
        connector,
        credential_repo,
        integration_id: integration.id,
    }
}

fn sf_contact(id: &str, first: &str, last: &str) -> serde_json::Value {
    json!({
        "Id": id,
        "FirstName": first,
        "LastName": last,
        "Email": format!("{}@example.com", first.to_lowercase()),
        "Phone": "555-0100",
        "CreatedDate": "2022-03-04T09:30:15.000+0000",
        "LastModifiedDate": "2022-03-05T10:00:00.000+0000"
    })
}

#[tokio::test]
async fn list_contacts_overfetches_and_pages_exclusively() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    let expected_soql = format!(
        "SELECT {} FROM Contact ORDER BY Id LIMIT 3",
        CONTACT_SOQL_FIELDS
    );
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("q", expected_soql.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 3,
            "done": true,
            "records": [
                sf_contact("003A", "Ada", "Lovelace"),
                sf_contact("003B", "Brian", "Kernighan"),
                sf_contact("003C", "Carol", "Shaw"),
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = fixture.connector.list_contacts(2, None).await.unwrap();

    assert_eq!(page.edges.len(), 2);
    assert!(page.page_info.has_next_page);
    assert_eq!(
        page.page_info.start_cursor.as_deref(),
        Some(encode_cursor("003A").as_str())
    );
    assert_eq!(
        page.page_info.end_cursor.as_deref(),
        Some(encode_cursor("003B").as_str())
    );
    assert_eq!(page.edges[0].node.name.as_deref(), Some("Ada Lovelace"));
    assert!(page.edges[0].node.created_at.is_some());
}

#[tokio::test]
async fn list_contacts_after_cursor_is_exclusive_window() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    let expected_soql = format!(
        "SELECT {} FROM Contact WHERE Id > '003A' ORDER BY Id LIMIT 3",
        CONTACT_SOQL_FIELDS
    );
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("q", expected_soql.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 1,
            "done": true,
            "records": [sf_contact("003B", "Brian", "Kernighan")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let after = encode_cursor("003A");
    let page = fixture.connector.list_contacts(2, Some(after)).await.unwrap();

    assert_eq!(page.edges.len(), 1);
    assert!(!page.page_info.has_next_page);
    assert_eq!(page.edges[0].node.id, "003B");
}

#[tokio::test]
async fn invalid_cursor_is_rejected_before_any_network_call() {
    let db = setup_test_db().await.unwrap();
    // Unroutable base: any network attempt would error differently.
    let fixture = salesforce_fixture(&db, "http://127.0.0.1:1").await;

    let result = fixture
        .connector
        .list_contacts(2, Some("not@base64!".to_string()))
        .await;
    assert!(matches!(result, Err(ConnectError::InvalidArgument(_))));

    let result = fixture.connector.list_contacts(0, None).await;
    assert!(matches!(result, Err(ConnectError::InvalidArgument(_))));
}

#[tokio::test]
async fn get_contact_maps_404_to_not_found() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003MISSING"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!([
            {"message": "The requested resource does not exist", "errorCode": "NOT_FOUND"}
        ])))
        .mount(&mock_server)
        .await;

    let result = fixture.connector.get_contact("003MISSING").await;
    assert!(matches!(result, Err(ConnectError::NotFound(_))));
}

#[tokio::test]
async fn backend_error_carries_status_and_first_message() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003BAD"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!([
            {"message": "malformed id 003BAD", "errorCode": "MALFORMED_ID"}
        ])))
        .mount(&mock_server)
        .await;

    let result = fixture.connector.get_contact("003BAD").await;
    match result {
        Err(ConnectError::Backend { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("MALFORMED_ID"));
            assert!(message.contains("malformed id 003BAD"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn refresh_on_401_retries_once_and_persists_tokens() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    // The stale token is rejected once.
    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003A"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!([
            {"message": "Session expired or invalid", "errorCode": "INVALID_SESSION_ID"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Exactly one refresh grant.
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The retried request succeeds with the refreshed token.
    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003A"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sf_contact("003A", "Ada", "Lovelace")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let contact = fixture.connector.get_contact("003A").await.unwrap();
    assert_eq!(contact.id, "003A");

    // The rotated tokens were re-encrypted and persisted atomically.
    let stored = fixture
        .credential_repo
        .find_by_integration(&fixture.integration_id)
        .await
        .unwrap()
        .unwrap();
    let decrypted = fixture.credential_repo.decrypt(&stored).unwrap();
    assert_eq!(decrypted.access_token.as_deref(), Some("new-access"));
    assert_eq!(decrypted.refresh_token.as_deref(), Some("new-refresh"));
}

#[tokio::test]
async fn failed_refresh_surfaces_auth_error_and_preserves_tokens() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003A"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!([
            {"message": "Session expired or invalid", "errorCode": "INVALID_SESSION_ID"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "expired authorization code"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = fixture.connector.get_contact("003A").await;
    assert!(matches!(result, Err(ConnectError::Auth(_))));

    // The stored tokens are untouched.
    let stored = fixture
        .credential_repo
        .find_by_integration(&fixture.integration_id)
        .await
        .unwrap()
        .unwrap();
    let decrypted = fixture.credential_repo.decrypt(&stored).unwrap();
    assert_eq!(decrypted.access_token.as_deref(), Some("old-access"));
    assert_eq!(decrypted.refresh_token.as_deref(), Some("old-refresh"));
}

#[tokio::test]
async fn second_401_after_refresh_stops_without_third_attempt() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003A"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The refreshed token is also rejected; exactly one retry happens.
    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003A"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = fixture.connector.get_contact("003A").await;
    assert!(matches!(result, Err(ConnectError::Auth(_))));
}

#[tokio::test]
async fn create_contact_posts_partial_payload_then_fetches() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    // Only the set fields appear in the creation payload.
    Mock::given(method("POST"))
        .and(path("/sobjects/Contact"))
        .and(body_json(json!({
            "FirstName": "Ada",
            "Email": "ada@example.com"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "003NEW",
            "success": true,
            "errors": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sobjects/Contact/003NEW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sf_contact("003NEW", "Ada", "Lovelace")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let input = ContactInput {
        first_name: Some("Ada".to_string()),
        email: Some("ada@example.com".to_string()),
        ..ContactInput::default()
    };
    let contact = fixture.connector.create_contact(&input).await.unwrap();

    assert_eq!(contact.id, "003NEW");
    assert_eq!(contact.last_name.as_deref(), Some("Lovelace"));
}

#[tokio::test]
async fn create_note_carries_parent_and_truncated_title() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    let content = "Spoke with the customer about the renewal timeline and budget.";
    let expected_title = format!("{}...", &content[..30]);

    Mock::given(method("POST"))
        .and(path("/sobjects/Note"))
        .and(body_json(json!({
            "Body": content,
            "Title": expected_title,
            "ParentId": "003A"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "002NOTE",
            "success": true,
            "errors": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sobjects/Note/002NOTE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "002NOTE",
            "Body": content,
            "CreatedDate": "2022-03-04T09:30:15.000+0000",
            "LastModifiedDate": "2022-03-04T09:30:15.000+0000"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let note = fixture
        .connector
        .create_contact_note("003A", &NoteInput { content: content.to_string() })
        .await
        .unwrap();

    assert_eq!(note.id, "002NOTE");
    assert_eq!(note.content, content);
    assert!(note.created_at.is_some());
}

#[tokio::test]
async fn update_and_delete_succeed_on_no_content() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    Mock::given(method("PATCH"))
        .and(path("/sobjects/Contact/003A"))
        .and(body_json(json!({"Phone": "555-0199"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/sobjects/Contact/003A"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let input = ContactInput {
        phone: Some("555-0199".to_string()),
        ..ContactInput::default()
    };
    assert!(fixture.connector.update_contact("003A", &input).await.unwrap());
    assert!(fixture.connector.delete_contact("003A").await.unwrap());
}

#[tokio::test]
async fn list_notes_filters_by_parent() {
    let mock_server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let fixture = salesforce_fixture(&db, &mock_server.uri()).await;

    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 1,
            "done": true,
            "records": [{
                "Id": "002NOTE",
                "Body": "Renewal discussion",
                "ParentId": "003A",
                "CreatedDate": "2022-03-04T09:30:15.000+0000",
                "LastModifiedDate": "2022-03-04T09:30:15.000+0000"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notes = fixture.connector.list_contact_notes("003A").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "Renewal discussion");

    // The WHERE clause targeted the parent record.
    let requests = mock_server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default();
    assert!(query.contains("ParentId"));
}
