//! HubSpot connector integration tests against a mock API server,
//! covering inclusive-after pagination, property mapping, and the
//! note create-then-associate sequence.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use omnicrm::crm::{CrmConnector, ContactInput, HubspotConfig, HubspotConnector, NoteInput};
use omnicrm::cursor::encode_cursor;
use omnicrm::error::ConnectError;

fn hubspot_connector(mock_uri: &str) -> HubspotConnector {
    let config = HubspotConfig {
        api_base: format!("{}/crm/v3/objects", mock_uri),
        timeout: std::time::Duration::from_secs(5),
    };
    HubspotConnector::new(config, "hs-access-token".to_string()).unwrap()
}

fn hs_contact(id: &str, first: &str, last: &str) -> serde_json::Value {
    json!({
        "id": id,
        "createdAt": "2022-01-10T08:00:00Z",
        "updatedAt": "2022-01-11T09:00:00Z",
        "archived": false,
        "properties": {
            "firstname": first,
            "lastname": last,
            "email": format!("{}@example.com", first.to_lowercase()),
            "phone": "555-0100",
            "company": "Initech",
            "website": "https://initech.example"
        }
    })
}

#[tokio::test]
async fn list_contacts_first_page_overfetches_by_one() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("limit", "3"))
        .and(header("authorization", "Bearer hs-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                hs_contact("201", "Ada", "Lovelace"),
                hs_contact("202", "Brian", "Kernighan"),
                hs_contact("203", "Carol", "Shaw"),
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = connector.list_contacts(2, None).await.unwrap();

    assert_eq!(page.edges.len(), 2);
    assert!(page.page_info.has_next_page);
    assert_eq!(
        page.page_info.end_cursor.as_deref(),
        Some(encode_cursor("202").as_str())
    );
    assert_eq!(page.edges[0].node.company_name.as_deref(), Some("Initech"));
    assert_eq!(page.edges[0].node.archived, Some(false));
}

#[tokio::test]
async fn list_contacts_after_drops_the_echoed_record() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    // Inclusive backend: the `after` record comes back as the first row,
    // so the over-fetch buffer is two.
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("after", "201"))
        .and(query_param("limit", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                hs_contact("201", "Ada", "Lovelace"),
                hs_contact("202", "Brian", "Kernighan"),
                hs_contact("203", "Carol", "Shaw"),
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let after = encode_cursor("201");
    let page = connector.list_contacts(2, Some(after)).await.unwrap();

    let ids: Vec<&str> = page.edges.iter().map(|edge| edge.node.id.as_str()).collect();
    assert_eq!(ids, vec!["202", "203"]);
    assert!(!page.page_info.has_next_page);
    assert_eq!(
        page.page_info.start_cursor.as_deref(),
        Some(encode_cursor("202").as_str())
    );
}

#[tokio::test]
async fn invalid_cursor_and_page_size_are_rejected() {
    let connector = hubspot_connector("http://127.0.0.1:1");

    let result = connector.list_contacts(2, Some("not@base64!".to_string())).await;
    assert!(matches!(result, Err(ConnectError::InvalidArgument(_))));

    let result = connector.list_contacts(-1, None).await;
    assert!(matches!(result, Err(ConnectError::InvalidArgument(_))));
}

#[tokio::test]
async fn get_contact_maps_404_to_not_found() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts/999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": "error",
            "message": "resource not found",
            "correlationId": "aaaa-bbbb",
            "category": "OBJECT_NOT_FOUND"
        })))
        .mount(&mock_server)
        .await;

    let result = connector.get_contact("999").await;
    assert!(matches!(result, Err(ConnectError::NotFound(_))));
}

#[tokio::test]
async fn backend_error_carries_status_and_message() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts/201"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "status": "error",
            "message": "Rate limit exceeded",
            "correlationId": "cccc-dddd",
            "category": "RATE_LIMITS"
        })))
        .mount(&mock_server)
        .await;

    let result = connector.get_contact("201").await;
    match result {
        Err(ConnectError::Backend { status, message }) => {
            assert_eq!(status, 429);
            assert!(message.contains("Rate limit exceeded"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn secret_auth_401_is_a_backend_error_not_a_refresh() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    // Secret-auth connectors have no refresh protocol: a 401 surfaces
    // directly and the request is not retried.
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts/201"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "error",
            "message": "The access token is invalid",
            "category": "INVALID_AUTHENTICATION"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = connector.get_contact("201").await;
    assert!(matches!(
        result,
        Err(ConnectError::Backend { status: 401, .. })
    ));
}

#[tokio::test]
async fn create_contact_sends_only_set_properties() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts"))
        .and(body_json(json!({
            "properties": {
                "firstname": "Ada",
                "email": "ada@example.com"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(hs_contact("210", "Ada", "Lovelace")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let input = ContactInput {
        first_name: Some("Ada".to_string()),
        email: Some("ada@example.com".to_string()),
        ..ContactInput::default()
    };
    let contact = connector.create_contact(&input).await.unwrap();

    assert_eq!(contact.id, "210");
    assert_eq!(contact.name.as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn list_notes_walks_associations_then_fetches_each_note() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts/201/associations/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "301", "type": "note_to_contact"},
                {"id": "302", "type": "note_to_contact"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    for (note_id, body) in [("301", "First call"), ("302", "Second call")] {
        Mock::given(method("GET"))
            .and(path(format!("/crm/v3/objects/notes/{}", note_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": note_id,
                "updatedAt": "2022-01-11T09:00:00Z",
                "archived": false,
                "properties": {
                    "hs_note_body": body,
                    "hs_createdate": "2022-01-10T08:00:00Z"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let notes = connector.list_contact_notes("201").await.unwrap();

    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].content, "First call");
    assert_eq!(notes[1].content, "Second call");
    assert!(notes[0].created_at.is_some());
    assert!(notes[0].updated_at.is_some());
}

#[tokio::test]
async fn create_note_associates_with_its_parent() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/notes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "305",
            "properties": {"hs_note_body": "Renewal discussion"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/crm/v3/objects/notes/305/associations/contacts/201/note_to_contact"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let note = connector
        .create_contact_note(
            "201",
            &NoteInput {
                content: "Renewal discussion".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(note.id, "305");
    assert_eq!(note.content, "Renewal discussion");
}

#[tokio::test]
async fn failed_association_deletes_the_orphan_note_and_surfaces_the_error() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/notes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "305",
            "properties": {"hs_note_body": "Renewal discussion"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/crm/v3/objects/notes/305/associations/deals/401/note_to_deal"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "status": "error",
            "message": "association backend unavailable"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The orphan note is cleaned up before the error surfaces.
    Mock::given(method("DELETE"))
        .and(path("/crm/v3/objects/notes/305"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = connector
        .create_opportunity_note(
            "401",
            &NoteInput {
                content: "Renewal discussion".to_string(),
            },
        )
        .await;

    match result {
        Err(ConnectError::Backend { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("association backend unavailable"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn list_opportunities_requests_deal_properties() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/deals"))
        .and(query_param(
            "properties",
            "amount,closedate,dealname,dealstage,hubspot_owner_id,pipeline",
        ))
        .and(query_param("limit", "11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "401",
                "properties": {
                    "amount": "1500.00",
                    "closedate": "2022-06-30T00:00:00Z",
                    "dealname": "Renewal",
                    "dealstage": "appointmentscheduled",
                    "pipeline": "default"
                }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = connector.list_opportunities(10, None).await.unwrap();

    assert_eq!(page.edges.len(), 1);
    assert!(!page.page_info.has_next_page);
    let deal = &page.edges[0].node;
    assert_eq!(deal.name, "Renewal");
    assert_eq!(deal.amount.as_deref(), Some("1500.00"));
    assert!(deal.close_date.is_some());
}

#[tokio::test]
async fn date_parse_failure_keeps_the_record() {
    let mock_server = MockServer::start().await;
    let connector = hubspot_connector(&mock_server.uri());

    let mut record = hs_contact("201", "Ada", "Lovelace");
    record["createdAt"] = json!("01/10/2022 08:00");

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts/201"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(&mock_server)
        .await;

    let contact = connector.get_contact("201").await.unwrap();

    // The malformed timestamp degrades to absent; the record survives.
    assert_eq!(contact.id, "201");
    assert_eq!(contact.created_at, None);
    assert!(contact.updated_at.is_some());
}
