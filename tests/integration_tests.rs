//! End-to-end tests against a mocked GraphQL endpoint
//!
//! The API is a single POST endpoint, so mocks are routed by matching on
//! the query text inside the request body.

use serde_json::{json, Value};
use tap_pipefy::catalog::{self, Catalog};
use tap_pipefy::client::{ClientConfig, GraphQlClient};
use tap_pipefy::config::TapConfig;
use tap_pipefy::state::StateStore;
use tap_pipefy::sync::Synchronizer;
use tap_pipefy::Error;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn organization_body() -> Value {
    json!({
        "data": {
            "organization": {
                "name": "Acme",
                "created_at": "2019-01-01T00:00:00Z",
                "members": [
                    {
                        "user": {
                            "id": "7", "name": "Ada", "email": "ada@example.com",
                            "username": "ada", "created_at": "2019-02-01T00:00:00Z",
                            "avatarUrl": null, "timeZone": "UTC", "locale": "en"
                        },
                        "role_name": "admin"
                    }
                ],
                "only_admin_can_create_pipes": false,
                "only_admin_can_invite_users": false,
                "pipes": [
                    {
                        "id": "17", "name": "Hiring", "description": null,
                        "icon": null, "created_at": "2019-03-01T00:00:00Z",
                        "phases": [
                            {
                                "id": "ph1", "name": "Screen", "cards_count": 2,
                                "fields": [
                                    {"id": "f1", "type": "short_text", "required": true}
                                ]
                            },
                            {"id": "ph2", "name": "Offer", "cards_count": 0, "fields": []}
                        ]
                    }
                ],
                "tables": {
                    "edges": [
                        {
                            "node": {
                                "id": "T1", "name": "Vendors", "description": null,
                                "icon": null, "authorization": "read", "public": false,
                                "public_form": false, "table_records_count": 1,
                                "url": "https://example.com/t/T1",
                                "table_fields": [
                                    {"id": "name", "label": "Name", "type": "short_text",
                                     "description": null, "is_multiple": false,
                                     "unique": false, "required": false, "options": []},
                                    {"id": "due", "label": "Due", "type": "date",
                                     "description": null, "is_multiple": false,
                                     "unique": false, "required": false, "options": []}
                                ]
                            }
                        }
                    ]
                }
            }
        }
    })
}

fn cards_page(ids: &[&str], next_cursor: Option<&str>) -> Value {
    let edges: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({"node": {
                "id": id, "title": format!("Card {id}"),
                "assignees": [{"id": "7"}],
                "comments": [{"text": "note"}],
                "comments_count": 1,
                "current_phase": {"name": "Screen"},
                "done": false, "due_date": null,
                "fields": [{"name": "Priority", "value": "High", "updated_at": null}],
                "labels": [], "phases_history": [],
                "url": format!("https://example.com/c/{id}")
            }})
        })
        .collect();
    json!({"data": {"cards": {
        "edges": edges,
        "pageInfo": {
            "hasNextPage": next_cursor.is_some(),
            "endCursor": next_cursor.unwrap_or("")
        }
    }}})
}

fn table_rows_page() -> Value {
    json!({"data": {"table_records": {
        "edges": [
            {"node": {
                "id": "4418", "title": "Vendor A",
                "url": "https://example.com/r/4418",
                "created_at": "2020-03-01T00:00:00Z",
                "updated_at": "2020-03-02T00:00:00Z",
                "due_date": null, "finished_at": null,
                "created_by": {"id": "7"},
                "record_fields": [
                    {"filled_at": null, "updated_at": null, "required": false,
                     "name": "Name", "value": "Vendor A", "array_value": null,
                     "field": {"id": "name", "type": "short_text"}},
                    {"filled_at": null, "updated_at": null, "required": false,
                     "name": "Due", "value": "2020-06-01T10:00:00-03:00", "array_value": null,
                     "field": {"id": "due", "type": "date"}}
                ]
            }}
        ],
        "pageInfo": {"hasNextPage": false, "endCursor": ""}
    }}})
}

async fn mount_organization(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("organization("))
        .respond_with(ResponseTemplate::new(200).set_body_json(organization_body()))
        .mount(server)
        .await;
}

async fn mount_table_rows(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("table_records("))
        .respond_with(ResponseTemplate::new(200).set_body_json(table_rows_page()))
        .mount(server)
        .await;
}

fn test_client(server: &MockServer) -> GraphQlClient {
    let config = ClientConfig {
        base_url: server.uri(),
        ..ClientConfig::default()
    };
    GraphQlClient::new("test-token", config).unwrap()
}

fn test_config(server: &MockServer) -> TapConfig {
    TapConfig::from_json(&format!(
        r#"{{"personal_access_token": "test-token", "organization_id": 42,
             "base_url": "{}"}}"#,
        server.uri()
    ))
    .unwrap()
}

/// Flip the selection flags for one stream and a set of its fields
fn select(catalog: &mut Catalog, stream_id: &str, fields: &[&str]) {
    let entry = catalog
        .streams
        .iter_mut()
        .find(|s| s.tap_stream_id == stream_id)
        .unwrap_or_else(|| panic!("stream {stream_id} not in catalog"));
    entry.schema.selected = true;
    for (name, property) in &mut entry.schema.properties {
        if fields.is_empty() || fields.contains(&name.as_str()) {
            property.selected = true;
        }
    }
}

async fn run_sync(server: &MockServer, catalog: &Catalog) -> (Vec<Value>, Result<(), Error>) {
    let client = test_client(server);
    let config = test_config(server);
    let mut output = Vec::new();
    let synchronizer = Synchronizer::new(
        &client,
        &config,
        catalog,
        &mut output,
        StateStore::in_memory(),
    );
    let result = synchronizer.run().await.map(|_| ());
    let messages = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    (messages, result)
}

fn records_for<'a>(messages: &'a [Value], stream: &str) -> Vec<&'a Value> {
    messages
        .iter()
        .filter(|m| m["type"] == "RECORD" && m["stream"] == stream)
        .map(|m| &m["record"])
        .collect()
}

#[tokio::test]
async fn test_discovery_end_to_end() {
    let server = MockServer::start().await;
    mount_organization(&server).await;

    let client = test_client(&server);
    let catalog = catalog::discover(&client, 42).await.unwrap();

    // Eleven fixed streams plus one per dynamic table
    assert_eq!(catalog.streams.len(), 12);
    assert!(catalog.get_stream("members").is_some());
    assert!(catalog.get_stream("cards").is_some());

    let table = catalog.get_stream("table_T1").unwrap();
    assert_eq!(table.key_properties, vec!["_record_id".to_string()]);
    let props = &table.schema.properties;
    assert!(props.contains_key("name"));
    assert!(props["due"].is_datetime());
    assert!(!props["name"].is_datetime());
    assert!(props.contains_key("id"));
    assert!(props.contains_key("_record_id"));
    assert!(props.contains_key("table_id"));

    // Nothing is selected out of the box
    assert!(catalog.selected_streams().is_empty());
}

#[tokio::test]
async fn test_discovery_failure_emits_no_partial_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "permission denied"}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = catalog::discover(&client, 42).await.unwrap_err();
    assert!(matches!(err, Error::CatalogIncomplete { .. }));
}

#[tokio::test]
async fn test_sync_message_ordering_and_field_filtering() {
    let server = MockServer::start().await;
    mount_organization(&server).await;
    mount_table_rows(&server).await;

    let client = test_client(&server);
    let mut catalog = catalog::discover(&client, 42).await.unwrap();
    select(&mut catalog, "members", &["id", "name"]);
    select(&mut catalog, "table_T1", &[]);

    let (messages, result) = run_sync(&server, &catalog).await;
    result.unwrap();

    // Per stream: SCHEMA, then RECORDs, then STATE; streams in catalog order
    let shape: Vec<(&str, &str)> = messages
        .iter()
        .map(|m| {
            (
                m["type"].as_str().unwrap(),
                m["stream"].as_str().unwrap_or(""),
            )
        })
        .collect();
    assert_eq!(
        shape,
        vec![
            ("SCHEMA", "members"),
            ("RECORD", "members"),
            ("STATE", ""),
            ("SCHEMA", "table_T1"),
            ("RECORD", "table_T1"),
            ("STATE", ""),
        ]
    );

    // Unselected fields appear in neither schema nor records
    let member_schema = &messages[0]["schema"]["properties"];
    assert!(member_schema.get("email").is_none());
    let member = records_for(&messages, "members")[0];
    assert_eq!(member["id"], "7");
    assert_eq!(member["name"], "Ada");
    assert!(member.get("email").is_none());

    // Table row: key column hoisted, datetime normalized to UTC
    let row = records_for(&messages, "table_T1")[0];
    assert_eq!(row["_record_id"], 4418);
    assert_eq!(row["created_by_id"], "7");
    assert_eq!(row["table_id"], "T1");
    assert_eq!(row["due"], "2020-06-01T13:00:00Z");

    // Final state records both streams as completed
    let state = messages.last().unwrap();
    assert_eq!(
        state["value"]["completed_streams"],
        json!(["members", "table_T1"])
    );
}

#[tokio::test]
async fn test_card_pagination_yields_every_item_once() {
    let server = MockServer::start().await;
    mount_organization(&server).await;

    // The page-two mock must be mounted first: its matcher is stricter
    Mock::given(method("POST"))
        .and(body_string_contains("cards("))
        .and(body_string_contains("after:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cards_page(&["c3"], None)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("cards("))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(cards_page(&["c1", "c2"], Some("CUR1"))),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut catalog = catalog::discover(&client, 42).await.unwrap();
    select(&mut catalog, "cards", &[]);

    let (messages, result) = run_sync(&server, &catalog).await;
    result.unwrap();

    let ids: Vec<&str> = records_for(&messages, "cards")
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);

    // Every card carries its pipe's id
    for record in records_for(&messages, "cards") {
        assert_eq!(record["pipe_id"], "17");
    }
}

#[tokio::test]
async fn test_card_children_carry_parent_reference() {
    let server = MockServer::start().await;
    mount_organization(&server).await;
    Mock::given(method("POST"))
        .and(body_string_contains("cards("))
        .respond_with(ResponseTemplate::new(200).set_body_json(cards_page(&["c1"], None)))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut catalog = catalog::discover(&client, 42).await.unwrap();
    select(&mut catalog, "card_assignees", &[]);
    select(&mut catalog, "card_comments", &[]);
    select(&mut catalog, "card_fields", &[]);

    let (messages, result) = run_sync(&server, &catalog).await;
    result.unwrap();

    let assignees = records_for(&messages, "card_assignees");
    assert_eq!(assignees.len(), 1);
    assert_eq!(assignees[0]["card_id"], "c1");
    assert_eq!(assignees[0]["id"], "7");

    let comments = records_for(&messages, "card_comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["card_id"], "c1");

    let fields = records_for(&messages, "card_fields");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["card_id"], "c1");
    assert_eq!(fields[0]["name"], "Priority");
    assert_eq!(fields[0]["value"], "High");
}

#[tokio::test]
async fn test_fatal_error_on_one_stream_does_not_stop_others() {
    let server = MockServer::start().await;
    mount_organization(&server).await;
    mount_table_rows(&server).await;
    Mock::given(method("POST"))
        .and(body_string_contains("cards("))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut catalog = catalog::discover(&client, 42).await.unwrap();
    select(&mut catalog, "members", &[]);
    select(&mut catalog, "cards", &[]);
    select(&mut catalog, "table_T1", &[]);

    let (messages, result) = run_sync(&server, &catalog).await;

    // The run reports the failure but only after finishing the others
    let err = result.unwrap_err();
    match &err {
        Error::SyncFailed { failed, streams } => {
            assert_eq!(*failed, 1);
            assert!(streams.contains("cards"));
        }
        other => panic!("expected SyncFailed, got {other}"),
    }

    assert_eq!(records_for(&messages, "members").len(), 1);
    assert_eq!(records_for(&messages, "table_T1").len(), 1);
    assert!(records_for(&messages, "cards").is_empty());

    // Checkpoints exist for the streams that completed, never for cards
    let state = messages
        .iter()
        .filter(|m| m["type"] == "STATE")
        .next_back()
        .unwrap();
    let completed = state["value"]["completed_streams"].as_array().unwrap();
    assert!(completed.contains(&json!("members")));
    assert!(completed.contains(&json!("table_T1")));
    assert!(!completed.contains(&json!("cards")));
}

#[tokio::test]
async fn test_sync_is_idempotent_per_stream() {
    let server = MockServer::start().await;
    mount_organization(&server).await;
    mount_table_rows(&server).await;

    let client = test_client(&server);
    let mut catalog = catalog::discover(&client, 42).await.unwrap();
    select(&mut catalog, "members", &[]);
    select(&mut catalog, "pipe_phases", &[]);
    select(&mut catalog, "table_T1", &[]);

    let (first, r1) = run_sync(&server, &catalog).await;
    let (second, r2) = run_sync(&server, &catalog).await;
    r1.unwrap();
    r2.unwrap();

    for stream in ["members", "pipe_phases", "table_T1"] {
        let a: Vec<&Value> = records_for(&first, stream);
        let b: Vec<&Value> = records_for(&second, stream);
        assert_eq!(a, b, "stream {stream} differed between runs");
    }
}

#[tokio::test]
async fn test_completed_streams_are_skipped_on_resume() {
    let server = MockServer::start().await;
    mount_organization(&server).await;

    let client = test_client(&server);
    let mut catalog = catalog::discover(&client, 42).await.unwrap();
    select(&mut catalog, "members", &[]);
    select(&mut catalog, "pipes", &[]);

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::write(
        &state_path,
        r#"{"completed_streams": ["members"]}"#,
    )
    .unwrap();

    let config = test_config(&server);
    let mut output = Vec::new();
    let synchronizer = Synchronizer::new(
        &client,
        &config,
        &catalog,
        &mut output,
        StateStore::load(&state_path).unwrap(),
    );
    synchronizer.run().await.unwrap();

    let messages: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    // members was already done: no schema and no records for it this run
    assert!(!messages
        .iter()
        .any(|m| m["type"] == "SCHEMA" && m["stream"] == "members"));
    assert_eq!(records_for(&messages, "pipes").len(), 1);

    // The saved state now includes both
    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(saved["completed_streams"], json!(["members", "pipes"]));
}

#[tokio::test]
async fn test_pipe_hierarchy_flattens_into_three_streams() {
    let server = MockServer::start().await;
    mount_organization(&server).await;

    let client = test_client(&server);
    let mut catalog = catalog::discover(&client, 42).await.unwrap();
    select(&mut catalog, "pipes", &[]);
    select(&mut catalog, "pipe_phases", &[]);
    select(&mut catalog, "phase_fields", &[]);

    let (messages, result) = run_sync(&server, &catalog).await;
    result.unwrap();

    assert_eq!(records_for(&messages, "pipes").len(), 1);
    let phases = records_for(&messages, "pipe_phases");
    assert_eq!(phases.len(), 2);
    assert!(phases.iter().all(|p| p["pipe_id"] == "17"));

    let fields = records_for(&messages, "phase_fields");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["phase_id"], "ph1");
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_organization(&server).await;

    let config = ClientConfig {
        base_url: server.uri(),
        initial_backoff: std::time::Duration::from_millis(1),
        ..ClientConfig::default()
    };
    let client = GraphQlClient::new("test-token", config).unwrap();
    let catalog = catalog::discover(&client, 42).await.unwrap();
    assert_eq!(catalog.streams.len(), 12);
}
