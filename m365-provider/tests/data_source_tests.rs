mod common;

use common::{obj, s};
use m365_graph::EntityUri;
use m365_model::{Attribute, AttributeKind, ResourceSchema};
use m365_provider::{PluralDataSource, SingularDataSource};
use m365_types::TypedValue;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APPS: &str = "/beta/deviceAppManagement/mobileApps";

fn app_schema() -> ResourceSchema {
    ResourceSchema::new(
        "m365_mobile_app",
        vec![
            Attribute::optional_computed("id", AttributeKind::String),
            Attribute::optional_computed("display_name", AttributeKind::String),
            Attribute::optional_computed("publisher", AttributeKind::String),
            Attribute::optional_computed("is_featured", AttributeKind::Bool),
        ],
    )
}

fn apps_schema() -> ResourceSchema {
    ResourceSchema::new(
        "m365_mobile_apps",
        vec![
            Attribute::optional("filter", AttributeKind::String),
            Attribute::computed(
                "apps",
                AttributeKind::list(AttributeKind::object(vec![
                    Attribute::computed("id", AttributeKind::String),
                    Attribute::computed("display_name", AttributeKind::String),
                ])),
            ),
        ],
    )
}

fn singular() -> SingularDataSource {
    SingularDataSource::new(app_schema(), EntityUri::new("deviceAppManagement/mobileApps"))
        .lookup_by("display_name")
        .lookup_by("publisher")
        .lookup_by("is_featured")
}

fn lookup(id: TypedValue, display_name: TypedValue) -> TypedValue {
    obj(vec![
        ("id", id),
        ("display_name", display_name),
        ("publisher", TypedValue::Null),
        ("is_featured", TypedValue::Unknown),
    ])
}

fn notes(id: &str) -> TypedValue {
    obj(vec![
        ("id", s(id)),
        ("display_name", s("O'Brien Notes")),
        ("publisher", s("Contoso")),
        ("is_featured", TypedValue::Bool(false)),
    ])
}

async fn mock_app(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{APPS}/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.type": "#microsoft.graph.win32LobApp",
            "id": id,
            "displayName": "O'Brien Notes",
            "publisher": "Contoso",
            "isFeatured": false
        })))
        .mount(server)
        .await;
}

async fn mock_matches(server: &MockServer, ids: &[&str]) {
    let value: Vec<_> = ids.iter().map(|id| json!({"id": id})).collect();
    Mock::given(method("GET"))
        .and(path(APPS))
        .and(query_param("$filter", "displayName eq 'O''Brien Notes'"))
        .and(query_param("$select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": value})))
        .expect(1)
        .mount(server)
        .await;
}

// ── Singular ────────────────────────────────────────────────────

#[test]
fn lookup_filter_joins_configured_attributes() {
    let config = obj(vec![
        ("id", TypedValue::Null),
        ("display_name", s("Notes")),
        ("publisher", s("Contoso")),
        ("is_featured", TypedValue::Bool(true)),
    ]);
    assert_eq!(
        singular().lookup_filter(&config).unwrap().as_deref(),
        Some("displayName eq 'Notes' and publisher eq 'Contoso' and isFeatured eq true")
    );
    assert_eq!(singular().lookup_filter(&lookup(TypedValue::Null, TypedValue::Unknown)).unwrap(), None);
}

#[tokio::test]
async fn singular_reads_by_id() {
    let server = MockServer::start().await;
    mock_app(&server, "a1").await;

    let response = singular()
        .read(&common::client(&server), &lookup(s("a1"), TypedValue::Null))
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.state, notes("a1"));
    assert_eq!(common::requests(&server).await, vec![format!("GET {APPS}/a1")]);
}

#[tokio::test]
async fn singular_looks_up_by_escaped_filter() {
    let server = MockServer::start().await;
    mock_matches(&server, &["a2"]).await;
    mock_app(&server, "a2").await;

    let response = singular()
        .read(&common::client(&server), &lookup(TypedValue::Null, s("O'Brien Notes")))
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.state, notes("a2"));
}

#[tokio::test]
async fn singular_without_match_is_an_error() {
    let server = MockServer::start().await;
    mock_matches(&server, &[]).await;

    let response = singular()
        .read(&common::client(&server), &lookup(TypedValue::Null, s("O'Brien Notes")))
        .await;

    assert_eq!(response.state, TypedValue::Null);
    let error = response.diagnostics.errors().next().unwrap();
    assert_eq!(error.summary, "Reading m365_mobile_app failed");
    assert!(error.detail.starts_with("not found: no m365_mobile_app matches"), "{}", error.detail);
}

#[tokio::test]
async fn singular_with_several_matches_is_an_error() {
    let server = MockServer::start().await;
    mock_matches(&server, &["a1", "a2"]).await;

    let response = singular()
        .read(&common::client(&server), &lookup(TypedValue::Null, s("O'Brien Notes")))
        .await;

    assert_eq!(response.state, TypedValue::Null);
    assert!(response.diagnostics.errors().next().unwrap().detail.contains("2 m365_mobile_app entities"));
}

#[tokio::test]
async fn singular_needs_an_id_or_a_lookup_value() {
    let server = MockServer::start().await;

    let response = singular()
        .read(&common::client(&server), &lookup(TypedValue::Null, TypedValue::Null))
        .await;

    let error = response.diagnostics.errors().next().unwrap();
    assert!(error.detail.contains("one of id, display_name, publisher, is_featured must be set"));
    assert!(common::requests(&server).await.is_empty());
}

// ── Plural ──────────────────────────────────────────────────────

#[tokio::test]
async fn plural_lists_every_page_into_the_result_attribute() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(APPS))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "a3", "displayName": "Paint"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(APPS))
        .and(query_param("$filter", "isAssigned eq true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "a1", "displayName": "Notes", "publisher": "Contoso"},
                {"id": "a2", "displayName": "Mail"}
            ],
            "@odata.nextLink": format!("{}{APPS}?$skiptoken=page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data_source = PluralDataSource::new(apps_schema(), EntityUri::new("deviceAppManagement/mobileApps"), "apps");
    let config = obj(vec![("filter", s("isAssigned eq true")), ("apps", TypedValue::Unknown)]);
    let response = data_source.read(&common::client(&server), &config).await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let app = |id: &str, name: &str| obj(vec![("id", s(id)), ("display_name", s(name))]);
    assert_eq!(
        response.state,
        obj(vec![
            ("filter", s("isAssigned eq true")),
            (
                "apps",
                TypedValue::List(vec![app("a1", "Notes"), app("a2", "Mail"), app("a3", "Paint")]),
            ),
        ])
    );
}

#[tokio::test]
async fn plural_failure_reports_and_clears_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(APPS))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "BadRequest", "message": "Invalid filter clause"}
        })))
        .mount(&server)
        .await;

    let data_source = PluralDataSource::new(apps_schema(), EntityUri::new("deviceAppManagement/mobileApps"), "apps");
    let config = obj(vec![("filter", s("nonsense")), ("apps", TypedValue::Unknown)]);
    let response = data_source.read(&common::client(&server), &config).await;

    assert_eq!(response.state, TypedValue::Null);
    let error = response.diagnostics.errors().next().unwrap();
    assert_eq!(error.summary, "Listing m365_mobile_apps failed");
    assert!(error.detail.contains("Invalid filter clause"));
}

#[tokio::test]
async fn plural_rejects_a_non_list_result_attribute() {
    let server = MockServer::start().await;
    let data_source = PluralDataSource::new(apps_schema(), EntityUri::new("deviceAppManagement/mobileApps"), "filter");
    let response = data_source.read(&common::client(&server), &obj(vec![])).await;
    assert!(response.diagnostics.has_error());
    assert!(common::requests(&server).await.is_empty());
}
