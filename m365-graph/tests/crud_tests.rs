mod common;

use m365_graph::{ExtraRequest, QueryOptions, crud};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APPS: &str = "deviceAppManagement/mobileApps";

#[tokio::test]
async fn create_returns_the_new_entity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/deviceAppManagement/mobileApps"))
        .and(body_json(json!({"displayName": "7-Zip"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "a1", "displayName": "7-Zip"})))
        .expect(1)
        .mount(&server)
        .await;

    let created = crud::create(&common::client(&server), APPS, &json!({"displayName": "7-Zip"}))
        .await
        .unwrap();
    assert_eq!(created["id"], "a1");
}

#[tokio::test]
async fn read_applies_query_and_merges_extra_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/deviceAppManagement/mobileApps/a1"))
        .and(query_param("$expand", "categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a1", "displayName": "7-Zip"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta/deviceAppManagement/mobileApps/a1/assignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "ignored",
            "value": [{"id": "as1", "intent": "required"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = QueryOptions {
        expand: Some("categories".to_string()),
        ..QueryOptions::default()
    };
    let extra = [ExtraRequest {
        attribute: "assignments".to_string(),
        uri_suffix: "assignments".to_string(),
    }];
    let entity = crud::read(&common::client(&server), &format!("{APPS}/a1"), &query, &extra)
        .await
        .unwrap();

    assert_eq!(
        entity,
        json!({
            "id": "a1",
            "displayName": "7-Zip",
            "assignments": [{"id": "as1", "intent": "required"}]
        })
    );
}

#[tokio::test]
async fn read_of_missing_entity_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/deviceAppManagement/mobileApps/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "ResourceNotFound", "message": "not found"}
        })))
        .mount(&server)
        .await;

    let err = crud::read(&common::client(&server), &format!("{APPS}/gone"), &QueryOptions::default(), &[])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_patches_by_default_and_puts_on_replace() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/beta/deviceAppManagement/mobileApps/a1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/beta/deviceAppManagement/mobileApps/a1"))
        .and(body_json(json!({"displayName": "7-Zip", "notes": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server);
    let uri = format!("{APPS}/a1");
    let patched = crud::update(&client, &uri, &json!({"displayName": "7-Zip"}), false)
        .await
        .unwrap();
    assert_eq!(patched, None);
    let replaced = crud::update(&client, &uri, &json!({"displayName": "7-Zip", "notes": null}), true)
        .await
        .unwrap();
    assert_eq!(replaced, Some(json!({"id": "a1"})));
}

#[tokio::test]
async fn delete_accepts_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/beta/deviceAppManagement/mobileApps/a1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    crud::delete(&common::client(&server), &format!("{APPS}/a1")).await.unwrap();
}

#[tokio::test]
async fn list_follows_next_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/deviceAppManagement/mobileApps"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{"id": "c"}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta/deviceAppManagement/mobileApps"))
        .and(query_param("$filter", "displayName eq 'O''Brien'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "a"}, {"id": "b"}],
            "@odata.nextLink": format!("{}/beta/deviceAppManagement/mobileApps?$skiptoken=page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = QueryOptions::filter(format!("displayName eq {}", m365_graph::odata_string("O'Brien")));
    let items = crud::list(&common::client(&server), APPS, &query).await.unwrap();
    let ids: Vec<_> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn list_rejects_non_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/deviceAppManagement/mobileApps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
        .mount(&server)
        .await;

    let err = crud::list(&common::client(&server), APPS, &QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, m365_graph::GraphError::UnexpectedResponse(_)));
}
