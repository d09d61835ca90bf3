//! Create, read, update, delete and list calls.
//!
//! Thin wrappers over [`GraphClient`] fixing the accepted statuses of each
//! operation.

use crate::client::GraphClient;
use crate::error::{GraphError, GraphResult};
use crate::uri::{ExtraRequest, QueryOptions};
use serde_json::Value;
use tracing::debug;

/// POSTs `body` to a collection and returns the created entity.
pub async fn create(client: &GraphClient, collection_uri: &str, body: &Value) -> GraphResult<Value> {
    let response = client.post(collection_uri, body, &[200, 201]).await?;
    Ok(response.into_body())
}

/// GETs one entity, then merges the result of each extra request into it.
pub async fn read(
    client: &GraphClient,
    entity_uri: &str,
    query: &QueryOptions,
    extra_requests: &[ExtraRequest],
) -> GraphResult<Value> {
    let mut entity = client.get(&query.apply(entity_uri), &[200]).await?.into_body();
    if extra_requests.is_empty() {
        return Ok(entity);
    }

    let Some(object) = entity.as_object_mut() else {
        return Err(GraphError::UnexpectedResponse(format!(
            "{entity_uri} did not return an object"
        )));
    };
    for extra in extra_requests {
        let uri = format!("{}/{}", entity_uri, extra.uri_suffix.trim_start_matches('/'));
        let mut body = client.get(&uri, &[200]).await?.into_body();
        let merged = if body.get("value").is_some_and(Value::is_array) {
            body["value"].take()
        } else {
            body
        };
        debug!(attribute = %extra.attribute, "merged extra request");
        object.insert(extra.attribute.clone(), merged);
    }
    Ok(entity)
}

/// PATCHes (or PUTs, when `replace` is set) `body` onto an entity.
///
/// Returns the response body when Graph sends one.
pub async fn update(
    client: &GraphClient,
    entity_uri: &str,
    body: &Value,
    replace: bool,
) -> GraphResult<Option<Value>> {
    let response = if replace {
        client.put(entity_uri, body, &[200, 204]).await?
    } else {
        client.patch(entity_uri, body, &[200, 204]).await?
    };
    Ok(response.body)
}

pub async fn delete(client: &GraphClient, entity_uri: &str) -> GraphResult<()> {
    client.delete(entity_uri, &[200, 204]).await?;
    Ok(())
}

/// GETs a collection, following `@odata.nextLink` until exhausted.
pub async fn list(client: &GraphClient, collection_uri: &str, query: &QueryOptions) -> GraphResult<Vec<Value>> {
    let mut items = Vec::new();
    let mut next = Some(query.apply(collection_uri));
    let mut pages = 0usize;

    while let Some(uri) = next.take() {
        let mut page = client.get(&uri, &[200]).await?.into_body();
        pages += 1;
        match page.get_mut("value").map(Value::take) {
            Some(Value::Array(values)) => items.extend(values),
            _ => {
                return Err(GraphError::UnexpectedResponse(format!(
                    "{uri} did not return a collection"
                )));
            }
        }
        next = page
            .get("@odata.nextLink")
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    debug!(uri = collection_uri, pages, items = items.len(), "listed collection");
    Ok(items)
}
