//! Authenticated JSON client for Microsoft Graph.

use crate::auth::TokenProvider;
use crate::blob::BlobUploader;
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::odata::ODataError;
use crate::retry::send_with_retry;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A validated response.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphResponse {
    pub status: u16,
    /// Parsed body; `None` for empty bodies such as `204 No Content`.
    pub body: Option<Value>,
}

impl GraphResponse {
    /// The body, or JSON null when there is none.
    pub fn into_body(self) -> Value {
        self.body.unwrap_or(Value::Null)
    }
}

/// Client for Graph requests.
///
/// Every request takes the list of statuses the caller accepts; anything
/// else becomes [`GraphError::Status`] with the parsed OData error.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    config: GraphConfig,
    token: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    pub fn new(config: GraphConfig, token: Arc<dyn TokenProvider>) -> GraphResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GraphError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            token,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Resolves a URI relative to the versioned Graph root. Absolute URIs,
    /// such as `@odata.nextLink` values, are used unchanged.
    pub fn url(&self, uri: &str) -> String {
        if uri.starts_with("https://") || uri.starts_with("http://") {
            uri.to_string()
        } else {
            format!("{}/{}", self.config.root(), uri.trim_start_matches('/'))
        }
    }

    /// An uploader sharing this client's connection pool and retry policy.
    pub fn blob_uploader(&self, block_size: usize) -> BlobUploader {
        BlobUploader::new(self.http.clone(), self.config.retry.clone(), block_size)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        valid_statuses: &[u16],
    ) -> GraphResult<GraphResponse> {
        let url = self.url(uri);
        let token = self.token.token().await?;
        debug!(method = %method, uri = %url, "graph request");

        let response = send_with_retry(&self.config.retry, &url, || {
            let request = self.http.request(method.clone(), &url).bearer_auth(&token);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await
        .map_err(|e| GraphError::Network(format!("{method} {url}: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GraphError::Network(format!("{method} {url}: reading body: {e}")))?;

        if !valid_statuses.contains(&status) {
            let error = ODataError::parse(status, &text);
            let request_body = if error.is_bad_request() {
                body.map(Value::to_string)
            } else {
                None
            };
            debug!(status, code = %error.code, "graph request rejected");
            return Err(GraphError::Status {
                method: method.to_string(),
                uri: url,
                status,
                error,
                request_body,
            });
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };
        Ok(GraphResponse { status, body })
    }

    pub async fn get(&self, uri: &str, valid_statuses: &[u16]) -> GraphResult<GraphResponse> {
        self.request(Method::GET, uri, None, valid_statuses).await
    }

    pub async fn post(&self, uri: &str, body: &Value, valid_statuses: &[u16]) -> GraphResult<GraphResponse> {
        self.request(Method::POST, uri, Some(body), valid_statuses).await
    }

    pub async fn patch(&self, uri: &str, body: &Value, valid_statuses: &[u16]) -> GraphResult<GraphResponse> {
        self.request(Method::PATCH, uri, Some(body), valid_statuses).await
    }

    pub async fn put(&self, uri: &str, body: &Value, valid_statuses: &[u16]) -> GraphResult<GraphResponse> {
        self.request(Method::PUT, uri, Some(body), valid_statuses).await
    }

    pub async fn delete(&self, uri: &str, valid_statuses: &[u16]) -> GraphResult<GraphResponse> {
        self.request(Method::DELETE, uri, None, valid_statuses).await
    }
}
