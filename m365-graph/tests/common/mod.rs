#![allow(dead_code)]

use m365_graph::{GraphClient, GraphConfig, RetryConfig, StaticToken};
use std::sync::Arc;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// Retries without real waiting.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 2,
        retry_after_floor_ms: 1,
    }
}

pub fn client(server: &MockServer) -> GraphClient {
    let config = GraphConfig {
        base_url: server.uri(),
        api_version: "beta".to_string(),
        timeout_secs: 5,
        retry: fast_retry(),
    };
    GraphClient::new(config, Arc::new(StaticToken::new(TOKEN))).unwrap()
}
