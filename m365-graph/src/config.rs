//! Transport configuration.

use serde::{Deserialize, Serialize};

/// Where and how to reach Microsoft Graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Base URL without the version segment.
    pub base_url: String,
    /// API version segment (`beta` or `v1.0`).
    pub api_version: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com".to_string(),
            api_version: "beta".to_string(),
            timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl GraphConfig {
    /// Root of every relative request URI, e.g. `https://graph.microsoft.com/beta`.
    pub fn root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

/// Bounded retries with jittered exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Lower bound applied to a server-advertised `Retry-After`.
    pub retry_after_floor_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            retry_after_floor_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}
