//! Provider configuration.

use m365_graph::GraphConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Overrides the Graph base URL.
pub const ENV_BASE_URL: &str = "M365_GRAPH_BASE_URL";
/// Overrides the Graph API version segment.
pub const ENV_API_VERSION: &str = "M365_GRAPH_API_VERSION";

/// Top-level configuration shared by every resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub graph: GraphConfig,
    pub content: ContentConfig,
    /// Wait after acquiring a contended per-resource-type write lock.
    pub serialize_writes_settle_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            content: ContentConfig::default(),
            serialize_writes_settle_ms: 3_000,
        }
    }
}

impl ProviderConfig {
    /// Defaults, with the Graph endpoint taken from the environment when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(base_url) = env_value(ENV_BASE_URL) {
            config.graph.base_url = base_url;
        }
        if let Some(api_version) = env_value(ENV_API_VERSION) {
            config.graph.api_version = api_version;
        }
        config
    }

    pub fn serialize_writes_settle(&self) -> Duration {
        Duration::from_millis(self.serialize_writes_settle_ms)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Timing of the mobile app content upload.
///
/// The delays compensate for eventual consistency in the Intune backend
/// and are tunable rather than fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Azure block size in bytes.
    pub block_size: usize,
    pub upload_state_poll_ms: u64,
    pub publishing_state_poll_ms: u64,
    /// Wait before creating a content version.
    pub pre_create_delay_ms: u64,
    /// Wait after acquiring a contended upload lock.
    pub lock_settle_delay_ms: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            block_size: 4 * 1024 * 1024,
            upload_state_poll_ms: 500,
            publishing_state_poll_ms: 200,
            pre_create_delay_ms: 1_000,
            lock_settle_delay_ms: 3_000,
        }
    }
}

impl ContentConfig {
    pub fn upload_state_poll(&self) -> Duration {
        Duration::from_millis(self.upload_state_poll_ms)
    }

    pub fn publishing_state_poll(&self) -> Duration {
        Duration::from_millis(self.publishing_state_poll_ms)
    }

    pub fn pre_create_delay(&self) -> Duration {
        Duration::from_millis(self.pre_create_delay_ms)
    }

    pub fn lock_settle_delay(&self) -> Duration {
        Duration::from_millis(self.lock_settle_delay_ms)
    }
}
