#![allow(dead_code)]

use async_trait::async_trait;
use m365_graph::{GraphClient, GraphConfig, RetryConfig, StaticToken};
use m365_model::{Attribute, AttributeKind, ResourceSchema};
use m365_provider::{ActionContext, ContentConfig, MemoryPrivateState, Operation, ProviderConfig, Sleeper};
use m365_types::TypedValue;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// Records requested delays without waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub fn graph_config(server: &MockServer) -> GraphConfig {
    GraphConfig {
        base_url: server.uri(),
        api_version: "beta".to_string(),
        timeout_secs: 5,
        retry: RetryConfig::disabled(),
    }
}

pub fn client(server: &MockServer) -> GraphClient {
    GraphClient::new(graph_config(server), Arc::new(StaticToken::new(TOKEN))).unwrap()
}

pub fn provider_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        graph: graph_config(server),
        content: ContentConfig {
            block_size: 16,
            ..ContentConfig::default()
        },
        serialize_writes_settle_ms: 50,
    }
}

pub fn obj(attrs: Vec<(&str, TypedValue)>) -> TypedValue {
    TypedValue::object(attrs)
}

pub fn s(value: &str) -> TypedValue {
    TypedValue::string(value)
}

fn assignment_target() -> AttributeKind {
    AttributeKind::object(vec![
        Attribute::optional(
            "group",
            AttributeKind::derived(
                "#microsoft.graph.groupAssignmentTarget",
                vec![Attribute::required("group_id", AttributeKind::String)],
            ),
        ),
        Attribute::optional(
            "all_devices",
            AttributeKind::derived("#microsoft.graph.allDevicesAssignmentTarget", vec![]),
        ),
    ])
}

/// A device configuration with nested assignments and referenced
/// members.
pub fn policy_schema() -> ResourceSchema {
    ResourceSchema::new(
        "m365_device_configuration",
        vec![
            Attribute::computed("id", AttributeKind::String),
            Attribute::required("display_name", AttributeKind::String),
            Attribute::optional("description", AttributeKind::String),
            Attribute::optional("version", AttributeKind::Number),
            Attribute::optional(
                "assignments",
                AttributeKind::set(AttributeKind::object(vec![
                    Attribute::computed("id", AttributeKind::String),
                    Attribute::required("target", assignment_target()),
                ])),
            ),
            Attribute::optional(
                "members",
                AttributeKind::set(AttributeKind::object(vec![
                    Attribute::required("id", AttributeKind::String),
                    Attribute::optional(
                        "user",
                        AttributeKind::derived("#microsoft.graph.user", vec![]),
                    ),
                    Attribute::optional(
                        "group",
                        AttributeKind::derived("#microsoft.graph.group", vec![]),
                    ),
                ])),
            ),
        ],
    )
}

/// An assignment nested under a policy.
pub fn assignment_schema() -> ResourceSchema {
    ResourceSchema::new(
        "m365_device_configuration_assignment",
        vec![
            Attribute::computed("id", AttributeKind::String),
            Attribute::required("policy_id", AttributeKind::String),
            Attribute::required("target", assignment_target()),
        ],
    )
}

/// A Win32 app with a local content attribute.
pub fn app_schema() -> ResourceSchema {
    ResourceSchema::new(
        "m365_mobile_app",
        vec![
            Attribute::computed("id", AttributeKind::String),
            Attribute::required("display_name", AttributeKind::String),
            Attribute::computed("committed_content_version", AttributeKind::String),
            Attribute::optional(
                "win32_lob_app",
                AttributeKind::derived(
                    "#microsoft.graph.win32LobApp",
                    vec![Attribute::optional("setup_file_path", AttributeKind::String)],
                ),
            ),
            Attribute::optional(
                "windows_universal_app_x",
                AttributeKind::derived(
                    "#microsoft.graph.windowsUniversalAppX",
                    vec![
                        Attribute::optional_computed("identity_name", AttributeKind::String),
                        Attribute::optional_computed("identity_publisher_hash", AttributeKind::String),
                        Attribute::optional_computed("identity_version", AttributeKind::String),
                    ],
                ),
            ),
            Attribute::optional(
                "content",
                AttributeKind::object(vec![
                    Attribute::required("source_file", AttributeKind::String),
                    Attribute::optional_computed("source_sha256", AttributeKind::String),
                ]),
            ),
        ],
    )
}

pub const POLICY_URI: &str = "deviceManagement/deviceConfigurations/p1";

/// Owns what an [`ActionContext`] borrows.
pub struct Harness {
    pub client: GraphClient,
    pub schema: ResourceSchema,
    pub config: ProviderConfig,
    pub sleeper: Arc<RecordingSleeper>,
    pub private: MemoryPrivateState,
}

impl Harness {
    pub fn new(server: &MockServer, schema: ResourceSchema) -> Self {
        Self {
            client: client(server),
            schema,
            config: provider_config(server),
            sleeper: RecordingSleeper::new(),
            private: MemoryPrivateState::new(),
        }
    }

    pub fn ctx<'a>(
        &'a mut self,
        operation: Operation,
        plan: Option<&'a TypedValue>,
        state: Option<&'a TypedValue>,
        entity_uri: Option<&str>,
    ) -> ActionContext<'a> {
        ActionContext {
            operation,
            client: &self.client,
            schema: &self.schema,
            config: &self.config,
            sleeper: self.sleeper.as_ref(),
            plan,
            state,
            entity_uri: entity_uri.map(str::to_string),
            private: &mut self.private,
            diagnostics: Default::default(),
        }
    }
}

/// `"METHOD /path"` of every request the server saw, in arrival order.
pub async fn requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

/// JSON bodies of the requests to `path` that carried one, in arrival
/// order.
pub async fn bodies(server: &MockServer, path: &str) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == path && !r.body.is_empty())
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}
