use m365_model::{Attribute, AttributeKind, AttributeMode, ResourceSchema};

fn policy_schema() -> ResourceSchema {
    ResourceSchema::new(
        "device_configuration",
        vec![
            Attribute::computed("id", AttributeKind::String),
            Attribute::required("display_name", AttributeKind::String),
            Attribute::optional("role_scope_tag_ids", AttributeKind::set(AttributeKind::String))
                .default_value(serde_json::json!(["0"])),
            Attribute::optional("odata_type", AttributeKind::String).graph_name("@odata.type"),
            Attribute::optional(
                "assignments",
                AttributeKind::list(AttributeKind::object(vec![Attribute::required(
                    "target",
                    AttributeKind::object(vec![Attribute::optional(
                        "group_id",
                        AttributeKind::String,
                    )]),
                )])),
            ),
            Attribute::optional(
                "windows10_custom",
                AttributeKind::derived(
                    "#microsoft.graph.windows10CustomConfiguration",
                    vec![Attribute::optional("oma_settings", AttributeKind::JsonString)],
                ),
            ),
        ],
    )
}

// ── AttributeMode ────────────────────────────────────────────────

#[test]
fn computed_is_not_writable() {
    assert!(!AttributeMode::Computed.is_writable());
    assert!(AttributeMode::Required.is_writable());
    assert!(AttributeMode::Optional.is_writable());
    assert!(AttributeMode::OptionalComputed.is_writable());
}

#[test]
fn default_value_makes_optional_computed() {
    let attr = Attribute::optional("enabled", AttributeKind::Bool)
        .default_value(serde_json::json!(true));
    assert_eq!(attr.mode, AttributeMode::OptionalComputed);
    let required = Attribute::required("name", AttributeKind::String)
        .default_value(serde_json::json!("x"));
    assert_eq!(required.mode, AttributeMode::Required);
}

// ── Graph names ──────────────────────────────────────────────────

#[test]
fn graph_key_is_camel_case_of_local_name() {
    let attr = Attribute::required("display_name", AttributeKind::String);
    assert_eq!(attr.graph_key(), "displayName");
    let attr = Attribute::optional("role_scope_tag_ids", AttributeKind::String);
    assert_eq!(attr.graph_key(), "roleScopeTagIds");
}

#[test]
fn graph_key_uses_override() {
    let attr = Attribute::optional("odata_type", AttributeKind::String).graph_name("@odata.type");
    assert_eq!(attr.graph_key(), "@odata.type");
}

#[test]
fn find_by_graph_key_prefers_override() {
    let schema = policy_schema();
    let root = schema.root();
    assert_eq!(root.find_by_graph_key("@odata.type").unwrap().name, "odata_type");
    assert_eq!(root.find_by_graph_key("displayName").unwrap().name, "display_name");
    assert!(root.find_by_graph_key("display_name").is_none());
    assert!(root.find_by_graph_key("unknownKey").is_none());
}

#[test]
fn derived_type_nodes_are_not_found_by_graph_key() {
    let schema = policy_schema();
    assert!(schema.root().find_by_graph_key("windows10Custom").is_none());
}

// ── Derived types ────────────────────────────────────────────────

#[test]
fn derived_type_lookup_by_tag() {
    let schema = policy_schema();
    let node = schema
        .root()
        .derived_type_for("#microsoft.graph.windows10CustomConfiguration")
        .unwrap();
    assert_eq!(node.name, "windows10_custom");
    assert!(schema.root().derived_type_for("#microsoft.graph.other").is_none());
    assert_eq!(schema.root().derived_types().count(), 1);
}

// ── ResourceSchema paths ─────────────────────────────────────────

#[test]
fn attribute_resolves_through_collections() {
    let schema = policy_schema();
    let attr = schema.attribute("assignments.target.group_id").unwrap();
    assert_eq!(attr.name, "group_id");
}

#[test]
fn attribute_resolves_into_derived_type() {
    let schema = policy_schema();
    let attr = schema.attribute("windows10_custom.oma_settings").unwrap();
    assert!(matches!(attr.kind, AttributeKind::JsonString));
}

#[test]
fn attribute_unknown_path_is_error() {
    let schema = policy_schema();
    assert!(schema.attribute("assignments.nope").is_err());
    assert!(schema.attribute("display_name.inner").is_err());
}

#[test]
fn type_name_is_kept() {
    assert_eq!(policy_schema().type_name(), "device_configuration");
}
