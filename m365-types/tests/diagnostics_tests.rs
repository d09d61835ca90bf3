use m365_types::{AttrPath, Diagnostics, Severity};

#[test]
fn empty_diagnostics_has_no_error() {
    let diags = Diagnostics::new();
    assert!(diags.is_empty());
    assert!(!diags.has_error());
}

#[test]
fn warnings_do_not_count_as_errors() {
    let mut diags = Diagnostics::new();
    diags.add_warning("resource not found", "removing from state");
    assert!(!diags.has_error());
    assert_eq!(diags.warnings().count(), 1);
}

#[test]
fn attribute_error_keeps_path() {
    let mut diags = Diagnostics::new();
    diags.add_attribute_error(AttrPath::attr("display_name"), "invalid value", "");
    let entry = diags.errors().next().unwrap();
    assert_eq!(entry.severity, Severity::Error);
    assert_eq!(entry.path, Some(AttrPath::attr("display_name")));
    assert_eq!(entry.to_string(), "error: invalid value (at display_name)");
}

#[test]
fn extend_preserves_order() {
    let mut first = Diagnostics::new();
    first.add_warning("one", "");
    let mut second = Diagnostics::new();
    second.add_error("two", "");
    first.extend(second);
    let summaries: Vec<&str> = first.iter().map(|d| d.summary.as_str()).collect();
    assert_eq!(summaries, vec!["one", "two"]);
    assert!(first.has_error());
}

#[test]
fn serde_roundtrip() {
    let mut diags = Diagnostics::new();
    diags.add_attribute_warning(AttrPath::parse("a[1]").unwrap(), "w", "detail");
    let json = serde_json::to_string(&diags).unwrap();
    let back: Diagnostics = serde_json::from_str(&json).unwrap();
    assert_eq!(back, diags);
}
