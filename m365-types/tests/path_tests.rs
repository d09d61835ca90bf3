use m365_types::{AttrPath, PathStep};

#[test]
fn parse_simple_attribute() {
    let path = AttrPath::parse("display_name").unwrap();
    assert_eq!(path.steps(), &[PathStep::Attr("display_name".into())]);
}

#[test]
fn parse_nested_with_indexes() {
    let path = AttrPath::parse("settings[2].children[0].value").unwrap();
    assert_eq!(
        path.steps(),
        &[
            PathStep::Attr("settings".into()),
            PathStep::Index(2),
            PathStep::Attr("children".into()),
            PathStep::Index(0),
            PathStep::Attr("value".into()),
        ]
    );
}

#[test]
fn parse_rejects_malformed() {
    assert!(AttrPath::parse("a..b").is_none());
    assert!(AttrPath::parse("a[x]").is_none());
    assert!(AttrPath::parse("a[1").is_none());
    assert!(AttrPath::parse("a[1]b").is_none());
}

#[test]
fn display_round_trips_dotted_form() {
    let text = "settings[2].value";
    assert_eq!(AttrPath::parse(text).unwrap().to_string(), text);
}

#[test]
fn display_root_and_map_key() {
    assert_eq!(AttrPath::root().to_string(), "<root>");
    let path = AttrPath::attr("labels").join_key("env");
    assert_eq!(path.to_string(), "labels[\"env\"]");
}

#[test]
fn schema_path_drops_indexes_and_keys() {
    let path = AttrPath::parse("settings[2].value").unwrap();
    assert_eq!(path.schema_path(), "settings.value");
    let keyed = AttrPath::attr("labels").join_key("env").join_attr("value");
    assert_eq!(keyed.schema_path(), "labels.value");
}

#[test]
fn parent_and_last() {
    let path = AttrPath::parse("a.b[1]").unwrap();
    assert_eq!(path.last(), Some(&PathStep::Index(1)));
    assert_eq!(path.parent().unwrap().to_string(), "a.b");
    assert!(AttrPath::root().parent().is_none());
}
