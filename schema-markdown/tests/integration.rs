//! Integration tests that parse complete fixture files end-to-end.

use pretty_assertions::assert_eq;
use schema_markdown::{Type, Types, UserType};
use serde_json::json;

fn fixtures_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture '{}': {}", path.display(), e))
}

fn widget_types() -> Types {
    schema_markdown::parse_schema_markdown_sources([
        ("common.smd", read_fixture("api/common.smd")),
        ("widgets.smd", read_fixture("api/widgets.smd")),
    ])
    .unwrap_or_else(|e| panic!("Widget fixtures should parse:\n{e}"))
}

#[test]
fn widget_fixtures_parse() {
    let types = widget_types();
    assert_eq!(
        types.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "Color",
            "Identifier",
            "SortOrder",
            "Widget",
            "WidgetKey",
            "getWidget",
            "getWidget_errors",
            "getWidget_output",
            "getWidget_path",
            "getWidget_query",
            "listWidgets",
            "listWidgets_output",
            "listWidgets_query",
        ]
    );

    let widget = types["Widget"].as_struct().expect("Widget should be a struct");
    assert_eq!(widget.doc, vec!["A widget"]);
    assert_eq!(widget.doc_group.as_deref(), Some("Widgets"));
    assert_eq!(widget.members.len(), 7);
    assert_eq!(widget.members[0].doc, vec!["The widget's identifier"]);
    match &widget.members[5].ty {
        Type::Dict(dict) => {
            assert_eq!(dict.key_type, Some(Type::User("Color".into())));
            assert_eq!(dict.attr.as_ref().and_then(|a| a.gte), Some(0.0));
        }
        other => panic!("Expected inventory to be a dict, got {other:?}"),
    }

    let colors = types["Color"].as_enum().expect("Color should be an enum");
    assert_eq!(
        colors.values.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        vec!["Red", "Green", "Blue", "Light Gray"]
    );

    assert_eq!(types["Identifier"].doc_group(), Some("Common"));
    assert!(types["WidgetKey"].as_struct().is_some_and(|s| s.union));
}

#[test]
fn widget_actions() {
    let types = widget_types();

    let get_widget = types["getWidget"].as_action().expect("getWidget should be an action");
    assert_eq!(get_widget.doc_group.as_deref(), Some("Widgets"));
    assert_eq!(get_widget.urls.len(), 1);
    assert_eq!(get_widget.urls[0].method.as_deref(), Some("GET"));
    assert_eq!(get_widget.urls[0].effective_path(get_widget), "/widgets/{id}");
    assert_eq!(get_widget.path.as_deref(), Some("getWidget_path"));
    assert_eq!(get_widget.query.as_deref(), Some("getWidget_query"));
    assert_eq!(get_widget.input, None);
    assert_eq!(get_widget.output.as_deref(), Some("getWidget_output"));
    assert_eq!(get_widget.errors.as_deref(), Some("getWidget_errors"));

    let output = types["getWidget_output"].as_struct().unwrap();
    assert_eq!(output.bases, vec!["Widget"]);
    let members = schema_markdown::struct_members(&types, output).unwrap();
    assert_eq!(members.len(), 7);

    // An empty `group` line ends the documentation group.
    let list_widgets = types["listWidgets"].as_action().unwrap();
    assert_eq!(list_widgets.doc_group, None);
    assert_eq!(list_widgets.urls[0].effective_path(list_widgets), "/listWidgets");
}

#[test]
fn widget_fixture_validates() {
    let types = widget_types();
    let value: serde_json::Value = serde_json::from_str(&read_fixture("widget.json")).unwrap();
    let widget = schema_markdown::validate_type(&types, "Widget", &value).unwrap();
    assert_eq!(
        widget,
        json!({
            "id": "w-1",
            "name": "Gear",
            "color": "Light Gray",
            "price": null,
            "inventory": {"Red": 4, "Blue": 0},
            "created": "2024-03-01T12:30:00Z"
        })
    );
}

#[test]
fn query_string_against_action_query() {
    let types = widget_types();

    let query = schema_markdown::decode_query_string("order=Descending&limit=25").unwrap();
    let validated = schema_markdown::validate_type(&types, "listWidgets_query", &query).unwrap();
    assert_eq!(validated, json!({"order": "Descending", "limit": 25}));
    assert_eq!(
        schema_markdown::encode_query_string(&validated),
        "limit=25&order=Descending"
    );

    let query = schema_markdown::decode_query_string("limit=0").unwrap();
    let err = schema_markdown::validate_type(&types, "listWidgets_query", &query).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid value 0 (type 'int') for member 'limit', expected type 'int' [> 0]"
    );
    assert_eq!(err.member.as_deref(), Some("limit"));
}

#[test]
fn widgets_alone_have_unknown_types() {
    let err = schema_markdown::parse_schema_markdown_sources([("widgets.smd", read_fixture("api/widgets.smd"))])
        .unwrap_err();
    let errors = err.errors();
    assert!(
        errors.contains(&"widgets.smd:9: error: Unknown type 'Identifier' from 'Widget' member 'id'".to_string()),
        "Unexpected errors: {errors:?}"
    );
    assert!(
        errors.contains(&"widgets.smd:69: error: Unknown type 'SortOrder' from 'listWidgets_query' member 'order'".to_string()),
        "Unexpected errors: {errors:?}"
    );
}

#[test]
fn invalid_fixture_reports_every_error() {
    let err = schema_markdown::parse_schema_markdown_sources([("invalid.smd", read_fixture("invalid.smd"))])
        .unwrap_err();
    assert_eq!(
        err.errors(),
        vec![
            "invalid.smd:5: error: Unknown type 'Missing' from 'Broken' member 'thing'",
            "invalid.smd:8: error: Invalid attribute '> 5' from 'Broken' member 'label'",
            "invalid.smd:10: error: Syntax error",
            "invalid.smd:12: error: Redefinition of type 'string'",
        ]
    );
}

#[test]
fn compiled_model_round_trips() {
    let model = schema_markdown::TypeModel {
        title: "Widgets".into(),
        types: widget_types(),
    };
    let value = serde_json::to_value(&model).unwrap();
    let loaded = schema_markdown::validate_type_model(&value).unwrap();
    assert_eq!(loaded, model);

    let referenced = schema_markdown::referenced_types(&model.types, "getWidget").unwrap();
    assert!(referenced.contains_key("Widget"));
    assert!(referenced.contains_key("Color"));
    assert!(!referenced.contains_key("SortOrder"));
    assert!(matches!(referenced["getWidget"], UserType::Action(_)));
}
