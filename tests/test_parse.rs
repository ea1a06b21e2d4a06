use apib::sections::{AttrValue, Requirement};
use apib::{Blueprint, ParseError, ParseOptions};

fn parse(doc: &str) -> Blueprint {
    Blueprint::parse_with(
        doc,
        ParseOptions {
            report_warnings: false,
            implicit_actions: true,
        },
    )
    .unwrap()
}

const PING: &str = "FORMAT: 1A\n\n# Hello\n\nWelcome.\n\n## GET /ping\n\n+ Response 200 (text/plain)\n\n        pong\n";

#[test]
fn test_minimal_document() {
    let bp = parse(PING);
    assert_eq!(bp.name(), "Hello");
    assert_eq!(bp.format(), "1A");
    assert_eq!(bp.overview(), Some("<p>Welcome.</p>"));

    assert_eq!(bp.len(), 1);
    let group = bp.iter().next().unwrap();
    assert_eq!(group.name(), None);

    assert_eq!(bp.count_resources(), 1);
    let resource = bp.resources().next().unwrap();
    assert_eq!(resource.request_method(), Some("GET"));
    assert_eq!(resource.uri_template().unwrap().as_str(), "/ping");

    assert_eq!(bp.count_actions(), 1);
    let action = bp.actions().next().unwrap();
    assert_eq!(action.request_method(), Some("GET"));
    assert_eq!(action.uri_template().unwrap().as_str(), "/ping");

    let responses: Vec<_> = action.responses().collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].http_code(), 200);
    assert_eq!(responses[0].media_type(), Some(("text", "plain")));
    assert_eq!(responses[0].body().unwrap().content, "pong");
}

#[test]
fn test_blueprint_display() {
    let bp = parse(PING);
    insta::assert_snapshot!(
        bp.to_string(),
        @r#"Blueprint "Hello", format 1A, with 1 resource groups (1 resources, 1 actions)"#
    );
}

#[test]
fn test_group_with_parameters() {
    let doc = "FORMAT: 1A\n\n# API\n\n# Group Users\n\n## /users/{id}\n\n+ Parameters\n    + id (number, required) - The id\n\n### GET\n\n+ Response 200\n";
    let bp = parse(doc);

    let group = bp.get("Users").unwrap().as_group().unwrap();
    assert_eq!(group.name(), Some("Users"));
    assert_eq!(group.len(), 1);

    let resource = group.iter().next().unwrap();
    assert_eq!(resource.uri_template().unwrap().as_str(), "/users/{id}");
    let id = resource.parameters().unwrap().get("id").unwrap();
    assert_eq!(id.type_name(), "number");
    assert_eq!(id.required(), Requirement::Required);
    assert_eq!(id.description(), Some("The id"));

    let action = resource.iter().next().unwrap();
    assert_eq!(action.request_method(), Some("GET"));
    assert_eq!(action.uri_template().unwrap().as_str(), "/users/{id}");
}

#[test]
fn test_data_structures() {
    let doc = "FORMAT: 1A\n\n# API\n\nintro\n\n# Data Structures\n\n## Coord (object)\n\n+ x: 1 (number)\n+ y: 2 (number)\n";
    let bp = parse(doc);

    let coord = &bp.data_structures()["Coord"];
    assert_eq!(coord.name(), Some("Coord"));
    assert_eq!(coord.type_name(), "object");
    let AttrValue::List(children) = coord.value().unwrap() else {
        panic!("expected child attributes");
    };
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].name(), Some("x"));
    assert_eq!(children[0].value(), Some(&AttrValue::Text("1".to_string())));
    assert_eq!(children[1].name(), Some("y"));
    assert_eq!(children[1].value(), Some(&AttrValue::Text("2".to_string())));
}

#[test]
fn test_source_order_is_preserved() {
    let doc = "FORMAT: 1A\n\n# API\n\n## /zebra\n\n### GET\n\n+ Response 200\n\n## Group Beta\n\n### /b2\n\n#### GET\n\n+ Response 200\n\n### /b1\n\n#### POST\n\n+ Response 200\n\n## Group Alpha\n\n### /a\n\n#### DELETE\n\n+ Response 204\n";
    let bp = parse(doc);

    let names: Vec<_> = bp.group_names().collect();
    assert_eq!(names, vec![None, Some("Beta"), Some("Alpha")]);

    let resources: Vec<_> = bp.resources().map(|r| r.id()).collect();
    assert_eq!(resources, vec!["/zebra", "/b2", "/b1", "/a"]);

    let methods: Vec<_> = bp
        .actions()
        .map(|a| a.request_method().unwrap().to_string())
        .collect();
    assert_eq!(methods, vec!["GET", "GET", "POST", "DELETE"]);
}

#[test]
fn test_method_and_template_inheritance() {
    let doc = "FORMAT: 1A\n\n# API\n\n## /things\n\n### GET\n\n+ Response 200\n\n### Create [POST /things/new]\n\n+ Response 201\n";
    let bp = parse(doc);

    let actions: Vec<_> = bp.actions().collect();
    // Inherited from the resource.
    assert_eq!(actions[0].uri_template().unwrap().as_str(), "/things");
    assert_eq!(actions[0].request_method(), Some("GET"));
    // Declared on the action itself.
    assert_eq!(actions[1].uri_template().unwrap().as_str(), "/things/new");
    assert_eq!(actions[1].request_method(), Some("POST"));
    assert_eq!(actions[1].name(), Some("Create"));
    assert_eq!(actions[1].to_string(), "Action Create [POST /things/new]");
}

#[test]
fn test_requests_inherit_action_attributes() {
    let doc = "FORMAT: 1A\n\n# API\n\n## /jobs\n\n### POST\n\n+ Attributes\n    + name\n\n+ Request (application/json)\n\n        {}\n\n+ Response 201\n";
    let bp = parse(doc);

    let action = bp.actions().next().unwrap();
    let attributes = action.attributes().unwrap();
    assert_eq!(attributes.len(), 1);
    let request = action.requests().next().unwrap();
    assert_eq!(request.attributes(), Some(attributes));
    // The request had no declared name.
    assert_eq!(request.name(), Some("#0"));
}

#[test]
fn test_resource_description_keeps_unknown_bullets() {
    let doc = "FORMAT: 1A\n\n# API\n\n## /misc\n\nSome text.\n\n+ Unknownsection here\n+ Parameters\n    + q (string)\n\n### GET\n\n+ Response 200\n";
    let bp = parse(doc);

    let resource = bp.resources().next().unwrap();
    assert!(resource.parameters().is_some());
    let description = resource.description().unwrap();
    assert!(description.starts_with("<p>Some text.</p>"));
    assert!(description.contains("<ul>"));
    assert!(description.contains("Unknownsection here"));
    assert!(description.ends_with("</ul>"));
}

#[test]
fn test_relation_section() {
    let doc = "FORMAT: 1A\n\n# API\n\n## /items\n\n### GET\n\n+ Relation: self\n+ Response 200\n";
    let bp = parse(doc);
    let action = bp.actions().next().unwrap();
    assert_eq!(action.relation().unwrap().link_id, "self");
}

#[test]
fn test_empty_resource_is_skipped_with_warning() {
    let doc = "FORMAT: 1A\n\n# API\n\n# Group Things\n\n## /empty\n\n# Group Others\n\n## /full\n\n### GET\n\n+ Response 200\n";
    let bp = parse(doc);
    assert_eq!(bp.get("Things").unwrap().as_group().unwrap().len(), 0);
    assert_eq!(bp.get("Others").unwrap().as_group().unwrap().len(), 1);
    assert!(
        bp.warnings()
            .iter()
            .any(|w| w.message.contains("skipping empty resource"))
    );
}

#[test]
fn test_too_short_document() {
    assert!(matches!(
        Blueprint::parse("FORMAT: 1A\n"),
        Err(ParseError::TooShort)
    ));
}

#[test]
fn test_missing_metadata_colon() {
    assert!(matches!(
        Blueprint::parse("FORMAT 1A\n\n# N\n\ntext\n"),
        Err(ParseError::InvalidMetadata(_))
    ));
}

#[test]
fn test_missing_format_entry() {
    assert!(matches!(
        Blueprint::parse("HOST: http://x\n\n# N\n\ntext\n"),
        Err(ParseError::MissingFormat)
    ));
}

#[test]
fn test_missing_name_heading() {
    assert!(matches!(
        Blueprint::parse("FORMAT: 1A\n\nsecond paragraph\n\nthird\n"),
        Err(ParseError::MissingName)
    ));
}

#[test]
fn test_from_tree() {
    // The structural parser also accepts a prebuilt element tree.
    let doc = "FORMAT: 1A\n\n# API\n\n# Thing [/thing]\n\n## GET\n\n+ Response 200 (text/plain)\n\n        ok\n";
    let mut root = apib::tree::parse_document(doc);
    apib::preprocess::unwrap_titles(&mut root);
    let bp = Blueprint::from_tree(
        &root,
        ParseOptions {
            report_warnings: false,
            implicit_actions: true,
        },
    )
    .unwrap();
    assert_eq!(bp.name(), "API");
    assert_eq!(bp.count_actions(), 1);
    assert_eq!(bp.actions().next().unwrap().uri(), Some("/thing"));
}

#[test]
fn test_backquotes_are_stripped_everywhere() {
    let doc = "FORMAT: 1A\n\n# `Hello`\n\nWelcome.\n\n## GET /ping\n\n+ Response 200 (text/plain)\n\n        pong\n";
    let bp = parse(doc);
    assert_eq!(bp.name(), "Hello");
}
