use apib::{Blueprint, MergeError, ParseOptions};

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

fn users() -> Blueprint {
    parse("FORMAT: 1A\n\n# Users API\n\nUser things.\n\n# Group Users\n\n## /users\n\n### GET\n\n+ Response 200\n")
}

fn admin() -> Blueprint {
    parse("FORMAT: 1A\n\n# Admin API\n\nAdmin things.\n\n# Group Admins\n\n## /admin\n\n### GET\n\n+ Response 200\n")
}

#[test]
fn test_merge_disjoint_groups() {
    let mut bp = users();
    bp.merge(&admin()).unwrap();

    assert_eq!(bp.name(), "Users API & Admin API");
    assert_eq!(
        bp.overview(),
        Some("<p>User things.</p>\n<p>Admin things.</p>")
    );
    let names: Vec<_> = bp.group_names().collect();
    assert_eq!(names, vec![Some("Users"), Some("Admins")]);
    assert_eq!(bp.count_resources(), 2);
    assert_eq!(bp.count_actions(), 2);

    // The trie is rebuilt over the merged graph.
    let lookup = bp.get("/admin:GET").unwrap();
    assert_eq!(lookup.as_actions().unwrap().len(), 1);

    // Parent links survive the merge.
    let group = bp.get("Admins").unwrap().as_group().unwrap();
    let resource = group.iter().next().unwrap();
    assert_eq!(resource.parent().unwrap().name(), Some("Admins"));
}

#[test]
fn test_merge_into_existing_group() {
    let mut bp = users();
    let other = parse("FORMAT: 1A\n\n# More\n\n# Group Users\n\n## /users/{id}\n\n### GET\n\n+ Response 200\n");
    bp.merge(&other).unwrap();

    assert_eq!(bp.len(), 1);
    let group = bp.get("Users").unwrap().as_group().unwrap();
    let ids: Vec<_> = group.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["/users", "/users/{id}"]);
}

#[test]
fn test_merge_new_action_into_existing_resource() {
    let mut bp = users();
    let other = parse("FORMAT: 1A\n\n# More\n\n# Group Users\n\n## /users\n\n### POST\n\n+ Response 201\n");
    bp.merge(&other).unwrap();

    let resource = bp.get(">Users>/users").unwrap().as_resource().unwrap();
    let methods: Vec<_> = resource
        .iter()
        .map(|a| a.request_method().unwrap())
        .collect();
    assert_eq!(methods, vec!["GET", "POST"]);
}

#[test]
fn test_merge_duplicate_action_refused() {
    let mut bp = users();
    let other = users();
    let err = bp.merge(&other).unwrap_err();
    assert!(matches!(err, MergeError::DuplicateAction(_)));
    // Nothing was merged.
    assert_eq!(bp.name(), "Users API");
    assert_eq!(bp.count_actions(), 1);
}

#[test]
fn test_merge_data_structure_collision_refused() {
    let ds_doc = "FORMAT: 1A\n\n# DS\n\ntext\n\n# Data Structures\n\n## Coord (object)\n\n+ x: 1 (number)\n";
    let mut bp = parse(ds_doc);
    let other = parse(ds_doc);
    assert!(matches!(
        bp.merge(&other).unwrap_err(),
        MergeError::DataStructureCollision(_)
    ));
}

#[test]
fn test_merge_copies_data_structures() {
    let mut bp = users();
    let other = parse("FORMAT: 1A\n\n# DS\n\ntext\n\n# Data Structures\n\n## Coord (object)\n\n+ x: 1 (number)\n");
    bp.merge(&other).unwrap();
    assert!(bp.data_structures().contains_key("Coord"));
}

#[test]
fn test_chained_merge_is_disjoint_union_in_order() {
    let mut bp = users();
    bp.merge(&admin()).unwrap();
    let third = parse("FORMAT: 1A\n\n# Audit API\n\nAudit things.\n\n# Group Audit\n\n## /audit\n\n### GET\n\n+ Response 200\n");
    bp.merge(&third).unwrap();

    let names: Vec<_> = bp.group_names().collect();
    assert_eq!(names, vec![Some("Users"), Some("Admins"), Some("Audit")]);
    assert_eq!(bp.count_actions(), 3);
    assert_eq!(bp.name(), "Users API & Admin API & Audit API");
    assert_eq!(bp.get("/").unwrap().as_actions().unwrap().len(), 3);
}
