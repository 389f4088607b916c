use ton_core::{
    parse, parse_with_options, serialize_with_options, validate_embedded, TonParseOptions,
    TonSerializeOptions, TonValueKind,
};

#[test]
fn test_pretty_round_trip_is_value_equal() {
    let source = "\
Person(1) {
    name = 'Ada Lovelace',
    age = 36,
    score = 99.5,
    active = true,
    id = 550e8400-e29b-41d4-a716-446655440000,
    status = |active|,
    permissions = |read|write|,
    tags = ['math', 'computing'],
    address = { city = 'London', zip = 'SW1' }
}";
    let doc = parse(source).unwrap();
    let pretty = serialize_with_options(&doc, TonSerializeOptions::pretty());
    let reparsed = parse(&pretty).unwrap();
    assert_eq!(doc.root, reparsed.root);
}

#[test]
fn test_compact_serialization_is_idempotent() {
    let source = "\
{
    name = 'test',
    version = 1.0,
    enabled = true,
    empty = [],
    missing = null,
    nested = Config { host = 'localhost', port = 8080 },
    tags = ['a', 'b', 'c']
}";
    let doc = parse(source).unwrap();
    let options = TonSerializeOptions::compact();
    let first = serialize_with_options(&doc, options.clone());
    let reparsed = parse(&first).unwrap();
    let second = serialize_with_options(&reparsed, options);
    assert_eq!(first, second);
}

#[test]
fn test_hex_and_binary_literals_equal_decimal() {
    let hex = parse("{ v = 0xFF }").unwrap();
    let dec = parse("{ v = 255 }").unwrap();
    assert_eq!(hex.root, dec.root);

    let bin = parse("{ v = 0b1010 }").unwrap();
    let ten = parse("{ v = 10 }").unwrap();
    assert_eq!(bin.root, ten.root);
}

#[test]
fn test_multiline_string_round_trip() {
    let source = "{ text = \"\"\"\n    first line\n      indented more\n    last line\n    \"\"\" }";
    let doc = parse(source).unwrap();
    assert_eq!(
        doc.get_path("text").unwrap().to_text(),
        "first line\n  indented more\nlast line"
    );

    let pretty = serialize_with_options(&doc, TonSerializeOptions::pretty());
    let reparsed = parse(&pretty).unwrap();
    assert_eq!(doc.root, reparsed.root);
}

#[test]
fn test_string_resembling_directives_round_trips() {
    let source = "{ text = \"\"\"\nfirst\n#! { (P) a = int }\n#@ tonVersion = '9'\n\"\"\" }";
    let doc = parse(source).unwrap();
    assert!(doc.schemas.is_empty());
    assert!(doc.header.is_none());

    let pretty = serialize_with_options(&doc, TonSerializeOptions::pretty());
    let reparsed = parse(&pretty).unwrap();
    assert_eq!(doc.root, reparsed.root);
    assert!(reparsed.schemas.is_empty());
}

#[test]
fn test_header_and_embedded_schema_end_to_end() {
    let source = "\
#@ tonVersion = '1'
#! enum(Status) [active, inactive, pending]
#! { (Server) host = string(required, nonEmpty),
#!   port = int(range(1, 65535)),
#!   status = enum:Status,
#!   tags = array:string(unique, maxCount(5)) }
(Server) {
    host = 'prod.example.com',
    port = 443,
    status = |active|,
    tags = ['web', 'tls']
}";
    let doc = parse(source).unwrap();
    assert_eq!(doc.header.as_ref().unwrap().ton_version(), Some("1"));
    assert!(doc.schemas.enum_definition("Status").is_some());

    let result = validate_embedded(&doc);
    assert!(result.is_valid, "unexpected errors: {:?}", result.errors);
}

#[test]
fn test_end_to_end_violations_are_located() {
    let source = "\
#! { (Server) host = string(required), port = int(range(1, 65535)), tags = array:string(minCount(1)) }
(Server) {
    port = 0,
    tags = []
}";
    let doc = parse(source).unwrap();
    let result = validate_embedded(&doc);
    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 3);

    let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["/host", "/port", "/tags"]);
    assert!(result.errors[2].message.contains("at least 1 elements"));
}

#[test]
fn test_document_paths_and_mutation() {
    let mut doc = parse("{ server = { ports = [80, 443] } }").unwrap();
    assert_eq!(doc.get_path("server/ports/1").unwrap().to_i64(), 443);

    let server = doc
        .as_object_mut()
        .unwrap()
        .get_mut("server")
        .unwrap()
        .as_object_mut()
        .unwrap();
    server.set("name", ton_core::TonValue::string("edge"));
    assert_eq!(doc.get_path("server/name").unwrap().to_text(), "edge");
}

#[test]
fn test_deeply_nested_document_within_limit() {
    let mut source = String::new();
    for _ in 0..20 {
        source.push_str("{ a = ");
    }
    source.push('1');
    for _ in 0..20 {
        source.push_str(" }");
    }
    assert!(parse(&source).is_ok());

    let shallow = TonParseOptions {
        max_nesting_depth: 10,
        ..TonParseOptions::default()
    };
    assert!(parse_with_options(&source, shallow).is_err());
}

#[test]
fn test_comments_everywhere() {
    let source = "\
// document comment
{
    /* block */ a = 1, // trailing
    b = /* inline */ 2
}";
    let doc = parse(source).unwrap();
    let obj = doc.as_object().unwrap();
    assert_eq!(obj.get("a").unwrap().to_i64(), 1);
    assert_eq!(obj.get("b").unwrap().to_i64(), 2);
}

#[test]
fn test_undefined_and_null_are_distinct() {
    let doc = parse("{ a = null, b = undefined }").unwrap();
    let obj = doc.as_object().unwrap();
    assert!(obj.get("a").unwrap().is_null());
    assert!(obj.get("b").unwrap().is_undefined());
    assert_ne!(obj.get("a").unwrap(), obj.get("b").unwrap());
}

#[test]
fn test_guid_survives_round_trip() {
    let doc = parse("{ id = 550E8400-E29B-41D4-A716-446655440000 }").unwrap();
    let compact = serialize_with_options(&doc, TonSerializeOptions::compact());
    let reparsed = parse(&compact).unwrap();
    match &reparsed.get_path("id").unwrap().kind {
        TonValueKind::Guid(g) => {
            assert_eq!(g.to_string(), "550e8400-e29b-41d4-a716-446655440000");
        }
        other => panic!("expected a GUID, got {other:?}"),
    }
}

#[test]
fn test_empty_enum_set_round_trip() {
    let doc = parse("{ flags = || }").unwrap();
    let compact = serialize_with_options(&doc, TonSerializeOptions::compact());
    assert_eq!(compact, "{flags = ||}");
    assert_eq!(parse(&compact).unwrap().root, doc.root);
}
