use pretty_assertions::assert_eq;
use protorec_compiler::{
    error::SchemaError,
    parser::{parse_schema, parse_schema_with, ParseOptions},
    types::{FieldType, Label, ScalarKind},
};

fn field_shapes(text: &str) -> Vec<(String, i32, FieldType, Label)> {
    let schema = parse_schema(text, "shapes.proto").expect("parse_schema failed");
    schema.messages[0]
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.number, f.type_.clone(), f.label))
        .collect()
}

#[test]
fn test_single_line_message_has_both_fields() {
    let schema = parse_schema("message M { string name = 1; int32 age = 2; }", "m.proto")
        .expect("parse_schema failed");

    assert_eq!(schema.messages.len(), 1);
    let message = &schema.messages[0];
    assert_eq!(message.name, "M");
    assert_eq!(message.fields.len(), 2);
    assert_eq!(message.fields[0].name, "name");
    assert_eq!(message.fields[0].number, 1);
    assert_eq!(message.fields[0].type_, FieldType::Scalar(ScalarKind::String));
    assert_eq!(message.fields[1].name, "age");
    assert_eq!(message.fields[1].number, 2);
    assert_eq!(message.fields[1].type_, FieldType::Scalar(ScalarKind::Int32));
}

#[test]
fn test_single_line_and_multi_line_forms_agree() {
    let single = field_shapes("message M { string name = 1; int32 age = 2; }");
    let multi = field_shapes(
        r#"
        message M {
            string name = 1;
            int32 age = 2;
        }
        "#,
    );
    assert_eq!(single, multi);

    let split_braces = field_shapes("message M\n{\n  string name = 1; int32 age\n = 2; }");
    assert_eq!(single, split_braces);
}

#[test]
fn test_parse_file_header() {
    let input = r#"
    // leading comment
    syntax = "proto3";
    package acme.billing.v1;

    import "acme/common.proto";
    import public "acme/money.proto";
    import weak "acme/legacy.proto";
    option java_package = "com.acme.billing";
    "#;

    let schema = parse_schema(input, "acme/billing.proto").expect("parse_schema failed");
    assert_eq!(schema.name, "acme/billing.proto");
    assert_eq!(schema.syntax.as_deref(), Some("proto3"));
    assert_eq!(schema.package.as_deref(), Some("acme.billing.v1"));
    assert_eq!(
        schema.import_paths(),
        vec!["acme/common.proto", "acme/money.proto", "acme/legacy.proto"]
    );
    assert_eq!(schema.imports[0].public, false);
    assert_eq!(schema.imports[1].public, true);
    assert_eq!(schema.imports[2].public, false);
}

#[test]
fn test_parse_nested_declarations() {
    let input = r#"
    message Outer {
        message Inner {
            repeated string tags = 1;
        }
        enum Mode { MODE_OFF = 0; MODE_ON = 1; }

        Inner inner = 1;
        Mode mode = 2 [deprecated = true];
        map<string, Inner> by_name = 3;
        optional bytes blob = 4;
        reserved 5, 6;
        reserved "old";

        oneof choice {
            string text = 7;
            Inner nested = 8;
        }
    }
    "#;

    let schema = parse_schema(input, "outer.proto").expect("parse_schema failed");
    let outer = &schema.messages[0];

    assert_eq!(outer.messages.len(), 1);
    assert_eq!(outer.messages[0].name, "Inner");
    assert_eq!(outer.messages[0].fields[0].label, Label::Repeated);

    assert_eq!(outer.enums.len(), 1);
    assert_eq!(outer.enums[0].values.len(), 2);

    assert_eq!(outer.fields.len(), 4);
    assert_eq!(outer.fields[0].type_, FieldType::Named("Inner".to_string()));
    assert_eq!(outer.fields[1].is_deprecated, true);
    assert_eq!(outer.fields[0].is_deprecated, false);
    assert_eq!(
        outer.fields[2].type_,
        FieldType::Map(ScalarKind::String, Box::new(FieldType::Named("Inner".to_string())))
    );
    assert_eq!(outer.fields[3].label, Label::Singular);
    assert_eq!(outer.fields[3].type_, FieldType::Scalar(ScalarKind::Bytes));

    assert_eq!(outer.oneofs.len(), 1);
    let choice = &outer.oneofs[0];
    assert_eq!(choice.name, "choice");
    assert_eq!(
        choice.fields.iter().map(|f| f.number).collect::<Vec<_>>(),
        vec![7, 8]
    );
    assert_eq!(outer.all_fields().count(), 6);
}

#[test]
fn test_parse_enum_values() {
    let input = r#"
    enum Code {
        option allow_alias = true;
        CODE_ZERO = 0;
        CODE_NEG = -1;
        CODE_HEX = 0x10;
        CODE_OCT = 010;
        CODE_ALIAS = 0 [deprecated = true];
        reserved 20 to 30;
    }
    "#;

    let schema = parse_schema(input, "code.proto").expect("parse_schema failed");
    let values: Vec<(&str, i32)> = schema.enums[0]
        .values
        .iter()
        .map(|v| (v.name.as_str(), v.number))
        .collect();
    assert_eq!(
        values,
        vec![
            ("CODE_ZERO", 0),
            ("CODE_NEG", -1),
            ("CODE_HEX", 16),
            ("CODE_OCT", 8),
            ("CODE_ALIAS", 0),
        ]
    );
}

#[test]
fn test_empty_enum_is_an_error() {
    let err = parse_schema("enum Nothing {}", "e.proto").unwrap_err();
    assert!(matches!(err, SchemaError::ParseError { line: 1, .. }));
}

#[test]
fn test_empty_oneof_is_an_error() {
    let err = parse_schema("message M { oneof pick { } }", "o.proto").unwrap_err();
    assert!(matches!(err, SchemaError::ParseError { .. }));
}

#[test]
fn test_parse_service() {
    let input = r#"
    service Billing {
        option (acme.audited) = true;
        rpc Charge (ChargeRequest) returns (ChargeReply);
        rpc Watch (WatchRequest) returns (stream acme.Event) {
            option deadline = 5;
        }
        rpc Upload (stream Chunk) returns (UploadReply) {}
    }
    "#;

    let schema = parse_schema(input, "svc.proto").expect("parse_schema failed");
    let methods = &schema.services[0].methods;
    assert_eq!(methods.len(), 3);

    assert_eq!(methods[0].name, "Charge");
    assert_eq!(methods[0].input_type, "ChargeRequest");
    assert_eq!(methods[0].output_type, "ChargeReply");
    assert_eq!((methods[0].client_streaming, methods[0].server_streaming), (false, false));

    assert_eq!(methods[1].output_type, "acme.Event");
    assert_eq!((methods[1].client_streaming, methods[1].server_streaming), (false, true));

    assert_eq!(methods[2].input_type, "Chunk");
    assert_eq!((methods[2].client_streaming, methods[2].server_streaming), (true, false));
}

#[test]
fn test_malformed_field_is_skipped() {
    let input = "message M { int32 = 1; string ok = 2; int64 big = 536870912; }";
    let schema = parse_schema(input, "m.proto").expect("parse_schema failed");

    let fields = &schema.messages[0].fields;
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name, "ok");
}

#[test]
fn test_malformed_field_is_rejected_in_strict_mode() {
    let options = ParseOptions { strict_fields: true };
    let err = parse_schema_with("message M {\n  int32 = 1;\n}", "m.proto", &options).unwrap_err();

    match err {
        SchemaError::ParseError { file, line, column, .. } => {
            assert_eq!(file, "m.proto");
            assert_eq!(line, 2);
            assert_eq!(column, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_invalid_map_key_is_a_malformed_field() {
    let options = ParseOptions { strict_fields: true };
    let err = parse_schema_with("message M { map<double, string> m = 1; }", "m.proto", &options)
        .unwrap_err();
    assert!(err.to_string().contains("map key"));
}

#[test]
fn test_top_level_garbage_reports_position() {
    let err = parse_schema("syntax = \"proto3\";\n\nbanana Split {}", "bad.proto").unwrap_err();

    assert_eq!(err.file(), Some("bad.proto"));
    match err {
        SchemaError::ParseError { line, column, msg, .. } => {
            assert_eq!(line, 3);
            assert_eq!(column, 1);
            assert!(msg.contains("banana"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_duplicate_package_is_an_error() {
    let err = parse_schema("package a;\npackage b;", "p.proto").unwrap_err();
    assert!(matches!(err, SchemaError::ParseError { line: 2, .. }));
}

#[test]
fn test_unterminated_message_is_an_error() {
    let err = parse_schema("message M { string name = 1;", "m.proto").unwrap_err();
    assert!(matches!(err, SchemaError::ParseError { .. }));
}

#[test]
fn test_comments_inside_blocks() {
    let input = r#"
    message M { /* inline */ string name = 1; // trailing
        /* multi
           line */
        int32 age = 2; }
    "#;
    let schema = parse_schema(input, "m.proto").expect("parse_schema failed");
    assert_eq!(schema.messages[0].fields.len(), 2);
}
