use pretty_assertions::assert_eq;
use protorec_compiler::{
    compile_protos,
    config::{CompilerConfig, NamespaceMode},
    error::SchemaError,
    loader::MemoryLoader,
    Compiler,
};
use std::collections::BTreeMap;
use std::fs;

const SHOP: &str = r#"
syntax = "proto3";
package shop;

import "google/protobuf/timestamp.proto";

enum Status {
    STATUS_UNKNOWN = 0;
    STATUS_OPEN = 1;
}

message Order {
    message Line { string sku = 1; uint32 qty = 2; }

    string id = 1;
    Status status = 2;
    google.protobuf.Timestamp created = 3;
    repeated Line lines = 4;
    oneof payment {
        string card = 5;
        string voucher = 6;
    }
}

message Ack {}
"#;

fn compile(
    config: CompilerConfig,
    loader: &MemoryLoader,
    inputs: &[&str],
) -> Result<BTreeMap<String, String>, SchemaError> {
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    Compiler::new(config).compile_with_loader(&inputs, loader)
}

fn nested() -> CompilerConfig {
    CompilerConfig {
        namespace_mode: NamespaceMode::Nested,
        ..CompilerConfig::default()
    }
}

#[test]
fn test_flat_artifacts() {
    let loader = MemoryLoader::new().with("shop.proto", SHOP);
    let output = compile(CompilerConfig::default(), &loader, &["shop.proto"]).expect("compile failed");

    assert_eq!(
        output.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["messages.rs", "mod.rs", "order_payment.rs", "status.rs"]
    );

    let messages = &output["messages.rs"];
    assert!(messages.starts_with("// @generated by protorec. Do not edit.\n// source: shop.proto\n"));
    assert!(messages.contains("use super::*;"));
    assert!(messages.contains("pub struct Order {"));
    assert!(messages.contains("pub struct OrderLine {"));
    assert!(messages.contains("pub struct Ack;"));
    assert!(messages.contains("pub struct Timestamp {"));
    assert!(messages.contains("pub created: ::core::option::Option<Timestamp>,"));
    assert!(messages.contains("pub lines: ::prost::alloc::vec::Vec<OrderLine>,"));
    assert!(messages.contains("pub payment: ::core::option::Option<OrderPayment>,"));
    assert_eq!(messages.matches("pub struct Order {").count(), 1);

    assert!(output["status.rs"].contains("pub enum Status {\n    Unknown = 0,\n    Open = 1,\n}"));
    assert!(!output["status.rs"].contains("use super::*;"));
    assert!(output["order_payment.rs"].contains("use super::*;"));
    assert!(output["order_payment.rs"].contains("pub enum OrderPayment {"));

    assert_eq!(
        output["mod.rs"],
        "// @generated by protorec. Do not edit.\n\
         \n\
         mod messages;\n\
         pub use self::messages::*;\n\
         \n\
         mod order_payment;\n\
         pub use self::order_payment::*;\n\
         \n\
         mod status;\n\
         pub use self::status::*;\n"
    );
}

#[test]
fn test_nested_artifacts() {
    let loader = MemoryLoader::new()
        .with("shop.proto", SHOP)
        .with(
            "acme/billing.proto",
            r#"
            package acme.billing;
            import "shop.proto";
            message Invoice { shop.Order order = 1; }
            "#,
        );
    let output = compile(nested(), &loader, &["acme/billing.proto"]).expect("compile failed");

    assert_eq!(
        output.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "acme/billing/messages.rs",
            "acme/billing/mod.rs",
            "acme/mod.rs",
            "google/mod.rs",
            "google/protobuf/messages.rs",
            "google/protobuf/mod.rs",
            "mod.rs",
            "shop/messages.rs",
            "shop/mod.rs",
            "shop/order_payment.rs",
            "shop/status.rs",
        ]
    );

    assert!(output["mod.rs"].contains("pub mod acme;\npub mod google;\npub mod shop;\n"));
    assert!(!output["mod.rs"].contains("mod messages;"));
    assert!(output["acme/mod.rs"].contains("pub mod billing;"));
    assert!(output["google/mod.rs"].contains("pub mod protobuf;"));
    assert!(output["google/protobuf/messages.rs"].contains("pub struct Timestamp {"));

    assert!(output["acme/billing/messages.rs"]
        .contains("pub order: ::core::option::Option<crate::proto::shop::Order>,"));
    assert!(output["shop/messages.rs"]
        .contains("pub created: ::core::option::Option<crate::proto::google::protobuf::Timestamp>,"));
    assert!(output["shop/messages.rs"].contains("#[prost(enumeration = \"Status\", optional, tag = \"2\")]"));
}

#[test]
fn test_include_imports_off() {
    let loader = MemoryLoader::new()
        .with("shop.proto", SHOP)
        .with("ext.proto", "package shop; import \"shop.proto\"; message Ext { Order order = 1; }");
    let config = CompilerConfig {
        include_imports: false,
        ..CompilerConfig::default()
    };
    let output = compile(config, &loader, &["ext.proto"]).expect("compile failed");

    assert_eq!(
        output.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["messages.rs", "mod.rs"]
    );
    assert!(output["messages.rs"].contains("pub struct Ext {"));
    assert!(!output["messages.rs"].contains("pub struct Order {"));
}

#[test]
fn test_well_known_only_when_referenced() {
    let loader = MemoryLoader::new().with(
        "plain.proto",
        "import \"google/protobuf/duration.proto\"; message Plain { int32 x = 1; }",
    );
    let output = compile(CompilerConfig::default(), &loader, &["plain.proto"]).expect("compile failed");
    assert!(!output["messages.rs"].contains("Duration"));

    let loader = MemoryLoader::new().with(
        "timed.proto",
        r#"
        import "google/protobuf/duration.proto";
        message Timed { map<string, google.protobuf.Duration> spans = 1; }
        "#,
    );
    let output = compile(CompilerConfig::default(), &loader, &["timed.proto"]).expect("compile failed");
    assert!(output["messages.rs"].contains("pub struct Duration {"));
    assert!(output["messages.rs"].contains("pub fn from_std(span: ::std::time::Duration) -> Self"));
}

#[test]
fn test_circular_imports() {
    let loader = MemoryLoader::new()
        .with("a.proto", "package p; import \"b.proto\"; message A { B b = 1; }")
        .with("b.proto", "package p; import \"a.proto\"; message B { A a = 1; int32 n = 2; }");
    let output = compile(CompilerConfig::default(), &loader, &["a.proto"]).expect("compile failed");

    let messages = &output["messages.rs"];
    assert!(messages.contains("// source: a.proto\n// source: b.proto\n"));
    assert!(messages.contains("pub b: ::core::option::Option<::prost::alloc::boxed::Box<B>>,"));
    assert!(messages.contains("pub a: ::core::option::Option<::prost::alloc::boxed::Box<A>>,"));
}

#[test]
fn test_unresolved_type_fails_compile() {
    let loader = MemoryLoader::new()
        .with("ok.proto", "message Fine { int32 x = 1; }")
        .with("bad.proto", "package shop; message Order { Customer buyer = 1; }");
    let err = compile(CompilerConfig::default(), &loader, &["ok.proto", "bad.proto"]).unwrap_err();

    assert_eq!(err.file(), Some("bad.proto"));
    let text = err.to_string();
    assert!(text.contains("bad.proto"));
    assert!(text.contains("Customer"));
}

#[test]
fn test_missing_import() {
    let loader = MemoryLoader::new().with("a.proto", "import \"nowhere/b.proto\"; message A { int32 x = 1; }");
    let err = compile(CompilerConfig::default(), &loader, &["a.proto"]).unwrap_err();

    match err {
        SchemaError::MissingImport { file, import } => {
            assert_eq!(file, "a.proto");
            assert_eq!(import, "nowhere/b.proto");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_missing_input() {
    let err = compile(CompilerConfig::default(), &MemoryLoader::new(), &["ghost.proto"]).unwrap_err();
    assert!(matches!(err, SchemaError::MissingInput(ref name) if name == "ghost.proto"));
}

#[test]
fn test_parse_errors_are_collected() {
    let loader = MemoryLoader::new()
        .with("one.proto", "message { }")
        .with("two.proto", "enum E {}")
        .with("fine.proto", "message Fine { int32 x = 1; }");
    let err = compile(CompilerConfig::default(), &loader, &["one.proto", "fine.proto", "two.proto"])
        .unwrap_err();

    match err {
        SchemaError::Multiple(errors) => {
            let files: Vec<Option<&str>> = errors.iter().map(|e| e.file()).collect();
            assert_eq!(files, vec![Some("one.proto"), Some("two.proto")]);
        }
        other => panic!("unexpected error {:?}", other),
    }

    let single = compile(CompilerConfig::default(), &loader, &["two.proto"]).unwrap_err();
    assert!(matches!(single, SchemaError::ParseError { ref file, .. } if file == "two.proto"));
}

#[test]
fn test_duplicate_field_number_fails_compile() {
    let loader = MemoryLoader::new().with("dup.proto", "message M { int32 a = 1; string b = 1; }");
    let err = compile(CompilerConfig::default(), &loader, &["dup.proto"]).unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateFieldNumber { number: 1, .. }));
}

#[test]
fn test_flat_mode_name_collision() {
    let loader = MemoryLoader::new()
        .with("x.proto", "package x; message Item { int32 id = 1; }")
        .with("y.proto", "package y; message Item { int32 id = 1; }");

    let err = compile(CompilerConfig::default(), &loader, &["x.proto", "y.proto"]).unwrap_err();
    match err {
        SchemaError::DuplicateDeclaration { name, namespace, first, second } => {
            assert_eq!(name, "Item");
            assert_eq!(namespace, "crate::proto");
            assert_eq!(first, "x.Item");
            assert_eq!(second, "y.Item");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let output = compile(nested(), &loader, &["x.proto", "y.proto"]).expect("compile failed");
    assert!(output.contains_key("x/messages.rs"));
    assert!(output.contains_key("y/messages.rs"));
}

#[test]
fn test_artifact_name_collision() {
    let loader = MemoryLoader::new().with(
        "c.proto",
        "enum OrderKind { ORDER_KIND_A = 0; } message Order { oneof kind { int32 a = 1; } }",
    );
    let err = compile(CompilerConfig::default(), &loader, &["c.proto"]).unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateDeclaration { .. }));
}

#[test]
fn test_package_module_collides_with_aggregate() {
    let loader = MemoryLoader::new()
        .with("foo.proto", "package foo; message Top { int32 id = 1; }")
        .with("inner.proto", "package foo.messages; message Deep { int32 id = 1; }");

    let err = compile(nested(), &loader, &["foo.proto", "inner.proto"]).unwrap_err();
    match err {
        SchemaError::DuplicateDeclaration { name, namespace, .. } => {
            assert_eq!(name, "messages");
            assert_eq!(namespace, "crate::proto::foo");
        }
        other => panic!("unexpected error {:?}", other),
    }

    // Without records in `foo` there is no aggregate to collide with.
    let output = compile(nested(), &loader, &["inner.proto"]).expect("compile failed");
    assert!(output.contains_key("foo/messages/messages.rs"));
    assert!(!output.contains_key("foo/messages.rs"));
    assert!(output["foo/mod.rs"].contains("pub mod messages;"));
}

#[test]
fn test_strict_fields() {
    let loader = MemoryLoader::new().with("m.proto", "message M { int32 = 1; string ok = 2; }");

    let output = compile(CompilerConfig::default(), &loader, &["m.proto"]).expect("compile failed");
    assert!(output["messages.rs"].contains("pub ok:"));

    let strict = CompilerConfig {
        strict_fields: true,
        ..CompilerConfig::default()
    };
    let err = compile(strict, &loader, &["m.proto"]).unwrap_err();
    assert!(matches!(err, SchemaError::ParseError { .. }));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = CompilerConfig {
        base_namespace: String::new(),
        ..CompilerConfig::default()
    };
    let loader = MemoryLoader::new().with("m.proto", "message M { int32 x = 1; }");
    let err = compile(config, &loader, &["m.proto"]).unwrap_err();
    assert!(matches!(err, SchemaError::Config(_)));
}

#[test]
fn test_compile_from_search_roots() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let root = dir.path().join("protos");
    fs::create_dir_all(root.join("acme")).expect("create_dir_all failed");
    fs::write(
        root.join("acme/order.proto"),
        "package acme; import \"acme/money.proto\"; message Order { Money total = 1; }",
    )
    .expect("write failed");
    fs::write(root.join("acme/money.proto"), "package acme; message Money { int64 units = 1; }")
        .expect("write failed");

    let inputs = vec![root.join("acme/order.proto"), root.join("acme/money.proto")];
    let output = Compiler::new(nested())
        .compile(&inputs, &[root.clone()])
        .expect("compile failed");

    let messages = &output["acme/messages.rs"];
    assert!(messages.contains("// source: acme/order.proto\n// source: acme/money.proto\n"));
    assert_eq!(messages.matches("pub struct Money {").count(), 1);

    let output = compile_protos(&[root.join("acme/order.proto")], &[root.clone()]).expect("compile failed");
    assert!(output["messages.rs"].contains("pub total: ::core::option::Option<Money>,"));

    let err = compile_protos(&[root.join("acme/missing.proto")], &[root.clone()]).unwrap_err();
    assert!(matches!(err, SchemaError::MissingInput(ref name) if name == "acme/missing.proto"));
}

#[test]
fn test_output_is_deterministic() {
    let loader = MemoryLoader::new().with("shop.proto", SHOP);
    let first = compile(nested(), &loader, &["shop.proto"]).expect("compile failed");
    let second = compile(nested(), &loader, &["shop.proto"]).expect("compile failed");
    assert_eq!(first, second);
    assert!(first.values().all(|code| code.starts_with("// @generated by protorec.")));
}
