use crate::{
    config::CompilerConfig,
    error::SchemaError,
    registry::{ResolvedType, Symbol, SymbolRegistry},
    types::{EnumDef, Field, FieldType, Label, Message, Oneof, ScalarKind, SchemaFile},
    utils::{escape_rust_keyword, to_pascal_case, to_snake_case},
    well_known::{self, WellKnownType},
};
use log::warn;
use std::collections::{HashMap, HashSet};

const RECORD_DERIVES: &str = "#[derive(Clone, PartialEq, ::prost::Message)]";
const MARKER_DERIVES: &str = "#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]";
const ONEOF_DERIVES:  &str = "#[derive(Clone, PartialEq, ::prost::Oneof)]";
const ENUM_DERIVES:   &str =
    "#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]";

const STRING_TYPE: &str = "::prost::alloc::string::String";
const BYTES_TYPE:  &str = "::prost::alloc::vec::Vec<u8>";

/// Where a declaration is being emitted from: the file, and the chain of
/// enclosing messages references are resolved in.
#[derive(Debug, Clone)]
pub struct EmitContext<'a> {
    pub registry: &'a SymbolRegistry,
    pub config:   &'a CompilerConfig,
    pub file:     &'a SchemaFile,
    pub scope:    Vec<String>,
}

/// How one resolved type is spelled in Rust and in prost attributes.
#[derive(Debug, Clone)]
struct Shape {
    rust:     String,
    kind:     String,
    map_kind: String,
    packable: bool,
    target:   Option<Symbol>,
}

impl<'a> EmitContext<'a> {
    pub fn new(registry: &'a SymbolRegistry, config: &'a CompilerConfig, file: &'a SchemaFile) -> Self {
        EmitContext {
            registry,
            config,
            file,
            scope: Vec::new(),
        }
    }

    /// The context inside message `name`.
    pub fn nested(&self, name: &str) -> EmitContext<'a> {
        let mut scope = self.scope.clone();
        scope.push(name.to_string());
        EmitContext {
            scope,
            ..self.clone()
        }
    }

    pub fn namespace(&self) -> String {
        self.config.namespace_for(self.file.package.as_deref())
    }

    pub fn namespace_dir(&self) -> Vec<String> {
        self.config.namespace_dir(self.file.package.as_deref())
    }

    /// Rust name of the declaration `name` in the current scope.
    pub fn type_name(&self, name: &str) -> String {
        type_name(&self.scope, name)
    }

    /// Rust name of the union for oneof `name` of the innermost message.
    pub fn oneof_type_name(&self, name: &str) -> String {
        let owner = match self.scope.split_last() {
            Some((last, parents)) => type_name(parents, last),
            None => String::new(),
        };
        escape_rust_keyword(&(owner + &to_pascal_case(name)))
    }

    /// Schema name of the innermost message, qualified with the package.
    pub fn qualified_scope(&self) -> String {
        let nested = self.scope.join(".");
        match self.file.package.as_deref() {
            Some(package) if !package.is_empty() => format!("{}.{}", package, nested),
            _ => nested,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<ResolvedType> {
        self.registry.resolve_scoped(
            name,
            &self.file.name,
            self.file.package.as_deref(),
            &self.scope,
        )
    }

    /// Resolves one non-map field type; failure names the field.
    fn resolve_field(&self, field: &Field, type_: &FieldType) -> Result<ResolvedType, SchemaError> {
        match type_ {
            FieldType::Scalar(kind) => Ok(ResolvedType::Scalar(*kind)),
            FieldType::Named(name) => self.resolve(name).ok_or_else(|| SchemaError::UnresolvedType {
                file:      self.file.name.clone(),
                message:   self.qualified_scope(),
                field:     field.name.clone(),
                type_name: name.clone(),
            }),
            FieldType::Map(..) => Err(SchemaError::UnresolvedType {
                file:      self.file.name.clone(),
                message:   self.qualified_scope(),
                field:     field.name.clone(),
                type_name: "nested map".to_string(),
            }),
        }
    }

    /// `Name` inside the current namespace, `path::to::Name` outside it.
    fn reference(&self, namespace: &str, name: &str) -> String {
        if namespace == self.namespace() {
            name.to_string()
        } else {
            format!("{}::{}", namespace, name)
        }
    }

    fn shape(&self, resolved: &ResolvedType) -> Shape {
        match resolved {
            ResolvedType::Scalar(kind) => Shape {
                rust:     scalar_rust_type(*kind).to_string(),
                kind:     scalar_prost_kind(*kind),
                map_kind: kind.keyword().to_string(),
                packable: kind.is_packable(),
                target:   None,
            },
            // prost encodes the Rust scalar itself as the wrapper message.
            ResolvedType::Wrapper(kind) => Shape {
                rust:     scalar_rust_type(*kind).to_string(),
                kind:     "message".to_string(),
                map_kind: "message".to_string(),
                packable: false,
                target:   None,
            },
            ResolvedType::WellKnown(known) => {
                let rust = if known.is_composite() {
                    let namespace = self.config.namespace_for(Some(well_known::NAMESPACE));
                    self.reference(&namespace, known.simple_name())
                } else {
                    "()".to_string()
                };
                Shape {
                    rust,
                    kind:     "message".to_string(),
                    map_kind: "message".to_string(),
                    packable: false,
                    target:   None,
                }
            }
            ResolvedType::Message(symbol) => Shape {
                rust:     self.symbol_reference(symbol),
                kind:     "message".to_string(),
                map_kind: "message".to_string(),
                packable: false,
                target:   Some(symbol.clone()),
            },
            ResolvedType::Enum(symbol) => {
                let path = self.symbol_reference(symbol);
                Shape {
                    rust:     "i32".to_string(),
                    kind:     format!("enumeration = \"{}\"", path),
                    map_kind: format!("enumeration({})", path),
                    packable: true,
                    target:   None,
                }
            }
        }
    }

    fn symbol_reference(&self, symbol: &Symbol) -> String {
        let namespace = self.config.namespace_for(symbol.package.as_deref());
        self.reference(&namespace, &symbol_type_name(symbol))
    }

    /// A singular message field must be boxed when its type contains the
    /// innermost message again.
    fn needs_box(&self, shape: &Shape) -> bool {
        let Some(target) = &shape.target else {
            return false;
        };
        let Some(owner) = self
            .registry
            .message_symbol(self.file.package.as_deref(), &self.scope)
        else {
            return false;
        };
        target == owner || self.registry.reaches(target, owner)
    }
}

pub fn type_name(parents: &[String], name: &str) -> String {
    let mut rust_name: String = parents.iter().map(|p| to_pascal_case(p)).collect();
    rust_name.push_str(&to_pascal_case(name));
    escape_rust_keyword(&rust_name)
}

pub fn symbol_type_name(symbol: &Symbol) -> String {
    type_name(&symbol.parents, &symbol.name)
}

pub fn field_name(name: &str) -> String {
    escape_rust_keyword(&to_snake_case(name))
}

fn scalar_rust_type(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Double => "f64",
        ScalarKind::Float => "f32",
        ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => "i32",
        ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => "i64",
        ScalarKind::Uint32 | ScalarKind::Fixed32 => "u32",
        ScalarKind::Uint64 | ScalarKind::Fixed64 => "u64",
        ScalarKind::Bool => "bool",
        ScalarKind::String => STRING_TYPE,
        ScalarKind::Bytes => BYTES_TYPE,
    }
}

fn scalar_prost_kind(kind: ScalarKind) -> String {
    match kind {
        ScalarKind::Bytes => "bytes = \"vec\"".to_string(),
        other => other.keyword().to_string(),
    }
}

/// Emits one record. Messages without fields or oneofs become a marker
/// unit struct instead.
pub fn emit_record(message: &Message, ctx: &EmitContext) -> Result<String, SchemaError> {
    let name = ctx.type_name(&message.name);
    if message.is_empty() {
        return Ok(emit_marker(&name));
    }

    let inner = ctx.nested(&message.name);
    let mut members = Vec::new();

    for field in &message.fields {
        members.push(emit_field(field, &inner)?);
    }

    for oneof in &message.oneofs {
        let union = inner.oneof_type_name(&oneof.name);
        let tags = oneof
            .fields
            .iter()
            .map(|f| f.number.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        members.push(format!(
            "    #[prost(oneof = \"{}\", tags = \"{}\")]\n    pub {}: ::core::option::Option<{}>,",
            union,
            tags,
            field_name(&oneof.name),
            union
        ));
    }

    Ok(format!(
        "{}\npub struct {} {{\n{}\n}}\n",
        RECORD_DERIVES,
        name,
        members.join("\n")
    ))
}

fn emit_field(field: &Field, ctx: &EmitContext) -> Result<String, SchemaError> {
    let (attribute, rust_type) = match &field.type_ {
        FieldType::Map(key, value) => {
            let value = ctx.shape(&ctx.resolve_field(field, value)?);
            (
                format!(
                    "#[prost(map = \"{}, {}\", tag = \"{}\")]",
                    key.keyword(),
                    value.map_kind,
                    field.number
                ),
                format!(
                    "::std::collections::HashMap<{}, {}>",
                    scalar_rust_type(*key),
                    value.rust
                ),
            )
        }
        other => {
            let shape = ctx.shape(&ctx.resolve_field(field, other)?);
            match field.label {
                Label::Repeated => {
                    let packed = if shape.packable { ", packed = \"true\"" } else { "" };
                    (
                        format!(
                            "#[prost({}, repeated{}, tag = \"{}\")]",
                            shape.kind, packed, field.number
                        ),
                        format!("::prost::alloc::vec::Vec<{}>", shape.rust),
                    )
                }
                Label::Singular => {
                    let boxed = ctx.needs_box(&shape);
                    let value = if boxed {
                        format!("::prost::alloc::boxed::Box<{}>", shape.rust)
                    } else {
                        shape.rust.clone()
                    };
                    (
                        format!(
                            "#[prost({}, optional{}, tag = \"{}\")]",
                            shape.kind,
                            if boxed { ", boxed" } else { "" },
                            field.number
                        ),
                        format!("::core::option::Option<{}>", value),
                    )
                }
            }
        }
    };

    let mut lines = String::new();
    if field.is_deprecated {
        lines.push_str("    #[deprecated]\n");
    }
    lines.push_str(&format!(
        "    {}\n    pub {}: {},",
        attribute,
        field_name(&field.name),
        rust_type
    ));
    Ok(lines)
}

/// A zero-member message: a unit struct with a hand-written `Message` impl
/// that encodes to nothing and skips whatever it reads.
fn emit_marker(name: &str) -> String {
    format!(
        r#"{derives}
pub struct {name};

impl ::prost::Message for {name} {{
    fn encode_raw(&self, _buf: &mut impl ::prost::bytes::BufMut) {{}}

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: ::prost::encoding::WireType,
        buf: &mut impl ::prost::bytes::Buf,
        ctx: ::prost::encoding::DecodeContext,
    ) -> ::core::result::Result<(), ::prost::DecodeError> {{
        ::prost::encoding::skip_field(wire_type, tag, buf, ctx)
    }}

    fn encoded_len(&self) -> usize {{
        0
    }}

    fn clear(&mut self) {{}}
}}
"#,
        derives = MARKER_DERIVES,
        name = name
    )
}

/// Emits the closed union for a oneof. `ctx` must be the owning message's
/// inner context.
pub fn emit_oneof(oneof: &Oneof, ctx: &EmitContext) -> Result<String, SchemaError> {
    let name = ctx.oneof_type_name(&oneof.name);
    let mut variants = Vec::new();

    for field in &oneof.fields {
        let shape = ctx.shape(&ctx.resolve_field(field, &field.type_)?);
        let boxed = ctx.needs_box(&shape);
        let (kind, payload) = if boxed {
            (
                format!("{}, boxed", shape.kind),
                format!("::prost::alloc::boxed::Box<{}>", shape.rust),
            )
        } else {
            (shape.kind.clone(), shape.rust.clone())
        };
        let mut variant = String::new();
        if field.is_deprecated {
            variant.push_str("    #[deprecated]\n");
        }
        variant.push_str(&format!(
            "    #[prost({}, tag = \"{}\")]\n    {}({}),",
            kind,
            field.number,
            escape_rust_keyword(&to_pascal_case(&field.name)),
            payload
        ));
        variants.push(variant);
    }

    Ok(format!(
        "{}\npub enum {} {{\n{}\n}}\n",
        ONEOF_DERIVES,
        name,
        variants.join("\n")
    ))
}

/// `COLOR_RED` in enum `Color` becomes `Red`; the prefix is kept when
/// stripping it would not leave an identifier.
fn variant_name(value: &str, prefix: &str) -> String {
    let stripped = value
        .strip_prefix(prefix)
        .filter(|rest| rest.chars().next().map_or(false, |c| c.is_ascii_alphabetic()))
        .unwrap_or(value);
    escape_rust_keyword(&to_pascal_case(stripped))
}

/// Emits an enumeration plus name conversion helpers. Aliases (values
/// repeating an earlier number) get no variant of their own.
pub fn emit_enum(enum_def: &EnumDef, ctx: &EmitContext) -> String {
    let name = ctx.type_name(&enum_def.name);
    let prefix = format!("{}_", to_snake_case(&enum_def.name).to_uppercase());

    let mut by_number: HashMap<i32, String> = HashMap::new();
    let mut variants = Vec::new();
    let mut from_names = Vec::new();
    let mut seen_variants = HashSet::new();

    for value in &enum_def.values {
        if let Some(existing) = by_number.get(&value.number) {
            warn!(
                "{}: enum {} value {} aliases {}; no separate variant emitted",
                ctx.file.name, enum_def.name, value.name, existing
            );
            from_names.push(format!(
                "            \"{}\" => ::core::option::Option::Some(Self::{}),",
                value.name, existing
            ));
            continue;
        }
        let mut variant = variant_name(&value.name, &prefix);
        if seen_variants.contains(&variant) {
            variant = escape_rust_keyword(&to_pascal_case(&value.name));
        }
        if seen_variants.contains(&variant) {
            let base = variant.trim_end_matches('_').to_string();
            let mut suffix = 2;
            while seen_variants.contains(&format!("{}{}", base, suffix)) {
                suffix += 1;
            }
            variant = format!("{}{}", base, suffix);
        }
        seen_variants.insert(variant.clone());
        by_number.insert(value.number, variant.clone());
        variants.push((variant.clone(), value));
        from_names.push(format!(
            "            \"{}\" => ::core::option::Option::Some(Self::{}),",
            value.name, variant
        ));
    }

    let body = variants
        .iter()
        .map(|(variant, value)| format!("    {} = {},", variant, value.number))
        .collect::<Vec<_>>()
        .join("\n");
    let as_names = variants
        .iter()
        .map(|(variant, value)| format!("            Self::{} => \"{}\",", variant, value.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{derives}
#[repr(i32)]
pub enum {name} {{
{body}
}}

impl {name} {{
    /// The value's name as written in the schema.
    pub fn as_str_name(&self) -> &'static str {{
        match self {{
{as_names}
        }}
    }}

    /// Looks a value up by its schema name.
    pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {{
        match value {{
{from_names}
            _ => ::core::option::Option::None,
        }}
    }}
}}
",
        derives = ENUM_DERIVES,
        name = name,
        body = body,
        as_names = as_names,
        from_names = from_names.join("\n"),
    )
}

const TIMESTAMP_HELPERS: &str = r#"
impl Timestamp {
    /// Converts a native instant into its wire form.
    pub fn from_system_time(time: ::std::time::SystemTime) -> Self {
        match time.duration_since(::std::time::UNIX_EPOCH) {
            ::core::result::Result::Ok(since) => Timestamp {
                seconds: ::core::cmp::min(since.as_secs(), i64::MAX as u64) as i64,
                nanos: since.subsec_nanos() as i32,
            },
            ::core::result::Result::Err(err) => {
                let before = err.duration();
                let mut seconds = -(::core::cmp::min(before.as_secs(), i64::MAX as u64) as i64);
                let mut nanos = -(before.subsec_nanos() as i32);
                if nanos < 0 {
                    seconds -= 1;
                    nanos += 1_000_000_000;
                }
                Timestamp { seconds, nanos }
            }
        }
    }

    /// `None` when `nanos` is outside `0..1_000_000_000` or the instant does
    /// not fit the native type.
    pub fn to_system_time(&self) -> ::core::option::Option<::std::time::SystemTime> {
        if !(0..1_000_000_000).contains(&self.nanos) {
            return ::core::option::Option::None;
        }
        let nanos = ::std::time::Duration::new(0, self.nanos as u32);
        let whole = ::std::time::Duration::from_secs(self.seconds.unsigned_abs());
        let base = if self.seconds >= 0 {
            ::std::time::UNIX_EPOCH.checked_add(whole)?
        } else {
            ::std::time::UNIX_EPOCH.checked_sub(whole)?
        };
        base.checked_add(nanos)
    }
}

impl ::core::convert::From<::std::time::SystemTime> for Timestamp {
    fn from(time: ::std::time::SystemTime) -> Self {
        Self::from_system_time(time)
    }
}
"#;

const DURATION_HELPERS: &str = r#"
impl Duration {
    /// Converts a native span into its wire form. Spans past `i64::MAX`
    /// seconds saturate.
    pub fn from_std(span: ::std::time::Duration) -> Self {
        Duration {
            seconds: ::core::cmp::min(span.as_secs(), i64::MAX as u64) as i64,
            nanos: span.subsec_nanos() as i32,
        }
    }

    /// `None` for negative or malformed spans, which the native type cannot hold.
    pub fn to_std(&self) -> ::core::option::Option<::std::time::Duration> {
        if self.seconds < 0 || !(0..1_000_000_000).contains(&self.nanos) {
            return ::core::option::Option::None;
        }
        ::core::option::Option::Some(::std::time::Duration::new(self.seconds as u64, self.nanos as u32))
    }
}

impl ::core::convert::From<::std::time::Duration> for Duration {
    fn from(span: ::std::time::Duration) -> Self {
        Self::from_std(span)
    }
}
"#;

/// Emits the synthetic record of a composite well-known type, with its
/// native conversion helpers. `Empty` maps to `()` and emits nothing.
pub fn emit_well_known(known: WellKnownType) -> Option<String> {
    if !known.is_composite() {
        return None;
    }

    let members = known
        .members()
        .iter()
        .map(|member| {
            let (kind, rust) = (scalar_prost_kind(member.kind), scalar_rust_type(member.kind));
            match member.label {
                Label::Repeated => format!(
                    "    #[prost({}, repeated, tag = \"{}\")]\n    pub {}: ::prost::alloc::vec::Vec<{}>,",
                    kind, member.number, member.name, rust
                ),
                Label::Singular => format!(
                    "    #[prost({}, tag = \"{}\")]\n    pub {}: {},",
                    kind, member.number, member.name, rust
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut code = format!(
        "{}\npub struct {} {{\n{}\n}}\n",
        RECORD_DERIVES,
        known.simple_name(),
        members
    );
    match known {
        WellKnownType::Timestamp => code.push_str(TIMESTAMP_HELPERS),
        WellKnownType::Duration => code.push_str(DURATION_HELPERS),
        _ => {}
    }
    Some(code)
}
