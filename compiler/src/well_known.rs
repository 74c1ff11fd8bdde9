//! Built-in resolution of the `google.protobuf` types.
//!
//! These are never read from files. Composite types are described member by
//! member so the emitter can synthesize them with their exact wire layout.

use crate::types::{Label, ScalarKind};
use serde::Serialize;

pub const NAMESPACE: &str = "google.protobuf";
pub const IMPORT_PREFIX: &str = "google/protobuf/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum WellKnownType {
    Timestamp,
    Duration,
    Any,
    FieldMask,
    Empty,
}

/// What a well-known name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    Type(WellKnownType),
    /// A boxed scalar such as `StringValue`.
    Wrapper(ScalarKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeMember {
    pub name:   &'static str,
    pub kind:   ScalarKind,
    pub label:  Label,
    pub number: i32,
}

const SECONDS_AND_NANOS: [CompositeMember; 2] = [
    CompositeMember { name: "seconds", kind: ScalarKind::Int64, label: Label::Singular, number: 1 },
    CompositeMember { name: "nanos",   kind: ScalarKind::Int32, label: Label::Singular, number: 2 },
];

const ANY_MEMBERS: [CompositeMember; 2] = [
    CompositeMember { name: "type_url", kind: ScalarKind::String, label: Label::Singular, number: 1 },
    CompositeMember { name: "value",    kind: ScalarKind::Bytes,  label: Label::Singular, number: 2 },
];

const FIELD_MASK_MEMBERS: [CompositeMember; 1] = [
    CompositeMember { name: "paths", kind: ScalarKind::String, label: Label::Repeated, number: 1 },
];

impl WellKnownType {
    pub fn simple_name(self) -> &'static str {
        match self {
            WellKnownType::Timestamp => "Timestamp",
            WellKnownType::Duration  => "Duration",
            WellKnownType::Any       => "Any",
            WellKnownType::FieldMask => "FieldMask",
            WellKnownType::Empty     => "Empty",
        }
    }

    pub fn full_name(self) -> String {
        format!("{}.{}", NAMESPACE, self.simple_name())
    }

    /// Members of the synthesized record. `Empty` has none: it maps to `()`.
    pub fn members(self) -> &'static [CompositeMember] {
        match self {
            WellKnownType::Timestamp | WellKnownType::Duration => &SECONDS_AND_NANOS,
            WellKnownType::Any => &ANY_MEMBERS,
            WellKnownType::FieldMask => &FIELD_MASK_MEMBERS,
            WellKnownType::Empty => &[],
        }
    }

    /// Whether a declaration has to be emitted for this type.
    pub fn is_composite(self) -> bool {
        self != WellKnownType::Empty
    }
}

pub fn in_namespace(full_name: &str) -> bool {
    full_name
        .strip_prefix(NAMESPACE)
        .map_or(false, |rest| rest.starts_with('.'))
}

/// Resolves a fully qualified `google.protobuf.*` name.
pub fn lookup(full_name: &str) -> Option<WellKnown> {
    let simple = full_name.strip_prefix(NAMESPACE)?.strip_prefix('.')?;
    let resolved = match simple {
        "Timestamp"   => WellKnown::Type(WellKnownType::Timestamp),
        "Duration"    => WellKnown::Type(WellKnownType::Duration),
        "Any"         => WellKnown::Type(WellKnownType::Any),
        "FieldMask"   => WellKnown::Type(WellKnownType::FieldMask),
        "Empty"       => WellKnown::Type(WellKnownType::Empty),
        "DoubleValue" => WellKnown::Wrapper(ScalarKind::Double),
        "FloatValue"  => WellKnown::Wrapper(ScalarKind::Float),
        "Int64Value"  => WellKnown::Wrapper(ScalarKind::Int64),
        "UInt64Value" => WellKnown::Wrapper(ScalarKind::Uint64),
        "Int32Value"  => WellKnown::Wrapper(ScalarKind::Int32),
        "UInt32Value" => WellKnown::Wrapper(ScalarKind::Uint32),
        "BoolValue"   => WellKnown::Wrapper(ScalarKind::Bool),
        "StringValue" => WellKnown::Wrapper(ScalarKind::String),
        "BytesValue"  => WellKnown::Wrapper(ScalarKind::Bytes),
        _ => return None,
    };
    Some(resolved)
}

/// Imports like `google/protobuf/timestamp.proto` are served by the table above.
pub fn is_well_known_import(path: &str) -> bool {
    path.starts_with(IMPORT_PREFIX)
}
