use serde::Serialize;

/// One parsed `.proto` file. Immutable once the parser hands it out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaFile {
    pub name:     String,
    pub package:  Option<String>,
    pub syntax:   Option<String>,
    pub imports:  Vec<Import>,
    pub messages: Vec<Message>,
    pub enums:    Vec<EnumDef>,
    pub services: Vec<Service>,
}

impl SchemaFile {
    pub fn new(name: &str) -> Self {
        SchemaFile {
            name:     name.to_string(),
            package:  None,
            syntax:   None,
            imports:  Vec::new(),
            messages: Vec::new(),
            enums:    Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn import_paths(&self) -> Vec<&str> {
        self.imports.iter().map(|i| i.path.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Import {
    pub path:   String,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub name:     String,
    pub line:     usize,
    pub column:   usize,
    pub fields:   Vec<Field>,
    pub oneofs:   Vec<Oneof>,
    pub messages: Vec<Message>,
    pub enums:    Vec<EnumDef>,
}

impl Message {
    /// True when the message has nothing to carry on the wire.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.oneofs.is_empty()
    }

    /// Direct fields followed by every oneof member, in declaration order.
    pub fn all_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .chain(self.oneofs.iter().flat_map(|o| o.fields.iter()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Singular,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name:          String,
    pub line:          usize,
    pub column:        usize,
    pub type_:         FieldType,
    pub number:        i32,
    pub label:         Label,
    pub is_deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Oneof {
    pub name:   String,
    pub fields: Vec<Field>,
}

/// The type of a field as written. `Named` covers both message and enum
/// references; the registry tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldType {
    Scalar(ScalarKind),
    Named(String),
    Map(ScalarKind, Box<FieldType>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 15] = [
        ScalarKind::Double,
        ScalarKind::Float,
        ScalarKind::Int32,
        ScalarKind::Int64,
        ScalarKind::Uint32,
        ScalarKind::Uint64,
        ScalarKind::Sint32,
        ScalarKind::Sint64,
        ScalarKind::Fixed32,
        ScalarKind::Fixed64,
        ScalarKind::Sfixed32,
        ScalarKind::Sfixed64,
        ScalarKind::Bool,
        ScalarKind::String,
        ScalarKind::Bytes,
    ];

    pub fn from_keyword(word: &str) -> Option<ScalarKind> {
        ScalarKind::ALL.iter().copied().find(|k| k.keyword() == word)
    }

    /// The schema keyword, which is also the prost attribute kind.
    pub fn keyword(self) -> &'static str {
        match self {
            ScalarKind::Double   => "double",
            ScalarKind::Float    => "float",
            ScalarKind::Int32    => "int32",
            ScalarKind::Int64    => "int64",
            ScalarKind::Uint32   => "uint32",
            ScalarKind::Uint64   => "uint64",
            ScalarKind::Sint32   => "sint32",
            ScalarKind::Sint64   => "sint64",
            ScalarKind::Fixed32  => "fixed32",
            ScalarKind::Fixed64  => "fixed64",
            ScalarKind::Sfixed32 => "sfixed32",
            ScalarKind::Sfixed64 => "sfixed64",
            ScalarKind::Bool     => "bool",
            ScalarKind::String   => "string",
            ScalarKind::Bytes    => "bytes",
        }
    }

    /// Numeric kinds are the only ones with a packed repeated encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, ScalarKind::String | ScalarKind::Bytes)
    }

    pub fn is_valid_map_key(self) -> bool {
        !matches!(
            self,
            ScalarKind::Double | ScalarKind::Float | ScalarKind::Bytes
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumDef {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    pub name:   String,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub name:    String,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Method {
    pub name:             String,
    pub input_type:       String,
    pub output_type:      String,
    pub client_streaming: bool,
    pub server_streaming: bool,
}
