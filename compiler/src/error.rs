use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path:   String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: parse error at line {line}, column {column}: {msg}")]
    ParseError {
        file:   String,
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Input file {0} not found")]
    MissingInput(String),

    #[error("{file}: import {import} not found on any search root")]
    MissingImport {
        file:   String,
        import: String,
    },

    #[error("{file}: type {type_name} of field {field} in message {message} cannot be resolved")]
    UnresolvedType {
        file:      String,
        message:   String,
        field:     String,
        type_name: String,
    },

    #[error("{file}: field number {number} is used by both {first} and {second} in message {message}")]
    DuplicateFieldNumber {
        file:    String,
        message: String,
        number:  i32,
        first:   String,
        second:  String,
    },

    #[error("The type {name} is defined in both {first} and {second}")]
    DuplicateSymbol {
        name:   String,
        first:  String,
        second: String,
    },

    #[error("Generated name {name} in {namespace} is produced by both {first} and {second}")]
    DuplicateDeclaration {
        name:      String,
        namespace: String,
        first:     String,
        second:    String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{} schema files failed:\n{}", .0.len(), summarize(.0))]
    Multiple(Vec<SchemaError>),
}

impl SchemaError {
    /// The schema file the failure belongs to, when a single one is known.
    pub fn file(&self) -> Option<&str> {
        match self {
            SchemaError::ParseError { file, .. }
            | SchemaError::MissingImport { file, .. }
            | SchemaError::UnresolvedType { file, .. }
            | SchemaError::DuplicateFieldNumber { file, .. } => Some(file),
            SchemaError::Io { path, .. } => Some(path),
            SchemaError::MissingInput(path) => Some(path),
            SchemaError::DuplicateSymbol { second, .. } => Some(second),
            _ => None,
        }
    }

    /// Collapses a list of failures: one error stays as-is, several become `Multiple`.
    pub fn collect(mut errors: Vec<SchemaError>) -> Option<SchemaError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(SchemaError::Multiple(errors)),
        }
    }
}

fn summarize(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
