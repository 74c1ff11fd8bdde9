//! protorec-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for `.proto` schema files,
//!  2) A symbol registry resolving type references across files, including
//!     the built-in `google.protobuf` types,
//!  3) Code generation of `prost`-annotated Rust (`gen_rust`),
//!  4) An output scheduler grouping declarations into module files,
//!  5) The two-pass `Compiler` API and the `SchemaError` type.

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod well_known;
pub mod registry;
pub mod config;
pub mod gen_rust;
pub mod scheduler;
pub mod traits;
pub mod loader;
pub mod compiler;

pub use compiler::{compile_protos, Compiler};
pub use config::{CompilerConfig, NamespaceMode};
pub use error::SchemaError;
pub use loader::{FsLoader, MemoryLoader};
pub use parser::{parse_schema, parse_schema_with, ParseOptions};
pub use registry::{ResolvedType, SymbolRegistry};
pub use traits::SchemaLoader;
